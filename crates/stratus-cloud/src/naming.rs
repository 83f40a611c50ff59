//! Generated resource names

use uuid::Uuid;

pub const VM_PREFIX: &str = "vm";
pub const DISK_PREFIX: &str = "disk";
pub const SNAPSHOT_PREFIX: &str = "snapshot";
pub const STEMCELL_PREFIX: &str = "stemcell";

/// `<prefix>-<uuid v4>`, lower-case so it is a valid provider resource name
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name() {
        let a = unique_name(DISK_PREFIX);
        let b = unique_name(DISK_PREFIX);

        assert!(a.starts_with("disk-"));
        assert_eq!(a.len(), "disk-".len() + 36);
        assert_ne!(a, b);
        assert_eq!(a, a.to_lowercase());
    }
}
