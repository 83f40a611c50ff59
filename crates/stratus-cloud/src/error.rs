//! Cloud provider error types

use thiserror::Error;

/// Errors surfaced by the provider layer and by every manager built on it.
#[derive(Error, Debug)]
pub enum CloudError {
    /// Validation failures and generic cloud errors carrying a descriptive message.
    #[error("{0}")]
    Cloud(String),

    #[error("Disk `{0}' not found")]
    DiskNotFound(String),

    #[error("Image `{0}' not found")]
    ImageNotFound(String),

    #[error("VM `{0}' not found")]
    VmNotFound(String),

    #[error("Disk snapshot `{0}' not found")]
    SnapshotNotFound(String),

    /// A resource vanished while being waited on.
    #[error("{0} not found")]
    ResourceNotFound(String),

    /// The provider failed while reloading a resource, or reported a terminal failure.
    #[error("{description} returned an error: {message}")]
    ResourceError { description: String, message: String },

    /// Polled resource is still transitioning. Only used as a retry signal.
    #[error("{0} is not ready yet")]
    NotReady(String),

    #[error("{0}")]
    Timeout(String),

    #[error("VM creation failed: {source}")]
    VmCreationFailed {
        cleanup_required: bool,
        #[source]
        source: Box<CloudError>,
    },

    /// The requested change needs the VM to be recreated.
    #[error("{0}")]
    NotSupported(String),

    #[error("Disk `{disk}' is not attached to vm `{vm}'")]
    DiskNotAttached { disk: String, vm: String },

    #[error("`{0}' is not implemented by this CPI")]
    NotImplemented(String),

    #[error("Task cancelled: {0}")]
    Cancelled(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn cloud(message: impl Into<String>) -> Self {
        CloudError::Cloud(message.into())
    }

    /// Wraps an error raised while provisioning a VM. Already wrapped errors pass through.
    pub fn vm_creation_failed(source: CloudError) -> Self {
        match source {
            err @ CloudError::VmCreationFailed { .. } => err,
            other => CloudError::VmCreationFailed {
                cleanup_required: true,
                source: Box::new(other),
            },
        }
    }

    /// True for the NotFound family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CloudError::DiskNotFound(_)
                | CloudError::ImageNotFound(_)
                | CloudError::VmNotFound(_)
                | CloudError::SnapshotNotFound(_)
                | CloudError::ResourceNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
