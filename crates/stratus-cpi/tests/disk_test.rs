mod common;

use common::*;
use serde_json::json;
use stratus_cloud::{CloudError, DiskSource};

#[tokio::test]
async fn test_create_disk_in_default_zone() {
    let t = TestCloud::new();

    let disk_id = t.cloud.create_disk(2048, None).await.unwrap();

    assert!(disk_id.starts_with("disk-"));
    let params = &t.api.inserted_disks()[0];
    assert_eq!(params.zone, DEFAULT_ZONE);
    assert_eq!(params.source, DiskSource::Blank { size_gb: 2 });
    assert_eq!(params.description, "Disk managed by BOSH");
}

#[tokio::test]
async fn test_create_disk_next_to_vm() {
    let t = TestCloud::new();
    let vm_id = t
        .create_vm(json!({ "instance_type": "n1-standard-1", "zone": "us-central1-f" }))
        .await;

    let disk_id = t.cloud.create_disk(1024, Some(&vm_id)).await.unwrap();

    assert_eq!(t.api.disk(&disk_id).unwrap().zone_name(), "us-central1-f");
}

#[tokio::test]
async fn test_create_disk_for_missing_vm() {
    let t = TestCloud::new();
    let err = t.cloud.create_disk(1024, Some("vm-404")).await.unwrap_err();
    assert!(matches!(err, CloudError::VmNotFound(_)));
    assert!(t.api.inserted_disks().is_empty());
}

#[tokio::test]
async fn test_create_disk_size_bounds() {
    let t = TestCloud::new();

    let err = t.cloud.create_disk(0, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Minimum disk size is 1 GiB and you set 0 GiB");

    let err = t.cloud.create_disk(1024 * 100_000, None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Maximum disk size is 10 TiB and you set 100000 GiB"
    );
    assert!(t.api.inserted_disks().is_empty());
}

#[tokio::test]
async fn test_attach_and_detach_track_registry() {
    let t = TestCloud::new();
    let vm_id = t.create_vm(small_pool()).await;
    let disk_id = t.cloud.create_disk(1024, Some(&vm_id)).await.unwrap();
    assert!(t.cloud.get_disks(&vm_id).await.unwrap().is_empty());

    t.cloud.attach_disk(&vm_id, &disk_id).await.unwrap();

    assert_eq!(t.cloud.get_disks(&vm_id).await.unwrap(), vec![disk_id.clone()]);
    let settings = t.registry.get(&vm_id).unwrap();
    assert_eq!(settings.disks.persistent[&disk_id], "persistent-disk-1");

    t.cloud.detach_disk(&vm_id, &disk_id).await.unwrap();

    assert!(t.cloud.get_disks(&vm_id).await.unwrap().is_empty());
    assert!(t.registry.get(&vm_id).unwrap().disks.persistent.is_empty());
}

#[tokio::test]
async fn test_detach_unattached_disk() {
    let t = TestCloud::new();
    let vm_id = t.create_vm(small_pool()).await;
    let disk_id = t.cloud.create_disk(1024, Some(&vm_id)).await.unwrap();
    t.api.clear_calls();

    let err = t.cloud.detach_disk(&vm_id, &disk_id).await.unwrap_err();

    assert!(matches!(err, CloudError::DiskNotAttached { .. }));
    assert!(t.api.mutations().is_empty());
}

#[tokio::test]
async fn test_attach_missing_disk() {
    let t = TestCloud::new();
    let vm_id = t.create_vm(small_pool()).await;

    let err = t.cloud.attach_disk(&vm_id, "disk-404").await.unwrap_err();
    assert!(matches!(err, CloudError::DiskNotFound(_)));
    assert_eq!(t.api.call_count("attach_disk"), 0);
}

#[tokio::test]
async fn test_delete_disk() {
    let t = TestCloud::new();
    let disk_id = t.cloud.create_disk(1024, None).await.unwrap();

    t.cloud.delete_disk(&disk_id).await.unwrap();
    assert!(t.api.disk(&disk_id).is_none());

    let err = t.cloud.delete_disk(&disk_id).await.unwrap_err();
    assert!(matches!(err, CloudError::DiskNotFound(_)));
}

#[tokio::test]
async fn test_snapshot_lifecycle() {
    let t = TestCloud::new();
    let disk_id = t.cloud.create_disk(1024, None).await.unwrap();

    let metadata = json!({ "deployment": "cf", "job": "router", "index": 0 });
    let snapshot_id = t
        .cloud
        .snapshot_disk(&disk_id, metadata.as_object().unwrap())
        .await
        .unwrap();

    assert!(snapshot_id.starts_with("snapshot-"));
    assert!(t.api.has_snapshot(&snapshot_id));

    t.cloud.delete_snapshot(&snapshot_id).await.unwrap();
    assert!(!t.api.has_snapshot(&snapshot_id));

    let err = t.cloud.delete_snapshot(&snapshot_id).await.unwrap_err();
    assert!(matches!(err, CloudError::SnapshotNotFound(_)));
}
