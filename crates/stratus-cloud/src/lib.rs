//! Stratus compute provider layer
//!
//! Everything the CPI core needs from the cloud platform, expressed as
//! provider-neutral traits and models, plus the single blocking primitive
//! used by every manager: the resource wait loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   stratus-cpi                    │
//! │        (Cloud orchestrator + managers)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 stratus-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Provider Abstraction             │   │
//! │  │  trait ComputeApi / trait StorageApi      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ResourceWaiter│  │ RetryPolicy  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ compute SDK   │ │  FakeCompute  │
//! │   binding     │ │ (test-utils)  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod api;
pub mod checkpoint;
pub mod error;
pub mod naming;
pub mod params;
pub mod resource;
pub mod retry;
pub mod waiter;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

// Re-exports
pub use api::{Acl, Bucket, ComputeApi, StorageApi, StoredObject};
pub use checkpoint::TaskCheckpoint;
pub use error::{CloudError, Result};
pub use params::{
    BootDisk, DiskParams, DiskSource, HostMaintenance, ImageParams, InstanceParams, Scheduling,
    SnapshotParams,
};
pub use resource::{
    AccessConfig, Address, AttachedDisk, CloudResource, Disk, Image, Instance, MachineType,
    MetadataItem, Network, NetworkInterface, Operation, Snapshot, Status, TargetPool,
    resource_name,
};
pub use retry::{Backoff, RetryFailure, RetryPolicy, retry};
pub use waiter::ResourceWaiter;
