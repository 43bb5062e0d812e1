//! File signatures and the metadata store that the incremental build engine
//! diffs project state against (spec §4.1).

mod disk;
mod signature;
mod snapshot;
mod store;

pub use disk::{DiskInterface, SystemDiskInterface};
pub use signature::{MTime, Signature};
pub use snapshot::{TargetKey, TargetSnapshot};
pub use store::{MetadataStore, MetadataWriteError};
