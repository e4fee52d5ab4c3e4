pub mod index;
pub mod snapshot;

pub use index::{squared_l2, Entry, FlatIndex, Neighbor};
pub use snapshot::SnapshotInfo;
