//! Persistence for ensys: versioned snapshots and CSV export.

pub mod export;
pub mod snapshot;

pub use export::write_results_csv;
pub use snapshot::{
    default_dump_dir, dump, read_header, restore, SnapshotHeader, SnapshotLocation,
    DEFAULT_FILENAME, SCHEMA_VERSION, SNAPSHOT_MAGIC,
};
