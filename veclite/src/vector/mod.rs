//! Vector storage: a raw binary vector file with a sidecar
//! row-id mapping and tombstone set, living alongside the SQLite
//! database rather than inside it.

pub mod file;
pub mod tombstone;

pub use file::VectorFile;
