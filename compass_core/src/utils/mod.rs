//! Small helpers shared by the cache and output modules
pub(crate) mod files;
pub(crate) mod hashing;
