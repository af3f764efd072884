//! Domain model for procache
//!
//! Newtypes for the identifiers that flow between the cache tables and the
//! control plane, plus the structured errors of the userspace side.

pub mod errors;
pub mod types;

pub use types::{Cookie, Pid, Tid};

pub use errors::{ConfigError, LoaderError, OffsetError, StoreError};
