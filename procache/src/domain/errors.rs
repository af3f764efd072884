//! Structured error types for procache
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The cache helpers themselves never fail; these cover the userspace store,
//! the configuration inputs and the kernel loader.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("{table} is full ({capacity} entries)")]
    TableFull { table: &'static str, capacity: usize },
}

#[derive(Error, Debug)]
pub enum OffsetError {
    #[error("Unknown structure in offset table: {0}")]
    MissingStructure(String),

    #[error("Unknown field {structure}.{field} in offset table")]
    MissingField { structure: String, field: String },

    #[error("Failed to read offset table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error(transparent)]
    Offsets(#[from] OffsetError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load eBPF object {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: aya::EbpfError,
    },

    #[error("Map {0} not found in eBPF object")]
    MapNotFound(&'static str),

    #[error("Program {0} not found in eBPF object")]
    ProgramNotFound(&'static str),

    #[error(transparent)]
    Map(#[from] aya::maps::MapError),

    #[error(transparent)]
    Program(#[from] aya::programs::ProgramError),
}
