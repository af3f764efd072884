//! Kernel structure offset table
//!
//! Offsets are resolved outside this crate (BTF, a kernel header probe,
//! a per-distribution table) and handed over as a JSON document keyed by
//! structure then field:
//!
//! ```json
//! {
//!   "task_struct": { "thread_pid": 1456, "mm": 2040 },
//!   "pid":         { "level": 4, "numbers": 96 },
//!   "upid":        { "size": 16 },
//!   "mm_struct":   { "exe_file": 952 },
//!   "file":        { "f_inode": 32 },
//!   "inode":       { "i_ino": 64 }
//! }
//! ```
//!
//! The namespace walk offsets are mandatory; the executable walk offsets
//! are optional and left at 0 (walk disabled) when absent.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use procache_common::KernelOffsets;
use serde::{Deserialize, Serialize};

use crate::domain::OffsetError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OffsetTable {
    structures: HashMap<String, HashMap<String, u64>>,
}

impl OffsetTable {
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid table.
    pub fn from_file(path: &Path) -> Result<Self, OffsetError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| OffsetError::Read { path: path.to_path_buf(), source })?;
        raw.parse()
    }

    pub fn set(&mut self, structure: &str, field: &str, offset: u64) {
        self.structures
            .entry(structure.to_string())
            .or_default()
            .insert(field.to_string(), offset);
    }

    /// Offset of `field` inside `structure`
    ///
    /// # Errors
    /// Returns an error naming the missing structure or field.
    pub fn field_offset(&self, structure: &str, field: &str) -> Result<u64, OffsetError> {
        let fields = self
            .structures
            .get(structure)
            .ok_or_else(|| OffsetError::MissingStructure(structure.to_string()))?;
        fields.get(field).copied().ok_or_else(|| OffsetError::MissingField {
            structure: structure.to_string(),
            field: field.to_string(),
        })
    }

    fn optional(&self, structure: &str, field: &str) -> u64 {
        self.field_offset(structure, field).unwrap_or(0)
    }

    /// Flatten into the layout the eBPF program reads from `OFFSETS`
    ///
    /// # Errors
    /// Returns an error if one of the pid namespace offsets is missing.
    pub fn to_kernel_offsets(&self) -> Result<KernelOffsets, OffsetError> {
        Ok(KernelOffsets {
            task_struct_pid: self.field_offset("task_struct", "thread_pid")?,
            pid_level: self.field_offset("pid", "level")?,
            pid_numbers: self.field_offset("pid", "numbers")?,
            sizeof_upid: self.field_offset("upid", "size")?,
            task_struct_mm: self.optional("task_struct", "mm"),
            mm_struct_exe_file: self.optional("mm_struct", "exe_file"),
            file_f_inode: self.optional("file", "f_inode"),
            inode_i_ino: self.optional("inode", "i_ino"),
        })
    }
}

impl FromStr for OffsetTable {
    type Err = OffsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "task_struct": { "thread_pid": 1456 },
        "pid": { "level": 4, "numbers": 96 },
        "upid": { "size": 16 }
    }"#;

    #[test]
    fn test_field_offset() {
        let table: OffsetTable = TABLE.parse().unwrap();
        assert_eq!(table.field_offset("pid", "numbers").unwrap(), 96);
        assert!(matches!(
            table.field_offset("pid", "tasks"),
            Err(OffsetError::MissingField { .. })
        ));
        assert!(matches!(
            table.field_offset("cred", "uid"),
            Err(OffsetError::MissingStructure(_))
        ));
    }

    #[test]
    fn test_exe_offsets_are_optional() {
        let table: OffsetTable = TABLE.parse().unwrap();
        let offsets = table.to_kernel_offsets().unwrap();
        assert_eq!(offsets.task_struct_pid, 1456);
        assert_eq!(offsets.sizeof_upid, 16);
        assert!(!offsets.has_exe_offsets());
    }

    #[test]
    fn test_namespace_offsets_are_required() {
        let mut table = OffsetTable::default();
        table.set("task_struct", "thread_pid", 8);
        assert!(table.to_kernel_offsets().is_err());
    }

    #[test]
    fn test_malformed_document() {
        let err = "{ \"pid\": 3 }".parse::<OffsetTable>().unwrap_err();
        assert!(matches!(err, OffsetError::Json(_)));
    }
}
