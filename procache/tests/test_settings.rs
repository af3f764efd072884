//! Settings and offset table files

use std::io::Write;

use procache::domain::{ConfigError, OffsetError};
use procache::offsets::OffsetTable;
use procache::settings::Settings;
use tempfile::NamedTempFile;

fn write_json(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_settings_with_offsets_file() {
    let offsets = write_json(
        r#"{
            "task_struct": { "thread_pid": 1456, "mm": 2040 },
            "pid": { "level": 4, "numbers": 96 },
            "upid": { "size": 16 },
            "mm_struct": { "exe_file": 952 },
            "file": { "f_inode": 32 },
            "inode": { "i_ino": 64 }
        }"#,
    );
    let settings = write_json(&format!(
        r#"{{ "event_pool_size": 64, "offsets": {} }}"#,
        serde_json::to_string(offsets.path()).unwrap()
    ));

    let settings = Settings::from_file(settings.path()).unwrap();
    assert_eq!(settings.event_pool_size, 64);
    assert!(settings.send_signal);

    let kernel = settings.kernel_offsets().unwrap();
    assert_eq!(kernel.task_struct_pid, 1456);
    assert_eq!(kernel.inode_i_ino, 64);
    assert!(kernel.has_exe_offsets());
}

#[test]
fn test_invalid_settings_file() {
    let file = write_json(r#"{ "table_capacity": 0 }"#);
    let err = Settings::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "table_capacity", .. }));
}

#[test]
fn test_missing_offsets_file() {
    let err = OffsetTable::from_file(std::path::Path::new("/nonexistent/offsets.json")).unwrap_err();
    assert!(matches!(err, OffsetError::Read { .. }));
}

#[test]
fn test_offsets_missing_namespace_field() {
    let file = write_json(r#"{ "task_struct": { "thread_pid": 8 }, "pid": { "level": 4 } }"#);
    let table = OffsetTable::from_file(file.path()).unwrap();
    let err = table.to_kernel_offsets().unwrap_err();
    assert!(err.to_string().contains("pid.numbers"));
}
