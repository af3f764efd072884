//! Human-readable view of a cached thread group

use std::fmt;

use procache_common::entries::c_str;
use procache_common::{PidCache, ProcCache};

use crate::domain::{Cookie, Pid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub ppid: Pid,
    pub cookie: Cookie,
    pub fork_timestamp: u64,
    pub uid: u32,
    pub image: Option<ImageSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub comm: String,
    pub tty: String,
    pub container_id: String,
    pub inode: u64,
    pub exec_timestamp: u64,
}

fn lossy(buf: &[u8]) -> String {
    String::from_utf8_lossy(c_str(buf)).into_owned()
}

impl ImageSummary {
    #[must_use]
    pub fn from_entry(image: &ProcCache) -> Self {
        Self {
            comm: lossy(&image.entry.comm),
            tty: lossy(&image.entry.tty_name),
            container_id: lossy(&image.container.container_id),
            inode: image.entry.executable.path_key.ino,
            exec_timestamp: image.entry.exec_timestamp,
        }
    }
}

impl ProcessSummary {
    #[must_use]
    pub fn new(pid: Pid, entry: &PidCache, image: Option<&ProcCache>) -> Self {
        Self {
            pid,
            ppid: Pid(entry.ppid),
            cookie: Cookie(entry.cookie),
            fork_timestamp: entry.fork_timestamp,
            uid: entry.credentials.uid,
            image: image.map(ImageSummary::from_entry),
        }
    }
}

impl fmt::Display for ProcessSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ppid={} uid={} {}", self.pid, self.ppid.0, self.uid, self.cookie)?;
        match &self.image {
            Some(image) => {
                write!(f, " comm={} ino={}", image.comm, image.inode)?;
                if !image.tty.is_empty() {
                    write!(f, " tty={}", image.tty)?;
                }
                if !image.container_id.is_empty() {
                    write!(f, " container={}", image.container_id)?;
                }
                Ok(())
            }
            None => write!(f, " (no image)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procache_common::entries::write_c_str;

    #[test]
    fn test_display_with_image() {
        let mut image = ProcCache::default();
        write_c_str(&mut image.entry.comm, b"bash");
        write_c_str(&mut image.entry.tty_name, b"pts/1");
        image.entry.executable.path_key.ino = 77;
        let entry = PidCache { cookie: 0x2a, ppid: 1, ..PidCache::default() };

        let summary = ProcessSummary::new(Pid(100), &entry, Some(&image));
        assert_eq!(
            summary.to_string(),
            "PID:100 ppid=1 uid=0 cookie:0x2a comm=bash ino=77 tty=pts/1"
        );
    }

    #[test]
    fn test_display_without_image() {
        let summary = ProcessSummary::new(Pid(3), &PidCache::default(), None);
        assert!(summary.to_string().ends_with("(no image)"));
    }
}
