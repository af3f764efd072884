//! Pre-flight checks for procache
//!
//! Validates system requirements before attempting to load eBPF programs.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() and setrlimit() require unsafe

use anyhow::{bail, Context, Result};
use log::debug;
use std::path::Path;

/// Minimum kernel version: `bpf_probe_read_kernel` landed in 5.5
const MIN_KERNEL_VERSION: (u32, u32) = (5, 5);

/// Run all pre-flight checks before eBPF loading
pub fn run_preflight_checks(object_path: &Path) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_object_exists(object_path)?;
    bump_memlock_rlimit();
    Ok(())
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    bail!(
        "Permission denied: procache requires root privileges to load eBPF programs.\n\n\
         Run with: sudo procache run ..."
    );
}

/// Parse `(major, minor)` out of a kernel release string like `6.1.0-arch1-1`
fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

/// Check if the kernel version is sufficient for eBPF features
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // "Linux version 5.15.0-generic ..."
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");

    let Some((major, minor)) = parse_kernel_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {major}.{minor} is too old.\n\n\
             procache requires Linux {}.{} or newer for bpf_probe_read_kernel.\n\
             Current kernel: {release}",
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
        );
    }

    Ok(())
}

/// Check if the eBPF object exists
fn check_object_exists(object_path: &Path) -> Result<()> {
    if !object_path.is_file() {
        bail!(
            "eBPF object not found: {}\n\n\
             Build it with: cargo xtask build-ebpf",
            object_path.display()
        );
    }
    Ok(())
}

/// Lift the locked memory limit for kernels that still charge BPF maps to it
fn bump_memlock_rlimit() {
    let rlim = libc::rlimit { rlim_cur: libc::RLIM_INFINITY, rlim_max: libc::RLIM_INFINITY };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {ret}");
    }
}
