//! CLI argument definitions

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::domain::{Cookie, Pid};

#[derive(Parser)]
#[command(
    name = "procache",
    about = "Kernel-side process cache for security event enrichment",
    after_help = "\
EXAMPLES:
    sudo procache run target/bpfel-unknown-none/release/procache --watch 1234
    sudo procache run ./procache.o --settings procache.json --signal 4321:15
    procache offsets offsets.json
    procache simulate"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (JSON); defaults apply when omitted
    #[arg(short, long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load the eBPF program and keep the cache running until Ctrl-C
    Run {
        /// Compiled eBPF object
        #[arg(value_name = "OBJECT")]
        object: PathBuf,

        /// Print the cached identity of these pids periodically
        #[arg(short, long, value_name = "PID")]
        watch: Vec<u32>,

        /// Treat these pids as kernel housekeeping workers
        #[arg(long, value_name = "PID")]
        ignore_pid: Vec<u32>,

        /// Queue a one-shot signal, as PID:SIGNAL or PID:SIGNAL:COOKIE
        #[arg(long, value_name = "REQUEST")]
        signal: Vec<SignalRequest>,

        /// Seconds between watch reports
        #[arg(long, default_value = "2")]
        interval: u64,
    },

    /// Validate an offset table and print the flattened offsets
    Offsets {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Run a fork/exec/signal/exit sequence against the userspace cache
    Simulate,
}

/// A `--signal` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalRequest {
    pub pid: Pid,
    pub signal: u32,
    pub cookie: Option<Cookie>,
}

impl FromStr for SignalRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(pid), Some(signal)) = (parts.next(), parts.next()) else {
            return Err(format!("expected PID:SIGNAL[:COOKIE], got {s:?}"));
        };
        let pid = pid.parse().map_err(|e| format!("invalid pid {pid:?}: {e}"))?;
        let signal = signal.parse().map_err(|e| format!("invalid signal {signal:?}: {e}"))?;
        let cookie = match parts.next() {
            Some(raw) => {
                let value = match raw.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => raw.parse(),
                };
                Some(Cookie(value.map_err(|e| format!("invalid cookie {raw:?}: {e}"))?))
            }
            None => None,
        };
        if parts.next().is_some() {
            return Err(format!("expected PID:SIGNAL[:COOKIE], got {s:?}"));
        }
        Ok(Self { pid: Pid(pid), signal, cookie })
    }
}

impl fmt::Display for SignalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal {} -> {}", self.signal, self.pid)?;
        if let Some(cookie) = self.cookie {
            write!(f, " ({cookie})")?;
        }
        Ok(())
    }
}
