//! # procache - Kernel-Side Process Cache
//!
//! Keeps a two-level cache of process identities inside the kernel so that
//! security events can be enriched with who produced them without asking
//! userspace. The cache logic itself lives in `procache-common` and is
//! shared by the eBPF program and this crate.
//!
//! ## Architecture Overview
//!
//! ```text
//!  sched_process_fork / exec / exit          control plane (this crate)
//! ┌──────────────────────────────────┐      ┌─────────────────────────────┐
//! │ procache-ebpf                    │      │ loader: OFFSETS, FEATURES,  │
//! │  handle_fork / exec / exit       │◀─────│ PID_IGNORED, KILL_LIST      │
//! │  new_process_event + fill        │      └─────────────────────────────┘
//! │  send_signal (one-shot)          │
//! └──────────────┬───────────────────┘
//!                ▼
//!   PID_CACHE (tgid → PidCache) ──cookie──▶ PROC_CACHE (cookie → ProcCache)
//! ```
//!
//! ## Module Structure
//!
//! - [`loader`]: load the eBPF object, fill its control maps, attach hooks,
//!   read the live cache back through [`loader::MapView`]
//! - [`engine`]: the same helpers driven in userspace over [`store`],
//!   [`pool`], a simulated [`host`] and simulated kernel [`memory`]
//! - [`offsets`] / [`settings`]: configuration inputs
//! - [`summary`]: printable view of a cached thread group
//! - [`domain`]: identifier newtypes and error enums
//! - [`cli`] / [`preflight`]: the binary's edges

pub mod cli;
pub mod domain;
pub mod engine;
pub mod host;
pub mod loader;
pub mod memory;
pub mod offsets;
pub mod pool;
pub mod preflight;
pub mod settings;
pub mod store;
pub mod summary;
