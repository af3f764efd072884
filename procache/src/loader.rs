//! # eBPF Program Loading and Attachment
//!
//! Loads the compiled eBPF object and wires it up:
//!
//! - `PROCESS_EVENT_GEN` is resized to the configured pool size, recorded
//!   in `FEATURES[FEATURE_EVENT_POOL_SIZE]`
//! - `OFFSETS[0]` gets the resolved [`KernelOffsets`]
//! - `FEATURES[FEATURE_SEND_SIGNAL]` tells the program whether it may call
//!   `bpf_send_signal`
//! - `PID_IGNORED` / `KILL_LIST` are written by the control plane
//! - the three `sched` tracepoints keep the cache current
//!
//! [`MapView`] reads the live cache maps back through the same
//! [`CacheMaps`] seam the kernel side uses.

use std::path::Path;

use aya::maps::{Array, HashMap, MapData};
use aya::programs::TracePoint;
use aya::{Ebpf, EbpfLoader};
use aya_log::EbpfLogger;
use log::{info, warn};
use procache_common::{
    CacheMaps, KernelOffsets, PendingSignal, PidCache, ProcCache, FEATURE_EVENT_POOL_SIZE,
    FEATURE_SEND_SIGNAL, MAP_FEATURES, MAP_KILL_LIST, MAP_NETNS_CACHE, MAP_OFFSETS,
    MAP_PID_CACHE, MAP_PID_IGNORED, MAP_PROCESS_EVENT_GEN, MAP_PROC_CACHE,
};

use crate::domain::{Cookie, LoaderError, Pid};

/// Tracepoints attached by [`Loader::attach`], as `(program, category, name)`
pub const TRACEPOINTS: [(&str, &str, &str); 3] = [
    ("sched_process_fork", "sched", "sched_process_fork"),
    ("sched_process_exec", "sched", "sched_process_exec"),
    ("sched_process_exit", "sched", "sched_process_exit"),
];

pub struct Loader {
    bpf: Ebpf,
}

impl Loader {
    /// Load the eBPF object at `path` with an event pool of `event_pool_size`
    /// slots
    ///
    /// The object is built by `cargo xtask build-ebpf`; always use the
    /// release build, debug builds pull in formatting code the verifier
    /// rejects.
    ///
    /// # Errors
    /// Returns an error if the object cannot be read or loaded
    pub fn load(path: &Path, event_pool_size: u32) -> Result<Self, LoaderError> {
        let mut bpf = EbpfLoader::new()
            .set_max_entries(MAP_PROCESS_EVENT_GEN, event_pool_size)
            .load_file(path)
            .map_err(|source| LoaderError::Load { path: path.to_path_buf(), source })?;

        let map =
            bpf.map_mut(MAP_FEATURES).ok_or(LoaderError::MapNotFound(MAP_FEATURES))?;
        let mut features: Array<_, u32> = Array::try_from(map)?;
        features.set(FEATURE_EVENT_POOL_SIZE, event_pool_size, 0)?;
        info!("✓ Loaded {} with {event_pool_size} event slots", path.display());

        Ok(Self { bpf })
    }

    /// Forward `aya-log` records from the program to the `log` facade
    pub fn init_logger(&mut self) {
        if let Err(e) = EbpfLogger::init(&mut self.bpf) {
            warn!("Failed to initialize eBPF logger: {e}");
        }
    }

    /// # Errors
    /// Returns an error if the `OFFSETS` map is missing or cannot be written
    pub fn write_offsets(&mut self, offsets: &KernelOffsets) -> Result<(), LoaderError> {
        let map = self.bpf.map_mut(MAP_OFFSETS).ok_or(LoaderError::MapNotFound(MAP_OFFSETS))?;
        let mut array: Array<_, KernelOffsets> = Array::try_from(map)?;
        array.set(KernelOffsets::MAP_INDEX, *offsets, 0)?;
        if !offsets.has_exe_offsets() {
            warn!("executable offsets not configured, image inodes will be 0");
        }
        info!("✓ Wrote kernel offsets");
        Ok(())
    }

    /// # Errors
    /// Returns an error if the `FEATURES` map is missing or cannot be written
    pub fn set_send_signal(&mut self, enabled: bool) -> Result<(), LoaderError> {
        let map = self.bpf.map_mut(MAP_FEATURES).ok_or(LoaderError::MapNotFound(MAP_FEATURES))?;
        let mut array: Array<_, u32> = Array::try_from(map)?;
        array.set(FEATURE_SEND_SIGNAL, u32::from(enabled), 0)?;
        Ok(())
    }

    /// Flag `pid` as a kernel housekeeping worker
    ///
    /// # Errors
    /// Returns an error if the `PID_IGNORED` map is missing or full
    pub fn ignore_pid(&mut self, pid: Pid) -> Result<(), LoaderError> {
        let map =
            self.bpf.map_mut(MAP_PID_IGNORED).ok_or(LoaderError::MapNotFound(MAP_PID_IGNORED))?;
        let mut ignored: HashMap<_, u32, u32> = HashMap::try_from(map)?;
        ignored.insert(pid.0, 1, 0)?;
        Ok(())
    }

    /// Queue a one-shot signal for the next hook firing in `pid`
    ///
    /// With a cookie, the request is dropped undelivered if `pid` no longer
    /// runs that image by then.
    ///
    /// # Errors
    /// Returns an error if the `KILL_LIST` map is missing or full
    pub fn request_signal(
        &mut self,
        pid: Pid,
        signal: u32,
        cookie: Option<Cookie>,
    ) -> Result<(), LoaderError> {
        let map = self.bpf.map_mut(MAP_KILL_LIST).ok_or(LoaderError::MapNotFound(MAP_KILL_LIST))?;
        let mut kill_list: HashMap<_, u32, PendingSignal> = HashMap::try_from(map)?;
        let request = match cookie {
            Some(cookie) => PendingSignal::for_cookie(signal, cookie.0),
            None => PendingSignal::new(signal),
        };
        kill_list.insert(pid.0, request, 0)?;
        info!("✓ Queued signal {signal} for {pid}");
        Ok(())
    }

    /// Load and attach the fork/exec/exit tracepoints
    ///
    /// # Errors
    /// Returns an error if a program is missing or fails to load or attach
    pub fn attach(&mut self) -> Result<(), LoaderError> {
        for (name, category, tracepoint) in TRACEPOINTS {
            let program: &mut TracePoint = self
                .bpf
                .program_mut(name)
                .ok_or(LoaderError::ProgramNotFound(name))?
                .try_into()?;
            program.load()?;
            program.attach(category, tracepoint)?;
            info!("✓ Attached tracepoint: {category}/{tracepoint}");
        }
        Ok(())
    }

    /// Read-only view of the live cache maps
    ///
    /// # Errors
    /// Returns an error if one of the cache maps is missing
    pub fn view(&self) -> Result<MapView<'_>, LoaderError> {
        let map = |name: &'static str| self.bpf.map(name).ok_or(LoaderError::MapNotFound(name));
        Ok(MapView {
            pid_cache: HashMap::try_from(map(MAP_PID_CACHE)?)?,
            proc_cache: HashMap::try_from(map(MAP_PROC_CACHE)?)?,
            netns: HashMap::try_from(map(MAP_NETNS_CACHE)?)?,
            pid_ignored: HashMap::try_from(map(MAP_PID_IGNORED)?)?,
        })
    }
}

/// The kernel cache maps seen through [`CacheMaps`]
pub struct MapView<'a> {
    pid_cache: HashMap<&'a MapData, u32, PidCache>,
    proc_cache: HashMap<&'a MapData, u64, ProcCache>,
    netns: HashMap<&'a MapData, u32, u32>,
    pid_ignored: HashMap<&'a MapData, u32, u32>,
}

impl CacheMaps for MapView<'_> {
    fn pid_cache(&self, tgid: u32) -> Option<PidCache> {
        self.pid_cache.get(&tgid, 0).ok()
    }

    fn proc_cache(&self, cookie: u64) -> Option<ProcCache> {
        self.proc_cache.get(&cookie, 0).ok()
    }

    fn netns(&self, tid: u32) -> Option<u32> {
        self.netns.get(&tid, 0).ok()
    }

    fn is_pid_ignored(&self, pid: u32) -> bool {
        self.pid_ignored.get(&pid, 0).is_ok()
    }
}
