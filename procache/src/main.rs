//! # procache - Main Entry Point
//!
//! - `run <OBJECT>`: load the eBPF program, configure and attach it, report
//!   watched pids until Ctrl-C
//! - `offsets <FILE>`: validate an offset table
//! - `simulate`: drive the cache lifecycle in userspace, no privileges needed

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use procache::cli::{Args, Command, SignalRequest};
use procache::domain::{Pid, Tid};
use procache::engine::ProcessCache;
use procache::host::SimulatedHost;
use procache::loader::Loader;
use procache::offsets::OffsetTable;
use procache::preflight::run_preflight_checks;
use procache::settings::Settings;
use procache::summary::ProcessSummary;
use procache_common::entries::write_c_str;
use procache_common::resolver::get_proc_from_cookie;
use procache_common::{CacheMaps, ProcCache, SignalDispatch};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("invalid setting") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.settings.as_deref())?;

    match args.command {
        Command::Run { object, watch, ignore_pid, signal, interval } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(run_live(&settings, &object, &watch, &ignore_pid, &signal, interval))
        }
        Command::Offsets { path } => {
            let offsets = OffsetTable::from_file(&path)?.to_kernel_offsets()?;
            println!("{offsets:#?}");
            if !offsets.has_exe_offsets() {
                println!("note: executable offsets missing, image inodes will be 0");
            }
            Ok(())
        }
        Command::Simulate => simulate(&settings),
    }
}

async fn run_live(
    settings: &Settings,
    object: &Path,
    watch: &[u32],
    ignore_pid: &[u32],
    signals: &[SignalRequest],
    interval: u64,
) -> Result<()> {
    run_preflight_checks(object)?;

    let offsets = settings.kernel_offsets()?;
    if settings.offsets.is_none() {
        warn!("no offset table configured, namespace pids will read as 0");
    }

    let mut loader = Loader::load(object, settings.event_pool_size)?;
    loader.init_logger();
    loader.write_offsets(&offsets)?;
    loader.set_send_signal(settings.send_signal)?;
    for pid in ignore_pid {
        loader.ignore_pid(Pid(*pid))?;
    }
    for request in signals {
        loader.request_signal(request.pid, request.signal, request.cookie)?;
    }
    loader.attach()?;

    println!("✅ Process cache active, press Ctrl-C to stop");

    let view = loader.view()?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl-C, detaching");
                break;
            }
            () = tokio::time::sleep(Duration::from_secs(interval.max(1))) => {
                for pid in watch {
                    match view.pid_cache(*pid) {
                        Some(entry) => {
                            let image = get_proc_from_cookie(&view, entry.cookie);
                            println!("{}", ProcessSummary::new(Pid(*pid), &entry, image.as_ref()));
                        }
                        None => println!("{}: not cached", Pid(*pid)),
                    }
                }
            }
        }
    }

    Ok(())
}

/// Fork a shell from init, exec it, fork a child, signal it and let both exit
fn simulate(settings: &Settings) -> Result<()> {
    let cache = ProcessCache::new(settings, settings.kernel_offsets()?, SimulatedHost::default());
    let host = cache.host();
    let (init, shell, child) = (Pid(1), Pid(100), Pid(101));

    host.advance(1_000);
    cache.fork(init, shell).context("fork of the shell was not cached")?;

    host.switch_to(shell, Tid(shell.0));
    host.set_comm("bash");
    let mut image = ProcCache::default();
    write_c_str(&mut image.entry.comm, b"bash");
    write_c_str(&mut image.entry.tty_name, b"pts/0");
    image.entry.executable.path_key.ino = 4242;
    host.advance(1_000);
    let (cookie, _) = cache.exec(&image).context("exec of the shell was not cached")?;

    host.advance(1_000);
    cache.fork(shell, child).context("fork of the child was not cached")?;
    for pid in [shell, child] {
        if let Some(summary) = cache.summary(pid) {
            println!("{summary}");
        }
    }

    cache.store().request_signal_for(child, 15, cookie)?;
    host.switch_to(child, Tid(child.0));
    match cache.dispatch_signal(child) {
        SignalDispatch::Delivered(signal) => println!("delivered signal {signal} to {child}"),
        other => println!("signal for {child} not delivered: {other:?}"),
    }

    host.advance(1_000);
    cache.exit();
    host.switch_to(shell, Tid(shell.0));
    cache.exit();

    let remaining = get_proc_from_cookie(cache.store(), cookie.0);
    println!(
        "after exit: {} pid entries, {} image entries, image {}",
        cache.store().pid_table().len(),
        cache.store().proc_table().len(),
        if remaining.is_some() { "kept" } else { "released" },
    );
    Ok(())
}
