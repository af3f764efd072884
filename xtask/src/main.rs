use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::Command;

const EBPF_PACKAGE: &str = "procache-ebpf";
const EBPF_BINARY: &str = "procache";

#[derive(Parser)]
#[command(name = "xtask", about = "Build and run procache")]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Build the eBPF object
    BuildEbpf {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
    },

    /// Build the eBPF object, then run `procache run` on it as root
    Run {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,

        /// Extra arguments for `procache run`
        #[arg(last = true)]
        run_args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::BuildEbpf { target } => {
            build_ebpf(&target)?;
        }
        Cmd::Run { target, run_args } => {
            let object = build_ebpf(&target)?;
            run(&object, &run_args)?;
        }
    }

    Ok(())
}

fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..")
}

/// Build the eBPF program and return the path of the object
fn build_ebpf(target: &str) -> Result<PathBuf> {
    // Always build in release mode: debug builds pull in formatting code
    // (LowerHex) that the BPF linker rejects. LTO strips the dead code.
    let status = Command::new("cargo")
        .current_dir(project_root())
        .args(["+nightly", "build", "--package", EBPF_PACKAGE, "--target", target])
        .args(["-Z", "build-std=core", "--release"])
        .status()
        .context("Failed to build eBPF program")?;

    if !status.success() {
        anyhow::bail!("Failed to build eBPF program");
    }

    let object = project_root().join("target").join(target).join("release").join(EBPF_BINARY);
    println!("✓ eBPF program built successfully");
    println!("  Object: {}", object.display());

    Ok(object)
}

fn run(object: &std::path::Path, run_args: &[String]) -> Result<()> {
    let status = Command::new("cargo")
        .current_dir(project_root())
        .args(["run", "--package", "procache", "--config"])
        .arg("target.'cfg(all())'.runner='sudo -E'")
        .arg("--")
        .arg("run")
        .arg(object)
        .args(run_args)
        .status()
        .context("Failed to run procache")?;

    if !status.success() {
        anyhow::bail!("procache exited with {status}");
    }
    Ok(())
}
