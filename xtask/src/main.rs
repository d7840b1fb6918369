//! Development automation tasks for the `FabricFlow` workspace.
//!
//! Run with: `cargo xtask <command>`
//!
//! This is a CLI tool for developers, so `println!` and `eprintln!` are
//! intentionally used for user-facing output rather than structured logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::{Command, ExitCode};

use anyhow::{bail, Context, Result};

mod features;

/// Task name and help text, in the order `ci` runs them.
const TASKS: &[(&str, &str)] = &[
    ("fmt", "Check Rust code formatting"),
    ("clippy", "Run Clippy with warnings denied"),
    ("test-features", "Check the core and infra feature matrix"),
    ("test", "Run all workspace tests"),
    ("deny", "Check dependencies with cargo-deny"),
    ("audit", "Audit dependencies for security advisories"),
];

fn main() -> ExitCode {
    let task = env::args().nth(1);

    let result = match task.as_deref() {
        Some("ci") => run_ci(),
        Some("help") | None => {
            print_help();
            Ok(())
        }
        Some(name) => run_task(name),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Task failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("FabricFlow Development Tasks");
    println!();
    println!("USAGE:");
    println!("    cargo xtask <TASK>");
    println!();
    println!("TASKS:");
    println!("    {:<14} Run every task below in order", "ci");
    for (name, about) in TASKS {
        println!("    {name:<14} {about}");
    }
    println!("    {:<14} Show this help message", "help");
}

fn run_task(name: &str) -> Result<()> {
    match name {
        "fmt" => cargo(&["fmt", "--all", "--", "--check"])
            .context("Format check failed. Run 'cargo fmt --all' to fix."),
        "clippy" => cargo(&[
            "clippy",
            "--workspace",
            "--all-targets",
            "--all-features",
            "--",
            "-D",
            "warnings",
        ]),
        "test-features" => features::test_feature_matrix(),
        "test" => cargo(&["test", "--workspace", "--all-features"]),
        "deny" => {
            require_subcommand("deny")?;
            cargo(&["deny", "check"])
        }
        "audit" => {
            require_subcommand("audit")?;
            cargo(&["audit"])
        }
        unknown => {
            eprintln!("Unknown task: {unknown}");
            eprintln!();
            print_help();
            bail!("Unknown task")
        }
    }
}

/// Run all CI checks in sequence
fn run_ci() -> Result<()> {
    println!("==> Running CI checks...");

    for (step, (name, about)) in TASKS.iter().enumerate() {
        println!("\n==> Step {}/{}: {about}...", step + 1, TASKS.len());
        run_task(name)?;
    }

    println!("\n✓ All CI checks passed!");
    Ok(())
}

fn cargo(args: &[&str]) -> Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("Failed to spawn cargo {}", args.join(" ")))?;

    if !status.success() {
        bail!("cargo {} exited with {status}", args.join(" "));
    }
    Ok(())
}

/// Fail with an install hint when `cargo <subcommand>` is unavailable.
fn require_subcommand(subcommand: &str) -> Result<()> {
    let installed = Command::new("cargo")
        .args([subcommand, "--version"])
        .output()
        .is_ok_and(|output| output.status.success());

    if !installed {
        eprintln!("Install it with: cargo install cargo-{subcommand}");
        bail!("cargo-{subcommand} not found");
    }
    Ok(())
}
