// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! # xtask - Project Automation
//!
//! Workspace-level task orchestration:
//!
//! - `cargo xtask ci`: the full local gate (format check, clippy with
//!   warnings denied, and the test suite)
//! - `cargo xtask fmt`: apply formatting
//! - `cargo xtask server`: run the server against an in-memory database
//!
//! All commands shell out through `duct` so failures propagate with the
//! child's exit status.

#![deny(
    clippy::pedantic,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use duct::cmd;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full local CI gate: fmt check, clippy, tests.
    Ci,
    /// Apply rustfmt to the workspace.
    Fmt,
    /// Run the server on an in-memory database.
    Server {
        /// Port to bind the server to.
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli: Cli = Cli::parse();

    match cli.command {
        Command::Ci => ci(),
        Command::Fmt => fmt(),
        Command::Server { port } => server(port),
    }
}

fn ci() -> Result<()> {
    println!("xtask: cargo fmt --check");
    cmd!("cargo", "fmt", "--all", "--", "--check").run()?;
    println!("xtask: cargo clippy");
    cmd!(
        "cargo",
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings"
    )
    .run()?;
    println!("xtask: cargo test");
    cmd!("cargo", "test", "--workspace").run()?;
    println!("xtask: ci passed");
    Ok(())
}

fn fmt() -> Result<()> {
    cmd!("cargo", "fmt", "--all").run()?;
    Ok(())
}

fn server(port: u16) -> Result<()> {
    cmd!(
        "cargo",
        "run",
        "--bin",
        "hemolink-server",
        "--",
        "--port",
        port.to_string()
    )
    .run()?;
    Ok(())
}
