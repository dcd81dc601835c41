//! CLI command definitions for the `conductor` binary.

pub mod agents;
pub mod route;
pub mod workflow;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::Value;

/// Route agent decisions to capabilities and run step workflows.
#[derive(Parser)]
#[command(name = "conductor", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ./conductor.toml when present).
    #[arg(long, global = true, env = "CONDUCTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate a workflow YAML file.
    Validate {
        /// Path to the workflow YAML file.
        file: PathBuf,
    },

    /// Show the steps of a workflow and its worst-case duration.
    Inspect {
        /// Path to the workflow YAML file.
        file: PathBuf,
    },

    /// Dry-run a workflow with echo agents.
    Run(RunArgs),

    /// Route one decision against the configured remote tools.
    Route(RouteArgs),

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the workflow YAML file.
    pub file: PathBuf,

    /// User input for the run.
    #[arg(long, default_value = "")]
    pub input: String,

    /// Initial variable (`name=value`, value parsed as JSON when possible).
    #[arg(long = "var", value_parser = parse_key_value)]
    pub vars: Vec<(String, Value)>,

    /// Fixed reply for an agent (`agent=text`); other agents echo their input.
    #[arg(long = "reply", value_parser = parse_reply)]
    pub replies: Vec<(String, String)>,

    /// Seed for weighted navigation.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory of workflows available to intent calls.
    #[arg(long)]
    pub workflow_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct RouteArgs {
    /// Decision JSON (object or string).
    pub decision: String,

    /// Directory of workflows available to intent calls.
    #[arg(long)]
    pub workflow_dir: Option<PathBuf>,
}

/// Parse `name=value`, reading the value as JSON and falling back to a string.
pub fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn parse_reply(raw: &str) -> Result<(String, String), String> {
    let (agent, reply) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected agent=text, got '{raw}'"))?;
    Ok((agent.trim().to_string(), reply.to_string()))
}
