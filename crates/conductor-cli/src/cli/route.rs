//! `conductor route`: send one decision through the action router.

use anyhow::{bail, Result};
use console::style;
use serde_json::Value;

use conductor_types::config::ConductorConfig;
use conductor_types::invocation::STATUS_HANDLED;

use super::agents::dry_run_agents;
use super::workflow::build_orchestrator;
use super::RouteArgs;

pub async fn route(args: RouteArgs, config: ConductorConfig, json: bool) -> Result<()> {
    // Non-JSON text goes to the router as a raw string, which it rejects.
    let decision = serde_json::from_str::<Value>(&args.decision)
        .unwrap_or_else(|_| Value::String(args.decision.clone()));

    let orchestrator = build_orchestrator(&config, dry_run_agents(&[]), args.workflow_dir.as_deref(), None)?;
    let result = orchestrator.route(&decision).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let code = if result.is_success() {
            style(result.status_code).green()
        } else {
            style(result.status_code).red()
        };
        println!("  {} {code}", style("Status:").bold());
        if result.status_code == STATUS_HANDLED || !result.is_success() {
            println!("{}", result.payload_text());
        }
    }

    if !result.is_success() {
        bail!("Decision was not handled (status {})", result.status_code);
    }
    Ok(())
}
