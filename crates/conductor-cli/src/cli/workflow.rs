//! Workflow subcommands: validate, inspect and dry-run.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use conductor_core::agent::AgentRegistry;
use conductor_core::handler::InMemoryHandlerRegistry;
use conductor_core::router::ActionRouter;
use conductor_core::workflow::dag::{topological_order, unreachable_steps};
use conductor_core::workflow::definition::{discover_workflows, load_workflow_file, WorkflowError};
use conductor_core::workflow::retry::RetryHandler;
use conductor_core::workflow::{NavigationEngine, RunInput, RunReport, WorkflowOrchestrator};
use conductor_infra::http_handler::register_remote_tools;
use conductor_types::config::ConductorConfig;
use conductor_types::workflow::{RunStatus, WorkflowDefinition};

use super::agents::dry_run_agents;
use super::RunArgs;

fn load(file: &Path) -> Result<WorkflowDefinition> {
    load_workflow_file(file).map_err(|e| match e {
        WorkflowError::ParseError(msg) => anyhow::anyhow!("Failed to parse workflow YAML: {msg}"),
        WorkflowError::ValidationError(msg) => anyhow::anyhow!("Workflow validation failed: {msg}"),
        other => anyhow::anyhow!("Failed to load workflow {}: {other}", file.display()),
    })
}

/// Orchestrator over the configured remote tools, with every workflow in
/// `workflow_dir` registered for intent calls.
pub fn build_orchestrator(
    config: &ConductorConfig,
    agents: AgentRegistry,
    workflow_dir: Option<&Path>,
    seed: Option<u64>,
) -> Result<WorkflowOrchestrator> {
    let mut registry = InMemoryHandlerRegistry::new();
    register_remote_tools(&mut registry, &config.tools).context("Failed to build HTTP client")?;
    let router = ActionRouter::new(Arc::new(registry), config.middleware.clone());

    let navigation = match seed {
        Some(seed) => NavigationEngine::with_seed(seed),
        None => NavigationEngine::new(),
    };
    let orchestrator = WorkflowOrchestrator::with_navigation(
        Arc::new(router),
        agents,
        config.orchestrator.clone(),
        navigation,
    );

    if let Some(dir) = workflow_dir {
        let found = discover_workflows(dir)
            .with_context(|| format!("Failed to read workflows from {}", dir.display()))?;
        for (path, def) in found {
            tracing::debug!(path = %path.display(), workflow_id = def.id.as_str(), "registering workflow");
            orchestrator.register_workflow(def)?;
        }
    }
    Ok(orchestrator)
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub fn validate(file: &Path, json: bool) -> Result<()> {
    let def = load(file)?;

    if json {
        let out = serde_json::json!({
            "id": def.id,
            "valid": true,
            "steps": def.steps.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "  {} Workflow '{}' is valid ({} steps)",
            style("*").green().bold(),
            style(&def.id).cyan(),
            def.steps.len()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

pub fn inspect(file: &Path, config: &ConductorConfig, json: bool) -> Result<()> {
    let def = load(file)?;
    let order = topological_order(&def)?;
    let unreachable = unreachable_steps(&def);
    let worst_case = RetryHandler::worst_case_duration(&config.orchestrator, &def);

    if json {
        let out = serde_json::json!({
            "id": def.id,
            "description": def.description,
            "entry": def.entry_step_id(),
            "order": order,
            "unreachable": unreachable,
            "worst_case_secs": worst_case.as_secs(),
            "steps": def.steps,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Workflow").bold(), style(&def.id).cyan());
    if let Some(description) = &def.description {
        println!("  {}", style(description).dim());
    }
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Target"),
            Cell::new("Next"),
            Cell::new("Fan"),
            Cell::new("Retry"),
            Cell::new("On error"),
        ]);

    for step in order.iter().filter_map(|id| def.step(id)) {
        let next = match &step.navigation {
            Some(nav) => format!("{} navigation", nav.mode),
            None if step.outputs.is_empty() => "user".to_string(),
            None => step.outputs.join(", "),
        };
        let fan = match (&step.fan_key, step.is_fan_in) {
            (Some(key), true) => format!("join {key}"),
            (Some(key), false) => key.clone(),
            (None, _) => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&step.id),
            Cell::new(step.kind),
            Cell::new(&step.target),
            Cell::new(next),
            Cell::new(fan),
            Cell::new(step.retry),
            Cell::new(step.on_error.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
    println!();
    println!("  Worst-case duration: {}s", worst_case.as_secs());

    for step_id in &unreachable {
        println!(
            "  {} step '{}' is unreachable from the entry step",
            style("!").yellow().bold(),
            step_id
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub async fn run(args: RunArgs, config: ConductorConfig, json: bool) -> Result<()> {
    let def = load(&args.file)?;
    let orchestrator = build_orchestrator(
        &config,
        dry_run_agents(&args.replies),
        args.workflow_dir.as_deref(),
        args.seed,
    )?;

    let mut input = RunInput::new(args.input);
    for (name, value) in args.vars {
        input = input.with_variable(name, value);
    }

    let report = orchestrator.run_definition(def, input).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_completed() {
        bail!(
            "Workflow run {}: {}",
            report.status,
            report.error.as_deref().unwrap_or("no error recorded")
        );
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let status = match report.status {
        RunStatus::Completed => style(report.status.to_string()).green(),
        RunStatus::Failed => style(report.status.to_string()).red(),
        _ => style(report.status.to_string()).yellow(),
    };

    println!();
    println!(
        "  {} '{}' {} in {}ms",
        style("Run").bold(),
        style(&report.workflow_id).cyan(),
        status,
        report.duration_ms()
    );
    println!("  Run ID: {}", report.run_id);
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Attempts"),
            Cell::new("Output"),
        ]);
    for (step_id, output) in &report.context.step_outputs {
        let attempts = report.attempts.get(step_id).copied().unwrap_or(0);
        let mut cell = Cell::new(truncate(output, 80));
        if output.starts_with("[ERROR]") {
            cell = cell.fg(Color::Red);
        }
        table.add_row(vec![Cell::new(step_id), Cell::new(attempts), cell]);
    }
    println!("{table}");

    for record in &report.context.navigation_log {
        println!(
            "  {} {} -> {} ({}, confidence {:.2}): {}",
            style(">").dim(),
            record.from_step,
            record.decision.chosen_step_id,
            record.mode,
            record.decision.confidence,
            record.decision.reasoning
        );
    }

    println!();
    match (&report.output, &report.error) {
        (Some(output), _) => println!("  {}\n{output}", style("Output:").bold()),
        (None, Some(error)) => println!("  {} {error}", style("Error:").red().bold()),
        (None, None) => {}
    }
    println!();
}

fn truncate(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max_chars || line.len() < text.len() {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
