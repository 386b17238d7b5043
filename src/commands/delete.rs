//! `appflow delete` - tear down managed resources

use anyhow::{Context as _, Result, bail};
use orchestrator::Graph;

use crate::Context;
use crate::cli::DeleteArgs;
use crate::ui;

pub fn run(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let settings = super::settings(ctx, None)?;
    let client = settings.client()?;
    let graph = super::load_graph(&args.graph, &client)?;

    let managed = deletion_order(&graph);
    if managed.is_empty() {
        ui::info("Nothing to delete: every declared resource is pre-existing");
        return Ok(());
    }

    ui::header(&format!("Deleting from {}", settings.namespace));
    for key in &managed {
        ui::dim(key);
    }
    println!();

    if !args.yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Delete {} resources?", managed.len()))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Aborted");
            return Ok(());
        }
    }

    let summary = orchestrator::teardown(&graph, &settings.retry_config());

    for key in &summary.removed {
        ui::success(&format!("deleted {key}"));
    }
    if !ctx.quiet {
        for key in summary.skipped.iter().filter(|k| managed.contains(*k)) {
            ui::dim(&format!("{key} already absent"));
        }
    }
    for (key, error) in &summary.failed {
        ui::error(&format!("{key}: {error}"));
    }

    if !summary.is_success() {
        bail!("{} resources could not be deleted", summary.failed.len());
    }
    Ok(())
}

/// Managed keys, dependents first
fn deletion_order(graph: &Graph) -> Vec<String> {
    graph
        .topological_order()
        .iter()
        .rev()
        .map(|&i| graph.node(i))
        .filter(|node| !node.is_existing())
        .map(|node| node.key().to_string())
        .collect()
}
