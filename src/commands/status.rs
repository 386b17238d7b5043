//! `appflow status` - read-only view of declared resources

use anyhow::Result;
use colored::Colorize;
use orchestrator::{ResourceStatus, StatusSnapshot};

use crate::Context;
use crate::cli::GraphArgs;
use crate::ui;

pub fn run(ctx: &Context, args: GraphArgs) -> Result<()> {
    let settings = super::settings(ctx, None)?;
    let client = settings.client()?;
    let graph = super::load_graph(&args, &client)?;

    let snapshot = orchestrator::snapshot(&graph);

    ui::header(&format!("Status ({})", settings.namespace));
    print_snapshot(&snapshot);

    println!();
    if snapshot.is_all_ready() {
        ui::success("All resources ready");
    } else {
        let ready = snapshot
            .nodes
            .iter()
            .filter(|n| n.status == Some(ResourceStatus::Ready))
            .count();
        ui::info(&format!("{ready} of {} resources ready", snapshot.nodes.len()));
    }
    Ok(())
}

fn print_snapshot(snapshot: &StatusSnapshot) {
    let width = ui::key_width(snapshot.nodes.iter().map(|n| n.key.as_str()));

    for node in &snapshot.nodes {
        let existing = if node.existing { " (existing)" } else { "" };
        println!(
            "  {} {}{}",
            ui::pad(&node.key, width),
            ui::status_label(node.status),
            existing.dimmed()
        );
        if let Some(error) = &node.error {
            println!("      {}", error.red());
        }
        for report in &node.dependencies {
            let marker = if report.unblocks() {
                "✓".green()
            } else if report.error.is_some() {
                "✗".red()
            } else {
                "…".yellow()
            };
            println!("      {marker} {}", report.message.dimmed());
        }
    }
}
