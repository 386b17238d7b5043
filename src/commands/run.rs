//! `appflow run` - create resources in dependency order

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use orchestrator::{DependencyReport, NodeState, RunObserver, RunReport};

use crate::Context;
use crate::cli::RunArgs;
use crate::ui;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let settings = super::settings(ctx, args.jobs)?;
    let client = settings.client()?;
    let graph = super::load_graph(&args.graph, &client)?;

    if !ctx.quiet {
        ui::header(&format!("Creating {} resources", graph.len()));
        ui::kv("Server", &settings.server);
        ui::kv("Namespace", &settings.namespace);
        println!();
    }

    let width = ui::key_width(graph.nodes().iter().map(|n| n.key()));
    let mut progress = Progress {
        width,
        quiet: ctx.quiet,
        verbose: ctx.verbose > 0,
    };
    let report = orchestrator::execute(&graph, &settings.execute_options(), &mut progress)
        .context("Failed to run the dependency graph")?;

    print_summary(&report, width, ctx.quiet);

    if !report.is_success() {
        bail!(
            "{} failed, {} waiting for upgrade, {} never started",
            report.failed().len(),
            report.drifted().len(),
            report.blocked().len()
        );
    }
    Ok(())
}

/// Prints state changes as they happen
struct Progress {
    width: usize,
    quiet: bool,
    verbose: bool,
}

impl RunObserver for Progress {
    fn on_run_start(&mut self, _nodes: usize) {}

    fn on_state_change(&mut self, key: &str, _from: NodeState, to: NodeState) {
        if self.quiet {
            return;
        }
        // Intermediate states only in verbose mode
        if to.is_terminal() || self.verbose {
            println!(
                "  {} {} {}",
                ui::state_icon(to),
                ui::pad(key, self.width),
                ui::state_label(to)
            );
        }
    }

    fn on_report(&mut self, dependent: &str, report: &DependencyReport) {
        if self.quiet || !self.verbose {
            return;
        }
        ui::dim(&format!("{dependent} <- {}", report.message));
    }

    fn on_blocked(&mut self, key: &str, reason: &str) {
        if !self.quiet {
            ui::warn(&format!("{key} will not be created: {reason}"));
        }
    }

    fn on_run_complete(&mut self, _report: &RunReport) {}
}

fn print_summary(report: &RunReport, width: usize, quiet: bool) {
    if report.is_success() {
        if !quiet {
            println!();
            ui::success(&format!(
                "All {} resources ready ({} created)",
                report.nodes.len(),
                report.created_count()
            ));
        }
        return;
    }

    ui::section("Not ready");
    for node in report.nodes.iter().filter(|n| n.state != NodeState::Ready) {
        println!(
            "  {} {} {}",
            ui::state_icon(node.state),
            ui::pad(&node.key, width),
            ui::state_label(node.state)
        );
        if let Some(message) = &node.message {
            ui::dim(message);
        }
        if let Some(report) = &node.blocking_report {
            ui::dim(&format!("waiting on {}", report.message));
        }
    }
    println!();
    println!(
        "  {} ready, {} {}",
        report
            .nodes
            .iter()
            .filter(|n| n.state == NodeState::Ready)
            .count()
            .to_string()
            .green(),
        report.created_count(),
        "created".dimmed()
    );
}
