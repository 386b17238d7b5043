//! `appflow check` - validate a declaration file offline

use anyhow::Result;
use cluster::Client;
use cluster::backend::memory::MemoryBackend;
use colored::Colorize;
use orchestrator::Graph;
use std::sync::Arc;

use crate::Context;
use crate::cli::GraphArgs;
use crate::ui;

pub fn run(ctx: &Context, args: GraphArgs) -> Result<()> {
    // Adapters are built against an empty in-memory cluster; nothing is contacted
    let client = Client::with_backend(Arc::new(MemoryBackend::new()), "default");
    let graph = super::load_graph(&args, &client)?;

    if !ctx.quiet {
        print_order(&graph);
    }
    ui::success(&format!(
        "{}: {} resources, {} dependencies, no cycles",
        args.file.display(),
        graph.len(),
        graph.edges().len()
    ));
    Ok(())
}

fn print_order(graph: &Graph) {
    ui::header("Creation order");
    for (position, &index) in graph.topological_order().iter().enumerate() {
        let node = graph.node(index);
        let existing = if node.is_existing() {
            " (existing)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("  {:>3}. {}{existing}", position + 1, node.key().bold());

        for &id in graph.incoming(index) {
            let edge = graph.edge(id);
            let dependency = graph.node(edge.dependency).key();
            if edge.meta.is_empty() {
                ui::dim(&format!("     after {dependency}"));
            } else {
                let meta: Vec<String> = edge.meta.iter().map(|(k, v)| format!("{k}={v}")).collect();
                ui::dim(&format!("     after {dependency} [{}]", meta.join(", ")));
            }
        }
    }
    println!();
}
