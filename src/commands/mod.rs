// Graph commands
pub mod check;
pub mod delete;
pub mod run;
pub mod status;

use anyhow::{Context as _, Result};
use cluster::Client;
use orchestrator::Graph;

use crate::Context;
use crate::cli::GraphArgs;
use crate::config::Settings;
use crate::loader;

/// Settings from the config file with command-line overrides applied
pub fn settings(ctx: &Context, jobs: Option<usize>) -> Result<Settings> {
    let mut overrides = ctx.overrides.clone();
    if jobs.is_some() {
        overrides.jobs = jobs;
    }
    Ok(Settings::load(ctx.config.as_deref())?.with_overrides(overrides))
}

/// Load the declaration file and build the dependency graph
pub fn load_graph(args: &GraphArgs, client: &Client) -> Result<Graph> {
    let declarations = loader::load_file(&args.file, client)?;
    let graph = if args.no_infer {
        Graph::build(declarations)
    } else {
        Graph::build_inferred(declarations)
    };
    graph.with_context(|| format!("Invalid dependency graph in {}", args.file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster::ResourceKind;
    use cluster::backend::memory::MemoryBackend;
    use orchestrator::{ExecuteOptions, NodeState, RetryConfig};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const APP: &str = r"
resources:
  - kind: ConfigMap
    metadata: {name: settings}
    data: {mode: fast}
  - kind: Deployment
    metadata: {name: web}
    depends_on: [configmap/settings]
    spec:
      replicas: 2
      template:
        metadata:
          labels: {app: web}
  - kind: Service
    metadata: {name: web}
    spec:
      selector: {app: web}
";

    fn fast_options() -> ExecuteOptions {
        ExecuteOptions {
            jobs: Some(2),
            retry: RetryConfig::new(3, Duration::from_millis(1), 1.0),
            poll: RetryConfig::new(2000, Duration::from_millis(2), 1.0),
        }
    }

    fn graph_args(dir: &tempfile::TempDir, no_infer: bool) -> GraphArgs {
        let file = dir.path().join("app.yaml");
        std::fs::write(&file, APP).unwrap();
        GraphArgs { file, no_infer }
    }

    #[test]
    fn test_inferred_service_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let client = Client::with_backend(Arc::new(MemoryBackend::new()), "default");

        let graph = load_graph(&graph_args(&dir, false), &client).unwrap();
        assert_eq!(graph.dependencies_of("service/web"), ["deployment/web"]);

        let graph = load_graph(&graph_args(&dir, true), &client).unwrap();
        assert!(graph.dependencies_of("service/web").is_empty());
    }

    #[test]
    fn test_run_against_memory_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryBackend::new();
        let client = Client::with_backend(Arc::new(memory.clone()), "default");
        let graph = load_graph(&graph_args(&dir, false), &client).unwrap();

        // Plays the cluster's controllers: roll out the deployment once created
        let cluster = memory.clone();
        let controller = std::thread::spawn(move || {
            for _ in 0..2000 {
                let rolled_out = cluster.update(ResourceKind::Deployment, "default", "web", |d| {
                    d["status"] = json!({"replicas": 2, "updatedReplicas": 2, "availableReplicas": 2});
                });
                if rolled_out {
                    for name in ["web-0", "web-1"] {
                        let pod = json!({
                            "metadata": {"name": name, "labels": {"app": "web"}},
                            "status": {"phase": "Running", "conditions": [{"type": "Ready", "status": "True"}]}
                        });
                        cluster.insert(ResourceKind::Pod, "default", pod).unwrap();
                    }
                    return;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        });

        let report = orchestrator::execute_simple(&graph, &fast_options()).unwrap();
        controller.join().unwrap();

        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.created_count(), 3);
        assert_eq!(
            memory.created(),
            ["configmap/settings", "deployment/web", "service/web"]
        );
        assert!(report.nodes.iter().all(|n| n.state == NodeState::Ready));
    }
}
