use crate::cmd_list::read_repository_list;
use anyhow::Result;
use drift_runner::{
    GitCli, NodeTools, PackageTools, Pipeline, RunConfig, RunReport, SourceControl, Workspaces,
};
use drift_store::HistoryStore;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::error;

const COMMIT_MESSAGE: &str = "Update data";

/// Execute `drift-tracker run`. Returns whether every entry (and the
/// commit, when requested) succeeded.
pub fn execute(base_dir: &Path, config: &RunConfig) -> Result<bool> {
    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    let source = GitCli::new(config.git.clone(), config.timeouts.clone_timeout())
        .with_author(&config.commit_author_name, &config.commit_author_email)
        .with_cancel(cancel.clone());
    let tools = NodeTools::new(config.libyear.clone(), config.timeouts.clone()).with_cancel(cancel);
    let variables: HashMap<String, String> = std::env::vars().collect();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(base_dir, config, &variables, &source, &tools))
}

/// The run itself, with the collaborators injected.
pub async fn run(
    base_dir: &Path,
    config: &RunConfig,
    variables: &HashMap<String, String>,
    source: &dyn SourceControl,
    tools: &dyn PackageTools,
) -> Result<bool> {
    let entries = read_repository_list(&config.repositories_path(base_dir))?;
    let store = HistoryStore::new(config.data_path(base_dir));
    println!(
        "Tracking {} entries (concurrency {})",
        entries.len(),
        config.concurrency
    );

    let pipeline = Pipeline {
        source,
        tools,
        store: &store,
        concurrency: config.concurrency,
    };
    let mut workspaces = Workspaces::new(config.keep_workspaces);
    let report = pipeline.run(&entries, variables, &mut workspaces).await;
    workspaces.cleanup();
    print_report(&report);

    let mut ok = report.is_success();
    if config.commit {
        let paths = [config.data_dir.clone()];
        match source.commit(base_dir, &paths, COMMIT_MESSAGE).await {
            Ok(true) => println!("Committed {}", config.data_dir.display()),
            Ok(false) => println!("Nothing to commit"),
            Err(e) => {
                error!("commit failed: {e:#}");
                ok = false;
            }
        }
    }
    Ok(ok)
}

fn print_report(report: &RunReport) {
    println!();
    for outcome in &report.succeeded {
        println!(
            "  ok    {}  drift {:.2}  pulse {:.2}  ({}, {} deps)",
            outcome.identifier,
            outcome.summary.drift,
            outcome.summary.pulse,
            outcome.manager,
            outcome.dependencies
        );
    }
    for failure in &report.failed {
        println!(
            "  FAIL  {}  [{}] {}",
            failure.identifier,
            failure.error.kind(),
            failure.error
        );
    }
    if let Some(e) = &report.index_error {
        println!("  index not written: {e}");
    }
    println!(
        "\n{} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}
