use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use shell_fnd::logging::{LogRouter, RouterLayer, UiBuffer};
use shell_fnd::shell::{ApplicationShell, Hooks, ShellOptions};
use shell_fnd::{AppContext, Config, Outcome};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Counts data rows in every CSV file of `io.input_dir`, one log file per input.
#[derive(Default)]
struct RowCounter {
    totals: Vec<(String, usize)>,
}

impl RowCounter {
    fn csv_files(dir: &Path, excluded: &[String]) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if path.is_file() && is_csv && !excluded.iter().any(|e| e.to_lowercase() == name) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Hooks for RowCounter {
    fn configure(&mut self, ctx: &AppContext) -> anyhow::Result<()> {
        let input: String = ctx.config().get("io.input_dir", "input");
        ctx.logger().info(format!("input directory: {input}"));
        Ok(())
    }

    fn run(&mut self, ctx: &AppContext) -> anyhow::Result<()> {
        let input: String = ctx.config().get("io.input_dir", "input");
        let excluded: Vec<String> = ctx.config().get("io.exclude_files", vec!["Sample.csv".to_string()]);

        let files = Self::csv_files(Path::new(&input), &excluded)?;
        if files.is_empty() {
            ctx.logger().warning("no matching CSV files");
            return Ok(());
        }
        ctx.logger().info(format!("found {} files", files.len()));

        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let log = ctx.logger_for(name.as_str());
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let rows = contents.lines().skip(1).filter(|l| !l.trim().is_empty()).count();
            tracing::info!(target: "batch", file = %name, rows, "counted");
            log.info(format!("{rows} data rows"));
            self.totals.push((name, rows));
        }
        Ok(())
    }

    fn on_failure(&mut self, ctx: &AppContext, error: &anyhow::Error) {
        ctx.logger()
            .warning(format!("stopping after {} files: {error}", self.totals.len()));
    }
}

fn main() -> Result<(), shell_fnd::Error> {
    let router = Arc::new(LogRouter::new());
    tracing_subscriber::registry()
        .with(RouterLayer::new(Arc::clone(&router)))
        .init();

    let ui = UiBuffer::bounded(200);
    let options = ShellOptions::new("batch")
        .with_config(
            Config::builder()
                .with_file("demos/batch.toml", true)
                .with_file("demos/batch.local.toml", false)
                .with_env("BATCH", "__"),
        )
        .require(["io.input_dir"])
        .with_router(router)
        .with_ui(ui.clone());

    let mut shell = ApplicationShell::new(options, RowCounter::default());
    let outcome = shell.execute()?;

    println!("{}", ui.text());
    for (name, rows) in &shell.hooks().totals {
        println!("{name}: {rows}");
    }
    if let Outcome::Failed(_) = outcome {
        std::process::exit(1);
    }
    Ok(())
}
