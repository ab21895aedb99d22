//! Command handlers.

use crate::commands::EventArgs;
use crate::config::{CliConfig, OutputFormat, RuntimeKind};
use console::style;
use drover_core::event::{Event, EventKind};
use drover_core::loader;
use drover_core::ports::ContainerRuntime;
use drover_core::run::{PipelineStatus, StepStatus};
use drover_core::trigger::Verdict;
use drover_runner::{DockerRuntime, RunnerConfig, RuntimeConfig, ShellRuntime, StepRunner};
use drover_scheduler::{
    DependencyGraph, DispatchReport, JsonFileStatusStore, Scheduler, SchedulerConfig,
};
use drover_secrets::{EnvProvider, FileProvider, HttpProvider, HttpProviderConfig, SecretResolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const TEMPLATE: &str = r#"kind: pipeline
name: default

steps:
  - name: test
    image: alpine
    commands:
      - echo "Running tests..."

trigger:
  branch:
    - main
  event:
    exclude:
      - pull_request
"#;

/// Write a starter definition file.
pub async fn init() -> CliResult<()> {
    let path = Path::new(".drover.yml");

    if path.exists() {
        println!("{} .drover.yml already exists", style("!").yellow());
        return Ok(());
    }

    std::fs::write(path, TEMPLATE)?;
    println!("{} Created .drover.yml", style("✓").green());
    Ok(())
}

fn load_graph(path: &Path) -> CliResult<DependencyGraph> {
    let definitions = loader::load_file(path)?;
    Ok(DependencyGraph::from_definitions(definitions)?)
}

/// Validate definitions and print them in dependency order.
pub async fn validate(path: &Path) -> CliResult<()> {
    let graph = load_graph(path)?;

    println!(
        "{} {} is valid ({} pipelines)",
        style("✓").green(),
        path.display(),
        graph.len()
    );

    for definition in graph.topological_order()? {
        println!(
            "  - {} ({} steps{})",
            style(&definition.name).bold(),
            definition.steps.len(),
            if definition.clone_disabled() { ", no clone" } else { "" }
        );
        if !definition.depends_on.is_empty() {
            println!("      depends on: {}", definition.depends_on.join(", "));
        }
        for step in &definition.steps {
            println!("      {} {}", style("·").dim(), step.name);
        }
    }

    Ok(())
}

/// Show which root pipelines the event admits.
pub async fn plan(path: &Path, args: &EventArgs) -> CliResult<()> {
    let graph = load_graph(path)?;
    let event = build_event(args)?;

    println!(
        "{} Plan for {} event (build {})",
        style("▶").cyan(),
        style(event.kind).bold(),
        event.build_number
    );

    for candidate in graph.evaluate(&event) {
        match candidate.verdict {
            Verdict::Admit => println!("  {} {}", style("✓").green(), candidate.name()),
            Verdict::Reject { dimension, reason } => println!(
                "  {} {} {}",
                style("○").dim(),
                candidate.name(),
                style(format!("(skipped: {} {:?})", dimension, reason)).dim()
            ),
        }
    }

    let waiting: Vec<_> = graph
        .definitions()
        .filter(|d| !d.depends_on.is_empty())
        .collect();
    for definition in waiting {
        println!(
            "  {} {} {}",
            style("…").dim(),
            definition.name,
            style(format!("(after {})", definition.depends_on.join(", "))).dim()
        );
    }

    Ok(())
}

/// Options for `drover run` after merging flags over the config file.
pub struct RunOptions {
    pub local: bool,
    pub secrets_file: Option<PathBuf>,
    pub secrets_url: Option<String>,
    pub secret_prefix: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub max_parallel: Option<usize>,
    pub timeout: Option<u64>,
}

/// Dispatch an event. Returns whether the build succeeded.
pub async fn run(
    config: &CliConfig,
    path: &Path,
    args: &EventArgs,
    options: RunOptions,
) -> CliResult<bool> {
    let graph = load_graph(path)?;
    let mut event = build_event(args)?;
    if event.remote_url.is_none() {
        event.remote_url = Some(std::env::current_dir()?.display().to_string());
    }

    let runtime_config = RuntimeConfig {
        timeout_seconds: options.timeout.or(config.timeout_seconds),
        ..Default::default()
    };
    let runtime: Arc<dyn ContainerRuntime> =
        if options.local || config.runtime == RuntimeKind::Shell {
            Arc::new(ShellRuntime::new(runtime_config))
        } else {
            Arc::new(DockerRuntime::new(runtime_config)?)
        };

    let secrets = build_resolver(config, &options).await?;

    let mut runner_config = RunnerConfig {
        clone_image: config.clone_image.clone(),
        ..Default::default()
    };
    if let Some(root) = &config.workspace_root {
        runner_config.workspace_root = root.clone();
    }
    let runner = StepRunner::new(runtime, secrets, runner_config);

    let scheduler_config = SchedulerConfig {
        max_parallel: options.max_parallel.or(config.max_parallel),
    };
    let mut scheduler = Scheduler::new(graph, Arc::new(runner), scheduler_config);
    if let Some(dir) = options.state_dir.or_else(|| config.state_dir.clone()) {
        scheduler = scheduler.with_store(Arc::new(JsonFileStatusStore::new(dir)));
    }

    println!(
        "{} Dispatching {} event (build {}) with {} runtime",
        style("▶").cyan(),
        style(event.kind).bold(),
        event.build_number,
        if options.local || config.runtime == RuntimeKind::Shell { "shell" } else { "docker" }
    );

    let report = scheduler.dispatch(event).await?;

    match config.output_format {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
    }

    Ok(report.is_success())
}

async fn build_resolver(config: &CliConfig, options: &RunOptions) -> CliResult<SecretResolver> {
    let prefix = options
        .secret_prefix
        .clone()
        .unwrap_or_else(|| config.secret_prefix.clone());
    let mut resolver = SecretResolver::new()
        .with_provider(Arc::new(EnvProvider::new(Some(prefix).filter(|p| !p.is_empty()))));

    if let Some(file) = options.secrets_file.as_ref().or(config.secrets_file.as_ref()) {
        let provider = FileProvider::load_from_file(file).await?;
        info!(path = %file.display(), secrets = provider.len(), "Loaded secrets file");
        resolver.register_provider(Arc::new(provider));
    }

    if let Some(address) = options.secrets_url.clone().or_else(|| config.secrets_url.clone()) {
        let provider = HttpProvider::new(HttpProviderConfig {
            address,
            token: config.secrets_token.clone(),
            timeout_secs: 10,
        })?;
        resolver.register_provider(Arc::new(provider));
    }

    Ok(resolver)
}

/// Turn event flags into an [`Event`].
pub fn build_event(args: &EventArgs) -> CliResult<Event> {
    let mut event = match &args.event_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        }
        None => {
            let kind: EventKind = args.event.parse()?;
            let mut event = match (&args.tag, &args.branch) {
                (Some(tag), _) => {
                    let mut event = Event::tag(tag);
                    event.kind = kind;
                    event
                }
                (None, Some(branch)) => {
                    let mut event = Event::push(branch);
                    event.kind = kind;
                    event
                }
                (None, None) => Event::new(kind),
            };
            if let Some(git_ref) = &args.git_ref {
                event = event.with_ref(git_ref);
            }
            if let Some(commit) = &args.commit {
                event = event.with_commit(commit);
            }
            if let Some(author) = &args.author {
                event = event.with_author(author);
            }
            event
        }
    };

    if let Some(build) = args.build {
        event.build_number = build;
    } else if event.build_number == 0 {
        event.build_number = chrono::Utc::now().timestamp().max(0) as u64;
    }
    if let Some(remote) = &args.remote {
        event.remote_url = Some(remote.clone());
    }

    Ok(event)
}

fn status_style(status: PipelineStatus) -> console::StyledObject<&'static str> {
    match status {
        PipelineStatus::Succeeded => style("✓").green().bold(),
        PipelineStatus::Failed => style("✗").red().bold(),
        PipelineStatus::Skipped => style("○").dim(),
    }
}

fn print_report(report: &DispatchReport) {
    println!();
    for pipeline in &report.pipelines {
        let note = if pipeline.resumed { " (from previous dispatch)" } else { "" };
        println!(
            "{} {} {}{}",
            status_style(pipeline.status),
            style(&pipeline.name).bold(),
            pipeline.status,
            style(note).dim()
        );

        let Some(run) = &pipeline.run else {
            continue;
        };
        for step in &run.steps {
            let marker = match step.status {
                StepStatus::Succeeded => style("✓").green(),
                StepStatus::Failed { ignored: true } => style("!").yellow(),
                StepStatus::Failed { ignored: false } => style("✗").red(),
                StepStatus::Skipped => style("○").dim(),
            };
            let detail = step
                .failure
                .as_ref()
                .map(|f| format!(" ({})", f))
                .unwrap_or_default();
            println!(
                "    {} {} {} {}{}",
                marker,
                step.name,
                step.status,
                style(format!("{:.2}s", step.duration_ms() as f64 / 1000.0)).dim(),
                detail
            );
        }
    }

    println!();
    if report.is_success() {
        println!(
            "{} Build {} succeeded in {:.2}s",
            style("✓").green().bold(),
            report.build_number,
            report.duration_ms() as f64 / 1000.0
        );
    } else {
        let failed: Vec<&str> = report.failed().map(|p| p.name.as_str()).collect();
        println!(
            "{} Build {} failed after {:.2}s: {}",
            style("✗").red().bold(),
            report.build_number,
            report.duration_ms() as f64 / 1000.0,
            failed.join(", ")
        );
    }
}

fn report_json(report: &DispatchReport) -> serde_json::Value {
    serde_json::json!({
        "build_number": report.build_number,
        "success": report.is_success(),
        "duration_ms": report.duration_ms(),
        "pipelines": report.pipelines.iter().map(|p| serde_json::json!({
            "name": p.name,
            "status": p.status,
            "resumed": p.resumed,
            "steps": p.run.as_ref().map(|run| run.steps.clone()).unwrap_or_default(),
        })).collect::<Vec<_>>(),
    })
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> CliResult<()> {
    let unset = "(not set)";
    let path_or_unset = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| unset.to_string())
    };

    println!("Current configuration:");
    println!("  runtime: {:?}", config.runtime);
    println!("  clone_image: {}", config.clone_image);
    println!("  workspace_root: {}", path_or_unset(&config.workspace_root));
    println!("  state_dir: {}", path_or_unset(&config.state_dir));
    println!("  secrets_file: {}", path_or_unset(&config.secrets_file));
    println!(
        "  secrets_url: {}",
        config.secrets_url.as_deref().unwrap_or(unset)
    );
    println!(
        "  secrets_token: {}",
        if config.secrets_token.is_some() { "***" } else { unset }
    );
    println!("  secret_prefix: {}", config.secret_prefix);
    println!(
        "  max_parallel: {}",
        config
            .max_parallel
            .map(|n| n.to_string())
            .unwrap_or_else(|| unset.to_string())
    );
    println!(
        "  timeout_seconds: {}",
        config
            .timeout_seconds
            .map(|n| n.to_string())
            .unwrap_or_else(|| unset.to_string())
    );
    println!("  output_format: {:?}", config.output_format);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }

    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> CliResult<()> {
    let mut config = CliConfig::load().unwrap_or_default();
    config.set(key, value)?;
    config.save()?;

    let shown = if key == "secrets_token" { "***" } else { value };
    println!("{} Set {} = {}", style("✓").green(), key, shown);
    Ok(())
}
