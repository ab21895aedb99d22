//! End-to-end dispatch tests against a scripted container runtime.

use async_trait::async_trait;
use drover_core::{Error, Result};
use drover_core::event::Event;
use drover_core::loader;
use drover_core::ports::{ContainerRuntime, ExecRequest, StatusStore};
use drover_core::run::{PipelineStatus, StatusRecord, StepStatus};
use drover_runner::{RunnerConfig, StepRunner};
use drover_scheduler::{
    DependencyGraph, JsonFileStatusStore, MemoryStatusStore, Scheduler, SchedulerConfig,
};
use drover_secrets::SecretResolver;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Exit codes keyed by `pipeline/step`; everything else exits 0.
#[derive(Default)]
struct ScriptedRuntime {
    exit_codes: HashMap<String, i32>,
    delay: Option<Duration>,
    executed: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRuntime {
    fn failing(steps: &[&str]) -> Self {
        Self {
            exit_codes: steps.iter().map(|s| (s.to_string(), 1)).collect(),
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn count(&self, pipeline: &str) -> usize {
        let prefix = format!("{}/", pipeline);
        self.executed()
            .iter()
            .filter(|s| s.starts_with(&prefix))
            .count()
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn execute(&self, request: &ExecRequest) -> Result<i32> {
        let key = format!("{}/{}", request.pipeline, request.step);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.executed.lock().unwrap().push(key.clone());
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(self.exit_codes.get(&key).copied().unwrap_or(0))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

const CONFIG: &str = r#"
kind: pipeline
name: main
clone:
  disable: true
steps:
  - name: test
    image: rust:1.85
    commands: [cargo test]
trigger:
  branch: [main]
---
kind: pipeline
name: notify
clone:
  disable: true
depends_on: [main]
steps:
  - name: slack
    image: plugins/slack
trigger:
  status: [failure]
---
kind: pipeline
name: deploy
clone:
  disable: true
depends_on: [main]
steps:
  - name: ship
    image: alpine
trigger:
  status: [success]
---
kind: pipeline
name: audit
clone:
  disable: true
depends_on: [deploy]
steps:
  - name: log
    image: alpine
"#;

fn scheduler(runtime: Arc<ScriptedRuntime>, config: SchedulerConfig) -> (Scheduler, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let runner = StepRunner::new(
        runtime,
        SecretResolver::new(),
        RunnerConfig {
            workspace_root: dir.path().to_path_buf(),
            ..Default::default()
        },
    );
    let graph = DependencyGraph::from_definitions(loader::load_str(CONFIG).unwrap()).unwrap();
    (Scheduler::new(graph, Arc::new(runner), config), dir)
}

fn scheduler_for(
    yaml: &str,
    runtime: Arc<ScriptedRuntime>,
    config: SchedulerConfig,
) -> (Scheduler, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let runner = StepRunner::new(
        runtime,
        SecretResolver::new(),
        RunnerConfig {
            workspace_root: dir.path().to_path_buf(),
            ..Default::default()
        },
    );
    let graph = DependencyGraph::from_definitions(loader::load_str(yaml).unwrap()).unwrap();
    (Scheduler::new(graph, Arc::new(runner), config), dir)
}

fn push(build: u64) -> Event {
    Event::push("main").with_build_number(build)
}

#[tokio::test]
async fn test_failure_only_notifier_runs_after_failure() {
    let runtime = Arc::new(ScriptedRuntime::failing(&["main/test"]));
    let (mut scheduler, _dir) = scheduler(runtime.clone(), SchedulerConfig::default());

    let report = scheduler.dispatch(push(1)).await.unwrap();

    assert_eq!(report.status_of("main"), Some(PipelineStatus::Failed));
    assert_eq!(report.status_of("notify"), Some(PipelineStatus::Succeeded));
    assert_eq!(report.status_of("deploy"), Some(PipelineStatus::Skipped));
    // A skipped dependency does not block its dependents.
    assert_eq!(report.status_of("audit"), Some(PipelineStatus::Succeeded));
    assert!(!report.is_success());
    assert_eq!(runtime.count("notify"), 1);
    assert_eq!(runtime.count("deploy"), 0);

    let executed = runtime.executed();
    let main = executed.iter().position(|s| s == "main/test").unwrap();
    let notify = executed.iter().position(|s| s == "notify/slack").unwrap();
    assert!(main < notify);
}

#[tokio::test]
async fn test_success_path_skips_notifier() {
    let runtime = Arc::new(ScriptedRuntime::default());
    let (mut scheduler, _dir) = scheduler(runtime.clone(), SchedulerConfig::default());

    let report = scheduler.dispatch(push(2)).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.status_of("notify"), Some(PipelineStatus::Skipped));
    assert_eq!(report.status_of("deploy"), Some(PipelineStatus::Succeeded));
    assert_eq!(report.status_of("audit"), Some(PipelineStatus::Succeeded));
    assert_eq!(runtime.executed(), vec!["main/test", "deploy/ship", "audit/log"]);
}

#[tokio::test]
async fn test_rejected_root_skips_without_running() {
    let runtime = Arc::new(ScriptedRuntime::default());
    let (mut scheduler, _dir) = scheduler(runtime.clone(), SchedulerConfig::default());

    let report = scheduler.dispatch(Event::push("feature/login")).await.unwrap();

    assert_eq!(report.status_of("main"), Some(PipelineStatus::Skipped));
    assert_eq!(report.status_of("notify"), Some(PipelineStatus::Skipped));
    assert_eq!(report.status_of("deploy"), Some(PipelineStatus::Succeeded));
    assert_eq!(runtime.count("main"), 0);
    assert!(report.pipelines.iter().all(|p| !p.resumed));
}

#[tokio::test]
async fn test_each_pipeline_runs_once_per_dispatch() {
    let runtime = Arc::new(ScriptedRuntime::default());
    let (mut scheduler, _dir) = scheduler(runtime.clone(), SchedulerConfig::default());

    let report = scheduler.dispatch(push(3)).await.unwrap();

    assert_eq!(report.pipelines.len(), 4);
    for name in ["main", "deploy", "audit"] {
        assert_eq!(runtime.count(name), 1, "{}", name);
    }
    let main = report.get("main").unwrap();
    let run = main.run.as_ref().unwrap();
    assert_eq!(run.step("test").unwrap().status, StepStatus::Succeeded);
}

#[tokio::test]
async fn test_independent_pipelines_run_concurrently() {
    let yaml = r#"
name: lint
clone: {disable: true}
steps: [{name: run, image: alpine}]
---
name: unit
clone: {disable: true}
steps: [{name: run, image: alpine}]
---
name: docs
clone: {disable: true}
steps: [{name: run, image: alpine}]
"#;
    for (max_parallel, expected_peak) in [(None, 3), (Some(1), 1)] {
        let runtime = Arc::new(ScriptedRuntime::slow(Duration::from_millis(100)));
        let dir = tempfile::tempdir().unwrap();
        let runner = StepRunner::new(
            runtime.clone(),
            SecretResolver::new(),
            RunnerConfig {
                workspace_root: dir.path().to_path_buf(),
                ..Default::default()
            },
        );
        let graph = DependencyGraph::from_definitions(loader::load_str(yaml).unwrap()).unwrap();
        let mut scheduler = Scheduler::new(graph, Arc::new(runner), SchedulerConfig { max_parallel });

        let report = scheduler.dispatch(push(4)).await.unwrap();

        assert!(report.is_success());
        assert_eq!(runtime.executed().len(), 3);
        assert_eq!(runtime.peak.load(Ordering::SeqCst), expected_peak);
    }
}

#[tokio::test]
async fn test_resume_skips_recorded_pipelines() {
    let runtime = Arc::new(ScriptedRuntime::default());
    let (scheduler, dir) = scheduler(runtime.clone(), SchedulerConfig::default());
    let store = Arc::new(JsonFileStatusStore::new(dir.path().join("state")));
    store
        .save(9, &StatusRecord {
            pipeline: "main".to_string(),
            status: PipelineStatus::Failed,
            recorded_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
    let mut scheduler = scheduler.with_store(store.clone());

    let report = scheduler.dispatch(push(9)).await.unwrap();

    assert_eq!(runtime.count("main"), 0);
    assert!(report.get("main").unwrap().resumed);
    assert_eq!(report.status_of("notify"), Some(PipelineStatus::Succeeded));
    assert_eq!(store.load(9).await.unwrap().len(), 4);

    // A second dispatch of the same build has nothing left to do.
    let again = scheduler.dispatch(push(9)).await.unwrap();
    assert_eq!(runtime.count("notify"), 1);
    assert!(again.pipelines.iter().all(|p| p.resumed));
}

#[tokio::test]
async fn test_memory_store_receives_every_record() {
    let runtime = Arc::new(ScriptedRuntime::failing(&["main/test"]));
    let (scheduler, _dir) = scheduler(runtime, SchedulerConfig::default());
    let store = Arc::new(MemoryStatusStore::new());
    let mut scheduler = scheduler.with_store(store.clone());

    scheduler.dispatch(push(5)).await.unwrap();

    let records = store.load(5).await.unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].pipeline, "main");
    assert_eq!(records[0].status, PipelineStatus::Failed);
}

/// Store whose writes always fail.
struct ReadOnlyStore;

#[async_trait]
impl StatusStore for ReadOnlyStore {
    async fn load(&self, _build_number: u64) -> Result<Vec<StatusRecord>> {
        Ok(vec![])
    }

    async fn save(&self, _build_number: u64, _record: &StatusRecord) -> Result<()> {
        Err(Error::Store("read-only file system".to_string()))
    }
}

#[tokio::test]
async fn test_store_write_failure_keeps_siblings_running() {
    let yaml = r#"
name: lint
clone: {disable: true}
steps: [{name: run, image: alpine}]
trigger: {branch: [release/*]}
---
name: unit
clone: {disable: true}
steps: [{name: run, image: alpine}]
---
name: docs
clone: {disable: true}
steps: [{name: run, image: alpine}]
"#;
    let runtime = Arc::new(ScriptedRuntime::slow(Duration::from_millis(50)));
    let (scheduler, _dir) = scheduler_for(yaml, runtime.clone(), SchedulerConfig::default());
    let mut scheduler = scheduler.with_store(Arc::new(ReadOnlyStore));

    let report = scheduler.dispatch(push(6)).await.unwrap();

    assert_eq!(report.status_of("lint"), Some(PipelineStatus::Skipped));
    assert_eq!(report.status_of("unit"), Some(PipelineStatus::Succeeded));
    assert_eq!(report.status_of("docs"), Some(PipelineStatus::Succeeded));
    assert_eq!(runtime.executed().len(), 2);
}

#[tokio::test]
async fn test_scheduler_without_store_evaluates_each_event() {
    let yaml = r#"
name: ci
clone: {disable: true}
steps: [{name: test, image: alpine}]
trigger: {event: [push]}
---
name: release
clone: {disable: true}
steps: [{name: publish, image: alpine}]
trigger: {event: [tag]}
"#;
    let runtime = Arc::new(ScriptedRuntime::default());
    let (mut scheduler, _dir) = scheduler_for(yaml, runtime.clone(), SchedulerConfig::default());

    let pushed = scheduler.dispatch(Event::push("main")).await.unwrap();
    assert_eq!(pushed.status_of("ci"), Some(PipelineStatus::Succeeded));
    assert_eq!(pushed.status_of("release"), Some(PipelineStatus::Skipped));

    // Same default build number, different event.
    let tagged = scheduler.dispatch(Event::tag("v1.0.0")).await.unwrap();
    assert_eq!(tagged.status_of("release"), Some(PipelineStatus::Succeeded));
    assert_eq!(tagged.status_of("ci"), Some(PipelineStatus::Skipped));
    assert!(tagged.pipelines.iter().all(|p| !p.resumed));
    assert_eq!(runtime.executed(), vec!["ci/test", "release/publish"]);
}
