//! Sequential step execution for a single pipeline run.

use chrono::Utc;
use drover_core::event::Event;
use drover_core::pipeline::{
    CLONE_STEP, EnvValue, FailurePolicy, PipelineDefinition, StepDefinition,
};
use drover_core::ports::{ContainerRuntime, ExecRequest};
use drover_core::run::{PipelineRun, PipelineStatus, StepFailure, StepOutcome, StepStatus};
use drover_core::secrets::StepEnvironment;
use drover_core::trigger::{TriggerEvaluator, Verdict};
use drover_core::Result;
use drover_secrets::SecretResolver;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Output stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Configuration for the step runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory under which each run gets its own workspace, removed when
    /// the run finishes.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Image used for the implicit clone step.
    #[serde(default = "default_clone_image")]
    pub clone_image: String,
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("drover")
}

fn default_clone_image() -> String {
    "alpine/git".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            clone_image: default_clone_image(),
        }
    }
}

/// Configuration shared by the container runtimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Kill a step that runs longer than this. No limit when unset.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Pull images that are not present locally.
    #[serde(default = "default_pull_images")]
    pub pull_images: bool,
}

fn default_pull_images() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            pull_images: default_pull_images(),
        }
    }
}

/// Build the `sh` script for a step: fail on the first failing command and
/// echo each command before it runs.
pub fn shell_script(commands: &[String]) -> String {
    let mut script = String::from("set -e\n");
    for command in commands {
        script.push_str(&format!("echo {}\n", shell_quote(&format!("+ {}", command))));
        script.push_str(command);
        script.push('\n');
    }
    script
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Runs a pipeline's steps in order against a container runtime.
pub struct StepRunner {
    runtime: Arc<dyn ContainerRuntime>,
    secrets: SecretResolver,
    evaluator: TriggerEvaluator,
    config: RunnerConfig,
}

impl StepRunner {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        secrets: SecretResolver,
        config: RunnerConfig,
    ) -> Self {
        Self {
            runtime,
            secrets,
            evaluator: TriggerEvaluator::new(),
            config,
        }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Execute every step of `run` and settle its final status.
    ///
    /// A fail-fast failure stops the run; later steps are not executed and
    /// get no outcome.
    pub async fn run(&self, run: &mut PipelineRun) -> PipelineStatus {
        let pipeline = Arc::clone(&run.definition);
        info!(
            pipeline = %pipeline.name,
            run_id = %run.id,
            runtime = %self.runtime.name(),
            steps = pipeline.steps.len(),
            "Starting pipeline run"
        );
        run.start();

        let workspace = self.workspace_for(run);
        if let Err(e) = tokio::fs::create_dir_all(&workspace).await {
            warn!(workspace = %workspace.display(), error = %e, "Failed to create workspace");
        }

        let clone_step = (!pipeline.clone_disabled()).then(|| self.clone_step(&pipeline));

        for step in clone_step.iter().chain(pipeline.steps.iter()) {
            let outcome = self.run_step(run, &pipeline, step, &workspace).await;
            let fatal = outcome.status.is_fatal();
            run.record_step(outcome);

            if fatal {
                warn!(pipeline = %pipeline.name, step = %step.name, "Step failed, halting pipeline");
                break;
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(&workspace).await {
            warn!(workspace = %workspace.display(), error = %e, "Failed to remove workspace");
        }

        let status = run.finish();
        info!(
            pipeline = %pipeline.name,
            run_id = %run.id,
            status = %status,
            duration_ms = run.duration_ms().unwrap_or(0),
            "Pipeline run finished"
        );
        status
    }

    /// Every run gets its own directory, so reruns of a build never see a
    /// previous checkout.
    fn workspace_for(&self, run: &PipelineRun) -> PathBuf {
        self.config.workspace_root.join(run.id.to_string())
    }

    fn clone_step(&self, pipeline: &PipelineDefinition) -> StepDefinition {
        let depth = pipeline
            .clone
            .depth
            .map(|d| format!(" --depth={}", d))
            .unwrap_or_default();

        let mut step = StepDefinition::new(CLONE_STEP, &self.config.clone_image);
        step.commands = vec![
            "git init -q".to_string(),
            "git remote add origin \"$CI_REMOTE_URL\" 2>/dev/null || git remote set-url origin \"$CI_REMOTE_URL\"".to_string(),
            format!("git fetch -q{} origin \"${{CI_COMMIT_REF:-HEAD}}\"", depth),
            "git checkout -qf \"${CI_COMMIT_SHA:-FETCH_HEAD}\"".to_string(),
        ];
        step
    }

    async fn run_step(
        &self,
        run: &PipelineRun,
        pipeline: &PipelineDefinition,
        step: &StepDefinition,
        workspace: &Path,
    ) -> StepOutcome {
        let started_at = Utc::now();
        let finish = |status: StepStatus, failure: Option<StepFailure>| StepOutcome {
            name: step.name.clone(),
            status,
            failure,
            started_at,
            completed_at: Utc::now(),
        };
        let failed = |failure: StepFailure| {
            let ignored = step.failure == FailurePolicy::Ignore;
            finish(StepStatus::Failed { ignored }, Some(failure))
        };

        if let Some(when) = &step.when {
            let event = run
                .event
                .clone()
                .with_status(run.current_status().as_build_status());
            if let Verdict::Reject { dimension, reason } = self.evaluator.evaluate(when, &event) {
                info!(step = %step.name, %dimension, ?reason, "Skipping step");
                return finish(StepStatus::Skipped, None);
            }
        }

        if step.name == CLONE_STEP
            && !pipeline.clone_disabled()
            && run.event.remote_url.is_none()
        {
            error!(pipeline = %pipeline.name, "No remote URL to clone from");
            return failed(StepFailure::Runtime(
                "event carries no remote URL to clone".to_string(),
            ));
        }

        let env = match self.step_environment(run, pipeline, step).await {
            Ok(env) => env,
            Err(e) => {
                error!(step = %step.name, error = %e, "Failed to resolve step secrets");
                return failed(StepFailure::SecretResolutionFailed(e.to_string()));
            }
        };

        let request = ExecRequest {
            pipeline: pipeline.name.clone(),
            step: step.name.clone(),
            image: step.image.clone(),
            commands: step.commands.clone(),
            env,
            workspace: workspace.to_path_buf(),
        };

        debug!(step = %step.name, image = %step.image, "Executing step");
        let result = self.runtime.execute(&request).await;
        drop(request);

        match result {
            Ok(0) => {
                info!(step = %step.name, "Step succeeded");
                finish(StepStatus::Succeeded, None)
            }
            Ok(code) => {
                warn!(step = %step.name, exit_code = code, policy = ?step.failure, "Step failed");
                failed(StepFailure::ExitCode(code))
            }
            Err(e) => {
                error!(step = %step.name, error = %e, "Container runtime failed");
                failed(StepFailure::Runtime(e.to_string()))
            }
        }
    }

    /// Assemble the environment for one step. Later layers override earlier
    /// ones: built-in `CI_*` values, pipeline environment, step environment,
    /// then plugin settings.
    async fn step_environment(
        &self,
        run: &PipelineRun,
        pipeline: &PipelineDefinition,
        step: &StepDefinition,
    ) -> Result<StepEnvironment> {
        let mut env = StepEnvironment::new();
        for (key, value) in ci_variables(run, step) {
            env.set(key, value);
        }

        for (key, value) in sorted(&pipeline.environment) {
            self.secrets.apply(&mut env, key.as_str(), value).await?;
        }
        for (key, value) in sorted(&step.environment) {
            self.secrets.apply(&mut env, key.as_str(), value).await?;
        }
        for (key, value) in sorted(&step.settings) {
            self.secrets
                .apply(&mut env, format!("PLUGIN_{}", key.to_uppercase()), value)
                .await?;
        }

        Ok(env)
    }
}

fn sorted(vars: &std::collections::HashMap<String, EnvValue>) -> Vec<(&String, &EnvValue)> {
    let mut entries: Vec<_> = vars.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn ci_variables(run: &PipelineRun, step: &StepDefinition) -> Vec<(&'static str, String)> {
    let event: &Event = &run.event;
    let mut vars = vec![
        ("CI", "true".to_string()),
        ("CI_BUILD_NUMBER", event.build_number.to_string()),
        ("CI_BUILD_EVENT", event.kind.to_string()),
        ("CI_BUILD_STATUS", run.current_status().as_build_status().as_str().to_string()),
        ("CI_PIPELINE_NAME", run.definition.name.clone()),
        ("CI_STEP_NAME", step.name.clone()),
        ("CI_RUN_ID", run.id.to_string()),
    ];
    let optional = [
        ("CI_COMMIT_BRANCH", &event.branch),
        ("CI_COMMIT_REF", &event.git_ref),
        ("CI_COMMIT_SHA", &event.commit),
        ("CI_COMMIT_AUTHOR", &event.author),
        ("CI_REMOTE_URL", &event.remote_url),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            vars.push((key, value.clone()));
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use drover_core::event::{Dimension, EventKind};
    use drover_core::pipeline::{Constraint, TriggerPredicate};
    use drover_core::run::RunPhase;
    use drover_core::Error;
    use drover_secrets::FileProvider;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Runtime double returning scripted exit codes per step name and
    /// recording every request it sees.
    #[derive(Default)]
    struct ScriptedRuntime {
        exit_codes: HashMap<String, i32>,
        broken: Vec<String>,
        seen: Mutex<Vec<(String, Vec<String>)>>,
        workspaces: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedRuntime {
        fn exit(mut self, step: &str, code: i32) -> Self {
            self.exit_codes.insert(step.to_string(), code);
            self
        }

        fn broken(mut self, step: &str) -> Self {
            self.broken.push(step.to_string());
            self
        }

        fn executed(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
        }

        fn env_of(&self, step: &str) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .find(|(s, _)| s == step)
                .map(|(_, env)| env.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ContainerRuntime for ScriptedRuntime {
        async fn execute(&self, request: &ExecRequest) -> Result<i32> {
            self.seen
                .lock()
                .unwrap()
                .push((request.step.clone(), request.env.to_pairs()));
            assert!(request.workspace.is_dir());
            self.workspaces.lock().unwrap().push(request.workspace.clone());
            if self.broken.contains(&request.step) {
                return Err(Error::Runtime("image pull failed".to_string()));
            }
            Ok(self.exit_codes.get(&request.step).copied().unwrap_or(0))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn runner(runtime: Arc<ScriptedRuntime>, secrets: SecretResolver) -> (StepRunner, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            workspace_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        (StepRunner::new(runtime, secrets, config), dir)
    }

    fn secrets(pairs: &[(&str, &str)]) -> SecretResolver {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SecretResolver::new().with_provider(Arc::new(FileProvider::from_map(map)))
    }

    fn step(name: &str) -> StepDefinition {
        StepDefinition::new(name, "alpine").with_command(format!("echo {}", name))
    }

    fn event() -> Event {
        Event::push("main")
            .with_commit("abc123")
            .with_build_number(7)
            .with_remote_url("https://git.example.com/app.git")
    }

    fn run_of(pipeline: PipelineDefinition) -> PipelineRun {
        PipelineRun::new(Arc::new(pipeline), event())
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let (runner, _dir) = runner(runtime.clone(), SecretResolver::new());
        let pipeline = PipelineDefinition::new("main")
            .with_step(step("build"))
            .with_step(step("test"));

        let mut run = run_of(pipeline);
        let status = runner.run(&mut run).await;

        assert_eq!(status, PipelineStatus::Succeeded);
        assert_eq!(run.phase, RunPhase::Succeeded);
        assert_eq!(runtime.executed(), vec!["clone", "build", "test"]);
        assert!(run.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_fast_halts_remaining_steps() {
        let runtime = Arc::new(ScriptedRuntime::default().exit("test", 1));
        let (runner, _dir) = runner(runtime.clone(), SecretResolver::new());
        let pipeline = PipelineDefinition::new("main")
            .without_clone()
            .with_step(step("build"))
            .with_step(step("test"))
            .with_step(step("deploy"));

        let mut run = run_of(pipeline);
        let status = runner.run(&mut run).await;

        assert_eq!(status, PipelineStatus::Failed);
        assert_eq!(runtime.executed(), vec!["build", "test"]);
        assert_eq!(
            run.step("test").unwrap().failure,
            Some(StepFailure::ExitCode(1))
        );
        assert!(run.step("deploy").is_none());
    }

    #[tokio::test]
    async fn test_ignored_failure_continues() {
        let runtime = Arc::new(ScriptedRuntime::default().exit("lint", 2));
        let (runner, _dir) = runner(runtime.clone(), SecretResolver::new());
        let pipeline = PipelineDefinition::new("main")
            .without_clone()
            .with_step(step("lint").with_failure(FailurePolicy::Ignore))
            .with_step(step("test"));

        let mut run = run_of(pipeline);
        let status = runner.run(&mut run).await;

        assert_eq!(status, PipelineStatus::Succeeded);
        assert_eq!(runtime.executed(), vec!["lint", "test"]);
        assert_eq!(
            run.step("lint").unwrap().status,
            StepStatus::Failed { ignored: true }
        );
    }

    #[tokio::test]
    async fn test_secret_resolution_failure_never_executes_step() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let (runner, _dir) = runner(runtime.clone(), secrets(&[]));
        let pipeline = PipelineDefinition::new("main")
            .without_clone()
            .with_step(step("build"))
            .with_step(step("notify").with_secret_env("SLACK_WEBHOOK", "slack_webhook"))
            .with_step(step("after"));

        let mut run = run_of(pipeline);
        let status = runner.run(&mut run).await;

        assert_eq!(status, PipelineStatus::Failed);
        assert_eq!(runtime.executed(), vec!["build"]);
        let notify = run.step("notify").unwrap();
        assert_eq!(notify.status, StepStatus::Failed { ignored: false });
        assert!(matches!(
            notify.failure,
            Some(StepFailure::SecretResolutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_secret_failure_respects_ignore_policy() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let (runner, _dir) = runner(runtime.clone(), secrets(&[]));
        let pipeline = PipelineDefinition::new("main")
            .without_clone()
            .with_step(
                step("notify")
                    .with_secret_env("SLACK_WEBHOOK", "slack_webhook")
                    .with_failure(FailurePolicy::Ignore),
            )
            .with_step(step("after"));

        let mut run = run_of(pipeline);
        assert_eq!(runner.run(&mut run).await, PipelineStatus::Succeeded);
        assert_eq!(runtime.executed(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_secrets_are_marked_in_step_environment() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let (runner, _dir) = runner(runtime.clone(), secrets(&[("docker_password", "pa55")]));
        let mut publish = step("publish").with_env("REPO", "acme/app");
        publish.settings.insert(
            "password".to_string(),
            EnvValue::Secret {
                from_secret: "docker_password".to_string(),
            },
        );
        let pipeline = PipelineDefinition::new("main")
            .without_clone()
            .with_step(publish);

        let mut run = run_of(pipeline);
        runner.run(&mut run).await;

        let env = runtime.env_of("publish");
        assert!(env.contains(&"PLUGIN_PASSWORD=pa55".to_string()));
        assert!(env.contains(&"REPO=acme/app".to_string()));
        assert!(env.contains(&"CI_BUILD_NUMBER=7".to_string()));
        assert!(env.contains(&"CI_COMMIT_BRANCH=main".to_string()));
        assert!(env.contains(&"CI=true".to_string()));
        assert!(!env.iter().any(|var| var.starts_with("DRONE")));
    }

    #[tokio::test]
    async fn test_when_gate_skips_and_sees_failure() {
        let runtime = Arc::new(ScriptedRuntime::default().exit("test", 1));
        let (runner, _dir) = runner(runtime.clone(), SecretResolver::new());
        let on_failure = TriggerPredicate::default()
            .with(Dimension::Status, Constraint::include(["failure"]).unwrap());
        let on_tag = TriggerPredicate::default()
            .with(Dimension::Event, Constraint::include(["tag"]).unwrap());

        let pipeline = PipelineDefinition::new("main")
            .without_clone()
            .with_step(step("publish").with_when(on_tag))
            .with_step(step("test").with_failure(FailurePolicy::Ignore))
            .with_step(step("report").with_when(on_failure));

        let mut run = run_of(pipeline);
        let status = runner.run(&mut run).await;

        // Ignored failures do not flip the running status.
        assert_eq!(status, PipelineStatus::Succeeded);
        assert_eq!(run.step("publish").unwrap().status, StepStatus::Skipped);
        assert_eq!(run.step("report").unwrap().status, StepStatus::Skipped);
        assert_eq!(runtime.executed(), vec!["test"]);
    }

    #[tokio::test]
    async fn test_runtime_error_is_step_failure() {
        let runtime = Arc::new(ScriptedRuntime::default().broken("build"));
        let (runner, _dir) = runner(runtime.clone(), SecretResolver::new());
        let pipeline = PipelineDefinition::new("main")
            .without_clone()
            .with_step(step("build"))
            .with_step(step("test"));

        let mut run = run_of(pipeline);
        assert_eq!(runner.run(&mut run).await, PipelineStatus::Failed);
        assert!(matches!(
            run.step("build").unwrap().failure,
            Some(StepFailure::Runtime(_))
        ));
        assert_eq!(runtime.executed(), vec!["build"]);
    }

    #[tokio::test]
    async fn test_clone_without_remote_fails() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let (runner, _dir) = runner(runtime.clone(), SecretResolver::new());
        let pipeline = PipelineDefinition::new("main").with_step(step("build"));

        let mut run = PipelineRun::new(Arc::new(pipeline), Event::new(EventKind::Push));
        assert_eq!(runner.run(&mut run).await, PipelineStatus::Failed);
        assert!(runtime.executed().is_empty());
        assert_eq!(run.steps[0].name, CLONE_STEP);
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let (runner, _dir) = runner(runtime.clone(), SecretResolver::new());

        let mut run = run_of(PipelineDefinition::new("noop").without_clone());
        assert_eq!(runner.run(&mut run).await, PipelineStatus::Succeeded);
        assert!(run.steps.is_empty());
    }

    #[tokio::test]
    async fn test_reruns_of_a_build_get_fresh_workspaces() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let (runner, dir) = runner(runtime.clone(), SecretResolver::new());
        let pipeline = Arc::new(PipelineDefinition::new("main").with_step(step("build")));

        for _ in 0..2 {
            let mut run = PipelineRun::new(Arc::clone(&pipeline), event());
            assert_eq!(runner.run(&mut run).await, PipelineStatus::Succeeded);
        }

        let workspaces = runtime.workspaces.lock().unwrap().clone();
        assert_eq!(workspaces.len(), 4);
        assert_eq!(workspaces[0], workspaces[1]);
        assert_ne!(workspaces[0], workspaces[2]);
        assert!(workspaces.iter().all(|w| !w.exists()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(["-c", "user.name=drover", "-c", "user.email=drover@example.com"])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?}", args);
    }

    #[tokio::test]
    async fn test_clone_script_can_run_twice_in_one_directory() {
        let origin = tempfile::tempdir().unwrap();
        git(origin.path(), &["init", "-q"]);
        git(origin.path(), &["commit", "-q", "--allow-empty", "-m", "init"]);
        git(origin.path(), &["branch", "-M", "main"]);

        let remote = origin.path().display().to_string();
        let (runner, _dir) = runner(Arc::new(ScriptedRuntime::default()), SecretResolver::new());
        let clone = runner.clone_step(&PipelineDefinition::new("main"));
        let checkout = tempfile::tempdir().unwrap();
        let shell = crate::shell::ShellRuntime::default();

        for _ in 0..2 {
            let mut env = StepEnvironment::new();
            env.set("CI_REMOTE_URL", remote.clone());
            env.set("CI_COMMIT_REF", "refs/heads/main");
            let request = ExecRequest {
                pipeline: "main".to_string(),
                step: CLONE_STEP.to_string(),
                image: clone.image.clone(),
                commands: clone.commands.clone(),
                env,
                workspace: checkout.path().to_path_buf(),
            };
            assert_eq!(shell.execute(&request).await.unwrap(), 0);
        }
        assert!(checkout.path().join(".git").is_dir());
    }

    #[tokio::test]
    async fn test_same_build_runs_twice_on_host_shell() {
        let origin = tempfile::tempdir().unwrap();
        git(origin.path(), &["init", "-q"]);
        git(origin.path(), &["commit", "-q", "--allow-empty", "-m", "init"]);
        git(origin.path(), &["branch", "-M", "main"]);

        let root = tempfile::tempdir().unwrap();
        let runner = StepRunner::new(
            Arc::new(crate::shell::ShellRuntime::default()),
            SecretResolver::new(),
            RunnerConfig {
                workspace_root: root.path().to_path_buf(),
                ..Default::default()
            },
        );
        let pipeline = Arc::new(
            PipelineDefinition::new("main")
                .with_step(StepDefinition::new("check", "alpine").with_command("test -d .git")),
        );
        let event = Event::push("main")
            .with_build_number(5)
            .with_remote_url(origin.path().display().to_string());

        for _ in 0..2 {
            let mut run = PipelineRun::new(Arc::clone(&pipeline), event.clone());
            assert_eq!(runner.run(&mut run).await, PipelineStatus::Succeeded);
        }
    }

    #[test]
    fn test_runtime_config_has_no_default_timeout() {
        assert_eq!(RuntimeConfig::default().timeout_seconds, None);
        let parsed: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.timeout_seconds, None);
        assert!(parsed.pull_images);
    }

    #[test]
    fn test_shell_script_quotes_echo() {
        let script = shell_script(&["echo 'hi'".to_string(), "make test".to_string()]);
        assert_eq!(
            script,
            "set -e\necho '+ echo '\\''hi'\\'''\necho 'hi'\necho '+ make test'\nmake test\n"
        );
    }
}
