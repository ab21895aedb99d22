//! Pipeline definition types.
//!
//! These types represent the user-authored pipeline YAML documents. They are
//! built once at load time and never mutated afterwards.

use crate::event::Dimension;
use crate::pattern::Pattern;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Name of the checkout step the runner adds unless cloning is disabled.
pub const CLONE_STEP: &str = "clone";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub clone: CloneConfig,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub trigger: TriggerPredicate,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub environment: HashMap<String, EnvValue>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clone: CloneConfig::default(),
            steps: vec![],
            trigger: TriggerPredicate::default(),
            depends_on: vec![],
            environment: HashMap::new(),
        }
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerPredicate) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn without_clone(mut self) -> Self {
        self.clone.disable = true;
        self
    }

    /// Whether the implicit source checkout is skipped.
    pub fn clone_disabled(&self) -> bool {
        self.clone.disable
    }

    /// Structural checks that do not need the rest of the definition set.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("pipeline name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "pipeline {}: step name must not be empty",
                    self.name
                )));
            }
            if step.image.trim().is_empty() {
                return Err(Error::Config(format!(
                    "pipeline {}: step {} has no image",
                    self.name, step.name
                )));
            }
            if !self.clone_disabled() && step.name == CLONE_STEP {
                return Err(Error::Config(format!(
                    "pipeline {}: step name '{}' is reserved unless clone is disabled",
                    self.name, CLONE_STEP
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(Error::Config(format!(
                    "pipeline {}: duplicate step {}",
                    self.name, step.name
                )));
            }
            for (key, value) in step.environment.iter().chain(step.settings.iter()) {
                value.render_literal().map_err(|e| {
                    Error::Config(format!(
                        "pipeline {}: step {}: value of {}: {}",
                        self.name, step.name, key, e
                    ))
                })?;
            }
        }

        for (key, value) in &self.environment {
            value.render_literal().map_err(|e| {
                Error::Config(format!("pipeline {}: value of {}: {}", self.name, key, e))
            })?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneConfig {
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub environment: HashMap<String, EnvValue>,
    #[serde(default)]
    pub settings: HashMap<String, EnvValue>,
    #[serde(default)]
    pub when: Option<TriggerPredicate>,
    #[serde(default)]
    pub failure: FailurePolicy,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            commands: vec![],
            environment: HashMap::new(),
            settings: HashMap::new(),
            when: None,
            failure: FailurePolicy::FailFast,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), EnvValue::literal(value));
        self
    }

    pub fn with_secret_env(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.environment.insert(
            key.into(),
            EnvValue::Secret {
                from_secret: secret.into(),
            },
        );
        self
    }

    pub fn with_when(mut self, when: TriggerPredicate) -> Self {
        self.when = Some(when);
        self
    }

    pub fn with_failure(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }

    /// Names of every secret this step references, settings included.
    pub fn secret_names(&self) -> impl Iterator<Item = &str> {
        self.environment
            .values()
            .chain(self.settings.values())
            .filter_map(|v| v.secret_name())
    }
}

/// What happens to the run when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    Ignore,
}

/// An environment or settings value: a literal, or a secret reference
/// resolved right before the step executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Secret { from_secret: String },
    Literal(serde_yaml::Value),
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal(serde_yaml::Value::String(value.into()))
    }

    pub fn secret_name(&self) -> Option<&str> {
        match self {
            EnvValue::Secret { from_secret } => Some(from_secret),
            EnvValue::Literal(_) => None,
        }
    }

    /// Render a literal the way it is exported to the container.
    ///
    /// Sequences are comma-joined and mappings become JSON. Returns `None`
    /// for secret references, and an error for a mapping JSON cannot hold.
    pub fn render_literal(&self) -> Result<Option<String>> {
        match self {
            EnvValue::Secret { .. } => Ok(None),
            EnvValue::Literal(value) => render_yaml(value).map(Some),
        }
    }
}

fn render_yaml(value: &serde_yaml::Value) -> Result<String> {
    use serde_yaml::Value;

    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items
            .iter()
            .map(render_yaml)
            .collect::<Result<Vec<_>>>()?
            .join(","),
        Value::Mapping(_) => serde_json::to_string(value)?,
        Value::Tagged(tagged) => render_yaml(&tagged.value)?,
    })
}

/// Admission rule for a pipeline (or the `when` gate of a step).
///
/// Each category is optional; an absent or empty one always passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Constraint>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Constraint>,
}

impl TriggerPredicate {
    pub fn with(mut self, dimension: Dimension, constraint: Constraint) -> Self {
        *self.slot_mut(dimension) = Some(constraint);
        self
    }

    pub fn constraint(&self, dimension: Dimension) -> Option<&Constraint> {
        match dimension {
            Dimension::Branch => self.branch.as_ref(),
            Dimension::Ref => self.git_ref.as_ref(),
            Dimension::Event => self.event.as_ref(),
            Dimension::Status => self.status.as_ref(),
        }
    }

    fn slot_mut(&mut self, dimension: Dimension) -> &mut Option<Constraint> {
        match dimension {
            Dimension::Branch => &mut self.branch,
            Dimension::Ref => &mut self.git_ref,
            Dimension::Event => &mut self.event,
            Dimension::Status => &mut self.status,
        }
    }

    /// Whether the predicate looks at dependency outcomes.
    pub fn references_status(&self) -> bool {
        self.status.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// One predicate category: an inclusion list or an exclusion list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConstraintRepr", into = "ConstraintRepr")]
pub enum Constraint {
    Include(Vec<Pattern>),
    Exclude(Vec<Pattern>),
}

impl Constraint {
    pub fn include<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Constraint::Include(parse_all(patterns)?))
    }

    pub fn exclude<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Constraint::Exclude(parse_all(patterns)?))
    }

    pub fn patterns(&self) -> &[Pattern] {
        match self {
            Constraint::Include(p) | Constraint::Exclude(p) => p,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns().is_empty()
    }
}

fn parse_all<I, S>(patterns: I) -> Result<Vec<Pattern>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| Pattern::parse(p.as_ref()))
        .collect()
}

/// YAML shapes accepted for a category: `main`, `[main, dev]`,
/// `{include: [...]}` or `{exclude: [...]}`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ConstraintRepr {
    One(String),
    Many(Vec<String>),
    Filter(ConstraintFilter),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConstraintFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude: Option<Vec<String>>,
}

impl TryFrom<ConstraintRepr> for Constraint {
    type Error = Error;

    fn try_from(repr: ConstraintRepr) -> Result<Self> {
        match repr {
            ConstraintRepr::One(pattern) => Constraint::include([pattern]),
            ConstraintRepr::Many(patterns) => Constraint::include(patterns),
            ConstraintRepr::Filter(filter) => match (filter.include, filter.exclude) {
                (Some(_), Some(_)) => Err(Error::Config(
                    "a condition cannot combine include and exclude".to_string(),
                )),
                (None, Some(patterns)) => Constraint::exclude(patterns),
                (Some(patterns), None) => Constraint::include(patterns),
                (None, None) => Ok(Constraint::Include(vec![])),
            },
        }
    }
}

impl From<Constraint> for ConstraintRepr {
    fn from(constraint: Constraint) -> Self {
        let texts = |patterns: Vec<Pattern>| -> Vec<String> {
            patterns.into_iter().map(String::from).collect()
        };
        match constraint {
            Constraint::Include(patterns) => ConstraintRepr::Many(texts(patterns)),
            Constraint::Exclude(patterns) => ConstraintRepr::Filter(ConstraintFilter {
                include: None,
                exclude: Some(texts(patterns)),
            }),
        }
    }
}
