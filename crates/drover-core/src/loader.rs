//! Loading pipeline definitions from multi-document YAML.
//!
//! Every document with `kind: pipeline` (or no `kind` at all) becomes one
//! [`PipelineDefinition`]. Other kinds, such as `secret` or `signature`
//! documents, are skipped.

use crate::pipeline::PipelineDefinition;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

const PIPELINE_KIND: &str = "pipeline";

/// Parse every pipeline document in `content`.
pub fn load_str(content: &str) -> Result<Vec<PipelineDefinition>> {
    let mut definitions = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let position = index + 1;
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| Error::Config(format!("document {}: {}", position, e)))?;

        if value.is_null() {
            continue;
        }

        match value.get("kind").and_then(|k| k.as_str()) {
            Some(kind) if kind != PIPELINE_KIND => {
                debug!(document = position, kind, "Skipping non-pipeline document");
                continue;
            }
            _ => {}
        }

        let definition: PipelineDefinition = serde_yaml::from_value(value)
            .map_err(|e| Error::Config(format!("document {}: {}", position, e)))?;
        definition.validate()?;

        debug!(
            pipeline = %definition.name,
            steps = definition.steps.len(),
            depends_on = ?definition.depends_on,
            "Loaded pipeline definition"
        );
        definitions.push(definition);
    }

    if definitions.is_empty() {
        return Err(Error::Config("no pipeline documents found".to_string()));
    }

    Ok(definitions)
}

/// Read and parse a definition file.
pub fn load_file(path: &Path) -> Result<Vec<PipelineDefinition>> {
    let content = std::fs::read_to_string(path)?;
    load_str(&content).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}
