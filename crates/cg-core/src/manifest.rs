//! Load compiled jobs from a dbt `manifest.json`.
//!
//! Every `model` node becomes a [`CompiledJob`]. Compiled SQL is taken from
//! the manifest (`compiled_code`, or `compiled_sql` for older manifests) and
//! falls back to the file under `target/compiled/` when the manifest does not
//! inline it. Ephemeral models are never executed on their own and are left out.

use crate::error::{CoreError, CoreResult};
use crate::job::{CompiledJob, JobOverrides, Materialization};
use crate::job_name::JobName;
use crate::pattern::GlobPattern;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    nodes: BTreeMap<String, RawNode>,
    #[serde(default)]
    sources: BTreeMap<String, RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    resource_type: String,
    name: String,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    original_file_path: Option<String>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    compiled_code: Option<String>,
    #[serde(default)]
    compiled_sql: Option<String>,
    #[serde(default)]
    config: RawConfig,
    #[serde(default)]
    meta: RawMeta,
    #[serde(default)]
    depends_on: RawDependsOn,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    materialized: Option<String>,
    #[serde(default)]
    meta: RawMeta,
}

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    #[serde(default)]
    cost_guard_skip: Option<bool>,
    #[serde(default)]
    cost_guard_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDependsOn {
    #[serde(default)]
    nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: String,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    identifier: Option<String>,
}

fn qualify(database: Option<&str>, schema: Option<&str>, relation: &str) -> String {
    [database, schema, Some(relation)]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

impl RawNode {
    fn materialization(&self) -> Materialization {
        self.config
            .materialized
            .as_deref()
            .map(Materialization::from_dbt)
            .unwrap_or_default()
    }

    /// Config-level meta wins over node-level meta, matching dbt's merge order.
    fn overrides(&self) -> JobOverrides {
        JobOverrides {
            threshold: self
                .config
                .meta
                .cost_guard_threshold
                .or(self.meta.cost_guard_threshold),
            skip: self
                .config
                .meta
                .cost_guard_skip
                .or(self.meta.cost_guard_skip)
                .unwrap_or(false),
        }
    }

    fn relation(&self) -> String {
        qualify(
            self.database.as_deref(),
            self.schema.as_deref(),
            self.alias.as_deref().unwrap_or(&self.name),
        )
    }

    fn compiled_sql(&self, target_dir: &Path) -> CoreResult<String> {
        if let Some(sql) = self.compiled_code.as_ref().or(self.compiled_sql.as_ref()) {
            return Ok(sql.clone());
        }

        let (Some(package), Some(file)) = (&self.package_name, &self.original_file_path) else {
            log::warn!("Model '{}' has no compiled SQL in the manifest", self.name);
            return Ok(String::new());
        };

        let path = target_dir.join("compiled").join(package).join(file);
        if !path.exists() {
            log::warn!(
                "Model '{}' has no compiled SQL (looked in {})",
                self.name,
                path.display()
            );
            return Ok(String::new());
        }
        std::fs::read_to_string(&path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Load every non-ephemeral model in a manifest as a compiled job, sorted by name.
pub fn load_manifest_jobs(path: &Path) -> CoreResult<Vec<CompiledJob>> {
    if !path.exists() {
        return Err(CoreError::ManifestNotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;
    let target_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_manifest_jobs(&content, target_dir).map_err(|e| match e {
        CoreError::Json(err) => CoreError::ManifestInvalid {
            path: path.display().to_string(),
            message: err.to_string(),
        },
        other => other,
    })
}

/// Parse manifest JSON. `target_dir` is where `compiled/` files are looked up.
pub fn parse_manifest_jobs(content: &str, target_dir: &Path) -> CoreResult<Vec<CompiledJob>> {
    let manifest: RawManifest = serde_json::from_str(content)?;

    let mut jobs = Vec::new();
    for (unique_id, node) in &manifest.nodes {
        if node.resource_type != "model" {
            continue;
        }
        let materialization = node.materialization();
        if materialization.is_ephemeral() {
            log::debug!("Skipping ephemeral model {}", unique_id);
            continue;
        }
        let Some(name) = JobName::try_new(node.name.clone()) else {
            return Err(CoreError::ManifestInvalid {
                path: target_dir.display().to_string(),
                message: format!("node '{}' has an empty name", unique_id),
            });
        };

        let referenced_tables = node
            .depends_on
            .nodes
            .iter()
            .filter_map(|dep| resolve_dependency(&manifest, dep))
            .collect();

        jobs.push(CompiledJob {
            name,
            materialization,
            sql: node.compiled_sql(target_dir)?,
            referenced_tables,
            overrides: node.overrides(),
            database: node.database.clone(),
            schema: node.schema.clone(),
            alias: node.alias.clone(),
        });
    }

    jobs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(jobs)
}

/// Resolve a `depends_on` node id to a qualified relation name.
///
/// Ephemeral upstream models have no relation and resolve to `None`.
fn resolve_dependency(manifest: &RawManifest, id: &str) -> Option<String> {
    if let Some(source) = manifest.sources.get(id) {
        return Some(qualify(
            source.database.as_deref(),
            source.schema.as_deref(),
            source.identifier.as_deref().unwrap_or(&source.name),
        ));
    }
    let node = manifest.nodes.get(id)?;
    if node.materialization().is_ephemeral() {
        return None;
    }
    Some(node.relation())
}

/// Keep jobs matching any `select` pattern (all when empty) and no `exclude` pattern.
pub fn select_jobs(
    jobs: Vec<CompiledJob>,
    select: &[GlobPattern],
    exclude: &[GlobPattern],
) -> Vec<CompiledJob> {
    jobs.into_iter()
        .filter(|job| select.is_empty() || select.iter().any(|p| p.matches(&job.name)))
        .filter(|job| !exclude.iter().any(|p| p.matches(&job.name)))
        .collect()
}

#[cfg(test)]
#[path = "manifest_test.rs"]
mod tests;
