use std::fmt;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::StorageError;
use crate::storage::ObjectStore;

pub const DEFAULT_NAMESPACE: &str = "orchestration";
pub const SUCCESS_BODY: &str = r#"{"ok": true}"#;
pub const NOTEBOOK_CONTENT_TYPE: &str = "application/x-ipynb+json";
const RUN_ID_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// `"auto"` derives the id from the current UTC time; anything else is
    /// taken literally.
    pub fn from_arg(arg: &str) -> Result<Self> {
        if arg == "auto" {
            Ok(Self::at(Utc::now()))
        } else {
            Self::literal(arg)
        }
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant.format(RUN_ID_FORMAT).to_string())
    }

    pub fn literal(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            bail!("Run id cannot be empty");
        }
        if value.contains('/') || value == "." || value == ".." {
            bail!("Run id '{value}' cannot be used as a storage path segment");
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage prefixes for one run, fully determined by the run id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: RunId,
    pub runs_prefix: String,
    pub logs_prefix: String,
}

impl RunContext {
    /// Rejects namespaces that would not yield relative object keys, so a bad
    /// namespace fails before any step executes.
    pub fn new(namespace: &str, run_id: RunId) -> Result<Self> {
        let namespace = namespace.trim_matches('/');
        if namespace.is_empty() {
            bail!("Storage namespace cannot be empty");
        }
        if namespace
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            bail!("Storage namespace '{namespace}' must be a plain relative path");
        }
        Ok(Self {
            runs_prefix: format!("{namespace}/runs/{run_id}"),
            logs_prefix: format!("{namespace}/logs/{run_id}"),
            run_id,
        })
    }

    pub fn success_key(&self, step: &str) -> String {
        format!("{}/{step}_SUCCESS.json", self.runs_prefix)
    }

    pub fn failure_key(&self, step: &str) -> String {
        format!("{}/{step}_FAILED.json", self.runs_prefix)
    }

    pub fn artifact_name(&self, step: &str) -> String {
        format!("_out_{step}_{}.ipynb", self.run_id)
    }

    pub fn log_key(&self, step: &str) -> String {
        format!("{}/{}", self.logs_prefix, self.artifact_name(step))
    }
}

pub struct RunTracker<'a> {
    ctx: RunContext,
    store: &'a dyn ObjectStore,
}

impl<'a> RunTracker<'a> {
    pub fn new(ctx: RunContext, store: &'a dyn ObjectStore) -> Self {
        Self { ctx, store }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Uploads the executed notebook, then the success marker.
    pub fn record_success(&self, step: &str, artifact: &[u8]) -> Result<(), StorageError> {
        let log_key = self.ctx.log_key(step);
        self.store.put(&log_key, artifact, NOTEBOOK_CONTENT_TYPE)?;
        let marker = self.ctx.success_key(step);
        self.store
            .put_text(&marker, SUCCESS_BODY, "application/json")?;
        info!(step, marker = marker.as_str(), log = log_key.as_str(), "Success recorded");
        Ok(())
    }

    /// Persists the full diagnostic as the failure marker body.
    pub fn record_failure(&self, step: &str, diagnostic: &str) -> Result<(), StorageError> {
        let marker = self.ctx.failure_key(step);
        self.store.put_text(&marker, diagnostic, "text/plain")?;
        info!(step, marker = marker.as_str(), "Failure recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn auto_ids_have_second_resolution() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).unwrap();
        assert_eq!(RunId::at(a).as_str(), "20240501-120000");
        assert_ne!(RunId::at(a), RunId::at(b));
    }

    #[test]
    fn literal_ids_are_validated() {
        assert!(RunId::literal("").is_err());
        assert!(RunId::literal("a/b").is_err());
        assert_eq!(RunId::literal("nightly").unwrap().as_str(), "nightly");
    }

    #[test]
    fn paths_follow_layout() {
        let ctx = RunContext::new("orchestration/", RunId::literal("r1").unwrap()).unwrap();
        assert_eq!(ctx.success_key("teams_gold"), "orchestration/runs/r1/teams_gold_SUCCESS.json");
        assert_eq!(ctx.failure_key("teams_gold"), "orchestration/runs/r1/teams_gold_FAILED.json");
        assert_eq!(ctx.log_key("teams_gold"), "orchestration/logs/r1/_out_teams_gold_r1.ipynb");
    }

    #[test]
    fn namespace_must_be_relative() {
        let id = RunId::literal("r1").unwrap();
        for bad in ["", "/", "//", "a/../b", "./a", "a//b"] {
            assert!(RunContext::new(bad, id.clone()).is_err(), "accepted {bad:?}");
        }
        let nested = RunContext::new("team/orchestration", id).unwrap();
        assert_eq!(nested.runs_prefix, "team/orchestration/runs/r1");
    }
}
