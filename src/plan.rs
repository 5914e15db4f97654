use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_ORDER: Lazy<Vec<StepSpec>> = Lazy::new(|| {
    [
        // cleaned Bronze notebook first, original as fallback
        "Camada_Bronze_clean.ipynb|Camada_Bronze.ipynb",
        "mascaramento.ipynb",
        "players_silver.ipynb",
        "teams_silver.ipynb",
        "matches_silver.ipynb",
        "players_gold.ipynb",
        "teams_gold.ipynb",
        "matches_gold.ipynb",
    ]
    .into_iter()
    .map(StepSpec::parse)
    .collect()
});

/// Ordered fallback chain for one pipeline position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StepSpecRepr", into = "String")]
pub struct StepSpec {
    candidates: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepSpecRepr {
    Chain(String),
    List(Vec<String>),
}

impl From<StepSpecRepr> for StepSpec {
    fn from(repr: StepSpecRepr) -> Self {
        match repr {
            StepSpecRepr::Chain(text) => StepSpec::parse(&text),
            StepSpecRepr::List(items) => StepSpec::new(items),
        }
    }
}

impl From<StepSpec> for String {
    fn from(spec: StepSpec) -> Self {
        spec.to_string()
    }
}

impl StepSpec {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates
                .into_iter()
                .map(|c| c.into().trim().to_string())
                .collect(),
        }
    }

    /// Parses the `A|B|C` notation.
    pub fn parse(text: &str) -> Self {
        Self::new(text.split('|'))
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

impl fmt::Display for StepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.candidates.join("|"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Plan {
    pub version: u32,
    pub steps: Vec<StepSpec>,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            version: 1,
            steps: DEFAULT_ORDER.clone(),
        }
    }
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;
        let plan: Plan = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse plan YAML: {}", path.display()))?;
        Ok(plan)
    }
}
