use std::fmt;

use anyhow::{Result, bail};
use serde_json::{Value, json};

/// Version tag stored next to the typed parameter triples.
pub const ENCODING_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::String(_) => "string",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
        }
    }

    /// Python literal form. Strings go through JSON escaping, which Python
    /// parses back to the same value.
    pub fn to_literal(&self) -> String {
        match self {
            ParamValue::String(s) => Value::String(s.clone()).to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => format!("{f:?}"),
            ParamValue::Bool(true) => "True".to_string(),
            ParamValue::Bool(false) => "False".to_string(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ParamValue::String(s) => json!(s),
            ParamValue::Int(i) => json!(i),
            ParamValue::Float(f) => json!(f),
            ParamValue::Bool(b) => json!(b),
        }
    }

    fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            ParamValue::String(s) => serde_yaml::Value::String(s.clone()),
            ParamValue::Int(i) => serde_yaml::Value::Number((*i).into()),
            ParamValue::Float(f) => serde_yaml::Value::Number((*f).into()),
            ParamValue::Bool(b) => serde_yaml::Value::Bool(*b),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Parameters shared by every step of a run. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new(entries: Vec<(String, ParamValue)>) -> Result<Self> {
        for (idx, (key, value)) in entries.iter().enumerate() {
            if !is_identifier(key) {
                bail!("Parameter name '{key}' is not a valid identifier");
            }
            if entries[..idx].iter().any(|(prev, _)| prev == key) {
                bail!("Parameter '{key}' is defined more than once");
            }
            if let ParamValue::Float(f) = value
                && !f.is_finite()
            {
                bail!("Parameter '{key}' has a non-finite value: {f}");
            }
        }
        Ok(Self { entries })
    }

    /// Standard parameters handed to every Bronze/Silver/Gold notebook.
    pub fn for_run(project: &str, region: &str, bucket: &str, run_id: &str) -> Result<Self> {
        let bucket = bucket.trim_end_matches('/');
        Self::new(vec![
            ("PROJECT_ID".into(), project.into()),
            ("REGION".into(), region.into()),
            ("BRONZE_PATH".into(), format!("gs://{bucket}/bronze/").into()),
            ("SILVER_PATH".into(), format!("gs://{bucket}/silver/").into()),
            ("GOLD_PATH".into(), format!("gs://{bucket}/gold/").into()),
            ("RUN_TS".into(), run_id.into()),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// `NAME = literal` lines in insertion order, newline terminated.
    pub fn render_assignments(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(&value.to_literal());
            out.push('\n');
        }
        out
    }

    /// Explicit `{key, type, value}` triples.
    pub fn typed_encoding(&self) -> Value {
        let triples: Vec<Value> = self
            .entries
            .iter()
            .map(|(key, value)| {
                json!({
                    "key": key,
                    "type": value.type_name(),
                    "value": value.to_json(),
                })
            })
            .collect();
        json!({
            "encoding": ENCODING_VERSION,
            "parameters": triples,
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        let mut mapping = serde_yaml::Mapping::new();
        for (key, value) in &self.entries {
            mapping.insert(serde_yaml::Value::String(key.clone()), value.to_yaml());
        }
        Ok(serde_yaml::to_string(&mapping)?)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
