use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::InjectError;
use crate::params::ParameterSet;

pub const PROLOGUE_HEADER: &str = "# parameters (injected by medallion-run)";
pub const PARAMETERS_TAG: &str = "parameters";

/// Runtime forced onto every injected notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub display_name: String,
    pub language: String,
    pub name: String,
}

impl Default for KernelSpec {
    fn default() -> Self {
        Self::python(None)
    }
}

impl KernelSpec {
    pub fn python(name: Option<&str>) -> Self {
        Self {
            display_name: "Python 3".to_string(),
            language: "python".to_string(),
            name: name.unwrap_or("python3").to_string(),
        }
    }
}

/// Source of the parameters cell, byte-identical for identical inputs.
pub fn render_prologue(params: &ParameterSet) -> String {
    format!("{PROLOGUE_HEADER}\n{}", params.render_assignments())
}

/// Returns a copy of `notebook` with the parameters cell prepended and the
/// kernelspec replaced. The input document is left untouched.
pub fn inject_document(
    notebook: &Value,
    params: &ParameterSet,
    kernel: &KernelSpec,
) -> Option<Value> {
    let mut document = notebook.clone();
    let root = document.as_object_mut()?;

    let cells = root.get_mut("cells")?.as_array_mut()?;
    cells.insert(0, parameters_cell(params));

    let metadata = root
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    if !metadata.is_object() {
        *metadata = Value::Object(Default::default());
    }
    if let Some(map) = metadata.as_object_mut() {
        map.insert("kernelspec".to_string(), json!(kernel));
    }

    Some(document)
}

fn parameters_cell(params: &ParameterSet) -> Value {
    let source = render_prologue(params);
    let lines: Vec<Value> = source
        .split_inclusive('\n')
        .map(|line| Value::String(line.to_string()))
        .collect();
    json!({
        "cell_type": "code",
        "execution_count": null,
        "metadata": {
            "tags": [PARAMETERS_TAG],
            "medallion": params.typed_encoding(),
        },
        "outputs": [],
        "source": lines,
    })
}

/// Injected copy of a notebook on disk. The file is removed on drop.
#[derive(Debug)]
pub struct InjectedNotebook {
    path: PathBuf,
}

impl InjectedNotebook {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InjectedNotebook {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), "Failed to remove injected notebook: {err}");
        }
    }
}

/// Reads `source`, injects `params` and writes `{stem}.__tmp__.ipynb` into `work_dir`.
pub fn inject_parameters(
    source: &Path,
    params: &ParameterSet,
    kernel: &KernelSpec,
    work_dir: &Path,
) -> Result<InjectedNotebook, InjectError> {
    let raw = fs::read(source).map_err(|err| InjectError::Read {
        path: source.to_path_buf(),
        source: err,
    })?;
    let notebook: Value = serde_json::from_slice(&raw).map_err(|err| InjectError::Parse {
        path: source.to_path_buf(),
        source: err,
    })?;
    let injected = inject_document(&notebook, params, kernel)
        .ok_or_else(|| InjectError::MissingCells(source.to_path_buf()))?;

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "notebook".to_string());
    let path = work_dir.join(format!("{stem}.__tmp__.ipynb"));
    let mut rendered = serde_json::to_vec_pretty(&injected).map_err(|err| InjectError::Parse {
        path: source.to_path_buf(),
        source: err,
    })?;
    rendered.push(b'\n');
    fs::write(&path, rendered).map_err(|err| InjectError::Write {
        path: path.clone(),
        source: err,
    })?;
    debug!(source = %source.display(), injected = %path.display(), "Parameters injected");

    Ok(InjectedNotebook { path })
}
