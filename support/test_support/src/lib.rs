use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    /// The function runs without a single diagnostic.
    RuntimeSuccess,
    /// The function runs to completion but reports diagnostics.
    RuntimeDiagnostic,
    /// The function body is rejected by the parser.
    FrontendError,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BenchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExpectedOutcome {
    /// Rendered return value.
    pub result: Option<String>,
    /// Fragments that must each appear in the rendered diagnostics.
    #[serde(default)]
    pub diagnostics: Vec<String>,
    /// Fragment of the syntax error for `frontend_error` cases.
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_function")]
    pub function: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub bench: BenchConfig,
    pub expected: ExpectedOutcome,
}

fn default_model() -> String {
    "model.yaml".to_string()
}

fn default_function() -> String {
    "main".to_string()
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub model_path: PathBuf,
    pub spec: CaseSpec,
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;

        let model_path = path.join(&spec.model);
        ensure!(
            model_path.exists(),
            "Missing {} for case {}",
            spec.model,
            path.display()
        );

        cases.push(Case {
            name: case_name,
            dir: path,
            model_path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}
