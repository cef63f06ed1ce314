#![allow(dead_code)]
use std::path::Path;

use oalparse::domain::model::Model;
use test_support::load_cases;

/// A bench-enabled program case: its model and the source of its entry function.
pub struct Workload {
    pub label: String,
    pub model: Model,
    pub function: String,
    pub source: String,
}

pub fn workloads() -> Vec<Workload> {
    let cases = load_cases(Path::new("tests/programs"))
        .unwrap_or_else(|err| panic!("load cases: {err:#}"));
    cases
        .into_iter()
        .filter(|case| case.spec.bench.enabled)
        .map(|case| {
            let model = Model::load(&case.model_path)
                .unwrap_or_else(|err| panic!("load {}: {err:#}", case.name));
            let source = model
                .functions
                .iter()
                .find(|function| function.name == case.spec.function)
                .map(|function| function.body.clone())
                .unwrap_or_else(|| panic!("{} has no function {}", case.name, case.spec.function));
            Workload {
                label: format!("{}_{}", case.name, case.spec.bench.tags.join("_")),
                model,
                function: case.spec.function,
                source,
            }
        })
        .collect()
}
