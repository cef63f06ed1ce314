use anyhow::{Context, Result, bail, ensure};
use std::path::Path;
use std::process::Command;

use oalparse::diagnostics::CollectingSink;
use oalparse::domain::model::Model;
use oalparse::domain::{Arguments, Domain, MemoryDomain};
use oalparse::interpreter;
use oalparse::value::Value;
use test_support::{Case, CaseClass, load_cases, normalize_output};

fn argument_value(case: &Case, name: &str, value: &serde_yaml::Value) -> Result<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(value) => Value::Boolean(*value),
        serde_yaml::Value::String(value) => Value::String(value.clone()),
        serde_yaml::Value::Number(number) => match number.as_i64() {
            Some(value) => Value::Integer(value),
            None => Value::Real(
                number
                    .as_f64()
                    .with_context(|| format!("Argument {name} of {} is out of range", case.name))?,
            ),
        },
        other => bail!(
            "Argument {name} of {} must be a scalar, got {other:?}",
            case.name
        ),
    })
}

fn arguments(case: &Case) -> Result<Arguments> {
    let mut arguments = Arguments::new();
    for (name, value) in &case.spec.arguments {
        arguments.insert(name.clone(), argument_value(case, name, value)?);
    }
    Ok(arguments)
}

fn run_case(case: &Case) -> Result<()> {
    let model = Model::load(&case.model_path)?;
    let (mut domain, invalid) = MemoryDomain::from_model(&model)
        .with_context(|| format!("Building domain for {}", case.name))?;
    let function = case.spec.function.as_str();

    if case.spec.class == CaseClass::FrontendError {
        let expected = case
            .spec
            .expected
            .error
            .as_deref()
            .with_context(|| format!("Missing expected.error in {}", case.name))?;
        let Some(rejected) = invalid.iter().find(|body| body.label == function) else {
            bail!(
                "Expected function {function} of {} to be rejected, but it parsed",
                case.name
            );
        };
        let actual = rejected.error.to_string();
        ensure!(
            actual.contains(expected.trim()),
            "Expected frontend error containing '{expected}' in {}, got '{actual}'",
            case.name
        );
        return Ok(());
    }

    ensure!(
        invalid.is_empty(),
        "Case {} has bodies that do not parse: {:?}",
        case.name,
        invalid
    );
    let action = domain
        .find_function(function)
        .with_context(|| format!("Resolving {function} in {}", case.name))?;
    let mut sink = CollectingSink::new();
    let value = interpreter::call_action(&mut domain, &action, None, arguments(case)?, &mut sink);

    if let Some(expected) = &case.spec.expected.result {
        assert_eq!(
            value.to_string(),
            normalize_output(expected),
            "Result mismatch for {}",
            case.name
        );
    }

    let rendered = sink.render();
    match case.spec.class {
        CaseClass::RuntimeSuccess => ensure!(
            sink.is_empty(),
            "Case {} expected no diagnostics, got:\n{rendered}",
            case.name
        ),
        CaseClass::RuntimeDiagnostic => {
            ensure!(
                !sink.is_empty(),
                "Case {} expected diagnostics, got none",
                case.name
            );
            for fragment in &case.spec.expected.diagnostics {
                ensure!(
                    rendered.contains(fragment.as_str()),
                    "Expected diagnostic containing '{fragment}' in {}, got:\n{rendered}",
                    case.name
                );
            }
        }
        CaseClass::FrontendError => {}
    }
    Ok(())
}

#[test]
fn runs_program_cases() -> Result<()> {
    for case in load_cases(Path::new("tests/programs"))? {
        run_case(&case)?;
    }
    Ok(())
}

#[test]
fn cli_prints_function_result() -> Result<()> {
    for case in load_cases(Path::new("tests/programs"))? {
        if case.spec.class != CaseClass::RuntimeSuccess {
            continue;
        }
        let Some(expected) = &case.spec.expected.result else {
            continue;
        };
        let mut command = Command::new(env!("CARGO_BIN_EXE_oalparse"));
        command.arg("--function").arg(&case.spec.function);
        for name in case.spec.arguments.keys() {
            let value = arguments(&case)?
                .remove(name)
                .with_context(|| format!("Argument {name} of {}", case.name))?;
            command.arg("--arg").arg(format!("{name}={value}"));
        }
        let output = command
            .arg(&case.model_path)
            .output()
            .with_context(|| format!("Running CLI for {}", case.name))?;
        ensure!(
            output.status.success(),
            "CLI failed for {}: {}",
            case.name,
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(
            normalize_output(&String::from_utf8_lossy(&output.stdout)),
            normalize_output(expected),
            "CLI output mismatch for {}",
            case.name
        );
    }
    Ok(())
}

#[test]
fn cli_rejects_missing_function() -> Result<()> {
    let case = load_cases(Path::new("tests/programs"))?
        .into_iter()
        .next()
        .context("No cases")?;
    let output = Command::new(env!("CARGO_BIN_EXE_oalparse"))
        .arg("--function")
        .arg("no_such_function")
        .arg(&case.model_path)
        .output()
        .context("Running CLI")?;
    ensure!(!output.status.success(), "CLI accepted a missing function");
    ensure!(
        String::from_utf8_lossy(&output.stderr).contains("no_such_function"),
        "CLI error should name the missing function"
    );
    Ok(())
}
