use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use oalparse::ast;
use oalparse::diagnostics::CollectingSink;
use oalparse::domain::model::Model;
use oalparse::domain::{Action, Arguments, Domain, MemoryDomain};
use oalparse::interpreter;
use oalparse::value::Value;

const USAGE: &str = "Usage: oalparse [--component NAME] [--function NAME] [--arg name=value]... [--dump-ast] MODEL.yaml...";

struct Options {
    component: Option<String>,
    function: String,
    arguments: Arguments,
    dump_ast: bool,
    models: Vec<PathBuf>,
}

fn parse_options() -> Result<Options> {
    let mut args = std::env::args().skip(1);
    let mut options = Options {
        component: None,
        function: "main".to_string(),
        arguments: Arguments::new(),
        dump_ast: false,
        models: Vec::new(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--component" | "-c" => {
                options.component = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("Missing component name after {arg}"))?,
                );
            }
            "--function" | "-f" => {
                options.function = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing function name after {arg}"))?;
            }
            "--arg" | "-a" => {
                let pair = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing name=value after {arg}"))?;
                let Some((name, value)) = pair.split_once('=') else {
                    bail!("Argument '{pair}' is not of the form name=value");
                };
                options
                    .arguments
                    .insert(name.to_string(), argument_value(value));
            }
            "--dump-ast" => options.dump_ast = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ if arg.starts_with('-') => bail!("Unknown option '{arg}'\n{USAGE}"),
            _ => options.models.push(PathBuf::from(arg)),
        }
    }

    if options.models.is_empty() {
        bail!("No model files given\n{USAGE}");
    }
    Ok(options)
}

/// Command-line values are typed by their spelling.
fn argument_value(text: &str) -> Value {
    if let Ok(value) = text.parse::<i64>() {
        Value::Integer(value)
    } else if let Ok(value) = text.parse::<f64>() {
        Value::Real(value)
    } else {
        match text {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::String(text.to_string()),
        }
    }
}

fn load_domain(options: &Options) -> Result<MemoryDomain> {
    let mut domain = MemoryDomain::new();
    let mut rejected = Vec::new();

    for path in &options.models {
        let model = Model::load(path)?;
        if let Some(component) = &options.component
            && model.component.as_deref() != Some(component.as_str())
        {
            debug!(path = %path.display(), "skipping model of another component");
            continue;
        }
        let invalid = domain
            .load_model(&model)
            .with_context(|| format!("Loading {}", path.display()))?;
        rejected.extend(invalid);
    }

    for body in &rejected {
        eprintln!("{}: {}", body.label, body.error);
    }
    if rejected.iter().any(|body| body.label == options.function) {
        bail!("Function '{}' has syntax errors", options.function);
    }
    Ok(domain)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = parse_options()?;
    let mut domain = load_domain(&options)?;
    let action = domain
        .find_function(&options.function)
        .with_context(|| format!("Resolving function '{}'", options.function))?;

    if options.dump_ast {
        match &action {
            Action::Oal { body, .. } => print!("{}", ast::dump(body)),
            Action::Native(_) => bail!("Function '{}' has no OAL body", options.function),
        }
        return Ok(());
    }

    let mut sink = CollectingSink::new();
    let value = interpreter::call_action(&mut domain, &action, None, options.arguments, &mut sink);
    for diagnostic in sink.diagnostics() {
        eprintln!("{diagnostic}");
    }
    println!("{value}");
    Ok(())
}
