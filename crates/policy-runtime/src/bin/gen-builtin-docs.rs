//! Writes builtin documentation metadata as JSON.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use policy_runtime::{docs, BuiltinRegistry};

#[derive(Debug, Parser)]
#[command(name = "gen-builtin-docs", version, about = "Export builtin documentation metadata")]
struct Args {
    /// File to write the JSON document to.
    output: PathBuf,

    /// Builtins with a native implementation, in addition to comparisons.
    ///
    /// No native table ships with the runtime: every other builtin is
    /// reported as SDK unless named here. Repeat the flag per builtin.
    #[arg(long = "native", value_name = "NAME")]
    native: Vec<String>,
}

fn run(args: Args) -> policy_runtime::Result<usize> {
    let registry = BuiltinRegistry::with_defaults();
    let native: HashSet<String> = args.native.into_iter().collect();
    let generated = docs::generate(&registry, &native);
    let json = docs::to_json(&generated)?;

    fs::write(&args.output, json).map_err(|e| {
        policy_runtime::PolicyError::Serialization(format!(
            "cannot write {}: {}",
            args.output.display(),
            e
        ))
    })?;
    Ok(generated.values().map(Vec::len).sum())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let output = args.output.clone();
    match run(args) {
        Ok(count) => {
            info!(builtins = count, output = %output.display(), "wrote builtin docs");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "failed to generate builtin docs");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_native_flag_repeats() {
        let args = Args::try_parse_from([
            "gen-builtin-docs",
            "builtins.json",
            "--native",
            "plus",
            "--native",
            "count",
        ])
        .unwrap();
        assert_eq!(args.output, PathBuf::from("builtins.json"));
        assert_eq!(args.native, vec!["plus".to_string(), "count".to_string()]);
    }

    #[test]
    fn test_help_explains_sdk_default() {
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("SDK unless named here"));
    }
}
