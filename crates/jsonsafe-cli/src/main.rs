#![allow(clippy::print_stdout, clippy::print_stderr)]
use std::{
    fs,
    io,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{ArgAction, Parser, ValueEnum};
use jsonsafe::{Mode, ValidationOptions, Validator};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "jsonsafe-cli",
    version,
    about = "Compile a JSON Schema and validate documents against it"
)]
struct Cli {
    /// Schema to compile (JSON, or YAML for `.yaml` / `.yml` files).
    #[arg(value_name = "SCHEMA")]
    schema: PathBuf,

    /// Document to validate; may be repeated.
    #[arg(short = 'i', long = "instance", value_name = "FILE")]
    instances: Vec<PathBuf>,

    /// Compilation mode, overrides the configuration file.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Report every error instead of stopping at the first one.
    #[arg(long)]
    all_errors: bool,

    /// Register an additional schema document under the given id.
    #[arg(long = "schema-ref", value_name = "ID=PATH", value_parser = parse_schema_ref)]
    schema_refs: Vec<(String, PathBuf)>,

    /// JSON file with compilation options.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the listing of the compiled validator.
    #[arg(long)]
    listing: bool,

    /// Output format for validation results.
    #[arg(long, value_enum, default_value_t = Output::Text)]
    output: Output,

    /// Increase log verbosity; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Permissive,
    Standard,
    Strict,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Permissive => Mode::Permissive,
            ModeArg::Standard => Mode::Standard,
            ModeArg::Strict => Mode::Strict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Invalid configuration in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Schema compilation failed: {0}")]
    Compile(#[from] jsonsafe::CompileError),
}

fn parse_schema_ref(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected ID=PATH, got {value:?}")),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "jsonsafe=debug",
        _ => "jsonsafe=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|extension| extension.to_str()),
        Some("yaml" | "yml")
    )
}

fn read_document(path: &Path) -> Result<Value, CliError> {
    let content = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = if is_yaml(path) {
        serde_saphyr::from_str(&content).map_err(|error| error.to_string())
    } else {
        serde_json::from_str(&content).map_err(|error| error.to_string())
    };
    parsed.map_err(|message| CliError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn load_options(cli: &Cli) -> Result<ValidationOptions, CliError> {
    let mut options = match &cli.config {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| CliError::Config {
                path: path.clone(),
                source,
            })?
        }
        None => jsonsafe::options(),
    };
    if let Some(mode) = cli.mode {
        options = options.with_mode(mode.into());
    }
    if cli.all_errors {
        options = options.should_collect_all_errors(true);
    }
    for (id, path) in &cli.schema_refs {
        options = options.with_schema(id.clone(), read_document(path)?);
    }
    Ok(options)
}

fn compile(cli: &Cli) -> Result<Validator, CliError> {
    let options = load_options(cli)?;
    let schema = read_document(&cli.schema)?;
    tracing::debug!(schema = %cli.schema.display(), mode = ?options.mode(), "Compiling");
    Ok(options.build(&schema)?)
}

fn report_text(path: &Path, output: &jsonsafe::ValidationOutput<'_>) {
    if output.valid {
        println!("{} - VALID", path.display());
        return;
    }
    println!("{} - INVALID. Errors:", path.display());
    for (idx, error) in output.errors.iter().enumerate() {
        println!(
            "{}. {error} (instance: \"{}\", keyword: \"{}\")",
            idx + 1,
            error.instance_location,
            error.keyword_location
        );
    }
}

fn report_json(path: &Path, output: &jsonsafe::ValidationOutput<'_>) {
    let record = json!({
        "instance": path.display().to_string(),
        "output": output,
    });
    println!("{record}");
}

/// Validate every instance, returning whether all of them are valid.
fn validate_instances(cli: &Cli, validator: &Validator) -> Result<bool, CliError> {
    let mut all_valid = true;
    for path in &cli.instances {
        let instance = read_document(path)?;
        let output = validator.validate(&instance);
        all_valid &= output.valid;
        match cli.output {
            Output::Text => report_text(path, &output),
            Output::Json => report_json(path, &output),
        }
    }
    Ok(all_valid)
}

fn run(cli: &Cli) -> Result<bool, CliError> {
    let validator = compile(cli)?;
    if validator.uses_dynamic_tracing() {
        tracing::debug!("Validator tracks evaluated members at runtime");
    }
    if cli.listing {
        println!("{}", validator.listing());
    }
    validate_instances(cli, &validator)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use test_case::test_case;

    use super::parse_schema_ref;

    #[test_case("https://example.com/a=a.json", Some(("https://example.com/a", "a.json")))]
    #[test_case("urn:x=dir/x=y.json", Some(("urn:x", "dir/x=y.json")))]
    #[test_case("no-separator", None)]
    #[test_case("=a.json", None)]
    #[test_case("id=", None)]
    fn test_parse_schema_ref(value: &str, expected: Option<(&str, &str)>) {
        let parsed = parse_schema_ref(value).ok();
        assert_eq!(
            parsed,
            expected.map(|(id, path)| (id.to_string(), PathBuf::from(path)))
        );
    }
}
