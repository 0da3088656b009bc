//! JP-015: CLI subcommands: compile, plan, validate, catalog, fingerprint,
//! schema, completions.

use crate::core::compiler::Compiler;
use crate::core::config::CompilerConfig;
use crate::core::error::CompileError;
use crate::core::types::{IntentDocument, Tagged};
use crate::core::parser;
use crate::tripwire::hasher;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "jalm.toml";

#[derive(Parser, Debug)]
#[command(
    name = "jalm-provision",
    version,
    about = "Compile JALM intents into runnable client deployments"
)]
pub struct Cli {
    /// Log verbosity when JALM_LOG is unset
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile an intent into a deployment directory
    Compile {
        /// Path to the intent file
        intent: PathBuf,

        /// Deployments root; the deployment lands in <out>/<app_id>
        #[arg(short, long, default_value = "deployments")]
        out: PathBuf,

        /// Compiler configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the provision plan without writing anything
    Plan {
        /// Path to the intent file
        intent: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Parse and validate an intent
    Validate {
        /// Path to the intent file
        intent: PathBuf,
    },

    /// List catalog entries, optionally filtered by tags
    Catalog {
        /// Comma-separated tags; entries matching any tag are listed
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the BLAKE3 fingerprint of a deployment directory
    Fingerprint {
        /// Deployment directory
        dir: PathBuf,
    },

    /// Print the JSON Schema of the intent document
    Schema,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Compile {
            intent,
            out,
            config,
        } => cmd_compile(&intent, &out, config.as_deref()),
        Commands::Plan { intent, config } => cmd_plan(&intent, config.as_deref()),
        Commands::Validate { intent } => cmd_validate(&intent),
        Commands::Catalog { tags, config } => cmd_catalog(&tags, config.as_deref()),
        Commands::Fingerprint { dir } => cmd_fingerprint(&dir),
        Commands::Schema => cmd_schema(),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "jalm-provision", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CompilerConfig, CompileError> {
    match path {
        Some(p) => CompilerConfig::load_or_default(p, true),
        None => CompilerConfig::load_or_default(Path::new(DEFAULT_CONFIG), false),
    }
}

fn cmd_compile(intent: &Path, out: &Path, config: Option<&Path>) -> Result<(), String> {
    let compiler = Compiler::new(load_config(config).map_err(|e| e.to_string())?);
    let compilation = compiler.compile(intent, out).map_err(|e| e.to_string())?;
    println!("{}", compilation.deployment.display());
    Ok(())
}

fn cmd_plan(intent: &Path, config: Option<&Path>) -> Result<(), String> {
    let compiler = Compiler::new(load_config(config).map_err(|e| e.to_string())?);
    let planned = compiler.plan_file(intent).map_err(|e| e.to_string())?;
    let yaml = planned
        .plan
        .to_canonical_yaml()
        .map_err(|e| CompileError::PlanInconsistent(e).to_string())?;
    print!("{}", yaml);
    Ok(())
}

fn cmd_validate(intent: &Path) -> Result<(), String> {
    let parsed = parser::parse_intent_file(intent).map_err(|e| e.to_string())?;
    println!(
        "OK: {} ({}, {} features, {} integrations)",
        parsed.identity.slug,
        parsed.flavor,
        parsed.enabled_features().count(),
        parsed.enabled_integrations().count()
    );
    Ok(())
}

fn cmd_catalog(tags: &[String], config: Option<&Path>) -> Result<(), String> {
    let compiler = Compiler::new(load_config(config).map_err(|e| e.to_string())?);
    let (catalog, _diags) = compiler.load_catalog();
    let query: BTreeSet<String> = tags
        .iter()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let functions = catalog.functions_by_tags(&query);
    let templates = catalog.templates_by_tags(&query);
    println!("Functions ({}):", functions.len());
    for f in &functions {
        println!("  {} {} [{}]", f.id(), f.version, f.tags().join(", "));
    }
    println!("Templates ({}):", templates.len());
    for t in &templates {
        println!(
            "  {} {} ({}) [{}]",
            t.id(),
            t.version,
            t.category,
            t.tags().join(", ")
        );
    }
    Ok(())
}

fn cmd_fingerprint(dir: &Path) -> Result<(), String> {
    if !dir.is_dir() {
        return Err(format!("FingerprintFailed: {} is not a directory", dir.display()));
    }
    let h = hasher::hash_directory(dir)
        .map_err(|e| format!("FingerprintFailed: {}: {}", dir.display(), e))?;
    println!("{}", h);
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(IntentDocument);
    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("SchemaFailed: {}", e))?;
    println!("{}", json);
    Ok(())
}
