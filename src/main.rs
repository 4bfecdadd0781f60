//! layercast CLI
//!
//! Entry point for the `layercast` command-line tool.

use clap::{Parser, Subcommand};
use layercast::config::DistributeTargets;
use layercast::{DistributeStage, EffectiveConfig, OnDiskBackends, OrchestratorError, RunSummary, Settings};
use layercast_worker::init_logging;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "layercast")]
#[command(about = "Distribute a layer archive into multiple regions", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Distribute stage: one job per configured region
    Distribute {
        /// Path to config file (default: ./layercast.toml if present)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Region to distribute to (repeatable; replaces the configured list)
        #[arg(long = "region", short = 'r')]
        regions: Vec<String>,

        /// Principal granted layer usage: account id, account root ARN, or *
        #[arg(long)]
        principal: Option<String>,

        /// Organization id scoping the grant ("" for none)
        #[arg(long)]
        organization_id: Option<String>,

        /// Bucket holding the build output
        #[arg(long)]
        bucket: Option<String>,

        /// Object key of the build output zip
        #[arg(long)]
        key: Option<String>,

        /// Write run_summary.json to this path (effective_config.json is
        /// written alongside)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Output the run summary in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and print the effective settings
    Verify {
        /// Path to config file (default: ./layercast.toml if present)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print the job invocations the Distribute stage would dispatch
    Plan {
        /// Path to config file (default: ./layercast.toml if present)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// CLI flags that override configuration values.
#[derive(Default)]
struct Overrides {
    regions: Vec<String>,
    principal: Option<String>,
    organization_id: Option<String>,
    bucket: Option<String>,
    key: Option<String>,
}

impl Overrides {
    fn to_value(&self) -> Option<Value> {
        let mut distribute = Map::new();
        if !self.regions.is_empty() {
            distribute.insert("regions".to_string(), json!(self.regions));
        }
        if let Some(principal) = &self.principal {
            distribute.insert("layer_principal".to_string(), json!(principal));
        }
        if let Some(org) = &self.organization_id {
            distribute.insert("organization_id".to_string(), json!(org));
        }

        let mut artifact = Map::new();
        if let Some(bucket) = &self.bucket {
            artifact.insert("bucket".to_string(), json!(bucket));
        }
        if let Some(key) = &self.key {
            artifact.insert("key".to_string(), json!(key));
        }

        if distribute.is_empty() && artifact.is_empty() {
            return None;
        }
        Some(json!({ "distribute": distribute, "artifact": artifact }))
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Distribute {
            config,
            regions,
            principal,
            organization_id,
            bucket,
            key,
            summary,
            json,
        } => {
            let overrides = Overrides {
                regions,
                principal,
                organization_id,
                bucket,
                key,
            };
            run_distribute(config.as_deref(), &overrides, summary.as_deref(), json);
        }
        Commands::Verify { config } => {
            run_verify(config.as_deref());
        }
        Commands::Plan { config, json } => {
            run_plan(config.as_deref(), json);
        }
    }
}

/// Load configuration and initialize logging, or exit 2.
fn load(config_path: Option<&Path>, overrides: &Overrides) -> (EffectiveConfig, Settings, DistributeTargets) {
    let loaded = EffectiveConfig::build(config_path, overrides.to_value()).and_then(|config| {
        let settings = config.settings()?;
        let targets = settings.targets()?;
        Ok((config, settings, targets))
    });

    match loaded {
        Ok((config, settings, targets)) => {
            init_logging(settings.logging.format, &settings.logging.level);
            (config, settings, targets)
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(2);
        }
    }
}

fn plan_or_exit(settings: &Settings, targets: &DistributeTargets) -> DistributeStage {
    DistributeStage::plan(targets, &settings.artifact_location()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    })
}

fn run_distribute(config_path: Option<&Path>, overrides: &Overrides, summary_path: Option<&Path>, json: bool) {
    let (config, settings, targets) = load(config_path, overrides);
    let stage = plan_or_exit(&settings, &targets);

    let summary = stage.run(&OnDiskBackends::from_settings(&settings));

    if let Err(e) = print_summary(&summary, json) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }

    if let Some(path) = summary_path {
        if let Err(e) = summary.write_to_file(path) {
            eprintln!("Error writing summary to {}: {}", path.display(), e);
            process::exit(1);
        }
        let config = config.with_run_id(stage.run_id.clone());
        if let Err(e) = config.write_beside(path) {
            eprintln!("Error writing effective config next to {}: {}", path.display(), e);
            process::exit(1);
        }
    }

    process::exit(summary.status.exit_code());
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<(), OrchestratorError> {
    if json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    println!("Run: {}", summary.run_id);
    for action in &summary.actions {
        let status = serde_json::to_value(action.status)?;
        println!(
            "  {:<28} {:<22} {}",
            action.action_name,
            status.as_str().unwrap_or("unknown"),
            action.job_id
        );
        if let Some(message) = &action.failure_message {
            println!("    {}", message);
        }
        if let Some(warning) = &action.warning {
            println!("    warning: {}", warning);
        }
    }
    println!();
    println!("{} ({} ms)", summary.human_summary, summary.duration_ms);
    Ok(())
}

fn run_verify(config_path: Option<&Path>) {
    let (config, settings, targets) = load(config_path, &Overrides::default());

    println!("Configuration valid");
    println!();
    for source in &config.sources {
        match (&source.path, &source.digest) {
            (Some(path), Some(digest)) => println!("  Source: {:?} {} (sha256 {})", source.origin, path, digest),
            _ => println!("  Source: {:?}", source.origin),
        }
    }
    let regions: Vec<String> = targets.regions.iter().map(|r| r.to_string()).collect();
    println!("  Regions: {}", regions.join(", "));
    println!("  Principal: {}", targets.principal);
    match &targets.organization_id {
        Some(org) => println!("  Organization: {}", org),
        None => println!("  Organization: (none)"),
    }
    println!("  Artifact: {}", settings.artifact_location());
    println!("  Artifact store: {}", settings.artifact.store_root.display());
    println!("  Registry: {}", settings.registry.root.display());

    if targets.is_public() {
        println!();
        println!("Warning: wildcard principal without organization id shares the layer with every account");
    }
}

fn run_plan(config_path: Option<&Path>, json: bool) {
    let (_config, settings, targets) = load(config_path, &Overrides::default());
    let stage = plan_or_exit(&settings, &targets);

    if json {
        match serde_json::to_string_pretty(&stage) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing plan: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Run: {}", stage.run_id);
    for action in &stage.actions {
        println!("  {:<28} job {}", action.action_name, action.job_id());
        match action.event.user_parameters() {
            Ok(params) => println!(
                "    region={} principal={} organization={}",
                params.region,
                params.layer_principal,
                params.organization_id.as_deref().filter(|o| !o.is_empty()).unwrap_or("(none)")
            ),
            Err(e) => println!("    {}", e),
        }
    }
}
