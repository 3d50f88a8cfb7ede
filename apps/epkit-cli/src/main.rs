use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use epkit::{FrozenType, InvocationHandler, MethodIdentity, ServiceInstance, TypePool, TypeRef};

mod manifest;

use manifest::Manifest;

/// Synthesize endpoint contracts from a declarative YAML manifest
#[derive(Parser)]
#[command(name = "epkit-cli")]
#[command(about = "Synthesize endpoint contracts from a declarative YAML manifest")]
#[command(version = "0.1.0")]
struct Cli {
    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the manifest's endpoints and print their artifacts
    Synthesize {
        /// Path to the YAML manifest
        manifest: PathBuf,

        /// Also construct an instance per endpoint and invoke every
        /// operation with demo arguments through an echoing handler
        #[arg(long)]
        instantiate: bool,
    },
    /// Validate the manifest and exit
    Check {
        /// Path to the YAML manifest
        manifest: PathBuf,
    },
}

/// Demo handler: answers string-returning operations with a call summary and
/// everything else with the declared default.
struct EchoHandler;

impl InvocationHandler for EchoHandler {
    fn invoke(
        &self,
        _target: &ServiceInstance,
        method: &MethodIdentity,
        args: &[Value],
    ) -> anyhow::Result<Value> {
        Ok(match &method.returns {
            Some(TypeRef::String) => {
                Value::from(format!("{}::{}({args:?})", method.type_name, method.name))
            }
            Some(other) => other.default_value(),
            None => Value::Null,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Synthesize {
            manifest,
            instantiate,
        } => synthesize(&manifest, instantiate),
        Commands::Check { manifest } => check(&manifest),
    }
}

fn synthesize(path: &std::path::Path, instantiate: bool) -> Result<()> {
    let manifest = Manifest::from_path(path)?;
    let pool = Arc::new(TypePool::new());

    for entry in &manifest.endpoints {
        tracing::info!(endpoint = %entry.name, "synthesizing");
        let mut builder = manifest::configure(Arc::clone(&pool), entry)?;

        if instantiate {
            // instantiate() synthesizes the handler constructor; build()
            // alone yields a type only constructible without a handler.
            let instance = builder.instantiate(Arc::new(EchoHandler))?;
            print_artifacts(instance.contract(), instance.class())?;
            for op in entry.operations.iter().filter(|op| !op.exclude) {
                let reply = instance.call(&op.name, &op.demo_args())?;
                println!("{}::{} -> {reply}", entry.name, op.name);
            }
        } else {
            let loaded = builder.build()?;
            print_artifacts(loaded.contract(), loaded.class())?;
        }
    }
    Ok(())
}

fn print_artifacts(contract: &FrozenType, class: &FrozenType) -> Result<()> {
    println!("{}", String::from_utf8_lossy(&contract.to_bytes()?));
    println!("{}", String::from_utf8_lossy(&class.to_bytes()?));
    Ok(())
}

fn check(path: &std::path::Path) -> Result<()> {
    let manifest = Manifest::from_path(path)?;
    let pool = Arc::new(TypePool::new());
    for entry in &manifest.endpoints {
        manifest::configure(Arc::clone(&pool), entry)?.build()?;
    }
    println!(
        "Manifest is valid: {} endpoint(s)",
        manifest.endpoints.len()
    );
    Ok(())
}
