//! emapctl: run extent map scripts against an in-memory table.
//!
//! This is a thin wrapper around `stratum_emap::script` that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Loads the script
//! 4. Runs it and prints one report per step

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stratum_be::MemStore;
use stratum_emap::script::{Runner, Script, StepReport};
use stratum_emap::{ExtMap, OpType};

#[derive(Parser)]
#[command(
    name = "emapctl",
    about = "Run extent map scripts against an in-memory table",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "EMAPCTL_LOG", default_value = "info")]
    log: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON script
    Run {
        /// Path to the script
        script: PathBuf,

        /// Check every map the script touches after each step
        #[arg(long)]
        verify: bool,
    },

    /// Print the credit estimate of an operation
    Credit {
        /// Operation kind
        #[arg(value_enum)]
        optype: OpKind,

        /// Operation count
        #[arg(default_value_t = 1)]
        nr: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OpKind {
    Create,
    Destroy,
    Insert,
    Delete,
    Update,
    Merge,
    Split,
    Paste,
}

impl From<OpKind> for OpType {
    fn from(kind: OpKind) -> Self {
        match kind {
            OpKind::Create => Self::Create,
            OpKind::Destroy => Self::Destroy,
            OpKind::Insert => Self::Insert,
            OpKind::Delete => Self::Delete,
            OpKind::Update => Self::Update,
            OpKind::Merge => Self::Merge,
            OpKind::Split => Self::Split,
            OpKind::Paste => Self::Paste,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { script, verify } => {
            let mut script = Script::from_file(&script)
                .await
                .with_context(|| format!("failed to load {}", script.display()))?;
            if verify {
                script.map.verify_invariants = true;
                script.map.dump_on_violation = true;
            }
            tracing::info!(steps = script.steps.len(), "running script");

            let runner = Runner::new(&script).await?;
            let reports = runner.run(&script).await?;
            print_reports(&reports, cli.format)?;
        }
        Commands::Credit { optype, nr } => {
            let map = ExtMap::new(MemStore::new());
            let optype = OpType::from(optype);
            let credit = map.credit_for(optype, nr);
            match cli.format {
                OutputFormat::Text => println!("{optype}({nr}): {credit}"),
                OutputFormat::Json => println!("{}", serde_json::to_string(&credit)?),
            }
        }
    }

    Ok(())
}

fn print_reports(reports: &[StepReport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reports)?),
        OutputFormat::Text => {
            for report in reports {
                println!(
                    "step {:3}: credit {} used {}",
                    report.step, report.credit, report.used
                );
                for (i, seg) in report.segments.iter().enumerate() {
                    println!(
                        "    {i:5} {:16x} .. {:16x}: {:16x} {:10x}",
                        seg.ext.start,
                        seg.ext.end,
                        seg.ext.length(),
                        seg.value
                    );
                }
            }
        }
    }
    Ok(())
}
