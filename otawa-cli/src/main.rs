//! `otawa`: drive the WCET analysis pipeline over a fixture process
//! image, optional flow-fact file, and optional cache-hierarchy
//! description (`spec.md` §6).

mod fixture;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use otawa_core::error::OtawaError;
use otawa_core::pipeline;
use otawa_core::{flowfacts, platform_xml};

#[derive(Parser)]
#[command(name = "otawa")]
#[command(about = "Static worst-case execution time (WCET) analysis driver")]
#[command(version)]
struct Cli {
    /// Path to the fixture process image (JSON; see `fixture.rs`)
    executable: PathBuf,

    /// Name of the entry symbol to analyze
    entry_symbol: String,

    /// Flow-fact file (loop bounds, call/branch/return directives)
    #[arg(short = 'f', long = "flow-facts")]
    flow_facts: Option<PathBuf>,

    /// Cache-hierarchy description (`<cache-config>` XML)
    #[arg(short = 'p', long = "platform")]
    platform: Option<PathBuf>,

    /// Output directory for the analysis report
    #[arg(short = 'o', long = "out")]
    out_dir: Option<PathBuf>,
}

const EXIT_OK: u8 = 0;
const EXIT_MISSING_INPUT: u8 = 1;
const EXIT_LOAD_ERROR: u8 = 2;
const EXIT_INFEASIBLE: u8 = 3;
const EXIT_CANCELLED: u8 = 4;
const EXIT_INTERNAL: u8 = 5;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    ExitCode::from(run(cli))
}

fn run(cli: Cli) -> u8 {
    if !cli.executable.exists() {
        error!("executable fixture not found: {}", cli.executable.display());
        return EXIT_MISSING_INPUT;
    }

    let mut process = match fixture::load(&cli.executable) {
        Ok(process) => process,
        Err(err) => {
            error!("failed to load executable: {err:#}");
            return EXIT_LOAD_ERROR;
        }
    };

    if let Some(platform_path) = &cli.platform {
        if !platform_path.exists() {
            error!("platform description not found: {}", platform_path.display());
            return EXIT_MISSING_INPUT;
        }
        let content = match std::fs::read_to_string(platform_path) {
            Ok(content) => content,
            Err(err) => {
                error!("failed to read platform description: {err}");
                return EXIT_LOAD_ERROR;
            }
        };
        match platform_xml::parse(&content) {
            Ok(platform) => process.platform = platform,
            Err(err) => {
                error!("failed to parse platform description: {err}");
                return EXIT_LOAD_ERROR;
            }
        }
    }

    let entry = match process.symbol(&cli.entry_symbol) {
        Some(symbol) => symbol.address,
        None => {
            error!("entry symbol '{}' not found in executable", cli.entry_symbol);
            return EXIT_MISSING_INPUT;
        }
    };

    let facts = match &cli.flow_facts {
        Some(path) => {
            if !path.exists() {
                error!("flow-fact file not found: {}", path.display());
                return EXIT_MISSING_INPUT;
            }
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(err) => {
                    error!("failed to read flow-fact file: {err}");
                    return EXIT_LOAD_ERROR;
                }
            };
            match flowfacts::parse(&content) {
                Ok(facts) => facts,
                Err(err) => {
                    error!("failed to parse flow-fact file: {err}");
                    return EXIT_LOAD_ERROR;
                }
            }
        }
        None => flowfacts::FlowFacts::default(),
    };
    for warning in &facts.warnings {
        warn!("{warning}");
    }

    let mut ws = otawa_core::Workspace::new(process.platform.clone());
    ws.process = process;

    match pipeline::run_to_wcet(&mut ws, entry, facts.builder_inputs(), facts.loop_bounds) {
        Ok(wcet) => {
            info!("WCET = {wcet} cycles");
            for warning in ws.warnings() {
                warn!("{}", warning.message);
            }
            if let Some(out_dir) = &cli.out_dir {
                if let Err(err) = write_report(out_dir, wcet, &ws) {
                    error!("failed to write report: {err:#}");
                    return EXIT_INTERNAL;
                }
            }
            println!("{wcet}");
            EXIT_OK
        }
        Err(OtawaError::Infeasible { .. }) | Err(OtawaError::Unbounded) | Err(OtawaError::MissingFlowFact { .. }) => {
            error!("no finite WCET computable for entry '{}'", cli.entry_symbol);
            EXIT_INFEASIBLE
        }
        Err(OtawaError::Cancelled) => {
            error!("analysis cancelled");
            EXIT_CANCELLED
        }
        Err(OtawaError::ConsistencyError(msg)) => {
            error!("internal consistency failure: {msg}");
            EXIT_INTERNAL
        }
        Err(err) => {
            error!("analysis failed: {err}");
            EXIT_LOAD_ERROR
        }
    }
}

fn write_report(out_dir: &std::path::Path, wcet: i64, ws: &otawa_core::Workspace) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let report = serde_json::json!({
        "wcet": wcet,
        "warnings": ws.warnings().iter().map(|w| w.message.clone()).collect::<Vec<_>>(),
    });
    std::fs::write(out_dir.join("wcet-report.json"), serde_json::to_string_pretty(&report)?)?;
    Ok(())
}
