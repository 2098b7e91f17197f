use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table};

use crate::batch::{run_extract, run_solve, SolveStatus, TreeStatus};
use crate::board_order::{BoardOrder, BOARD_COUNT};
use crate::config::ExtractConfig;
use crate::display::{extract_summary, print_error, print_section, print_success, solve_summary};
use crate::engine::Queries;
use crate::error::{ExtractError, ExtractResult};
use crate::hand_order::{HandOrder, HAND_COUNT};
use crate::logging;
use crate::transport::Session;

#[derive(Parser)]
#[command(
    name = "upix",
    version,
    about = "Drive a UPI solver engine: extract saved trees into per-combination records, or solve scripts over flops."
)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Engine executable (overrides the config file)
    #[arg(long, global = true)]
    engine: Option<PathBuf>,
    /// Engine working directory (overrides the config file)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract saved trees into JSON-lines record files
    Extract {
        /// Tree files to load into the engine
        #[arg(required = true)]
        trees: Vec<PathBuf>,
        /// Output directory (one <tree>.jsonl per tree)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Trees extracted in parallel, one engine per job
        #[arg(short, long, default_value = "1")]
        jobs: usize,
        /// Re-extract trees whose output already exists
        #[arg(long)]
        force: bool,
    },
    /// Run a solve script once per flop and dump each solved tree
    Solve {
        /// Script of engine commands; set_board lines are replaced per flop
        script: PathBuf,
        /// Flops to solve (e.g., AsKd2c)
        #[arg(short, long = "flop", required = true, num_args = 1..)]
        flops: Vec<String>,
        /// Directory for dumped trees
        #[arg(long)]
        save_dir: Option<PathBuf>,
        /// Solve flops whose dump already exists
        #[arg(long)]
        force: bool,
    },
    /// Show the canonical form and index of a three-card board
    Board {
        /// Board cards (e.g., "2c Kd Ah" or 2cKdAh)
        cards: String,
    },
    /// Fetch the engine's hand order and show its size
    Hands,
}

pub fn run() {
    let cli = Cli::parse();
    dispatch(cli);
}

fn dispatch(cli: Cli) {
    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            print_error(&e.to_string());
            process::exit(2);
        }
    };
    if let Err(e) = logging::init(cli.verbose, config.log_file.as_deref()) {
        print_error(&e.to_string());
    }

    let result = match cli.command {
        Commands::Extract {
            trees,
            out,
            jobs,
            force,
        } => cmd_extract(config, trees, out, jobs, force),
        Commands::Solve {
            script,
            flops,
            save_dir,
            force,
        } => cmd_solve(config, script, flops, save_dir, force),
        Commands::Board { cards } => cmd_board(&cards),
        Commands::Hands => cmd_hands(&config),
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> ExtractResult<ExtractConfig> {
    let mut config = match &cli.config {
        Some(path) => ExtractConfig::load(path)?,
        None => ExtractConfig::default(),
    };
    if let Some(engine) = &cli.engine {
        config.session.executable = engine.clone();
    }
    if let Some(dir) = &cli.workdir {
        config.session.working_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn cmd_extract(
    mut config: ExtractConfig,
    trees: Vec<PathBuf>,
    out: Option<PathBuf>,
    jobs: usize,
    force: bool,
) -> ExtractResult<()> {
    if let Some(out) = out {
        config.output_dir = out;
    }
    let reports = run_extract(&config, &trees, jobs, force)?;

    println!();
    println!("{}", extract_summary(&reports));
    let failed = reports
        .iter()
        .filter(|r| matches!(r.status, TreeStatus::Failed(_)))
        .count();
    let records: usize = reports
        .iter()
        .filter_map(|r| match &r.status {
            TreeStatus::Extracted(stats) => Some(stats.records_emitted),
            _ => None,
        })
        .sum();
    println!();
    if failed == 0 {
        print_success(&format!(
            "  {} trees processed, {} records written to {}",
            reports.len(),
            records,
            config.output_dir.display()
        ));
        Ok(())
    } else {
        Err(ExtractError::Config(format!("{} of {} trees failed", failed, reports.len())))
    }
}

fn cmd_solve(
    mut config: ExtractConfig,
    script: PathBuf,
    flops: Vec<String>,
    save_dir: Option<PathBuf>,
    force: bool,
) -> ExtractResult<()> {
    if let Some(dir) = save_dir {
        config.save_dir = dir;
    }
    let reports = run_solve(&config, &script, &flops, force)?;

    println!();
    println!("{}", solve_summary(&reports));
    let failed = reports
        .iter()
        .filter(|r| matches!(r.status, SolveStatus::Failed(_)))
        .count();
    println!();
    if failed == 0 {
        print_success(&format!("  {} flops processed", reports.len()));
        Ok(())
    } else {
        Err(ExtractError::Config(format!("{} of {} flops failed", failed, flops.len())))
    }
}

fn cmd_board(cards: &str) -> ExtractResult<()> {
    let boards = BoardOrder::new();
    let table = boards.ensure_built();
    let canonical = table
        .canonical(cards)
        .ok_or_else(|| ExtractError::InvalidBoard(cards.to_string()))?;
    let index = table
        .index(&canonical)
        .ok_or_else(|| ExtractError::InvalidBoard(cards.to_string()))?;

    let mut out = Table::new();
    out.set_content_arrangement(ContentArrangement::Dynamic);
    out.add_row(vec![Cell::new("Canonical".bold().to_string()), Cell::new(&canonical)]);
    out.add_row(vec![
        Cell::new("Index".bold().to_string()),
        Cell::new(format!("{} of {}", index, BOARD_COUNT)),
    ]);
    println!();
    println!("{}", out);
    Ok(())
}

fn cmd_hands(config: &ExtractConfig) -> ExtractResult<()> {
    let session = Session::new(config.session.clone(), config.timeouts.sentinel());
    session.start()?;
    let hands = HandOrder::new();
    let result = Queries::new(&session, &config.timeouts)
        .is_ready()
        .and_then(|ready| match ready {
            true => hands.ensure_built(&session, &config.timeouts).cloned(),
            false => Err(ExtractError::parse("is_ready", "engine did not report ready")),
        });
    if let Err(e) = session.close() {
        log::warn!("closing session: {}", e);
    }
    let table = result?;

    let preview: Vec<&str> = table.order().iter().take(8).map(String::as_str).collect();
    print_section(
        "Hand order",
        &format!("{} combinations (expected {})", table.len(), HAND_COUNT),
    );
    println!("  first: {}", preview.join(" "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_args() {
        let cli = Cli::parse_from(["upix", "-vv", "extract", "a.cfr", "b.cfr", "--jobs", "3"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Extract { trees, jobs, force, .. } => {
                assert_eq!(trees.len(), 2);
                assert_eq!(jobs, 3);
                assert!(!force);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_solve_requires_flop() {
        assert!(Cli::try_parse_from(["upix", "solve", "script.txt"]).is_err());
        let cli = Cli::try_parse_from(["upix", "solve", "script.txt", "--flop", "AsKd2c", "Qh7d2c"]).unwrap();
        match cli.command {
            Commands::Solve { flops, .. } => assert_eq!(flops, vec!["AsKd2c", "Qh7d2c"]),
            _ => panic!("expected solve"),
        }
    }

    #[test]
    fn test_engine_override() {
        let cli = Cli::parse_from(["upix", "--engine", "/opt/pio", "hands"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.session.executable, PathBuf::from("/opt/pio"));
    }
}
