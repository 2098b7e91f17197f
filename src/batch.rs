//! Batch drivers: extracting many saved trees into JSON-lines files, and
//! running a solve script over a list of flops. Both skip work whose output
//! already exists unless forced.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::board_order::BoardOrder;
use crate::cards::parse_cards;
use crate::completion::{wait_for_compute, Completion};
use crate::config::ExtractConfig;
use crate::engine::Queries;
use crate::error::{ExtractError, ExtractResult};
use crate::extract::{Extractor, WalkStats};
use crate::hand_order::HandOrder;
use crate::sink::JsonLinesSink;
use crate::transport::Session;

// ---------------------------------------------------------------------------
// Tree extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub enum TreeStatus {
    Extracted(WalkStats),
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeReport {
    pub tree: PathBuf,
    pub output: PathBuf,
    pub status: TreeStatus,
    pub elapsed: Duration,
}

/// `<out>/<tree stem>.jsonl`
pub fn output_path(output_dir: &Path, tree: &Path) -> PathBuf {
    let stem = tree
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tree".to_string());
    output_dir.join(format!("{}.jsonl", stem))
}

/// Extracts one tree in its own engine session. The session is closed
/// whatever the outcome.
pub fn extract_tree(
    config: &ExtractConfig,
    tree: &Path,
    output: &Path,
    hands: &HandOrder,
    boards: &BoardOrder,
) -> ExtractResult<WalkStats> {
    let session = Session::new(config.session.clone(), config.timeouts.sentinel());
    session.start()?;
    let result = walk_tree(&session, config, tree, output, hands, boards);
    if let Err(e) = session.close() {
        log::warn!("closing session for {}: {}", tree.display(), e);
    }
    result
}

fn walk_tree(
    session: &Session,
    config: &ExtractConfig,
    tree: &Path,
    output: &Path,
    hands: &HandOrder,
    boards: &BoardOrder,
) -> ExtractResult<WalkStats> {
    let queries = Queries::new(session, &config.timeouts);
    if !queries.is_ready()? {
        return Err(ExtractError::parse("is_ready", "engine did not report ready"));
    }
    let hand_table = hands.ensure_built(session, &config.timeouts)?;
    let board_table = boards.ensure_built();

    log::info!("loading {}", tree.display());
    queries.load_tree(tree)?;

    let effective_stack = match queries.effective_stack() {
        Ok(stack) => stack,
        Err(e) if e.poisons_session() => return Err(e),
        Err(e) => {
            log::warn!(
                "effective stack unavailable ({}), using {}",
                e,
                config.fallback_effective_stack
            );
            config.fallback_effective_stack
        }
    };
    log::debug!("effective stack {}", effective_stack);

    let mut sink = JsonLinesSink::new(output);
    log::info!("writing records to {}", sink.path().display());
    let mut extractor = Extractor::new(
        session,
        &config.timeouts,
        hand_table,
        board_table,
        effective_stack,
        &mut sink,
    );
    extractor.walk(&config.root)
}

fn process_tree(
    config: &ExtractConfig,
    tree: &Path,
    hands: &HandOrder,
    boards: &BoardOrder,
    force: bool,
) -> TreeReport {
    let start = Instant::now();
    let output = output_path(&config.output_dir, tree);
    let status = if !force && output.exists() {
        log::info!("{} already extracted, skipping", tree.display());
        TreeStatus::Skipped
    } else {
        match extract_tree(config, tree, &output, hands, boards) {
            Ok(stats) => TreeStatus::Extracted(stats),
            Err(e) => {
                log::error!("extracting {} failed: {}", tree.display(), e);
                if output.exists() {
                    if let Err(rm) = fs::remove_file(&output) {
                        log::warn!("could not remove partial {}: {}", output.display(), rm);
                    }
                }
                TreeStatus::Failed(e.to_string())
            }
        }
    };
    TreeReport {
        tree: tree.to_path_buf(),
        output,
        status,
        elapsed: start.elapsed(),
    }
}

/// Extracts every tree, up to `jobs` at a time, each in its own session.
/// The hand and board orders are built once and shared.
pub fn run_extract(
    config: &ExtractConfig,
    trees: &[PathBuf],
    jobs: usize,
    force: bool,
) -> ExtractResult<Vec<TreeReport>> {
    let hands = HandOrder::new();
    let boards = BoardOrder::new();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .map_err(|e| ExtractError::Config(format!("thread pool: {}", e)))?;

    log::info!("extracting {} trees with {} jobs", trees.len(), jobs.max(1));
    let reports = pool.install(|| {
        trees
            .par_iter()
            .map(|tree| process_tree(config, tree, &hands, &boards, force))
            .collect()
    });
    Ok(reports)
}

// ---------------------------------------------------------------------------
// Solve scripts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub enum SolveStatus {
    Solved { reason: String },
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub flop: String,
    pub dump: PathBuf,
    pub status: SolveStatus,
    pub elapsed: Duration,
}

/// Validates a flop and returns it in packed form, e.g. `AsKd2c`.
pub fn normalize_flop(flop: &str) -> ExtractResult<String> {
    let cards = parse_cards(flop)?;
    if cards.len() != 3 {
        return Err(ExtractError::InvalidBoard(flop.to_string()));
    }
    Ok(cards.iter().map(|c| c.to_string()).collect())
}

/// Script lines to send for one flop: blank and `#` lines dropped, every
/// `set_board` line replaced by the flop.
pub fn script_commands(script: &str, flop: &str) -> Vec<String> {
    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let is_set_board = line
                .split_whitespace()
                .next()
                .is_some_and(|word| word == "set_board");
            if is_set_board {
                format!("set_board {}", flop)
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// `<save-dir>/<script dir>_<script stem>_<flop>.cfr`
pub fn dump_path(save_dir: &Path, script: &Path, flop: &str) -> PathBuf {
    let name = |p: Option<&std::ffi::OsStr>| {
        p.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    };
    let prefix = name(
        script
            .parent()
            .and_then(|dir| dir.file_name()),
    );
    let stem = name(script.file_stem());
    let file = if prefix.is_empty() {
        format!("{}_{}.cfr", stem, flop)
    } else {
        format!("{}_{}_{}.cfr", prefix, stem, flop)
    };
    save_dir.join(file)
}

/// Runs the script for one flop in a fresh session and asks the engine to
/// dump the solved tree to `dump`.
pub fn solve_flop(config: &ExtractConfig, commands: &[String], dump: &Path) -> ExtractResult<Completion> {
    let session = Session::new(config.session.clone(), config.timeouts.sentinel());
    session.start()?;
    let result = compute_and_dump(&session, config, commands, dump);
    if let Err(e) = session.close() {
        log::warn!("closing session: {}", e);
    }
    result
}

fn compute_and_dump(
    session: &Session,
    config: &ExtractConfig,
    commands: &[String],
    dump: &Path,
) -> ExtractResult<Completion> {
    let queries = Queries::new(session, &config.timeouts);
    for command in commands {
        queries.run_script_line(command)?;
    }
    log::info!("ran {} script commands", commands.len());

    match queries.set_accuracy(config.accuracy) {
        Ok(lines) => lines.iter().for_each(|l| log::debug!("set_accuracy: {}", l)),
        Err(e) if e.poisons_session() => return Err(e),
        Err(e) => log::warn!("set_accuracy failed: {}", e),
    }

    let stream = session.stream("go")?;
    let completion = wait_for_compute(&stream, &config.completion)?;
    drop(stream);

    if let Some(parent) = dump.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    session.send_raw(&format!("dump_tree \"{}\" no_rivers", dump.display()))?;
    thread::sleep(config.session.settle());
    log::info!("dump requested: {}", dump.display());
    Ok(completion)
}

/// Solves `script` once per flop, sequentially.
pub fn run_solve(
    config: &ExtractConfig,
    script: &Path,
    flops: &[String],
    force: bool,
) -> ExtractResult<Vec<SolveReport>> {
    let text = fs::read_to_string(script)?;
    let mut reports = Vec::with_capacity(flops.len());
    let batch_start = Instant::now();

    for (i, raw) in flops.iter().enumerate() {
        let start = Instant::now();
        let flop = match normalize_flop(raw) {
            Ok(flop) => flop,
            Err(e) => {
                log::error!("[{}/{}] {}", i + 1, flops.len(), e);
                reports.push(SolveReport {
                    flop: raw.clone(),
                    dump: PathBuf::new(),
                    status: SolveStatus::Failed(e.to_string()),
                    elapsed: start.elapsed(),
                });
                continue;
            }
        };
        let dump = dump_path(&config.save_dir, script, &flop);

        let status = if !force && dump.exists() {
            log::info!("[{}/{}] {} already dumped, skipping", i + 1, flops.len(), flop);
            SolveStatus::Skipped
        } else {
            log::info!("[{}/{}] solving {}", i + 1, flops.len(), flop);
            match solve_flop(config, &script_commands(&text, &flop), &dump) {
                Ok(completion) => SolveStatus::Solved {
                    reason: completion.reason.to_string(),
                },
                Err(e) => {
                    log::error!("[{}/{}] {} failed: {}", i + 1, flops.len(), flop, e);
                    SolveStatus::Failed(e.to_string())
                }
            }
        };

        let solved_so_far = reports
            .iter()
            .filter(|r: &&SolveReport| matches!(r.status, SolveStatus::Solved { .. }))
            .count()
            + usize::from(matches!(status, SolveStatus::Solved { .. }));
        if solved_so_far > 0 {
            log::info!(
                "average {:.1}s per solved flop",
                batch_start.elapsed().as_secs_f64() / solved_so_far as f64
            );
        }
        reports.push(SolveReport {
            flop,
            dump,
            status,
            elapsed: start.elapsed(),
        });
    }
    Ok(reports)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
