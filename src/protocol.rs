//! Shapes of the engine's per-node responses and their parsers.
//!
//! Every parser here works on the already-filtered line batch returned by a
//! synchronous call, so none of them touch the process.

use std::fmt;

use serde::Serialize;

use crate::error::{ExtractError, ExtractResult};

pub const CHILD_BLOCK_LINES: usize = 7;
pub const NODE_INFO_MIN_LINES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    #[serde(rename = "IP")]
    Ip,
    #[serde(rename = "OOP")]
    Oop,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Ip => "IP",
            Side::Oop => "OOP",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    IpDecision,
    OopDecision,
    Split,
    Other(String),
}

impl NodeKind {
    pub fn parse(s: &str) -> NodeKind {
        match s.trim() {
            "IP_DEC" => NodeKind::IpDecision,
            "OOP_DEC" => NodeKind::OopDecision,
            "SPLIT_NODE" => NodeKind::Split,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::IpDecision => "IP_DEC",
            NodeKind::OopDecision => "OOP_DEC",
            NodeKind::Split => "SPLIT_NODE",
            NodeKind::Other(s) => s,
        }
    }

    /// The side making a genuine decision here, if any.
    pub fn decision_side(&self) -> Option<Side> {
        match self {
            NodeKind::IpDecision => Some(Side::Ip),
            NodeKind::OopDecision => Some(Side::Oop),
            _ => None,
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, NodeKind::Split)
    }
}

/// Cumulative contributions: out-of-position, in-position, dead money.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pot {
    pub oop: f64,
    pub ip: f64,
    pub dead: f64,
}

impl Pot {
    pub fn new(oop: f64, ip: f64, dead: f64) -> Pot {
        Pot { oop, ip, dead }
    }

    pub fn parse(line: &str) -> Option<Pot> {
        let fields: Vec<f64> = line
            .split_whitespace()
            .map(|f| f.parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        match fields.as_slice() {
            [oop, ip, dead, ..] => Some(Pot::new(*oop, *ip, *dead)),
            _ => None,
        }
    }

    pub fn total(&self) -> f64 {
        self.oop + self.ip + self.dead
    }

    pub fn committed(&self, side: Side) -> f64 {
        match side {
            Side::Oop => self.oop,
            Side::Ip => self.ip,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub path: String,
    pub kind: NodeKind,
    pub board: String,
    pub pot_line: String,
    pub pot: Pot,
    pub child_count: usize,
}

impl NodeInfo {
    pub fn is_terminal(&self) -> bool {
        self.child_count == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChildNode {
    /// Position of the block in the response; aligns with strategy rows.
    pub ordinal: usize,
    /// Index the engine printed in the block header.
    pub index: usize,
    pub path: String,
    pub kind: NodeKind,
    pub board: String,
    pub pot_line: String,
    pub pot: Pot,
    pub child_count: usize,
    pub flag: String,
}

pub fn is_error_line(line: &str) -> bool {
    line.contains("ERROR")
}

/// Leading integer of a "N children" style line; unparsable counts read as 0.
fn leading_count(line: &str) -> usize {
    line.split_whitespace()
        .next()
        .and_then(|f| f.parse().ok())
        .unwrap_or(0)
}

pub fn parse_node_info(command: &str, path: &str, lines: &[String]) -> ExtractResult<NodeInfo> {
    if let Some(line) = lines.first().filter(|l| is_error_line(l)) {
        return Err(ExtractError::EngineError {
            command: command.to_string(),
            line: line.clone(),
        });
    }
    if lines.len() < NODE_INFO_MIN_LINES {
        return Err(ExtractError::parse(
            command,
            format!("expected at least {} lines, got {}", NODE_INFO_MIN_LINES, lines.len()),
        ));
    }

    let pot_line = lines[3].trim().to_string();
    let pot = Pot::parse(&pot_line)
        .ok_or_else(|| ExtractError::parse(command, format!("bad pot tuple '{}'", pot_line)))?;
    let child_count = lines
        .iter()
        .find(|l| l.contains("children"))
        .map(|l| leading_count(l))
        .unwrap_or(0);

    Ok(NodeInfo {
        path: path.to_string(),
        kind: NodeKind::parse(&lines[1]),
        board: lines[2].trim().to_string(),
        pot_line,
        pot,
        child_count,
    })
}

fn parse_child_block(ordinal: usize, block: &[String]) -> ExtractResult<ChildNode> {
    let command = "show_children";
    let header = block[0].trim();
    let index = header
        .strip_prefix("child")
        .and_then(|rest| rest.trim().strip_suffix(':'))
        .and_then(|n| n.trim().parse::<usize>().ok())
        .ok_or_else(|| ExtractError::parse(command, format!("bad child header '{}'", header)))?;

    let pot_line = block[4].trim().to_string();
    let pot = Pot::parse(&pot_line)
        .ok_or_else(|| ExtractError::parse(command, format!("bad child pot '{}'", pot_line)))?;

    Ok(ChildNode {
        ordinal,
        index,
        path: block[1].trim().to_string(),
        kind: NodeKind::parse(&block[2]),
        board: block[3].trim().to_string(),
        pot_line,
        pot,
        child_count: leading_count(&block[5]),
        flag: block[6].trim().to_string(),
    })
}

/// Splits a children response into fixed 7-line blocks. A block that fails
/// to parse yields an error in its slot so callers can skip just that child;
/// a trailing partial block is reported the same way.
pub fn parse_children(lines: &[String]) -> Vec<ExtractResult<ChildNode>> {
    lines
        .chunks(CHILD_BLOCK_LINES)
        .enumerate()
        .map(|(ordinal, block)| {
            if block.len() < CHILD_BLOCK_LINES {
                Err(ExtractError::parse(
                    "show_children",
                    format!("truncated block {} ({} lines)", ordinal, block.len()),
                ))
            } else {
                parse_child_block(ordinal, block)
            }
        })
        .collect()
}

/// Frequencies indexed `[action row][combination]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyTable {
    rows: Vec<Vec<f64>>,
}

impl StrategyTable {
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn frequency(&self, row: usize, combo: usize) -> f64 {
        self.rows
            .get(row)
            .and_then(|r| r.get(combo))
            .copied()
            .unwrap_or(0.0)
    }
}

/// `None` means "no frequency data": empty, or the engine answered with an error.
pub fn parse_strategy(lines: &[String]) -> Option<StrategyTable> {
    match lines.first() {
        None => return None,
        Some(first) if is_error_line(first) => return None,
        Some(_) => {}
    }
    let rows = lines
        .iter()
        .map(|line| {
            line.split_whitespace()
                .map(|tok| match tok.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => {
                        log::debug!("unparsable frequency '{}', using 0", tok);
                        0.0
                    }
                })
                .collect()
        })
        .collect();
    Some(StrategyTable { rows })
}

/// One value per combination; `None` for NaN markers or unparsable tokens.
pub fn parse_value_row(line: &str) -> Vec<Option<f64>> {
    line.split_whitespace()
        .map(|tok| {
            if tok.to_ascii_lowercase().contains("nan") {
                None
            } else {
                tok.parse::<f64>().ok()
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvRows {
    pub ev: Vec<Option<f64>>,
    pub matchup: Vec<Option<f64>>,
}

pub fn parse_ev(command: &str, lines: &[String]) -> ExtractResult<EvRows> {
    if let Some(line) = lines.iter().find(|l| is_error_line(l)) {
        return Err(ExtractError::EngineError {
            command: command.to_string(),
            line: line.clone(),
        });
    }
    match lines {
        [ev, matchup, ..] => Ok(EvRows {
            ev: parse_value_row(ev),
            matchup: parse_value_row(matchup),
        }),
        _ => Err(ExtractError::parse(
            command,
            format!("expected 2 lines, got {}", lines.len()),
        )),
    }
}

pub fn parse_equity(command: &str, lines: &[String]) -> ExtractResult<Vec<Option<f64>>> {
    match lines.first() {
        Some(line) if is_error_line(line) => Err(ExtractError::EngineError {
            command: command.to_string(),
            line: line.clone(),
        }),
        Some(line) => Ok(parse_value_row(line)),
        None => Err(ExtractError::parse(command, "empty response")),
    }
}
