//! Per-node statistics that depend only on the pot tuple, the node path and
//! the effective starting stack, never on a particular hole-card combination.

use crate::path::{actions, bet_amount, is_aggressive, last_token, ROOT_PREFIX};
use crate::protocol::{Pot, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeMetrics {
    pub stack_depth: f64,
    pub spr: f64,
    pub bet_pct: f64,
    pub position: Side,
    pub aggression: u32,
}

impl NodeMetrics {
    pub fn compute(pot: &Pot, path: &str, effective_stack: f64) -> NodeMetrics {
        NodeMetrics {
            stack_depth: stack_depth(pot, effective_stack),
            spr: spr(pot, effective_stack),
            bet_pct: last_bet_fraction(pot, path),
            position: acting_position(path),
            aggression: aggression_count(path),
        }
    }
}

/// Smaller of the two remaining stacks.
pub fn stack_depth(pot: &Pot, effective_stack: f64) -> f64 {
    (effective_stack - pot.oop).min(effective_stack - pot.ip)
}

pub fn spr(pot: &Pot, effective_stack: f64) -> f64 {
    let total = pot.total();
    let remaining = effective_stack - pot.oop.max(pot.ip);
    if total > 0.0 && remaining > 0.0 {
        remaining / total
    } else {
        0.0
    }
}

/// Size of the bet that led here, as a fraction of the pot before it.
///
/// Only the node's own pot is known, so the bettor is taken to have matched
/// the opponent (the smaller contribution) before betting to `b<amount>`.
pub fn last_bet_fraction(pot: &Pot, path: &str) -> f64 {
    let Some(amount) = bet_amount(last_token(path)) else {
        return 0.0;
    };
    let opponent = pot.oop.min(pot.ip);
    let pot_before = pot.dead + 2.0 * opponent;
    if pot_before <= 0.0 {
        return 0.0;
    }
    (amount as f64 - opponent) / pot_before
}

/// Bets and raises on the path after the root prefix.
pub fn aggression_count(path: &str) -> u32 {
    actions(path)
        .map(|tokens| tokens.iter().filter(|t| is_aggressive(t)).count() as u32)
        .unwrap_or(0)
}

/// Side to act, assuming out-of-position acts first on the street and the
/// turn alternates with every prior action.
pub fn acting_position(path: &str) -> Side {
    match actions(path) {
        None => {
            log::warn!("node '{}' lacks the '{}' prefix, attributing to IP", path, ROOT_PREFIX);
            Side::Ip
        }
        Some(tokens) if tokens.len() % 2 == 1 => Side::Ip,
        Some(_) => Side::Oop,
    }
}
