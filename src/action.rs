//! Human-readable labels for the edges out of a decision node.
//!
//! The engine only names an edge by its path token (`f`, `c`, `b<n>`), so
//! bet and raise sizes are recovered by comparing the parent's and the
//! child's cumulative contributions.

use std::fmt;

use crate::error::{ExtractError, ExtractResult};
use crate::path::{bet_amount, last_token};
use crate::protocol::{Pot, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLabel {
    Fold,
    Check,
    Call,
    /// First bet in the subtree, as a whole percent of the pot before it.
    Bet(i64),
    /// Raise increment as a whole percent of the pot after calling.
    Raise(i64),
}

impl ActionLabel {
    pub fn is_fold(&self) -> bool {
        matches!(self, ActionLabel::Fold)
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionLabel::Fold => write!(f, "fold"),
            ActionLabel::Check => write!(f, "check"),
            ActionLabel::Call => write!(f, "call"),
            ActionLabel::Bet(pct) => write!(f, "bet {}%", pct),
            ActionLabel::Raise(pct) => write!(f, "raise {}%", pct),
        }
    }
}

/// Exact halves go to the even neighbour, so 62.5 reads as 62.
fn whole_percent(fraction: f64) -> i64 {
    (fraction * 100.0).round_ties_even() as i64
}

/// Derives the label for the edge leading to `child_path`.
pub fn label(parent: &Pot, child_path: &str, child: &Pot) -> ExtractResult<ActionLabel> {
    let token = last_token(child_path);
    match token {
        "f" => return Ok(ActionLabel::Fold),
        "c" if parent.oop == parent.ip => return Ok(ActionLabel::Check),
        "c" => return Ok(ActionLabel::Call),
        _ => {}
    }
    if bet_amount(token).is_none() {
        return Err(ExtractError::UnrecognizedAction(token.to_string()));
    }

    let actor = if child.ip != parent.ip { Side::Ip } else { Side::Oop };
    let opponent = match actor {
        Side::Ip => Side::Oop,
        Side::Oop => Side::Ip,
    };
    let old_cum = parent.committed(actor);
    let new_cum = child.committed(actor);
    let opp_cum = parent.committed(opponent);
    let pot_before = parent.total();

    if opp_cum == old_cum {
        if pot_before <= 0.0 {
            return Err(ExtractError::parse(child_path, "bet into an empty pot"));
        }
        return Ok(ActionLabel::Bet(whole_percent((new_cum - old_cum) / pot_before)));
    }

    let call_amount = opp_cum - old_cum;
    let pot_after_call = pot_before + call_amount;
    if pot_after_call <= 0.0 {
        return Err(ExtractError::parse(child_path, "raise into an empty pot"));
    }
    let raise_increment = new_cum - old_cum - call_amount;
    Ok(ActionLabel::Raise(whole_percent(raise_increment / pot_after_call)))
}
