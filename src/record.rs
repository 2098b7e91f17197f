use serde::{Serialize, Serializer};

use crate::metrics::NodeMetrics;
use crate::protocol::Side;

pub const FOLD: &str = "fold";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEntry {
    pub child: String,
    pub label: String,
    pub freq: f64,
    pub ev: f64,
    pub eq: f64,
    pub matchup: f64,
}

impl ActionEntry {
    pub fn new(child: &str, label: &str, freq: f64) -> ActionEntry {
        ActionEntry {
            child: child.to_string(),
            label: label.to_string(),
            freq,
            ev: 0.0,
            eq: 0.0,
            matchup: 0.0,
        }
    }

    pub fn is_fold(&self) -> bool {
        self.label == FOLD
    }

    /// Frequency, EV and equity are all zero, NaN or infinite.
    fn carries_nothing(&self) -> bool {
        let blank = |v: f64| v == 0.0 || !v.is_finite();
        blank(self.freq) && blank(self.ev) && blank(self.eq)
    }

    pub fn is_valid(&self) -> bool {
        if self.carries_nothing() {
            return false;
        }
        !(self.ev * self.matchup == 0.0 && !self.is_fold())
    }
}

fn four_places<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.4}", value))
}

/// One hole-card combination at one decision node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationRecord {
    pub node: String,
    pub actor: String,
    pub board: String,
    pub board_id: Option<usize>,
    pub hand: String,
    pub combo_id: usize,
    pub actions: Vec<ActionEntry>,
    pub pot_info: String,
    pub stack_depth: f64,
    #[serde(serialize_with = "four_places")]
    pub spr: f64,
    #[serde(serialize_with = "four_places")]
    pub bet_pct: f64,
    pub ip_or_oop: Side,
    pub bet_level: u32,
}

impl CombinationRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: &str,
        actor: &str,
        board: &str,
        board_id: Option<usize>,
        hand: &str,
        combo_id: usize,
        pot_info: &str,
        metrics: &NodeMetrics,
    ) -> CombinationRecord {
        CombinationRecord {
            node: node.to_string(),
            actor: actor.to_string(),
            board: board.to_string(),
            board_id,
            hand: hand.to_string(),
            combo_id,
            actions: Vec::new(),
            pot_info: pot_info.to_string(),
            stack_depth: metrics.stack_depth,
            spr: metrics.spr,
            bet_pct: metrics.bet_pct,
            ip_or_oop: metrics.position,
            bet_level: metrics.aggression,
        }
    }

    pub fn action_mut(&mut self, child: &str) -> Option<&mut ActionEntry> {
        self.actions.iter_mut().find(|a| a.child == child)
    }

    /// Drops invalid actions and returns how many were removed.
    pub fn retain_valid_actions(&mut self) -> usize {
        let before = self.actions.len();
        self.actions.retain(ActionEntry::is_valid);
        before - self.actions.len()
    }

    /// A record is worth emitting when something other than a lone fold survives.
    pub fn is_worth_keeping(&self) -> bool {
        match self.actions.as_slice() {
            [] => false,
            [only] => !only.is_fold(),
            _ => true,
        }
    }
}

/// Filters every record in place and returns the survivors together with
/// the number of actions dropped.
pub fn filter_records(records: Vec<CombinationRecord>) -> (Vec<CombinationRecord>, usize) {
    let mut dropped = 0;
    let kept = records
        .into_iter()
        .filter_map(|mut record| {
            dropped += record.retain_valid_actions();
            record.is_worth_keeping().then_some(record)
        })
        .collect();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, freq: f64, ev: f64, eq: f64, matchup: f64) -> ActionEntry {
        ActionEntry {
            ev,
            eq,
            matchup,
            ..ActionEntry::new("r:0:x", label, freq)
        }
    }

    #[test]
    fn blank_action_is_invalid() {
        assert!(!entry("check", 0.0, f64::NAN, 0.0, 1.0).is_valid());
    }

    #[test]
    fn nan_frequency_counts_as_blank() {
        assert!(!entry("fold", f64::NAN, 0.0, 0.0, 1.0).is_valid());
        assert!(entry("fold", f64::NAN, 0.0, 0.4, 1.0).is_valid());
    }

    #[test]
    fn zero_ev_only_valid_for_fold() {
        assert!(!entry("call", 0.4, 0.0, 0.3, 1.0).is_valid());
        assert!(entry("fold", 0.4, 0.0, 0.3, 1.0).is_valid());
        assert!(!entry("bet 50%", 0.4, 2.0, 0.3, 0.0).is_valid());
    }

    #[test]
    fn lone_fold_not_worth_keeping() {
        let metrics = NodeMetrics {
            stack_depth: 100.0,
            spr: 1.0,
            bet_pct: 0.0,
            position: Side::Oop,
            aggression: 0,
        };
        let mut record = CombinationRecord::new("r:0", "OOP_DEC", "Ah Kd 2c", Some(0), "AsAc", 0, "0 0 60", &metrics);
        record.actions = vec![entry("fold", 0.2, 0.0, 0.5, 1.0)];
        assert!(!record.is_worth_keeping());
        record.actions.push(entry("call", 0.8, 1.0, 0.5, 1.0));
        assert!(record.is_worth_keeping());
    }
}
