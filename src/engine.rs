//! The command surface the extraction code needs from an engine, and typed
//! wrappers for each query it issues.

use std::path::Path;
use std::time::Duration;

use crate::config::Timeouts;
use crate::error::{ExtractError, ExtractResult};
use crate::protocol::{
    parse_children, parse_equity, parse_ev, parse_node_info, parse_strategy, ChildNode, EvRows,
    NodeInfo, Side, StrategyTable,
};

/// Anything that answers one command with a batch of response lines.
pub trait Engine {
    fn call(&self, command: &str, timeout: Duration) -> ExtractResult<Vec<String>>;
}

pub struct Queries<'a, E: Engine + ?Sized> {
    engine: &'a E,
    timeouts: &'a Timeouts,
}

impl<'a, E: Engine + ?Sized> Queries<'a, E> {
    pub fn new(engine: &'a E, timeouts: &'a Timeouts) -> Self {
        Queries { engine, timeouts }
    }

    pub fn is_ready(&self) -> ExtractResult<bool> {
        let lines = self.engine.call("is_ready", self.timeouts.ready())?;
        Ok(lines.iter().any(|l| l.trim() == "is_ready ok!"))
    }

    pub fn load_tree(&self, tree: &Path) -> ExtractResult<Vec<String>> {
        let command = format!("load_tree {}", tree.display());
        let lines = self.engine.call(&command, self.timeouts.load_tree())?;
        if let Some(line) = lines.iter().find(|l| l.contains("ERROR")) {
            return Err(ExtractError::EngineError {
                command,
                line: line.clone(),
            });
        }
        Ok(lines)
    }

    pub fn effective_stack(&self) -> ExtractResult<f64> {
        let command = "show_effective_stack";
        let lines = self.engine.call(command, self.timeouts.effective_stack())?;
        let first = lines
            .first()
            .ok_or_else(|| ExtractError::parse(command, "empty response"))?;
        first
            .trim()
            .parse::<f64>()
            .map_err(|_| ExtractError::parse(command, format!("not a number: '{}'", first)))
    }

    pub fn hand_order(&self) -> ExtractResult<Vec<String>> {
        let command = "show_hand_order";
        let lines = self.engine.call(command, self.timeouts.hand_order())?;
        let first = lines
            .first()
            .ok_or_else(|| ExtractError::parse(command, "empty response"))?;
        Ok(first.split_whitespace().map(str::to_string).collect())
    }

    pub fn node_info(&self, path: &str) -> ExtractResult<NodeInfo> {
        let command = format!("show_node {}", path);
        let lines = self.engine.call(&command, self.timeouts.node())?;
        parse_node_info(&command, path, &lines)
    }

    pub fn children(&self, path: &str) -> ExtractResult<Vec<ExtractResult<ChildNode>>> {
        let command = format!("show_children {}", path);
        let lines = self.engine.call(&command, self.timeouts.node())?;
        Ok(parse_children(&lines))
    }

    /// `Ok(None)` when the engine has no usable table for this node.
    pub fn strategy(&self, path: &str) -> ExtractResult<Option<StrategyTable>> {
        let command = format!("show_strategy {}", path);
        let lines = self.engine.call(&command, self.timeouts.strategy())?;
        Ok(parse_strategy(&lines))
    }

    pub fn ev(&self, side: Side, child: &str) -> ExtractResult<EvRows> {
        let command = format!("calc_ev {} {}", side, child);
        let lines = self.engine.call(&command, self.timeouts.ev())?;
        parse_ev(&command, &lines)
    }

    pub fn equity(&self, side: Side, node: &str) -> ExtractResult<Vec<Option<f64>>> {
        let command = format!("calc_eq_node {} {}", side, node);
        let lines = self.engine.call(&command, self.timeouts.ev())?;
        parse_equity(&command, &lines)
    }

    pub fn set_accuracy(&self, accuracy: f64) -> ExtractResult<Vec<String>> {
        let command = format!("set_accuracy {}", accuracy);
        self.engine.call(&command, self.timeouts.accuracy())
    }

    pub fn run_script_line(&self, line: &str) -> ExtractResult<Vec<String>> {
        self.engine.call(line, self.timeouts.script())
    }
}
