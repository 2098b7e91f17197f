//! Recursive walk over the engine's decision tree.
//!
//! Each node costs a fixed sequence of queries: node info, children,
//! strategy, then (for a genuine decision) one EV query per child and one
//! equity query. Results are merged into one record per hole-card
//! combination, filtered, handed to the sink, and the walk descends into
//! every child that is not a split node.
//!
//! Structural problems with one node or one child are logged, counted and
//! skipped. Errors that leave the session unusable abort the whole walk.

use serde::Serialize;

use crate::action::label;
use crate::board_order::BoardTable;
use crate::config::Timeouts;
use crate::engine::{Engine, Queries};
use crate::error::ExtractResult;
use crate::hand_order::HandTable;
use crate::metrics::NodeMetrics;
use crate::path::is_root;
use crate::protocol::{ChildNode, NodeInfo, Side, StrategyTable};
use crate::record::{filter_records, ActionEntry, CombinationRecord};
use crate::sink::RecordSink;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub nodes_visited: usize,
    pub terminal_nodes: usize,
    pub failed_nodes: usize,
    pub skipped_children: usize,
    pub skipped_queries: usize,
    pub actions_filtered: usize,
    pub records_emitted: usize,
}

/// A child that parsed and could be labelled.
struct Edge {
    child: ChildNode,
    label: String,
}

pub struct Extractor<'a, E: Engine + ?Sized, S: RecordSink> {
    queries: Queries<'a, E>,
    hands: &'a HandTable,
    boards: &'a BoardTable,
    effective_stack: f64,
    sink: &'a mut S,
    stats: WalkStats,
}

/// Propagates errors that poison the session; anything else is logged,
/// counted and replaced by `None`.
macro_rules! tolerate {
    ($self:ident, $expr:expr, $what:expr) => {
        match $expr {
            Ok(v) => Some(v),
            Err(e) if e.poisons_session() => return Err(e),
            Err(e) => {
                log::warn!("{}: {}", $what, e);
                $self.stats.skipped_queries += 1;
                None
            }
        }
    };
}

impl<'a, E: Engine + ?Sized, S: RecordSink> Extractor<'a, E, S> {
    pub fn new(
        engine: &'a E,
        timeouts: &'a Timeouts,
        hands: &'a HandTable,
        boards: &'a BoardTable,
        effective_stack: f64,
        sink: &'a mut S,
    ) -> Self {
        Extractor {
            queries: Queries::new(engine, timeouts),
            hands,
            boards,
            effective_stack,
            sink,
            stats: WalkStats::default(),
        }
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Walks the subtree under `root`, opening a fresh output unit first.
    /// On error the sink is still finished and `stats()` reflects the
    /// partial walk.
    pub fn walk(&mut self, root: &str) -> ExtractResult<WalkStats> {
        if !is_root(root) {
            log::debug!("walking the subtree under {}", root);
        }
        self.sink.begin(root)?;
        let outcome = self.visit(root);
        let finished = self.sink.finish();
        if let Err(e) = outcome {
            if let Err(fe) = finished {
                log::warn!("finishing output after a failed walk: {}", fe);
            }
            return Err(e);
        }
        finished?;
        log::info!(
            "walked {}: {} nodes, {} records, {} actions filtered",
            root,
            self.stats.nodes_visited,
            self.stats.records_emitted,
            self.stats.actions_filtered
        );
        Ok(self.stats.clone())
    }

    fn visit(&mut self, path: &str) -> ExtractResult<()> {
        self.stats.nodes_visited += 1;
        let children = match self.expand(path) {
            Ok(children) => children,
            Err(e) if e.poisons_session() => return Err(e),
            Err(e) => {
                log::warn!("skipping node {}: {}", path, e);
                self.stats.failed_nodes += 1;
                return Ok(());
            }
        };
        for child in children.iter().filter(|c| !c.kind.is_split()) {
            self.visit(&child.path)?;
        }
        Ok(())
    }

    /// Extracts one node and returns the children to descend into.
    fn expand(&mut self, path: &str) -> ExtractResult<Vec<ChildNode>> {
        let info = self.queries.node_info(path)?;
        if info.is_terminal() {
            log::debug!("{} is terminal", path);
            self.stats.terminal_nodes += 1;
            return Ok(Vec::new());
        }

        let edges = self.edges(&info)?;
        if edges.is_empty() {
            log::warn!("{} declared {} children but none were usable", path, info.child_count);
            return Ok(Vec::new());
        }

        let children: Vec<ChildNode> = edges.iter().map(|e| e.child.clone()).collect();
        let strategy = tolerate!(self, self.queries.strategy(path), format!("strategy for {}", path))
            .flatten();
        let Some(table) = strategy else {
            log::warn!("no strategy data for {}, no records", path);
            return Ok(children);
        };
        // Rows run in child order; the first child past the table ends the actions.
        let covered = edges
            .iter()
            .take_while(|e| e.child.ordinal < table.rows())
            .count();
        if covered < edges.len() {
            log::warn!("{}: {} strategy rows for {} children", path, table.rows(), info.child_count);
        }
        let edges = &edges[..covered];

        let mut records = self.seed_records(&info, edges, &table);
        match info.kind.decision_side() {
            Some(side) => self.merge_values(side, path, edges, &mut records)?,
            None => log::debug!("{} is {}, no EV or equity", path, info.kind.as_str()),
        }

        let (kept, dropped) = filter_records(records);
        self.stats.actions_filtered += dropped;
        if !kept.is_empty() {
            self.sink.append(path, &kept)?;
            self.stats.records_emitted += kept.len();
        }
        log::debug!("{}: {} records kept, {} actions dropped", path, kept.len(), dropped);

        Ok(children)
    }

    fn edges(&mut self, info: &NodeInfo) -> ExtractResult<Vec<Edge>> {
        let mut edges = Vec::new();
        for parsed in self.queries.children(&info.path)? {
            let child = match parsed {
                Ok(child) => child,
                Err(e) => {
                    log::warn!("{}: skipping child: {}", info.path, e);
                    self.stats.skipped_children += 1;
                    continue;
                }
            };
            match label(&info.pot, &child.path, &child.pot) {
                Ok(l) => edges.push(Edge {
                    child,
                    label: l.to_string(),
                }),
                Err(e) => {
                    log::warn!("{}: skipping child {}: {}", info.path, child.path, e);
                    self.stats.skipped_children += 1;
                }
            }
        }
        Ok(edges)
    }

    /// One record per combination, carrying every action with its frequency.
    fn seed_records(
        &self,
        info: &NodeInfo,
        edges: &[Edge],
        strategy: &StrategyTable,
    ) -> Vec<CombinationRecord> {
        let metrics = NodeMetrics::compute(&info.pot, &info.path, self.effective_stack);
        let board_id = self.boards.index(&info.board);
        if board_id.is_none() {
            log::debug!("no board index for '{}'", info.board);
        }

        self.hands
            .order()
            .iter()
            .enumerate()
            .map(|(combo, hand)| {
                let mut record = CombinationRecord::new(
                    &info.path,
                    info.kind.as_str(),
                    &info.board,
                    board_id,
                    hand,
                    combo,
                    &info.pot_line,
                    &metrics,
                );
                record.actions = edges
                    .iter()
                    .map(|edge| {
                        let freq = strategy.frequency(edge.child.ordinal, combo);
                        ActionEntry::new(&edge.child.path, &edge.label, freq)
                    })
                    .collect();
                record
            })
            .collect()
    }

    fn merge_values(
        &mut self,
        side: Side,
        path: &str,
        edges: &[Edge],
        records: &mut [CombinationRecord],
    ) -> ExtractResult<()> {
        for edge in edges {
            let target = &edge.child.path;
            let Some(rows) = tolerate!(self, self.queries.ev(side, target), format!("EV for {}", target))
            else {
                continue;
            };
            for (combo, record) in records.iter_mut().enumerate() {
                let (Some(Some(ev)), Some(Some(matchup))) = (rows.ev.get(combo), rows.matchup.get(combo))
                else {
                    continue;
                };
                if let Some(action) = record.action_mut(target) {
                    action.ev = *ev;
                    action.matchup = *matchup;
                }
            }
        }

        if let Some(equity) = tolerate!(self, self.queries.equity(side, path), format!("equity for {}", path)) {
            for (record, eq) in records.iter_mut().zip(equity) {
                let Some(eq) = eq else { continue };
                for action in &mut record.actions {
                    action.eq = eq;
                }
            }
        }
        Ok(())
    }
}
