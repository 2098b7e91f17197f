//! Canonical index of every three-card board.
//!
//! All 52C3 = 22,100 boards are enumerated locally, each written strongest
//! card first ("Ah Kd 2c"), and the list is sorted so indices are stable
//! across runs. Any permutation of the same three cards maps to the same
//! string and therefore the same index.

use std::collections::HashMap;

use itertools::Itertools;
use once_cell::sync::OnceCell;

use crate::cards::{board_key, full_deck, parse_cards};

pub const BOARD_COUNT: usize = 22_100;

/// A built board table. Immutable; share it by reference.
#[derive(Debug)]
pub struct BoardTable {
    order: Vec<String>,
    idx: HashMap<String, usize>,
}

impl BoardTable {
    fn build() -> BoardTable {
        let mut order: Vec<String> = full_deck()
            .into_iter()
            .combinations(3)
            .map(|cards| board_key(&cards))
            .collect();
        order.sort();

        let idx = order
            .iter()
            .enumerate()
            .map(|(i, board)| (board.clone(), i))
            .collect();
        BoardTable { order, idx }
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Canonical form of a three-card board, or `None` if it is not one.
    pub fn canonical(&self, board: &str) -> Option<String> {
        let cards = parse_cards(board).ok()?;
        if cards.len() != 3 || cards.iter().duplicates().next().is_some() {
            return None;
        }
        Some(board_key(&cards))
    }

    pub fn index(&self, board: &str) -> Option<usize> {
        let key = self.canonical(board)?;
        self.idx.get(&key).copied()
    }

    pub fn board(&self, id: usize) -> Option<&str> {
        self.order.get(id).map(String::as_str)
    }
}

/// Build-once holder for the board table.
#[derive(Debug, Default)]
pub struct BoardOrder {
    table: OnceCell<BoardTable>,
}

impl BoardOrder {
    pub fn new() -> BoardOrder {
        BoardOrder::default()
    }

    /// Builds the table on the first call; later calls return the same table.
    pub fn ensure_built(&self) -> &BoardTable {
        self.table.get_or_init(|| {
            let table = BoardTable::build();
            log::debug!("built board order ({} boards)", table.len());
            table
        })
    }

    pub fn get(&self) -> Option<&BoardTable> {
        self.table.get()
    }
}
