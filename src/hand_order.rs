//! Canonical index of every two-card hole combination, in the engine's own
//! order. Strategy, EV and equity rows are positional against this order, so
//! it is always fetched from the engine rather than computed locally.

use std::collections::HashMap;

use once_cell::sync::OnceCell;

use crate::cards::{hand_key, parse_cards};
use crate::config::Timeouts;
use crate::engine::{Engine, Queries};
use crate::error::{ExtractError, ExtractResult};

pub const HAND_COUNT: usize = 1326;

/// Lookup key that ignores the order of the two cards.
fn lookup_key(hand: &str) -> String {
    match parse_cards(hand) {
        Ok(cards) if cards.len() == 2 => hand_key(&cards),
        _ => hand.trim().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct HandTable {
    order: Vec<String>,
    idx: HashMap<String, usize>,
}

impl HandTable {
    pub fn from_tokens<I, S>(tokens: I) -> ExtractResult<HandTable>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if order.is_empty() {
            return Err(ExtractError::parse("show_hand_order", "no hands returned"));
        }
        if order.len() != HAND_COUNT {
            log::warn!("hand order has {} entries, expected {}", order.len(), HAND_COUNT);
        }

        let mut idx = HashMap::with_capacity(order.len());
        for (i, hand) in order.iter().enumerate() {
            if idx.insert(lookup_key(hand), i).is_some() {
                return Err(ExtractError::parse(
                    "show_hand_order",
                    format!("duplicate hand '{}'", hand),
                ));
            }
        }
        Ok(HandTable { order, idx })
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

    pub fn index(&self, hand: &str) -> Option<usize> {
        self.idx.get(&lookup_key(hand)).copied()
    }
}

/// Build-once holder for the hand table; safe to share between sessions.
#[derive(Debug, Default)]
pub struct HandOrder {
    table: OnceCell<HandTable>,
}

impl HandOrder {
    pub fn new() -> HandOrder {
        HandOrder::default()
    }

    /// Queries the engine on the first successful call only. A failed build
    /// leaves the holder empty so a later call can retry.
    pub fn ensure_built<E: Engine + ?Sized>(
        &self,
        engine: &E,
        timeouts: &Timeouts,
    ) -> ExtractResult<&HandTable> {
        self.table.get_or_try_init(|| {
            let tokens = Queries::new(engine, timeouts).hand_order()?;
            let table = HandTable::from_tokens(tokens)?;
            log::info!("hand order loaded ({} combinations)", table.len());
            Ok(table)
        })
    }

    pub fn get(&self) -> Option<&HandTable> {
        self.table.get()
    }
}
