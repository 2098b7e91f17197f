use std::collections::HashSet;
use std::time::Duration;

use itertools::Itertools;

use upi_extract::board_order::*;
use upi_extract::config::Timeouts;
use upi_extract::engine::Engine;
use upi_extract::error::{ExtractError, ExtractResult};
use upi_extract::hand_order::*;

#[test]
fn test_board_count() {
    let boards = BoardOrder::new();
    let table = boards.ensure_built();
    assert_eq!(table.len(), BOARD_COUNT);
    let unique: HashSet<&String> = table.order().iter().collect();
    assert_eq!(unique.len(), BOARD_COUNT);
}

#[test]
fn test_board_permutations_share_index() {
    let boards = BoardOrder::new();
    let table = boards.ensure_built();
    let cards = ["Ah", "Kd", "2c"];
    let expected = table.index("Ah Kd 2c").unwrap();
    for perm in cards.iter().permutations(3) {
        let spaced = perm.iter().join(" ");
        let packed = perm.iter().join("");
        assert_eq!(table.index(&spaced), Some(expected), "{}", spaced);
        assert_eq!(table.index(&packed), Some(expected), "{}", packed);
    }
    assert_eq!(table.canonical("2cAhKd").as_deref(), Some("Ah Kd 2c"));
    assert_eq!(table.board(expected), Some("Ah Kd 2c"));
}

#[test]
fn test_board_rejects_non_flops() {
    let boards = BoardOrder::new();
    let table = boards.ensure_built();
    assert_eq!(table.index("Ah Kd"), None);
    assert_eq!(table.index("Ah Kd 2c 3s"), None);
    assert_eq!(table.index("Ah Ah 2c"), None);
    assert_eq!(table.index("Zz Kd 2c"), None);
}

#[test]
fn test_board_order_built_once() {
    let boards = BoardOrder::new();
    assert!(boards.get().is_none());
    let first = boards.ensure_built() as *const BoardTable;
    let second = boards.ensure_built() as *const BoardTable;
    assert_eq!(first, second);
}

#[test]
fn test_hand_index_ignores_card_order() {
    let table = HandTable::from_tokens(["AhKd", "2c2d", "Qs9h"]).unwrap();
    assert_eq!(table.index("AhKd"), Some(0));
    assert_eq!(table.index("KdAh"), Some(0));
    assert_eq!(table.index("2d2c"), Some(1));
    assert_eq!(table.index("9hQs"), Some(2));
    assert_eq!(table.index("AsKs"), None);
}

#[test]
fn test_hand_table_rejects_duplicates_and_empty() {
    assert!(HandTable::from_tokens(["AhKd", "KdAh"]).is_err());
    assert!(HandTable::from_tokens(Vec::<String>::new()).is_err());
}

struct CountingEngine {
    calls: std::cell::Cell<usize>,
    fail_first: bool,
}

impl Engine for CountingEngine {
    fn call(&self, command: &str, _timeout: Duration) -> ExtractResult<Vec<String>> {
        assert_eq!(command, "show_hand_order");
        let n = self.calls.get();
        self.calls.set(n + 1);
        if self.fail_first && n == 0 {
            return Err(ExtractError::parse(command, "empty response"));
        }
        Ok(vec!["AhKd 2c2d Qs9h".to_string()])
    }
}

#[test]
fn test_hand_order_queries_engine_once() {
    let engine = CountingEngine {
        calls: std::cell::Cell::new(0),
        fail_first: false,
    };
    let hands = HandOrder::new();
    let timeouts = Timeouts::default();
    assert_eq!(hands.ensure_built(&engine, &timeouts).unwrap().len(), 3);
    assert_eq!(hands.ensure_built(&engine, &timeouts).unwrap().len(), 3);
    assert_eq!(engine.calls.get(), 1);
}

#[test]
fn test_failed_hand_order_build_can_retry() {
    let engine = CountingEngine {
        calls: std::cell::Cell::new(0),
        fail_first: true,
    };
    let hands = HandOrder::new();
    let timeouts = Timeouts::default();
    assert!(hands.ensure_built(&engine, &timeouts).is_err());
    assert!(hands.get().is_none());
    assert_eq!(hands.ensure_built(&engine, &timeouts).unwrap().order()[2], "Qs9h");
}
