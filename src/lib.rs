pub mod action;
pub mod batch;
pub mod board_order;
pub mod cards;
pub mod cli;
pub mod completion;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod extract;
pub mod hand_order;
pub mod logging;
pub mod metrics;
pub mod path;
pub mod protocol;
pub mod record;
pub mod sink;
pub mod transport;
