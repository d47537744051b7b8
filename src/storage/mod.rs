//! Storage layer.
//!
//! Two engines satisfy one async contract ([`StorageEngine`]):
//! - **Memory**: a concurrent in-process map ([`InMemoryEngine`])
//! - **Relational**: a `SQLite` database ([`RelationalEngine`])
//!
//! [`PersistenceSwitch`] owns both and hands out the active one per call.

// Allow significant_drop_tightening - dropping connections and map guards
// slightly early provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow cast_possible_truncation for usize/u64 conversions of counts.
#![allow(clippy::cast_possible_truncation)]

mod dataset;
mod memory;
mod metrics;
mod relational;
mod switch;
mod traits;

pub use dataset::{ParsedCards, UNKNOWN_NAME, parse_cards_csv, parse_cards_reader};
pub use memory::InMemoryEngine;
pub use relational::RelationalEngine;
pub use switch::{Engine, PersistenceMode, PersistenceSwitch};
pub use traits::{CardFilter, StorageEngine, sort_by_name};
