//! Data models for cardvault.
//!
//! This module contains the card record and the query result envelope.

mod card;
mod query;

pub use card::{Card, CardId, MAX_NAME_LEN, RARITIES};
pub use query::{QueryResult, RouterKind};
