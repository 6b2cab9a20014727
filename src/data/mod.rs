//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Row models and partial-update types

mod database;
mod models;

pub use database::{
    ALREADY_REGISTERED, Database, VOTE_ALREADY_RECORDED, VoteOutcome, WHATSAPP_ALREADY_USED,
};
pub use models::*;

#[cfg(test)]
mod database_test;
