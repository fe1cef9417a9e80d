//! Data layer module
//!
//! Handles user record persistence:
//! - `UserStore` trait (the record-store seam)
//! - SQLite database
//! - In-memory store (volatile)

mod database;
mod memory;
mod models;
mod store;

pub use database::Database;
pub use memory::MemoryStore;
pub use models::*;
pub use store::UserStore;
