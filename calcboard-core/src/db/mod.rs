//! Database layer for calcboard
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Owner-scoped calculation storage
//! - User and bearer token records

pub mod repo;
pub mod schema;

pub use repo::Database;
