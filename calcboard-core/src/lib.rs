//! # calcboard-core
//!
//! Core library for calcboard - per-user arithmetic history and statistics.
//!
//! This library provides:
//! - Domain types for calculations, users and tokens
//! - The arithmetic engine that derives every calculation's result
//! - Owner-scoped calculation storage, with a SQLite implementation
//! - History and statistics aggregation
//! - Registration, login and bearer token resolution
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use calcboard_core::{analytics, calculations, Config, Database, NewCalculation};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let request = NewCalculation {
//!     operation: "division".to_string(),
//!     inputs: vec![100.0, 2.0, 5.0],
//! };
//! let calc = calculations::create_calculation(&db, "user-id", &request).unwrap();
//! assert_eq!(calc.result, 10.0);
//!
//! let summary = analytics::user_summary(&db, "user-id").unwrap();
//! println!("{} calculations", summary.total_calculations);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use store::{CalculationQuery, CalculationStore, SortOrder};
pub use types::*;

// Public modules
pub mod analytics;
pub mod arithmetic;
pub mod auth;
pub mod calculations;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod store;
pub mod types;
