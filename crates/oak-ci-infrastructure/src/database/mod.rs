//! SQLite-backed [`oak_ci_domain::ports::ActivityStore`] (spec.md §4.5).

mod backup;
mod migrations;
mod rows;
mod sqlite_store;

pub use sqlite_store::SqliteActivityStore;
