//! Database module: row models and SQL repositories.
//!
//! - `model`: row shapes returned by queries.
//! - `repo`: SQL-only functions over the `posts` table.
//! - `store`: the `PostStore` implementation backed by a SQLite pool.

pub mod model;
pub mod repo;
pub mod store;

pub use repo::*;

pub use model::{StoredPost, WindowRow};
pub use store::SqlitePostStore;
