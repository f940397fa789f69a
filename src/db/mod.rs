//! Database module: image metadata rows and their SQLite storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and the listing filter
//! - `schema.rs`: SQL DDL for initializing the database
//! - `sqlite.rs`: the `ImageStorage` repository

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{ImageFilter, ImageRecord, NewImage, ResponseFormat};
pub use schema::SQLITE_INIT;
pub use sqlite::{ImageStorage, SqlitePool};
