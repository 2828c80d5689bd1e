// crates/fitstore/src/lib.rs
// fitstore - versioned SQLite store with a self-verifying migration engine

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod db;
pub mod error;

pub use db::opener::{OpenOptions, OpenReport, OpenState, StoreHandle, StoreOpener, open_store};
pub use db::schema::{CURRENT_SCHEMA_VERSION, fitness_catalog};
pub use error::{FatalOpenError, FatalOpenKind, Result, StoreError};
