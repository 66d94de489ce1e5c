pub mod config;
pub mod context;
pub mod database;
pub mod logging;
pub mod services;

pub use context::{Context, IdentityClaims};
pub use database::{DbError, DbResult};

#[cfg(test)]
pub mod testing;
