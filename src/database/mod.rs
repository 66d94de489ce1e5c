pub mod error;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod session;

pub use error::{DbError, DbResult};
pub use manager::connect;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use session::{PodRepo, RoutingRepo, Session, SiteRepo, Store};
