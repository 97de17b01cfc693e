//! # Database Operations
//!
//! PostgreSQL connection pooling and the embedded schema migrations used by
//! [`crate::store::PgStepStore`].

pub mod connection;
pub mod migrator;

pub use connection::create_pool;
pub use migrator::{run_migrations, MIGRATOR};
