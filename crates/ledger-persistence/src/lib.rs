//! ledger-persistence
//!
//! Backend Postgres (Diesel + r2d2) del contrato `WorkflowStore` /
//! `UnitOfWork` de `ledger-core`, con paridad de comportamiento respecto al
//! backend en memoria.
//!
//! Módulos:
//! - `pg`: pool, proveedor de conexiones, reintentos y `PgWorkflowStore`.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgPool, PgWorkflowStore, PoolProvider};
