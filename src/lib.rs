//! ledgerflow
//!
//! Fachada del workspace:
//! - re-exporta `ledger_core` (motor de aprobaciones y contabilización) y
//!   `ledger_documents` (documentos y mapeo de cuentas);
//! - `config`: configuración de la aplicación desde .env;
//! - `logging`: inicialización de `tracing-subscriber` para binarios.
//!
//! Con el feature `pg_demo` también re-exporta `ledger_persistence`.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, CONFIG};
pub use error::AppError;
pub use ledger_core;
pub use ledger_documents;
#[cfg(feature = "pg_demo")]
pub use ledger_persistence;
pub use logging::init_logging;
