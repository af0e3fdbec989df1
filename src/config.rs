//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone una estructura
//! inmutable (`CONFIG`).
use std::env;

use ledger_core::EngineConfig;
use once_cell::sync::Lazy;

/// Configuración global de la aplicación.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Parámetros del motor (`LEDGER_*`).
    pub engine: EngineConfig,
    /// `DATABASE_URL`, si existe; sin ella sólo corre el backend en memoria.
    pub database_url: Option<String>,
    /// Filtro de logs por defecto cuando `RUST_LOG` no está definida.
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        ledger_core::config::init_dotenv();
        Self { engine: EngineConfig::from_env(),
               database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
               log_filter: env::var("LEDGERFLOW_LOG").unwrap_or_else(|_| "info".to_string()) }
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
