//! Configuración del motor desde variables de entorno (.env opcional).

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::constants::{DEFAULT_NUMBERING_RETRIES, JOURNAL_COUNTER_KEY};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Reintentos acotados ante `NumberingConflict`.
    pub numbering_retries: u32,
    /// Clave del contador de asientos.
    pub journal_key: String,
    /// Moneda base del libro (los asientos se registran en ella).
    pub base_currency_id: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { numbering_retries: DEFAULT_NUMBERING_RETRIES,
               journal_key: JOURNAL_COUNTER_KEY.to_string(),
               base_currency_id: 1 }
    }
}

impl EngineConfig {
    /// Lee `LEDGER_NUMBERING_RETRIES`, `LEDGER_JOURNAL_KEY` y
    /// `LEDGER_BASE_CURRENCY_ID`; los valores ausentes o inválidos caen al
    /// default.
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        let numbering_retries = env::var("LEDGER_NUMBERING_RETRIES").ok()
                                                                     .and_then(|v| v.parse().ok())
                                                                     .unwrap_or(defaults.numbering_retries);
        let journal_key = env::var("LEDGER_JOURNAL_KEY").ok()
                                                         .filter(|v| !v.trim().is_empty())
                                                         .unwrap_or(defaults.journal_key);
        let base_currency_id = env::var("LEDGER_BASE_CURRENCY_ID").ok()
                                                                  .and_then(|v| v.parse().ok())
                                                                  .unwrap_or(defaults.base_currency_id);
        Self { numbering_retries,
               journal_key,
               base_currency_id }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
