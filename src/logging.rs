use tracing_subscriber::EnvFilter;

use crate::CONFIG;

/// Instala el subscriber `fmt` con filtro de `RUST_LOG` (o `LEDGERFLOW_LOG`).
/// Los registros del facade `log` llegan por el puente `tracing-log`.
///
/// Devuelve `false` si ya había un subscriber global.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&CONFIG.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter)
                             .with_target(true)
                             .try_init()
                             .is_ok()
}
