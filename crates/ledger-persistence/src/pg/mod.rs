//! Implementación Postgres (Diesel) del contrato de almacenamiento del motor.
//!
//! - `PgWorkflowStore` abre una transacción `read_write` por unidad de trabajo
//!   y entrega al motor un `UnitOfWork` sobre esa conexión. Si la closure
//!   devuelve error la transacción se revierte completa.
//! - Conflictos de serialización, errores de IO del pool y conflictos de
//!   numeración reintentables repiten la unidad de trabajo completa con
//!   backoff corto.
//! - Paridad con el backend en memoria: mismas garantías de unicidad
//!   (instancia pendiente por documento, asiento por documento, acción por
//!   paso) expresadas como constraints de la base.

mod rows;
mod uow;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use ledger_core::{EngineError, StoreError, UnitOfWork, WorkflowStore};
use log::{debug, warn};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use uow::PgUnitOfWork;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// El pool se construye con `min_idle` y `max_size`; al construirlo se
/// corren las migraciones pendientes una sola vez.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Debe devolver una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Error interno de una transacción: o el motor abortó la unidad de trabajo,
/// o Diesel falló al abrir / confirmar.
#[derive(Debug)]
enum TxError {
    Engine(EngineError),
    Db(PersistenceError),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Db(err.into())
    }
}

impl From<PersistenceError> for TxError {
    fn from(err: PersistenceError) -> Self {
        TxError::Db(err)
    }
}

impl TxError {
    fn is_retryable(&self) -> bool {
        match self {
            TxError::Engine(e) => e.is_retryable(),
            TxError::Db(e) => is_retryable(e),
        }
    }

    fn into_engine(self) -> EngineError {
        match self {
            TxError::Engine(e) => e,
            TxError::Db(e) => EngineError::Storage(StoreError::from(e)),
        }
    }
}

/// Determina si un error es transitorio.
///
/// Cubre conflictos de serialización, IO del pool / conexión y mensajes
/// comunes de desconexión o deadlock que llegan como `Unknown`.
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

const MAX_ATTEMPTS: u32 = 3;

/// Retry con backoff corto: 3 reintentos (15ms, 30ms, 45ms), `warn!` por
/// intento. Sólo repite la unidad de trabajo provista por `f`.
fn with_retry<F, T>(mut f: F) -> Result<T, TxError>
    where F: FnMut() -> Result<T, TxError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.is_retryable() && attempts < MAX_ATTEMPTS => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// `WorkflowStore` sobre Postgres.
pub struct PgWorkflowStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgWorkflowStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl PgWorkflowStore<PoolProvider> {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> WorkflowStore for PgWorkflowStore<P> {
    fn transaction<T, F>(&self, mut f: F) -> Result<T, EngineError>
        where F: FnMut(&mut dyn UnitOfWork) -> Result<T, EngineError>
    {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx_conn| {
                    let mut uow = PgUnitOfWork { conn: tx_conn };
                    f(&mut uow).map_err(TxError::Engine)
                })
        }).map_err(|e| {
              debug!("transaction:rollback err={e:?}");
              e.into_engine()
          })
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// - Si `min_size > max_size`, usa `min_size = max_size`.
/// - Ejecuta migraciones tras el primer `get()`.
/// - Devuelve `PersistenceError::TransientIo` ante errores del pool.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        warn!("min_size > max_size ({} > {}), ajustando min=max", validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee `DATABASE_URL` y tamaños y
/// construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
