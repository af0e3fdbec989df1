//! Numeración secuencial por `(clave, año)`.
//!
//! El incremento es atómico en el store (fila bloqueada o `UPSERT ...
//! RETURNING`); aquí sólo se reintenta, acotado, cuando el store informa una
//! carrera perdida. Los huecos por transacciones revertidas son aceptables,
//! los duplicados no.
use log::{debug, warn};

use crate::errors::{EngineError, StoreError};
use crate::repo::UnitOfWork;

#[derive(Debug, Clone, Copy)]
pub struct NumberingService {
    max_retries: u32,
}

impl NumberingService {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Siguiente valor para `(key, year)` dentro de la unidad de trabajo.
    pub fn next(&self, uow: &mut dyn UnitOfWork, key: &str, year: i32) -> Result<i64, EngineError> {
        let mut attempt = 0;
        loop {
            match uow.increment_counter(key, year) {
                Ok(value) => {
                    debug!("numbering:next key={key} year={year} value={value}");
                    return Ok(value);
                }
                Err(StoreError::Conflict(msg)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!("numbering:conflict key={key} year={year} attempt={attempt} {msg}");
                }
                Err(StoreError::Conflict(_)) => {
                    return Err(EngineError::NumberingConflict { key: key.to_string(), year });
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}
