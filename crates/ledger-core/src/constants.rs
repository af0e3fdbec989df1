//! Constantes del motor.
//!
//! `ENGINE_VERSION` participa en el hash del snapshot de definición: cambiarla
//! invalida la comparación de hashes entre instancias abiertas con versiones
//! distintas del motor.

/// Versión lógica del motor.
pub const ENGINE_VERSION: &str = "L1.0";

/// Clave del contador usado para numerar asientos.
pub const JOURNAL_COUNTER_KEY: &str = "JournalEntry";

/// Decimales de la moneda base (montos de líneas y compuertas).
pub const BASE_DECIMAL_PLACES: u32 = 2;

/// Reintentos por defecto ante conflictos del contador.
pub const DEFAULT_NUMBERING_RETRIES: u32 = 3;
