//! Eventos de auditoría del workflow.
//!
//! Cada cambio de ciclo de vida agrega un evento dentro de la misma unidad de
//! trabajo que lo produjo; si la transacción se revierte, el evento también.
mod types;

pub use types::{WorkflowEvent, WorkflowEventKind};
