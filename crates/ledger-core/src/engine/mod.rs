//! Motor de aprobaciones.
//!
//! - `core`: `ApprovalEngine` y consultas.
//! - `builder`: inyección de store y colaboradores.
//! - `lifecycle`: apertura, avance y cancelación de instancias.
//! - `decision`: procesador de decisiones (aprobar / rechazar).
//! - `posting`: construcción y registro del asiento balanceado.
//! - `numbering`: numeración secuencial por `(clave, año)`.
//! - `outbox`: notificaciones diferidas hasta el commit.

pub mod builder;
pub mod core;
pub mod decision;
pub mod lifecycle;
pub mod numbering;
pub mod outbox;
pub mod posting;

pub use builder::EngineBuilder;
pub use core::{ApprovalEngine, InboxItem};
pub use decision::DecisionOutcome;
pub use numbering::NumberingService;
pub use outbox::{Notification, Outbox};
pub use posting::PostingService;
