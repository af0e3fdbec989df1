//! ledger-core: motor de aprobaciones y contabilización en partida doble.
//!
//! Componentes (de las hojas hacia arriba):
//! - `model`: documentos, definiciones, instancias, acciones y asientos.
//! - `step`: bosque de pasos (arena indexada por id) y reglas de aprobador.
//! - `routing`: evaluador de ruteo (pasos vencidos, satisfacción AND/OR).
//! - `engine`: máquina de estados de la instancia, procesador de decisiones,
//!   servicio de contabilización y servicio de numeración.
//! - `repo`: contrato transaccional `WorkflowStore`/`UnitOfWork` y backend en
//!   memoria.
//! - `collab`: colaboradores externos (directorio, cuentas, notificaciones).
pub mod collab;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod repo;
pub mod routing;
pub mod step;

pub use collab::{AccountMapper, ApproverDirectory, CollaboratorError, NoopNotifier, Notifier, PostingLine,
                 RecordingNotifier, SentNotification, StaticDirectory};
pub use config::EngineConfig;
pub use engine::{ApprovalEngine, DecisionOutcome, EngineBuilder, InboxItem, NumberingService, PostingService};
pub use errors::{ConcurrencyError, ConfigurationError, DefinitionError, EngineError, StoreError};
pub use event::{WorkflowEvent, WorkflowEventKind};
pub use model::{ActionStatus, ApprovalMode, Decision, DocumentLedgerState, DocumentRef, DocumentStatus,
                DocumentSubmission, DocumentType, EntryStatus, InstanceStatus, JournalEntry, JournalEntryLine, Side,
                WorkflowAction, WorkflowDefinition, WorkflowInstance};
pub use repo::{InMemoryWorkflowStore, UnitOfWork, WorkflowStore};
pub use routing::{Evaluation, NodeState, RoutingContext, RoutingEvaluator};
pub use step::{AmountGate, ApproverRule, Connector, StepForest, StepNode, WorkflowStep};
