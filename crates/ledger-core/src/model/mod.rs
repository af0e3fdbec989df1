//! Tipos de dominio: documentos, definiciones, instancias, acciones y
//! asientos contables.

mod action;
mod definition;
mod document;
mod instance;
mod journal;

pub use action::{ActionStatus, Decision, WorkflowAction};
pub use definition::{ApprovalMode, WorkflowDefinition};
pub use document::{DocumentLedgerState, DocumentRef, DocumentStatus, DocumentSubmission, DocumentType};
pub use instance::{InstanceStatus, WorkflowInstance};
pub use journal::{EntryStatus, JournalEntry, JournalEntryLine, Side};
