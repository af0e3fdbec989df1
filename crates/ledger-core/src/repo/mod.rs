//! Contrato de persistencia transaccional.
//!
//! El motor trabaja siempre dentro de `WorkflowStore::transaction`: la
//! closure recibe una `UnitOfWork` y todo lo que escribe se confirma junto o
//! se descarta junto. El backend en memoria serializa las transacciones; el
//! de Postgres (crate `ledger-persistence`) usa bloqueo de fila.
mod memory;
mod store;

pub use memory::InMemoryWorkflowStore;
pub use store::{UnitOfWork, WorkflowStore};
