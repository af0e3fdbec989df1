// ledger-documents: documentos de negocio y su mapeo contable
pub mod document;
pub mod error;
pub mod mapping;
pub mod registry;
pub use document::{Document, DocumentBody, ScreenLine};
pub use error::DocumentError;
pub use mapping::{AccountPair, AccountTable};
pub use registry::DocumentRegistry;
