//! Huella de la definición congelada en cada instancia: JSON canónico
//! (claves ordenadas) + BLAKE3.

mod canonical_json;
mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value};
