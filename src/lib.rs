//! Codec bidirecional para as tabelas de localização `.lng` dos dois
//! formatos de jogo suportados: detecção de formato, decode para uma
//! coleção editável de entradas e rebuild preservando o leiaute binário.

pub mod error;
pub mod model;
pub mod parsers;
pub mod services;

pub use error::{Error, Result};
pub use model::entry::{FileHeader, LangEntry, LangTable, Slot, Variant, VariantAMode};
pub use model::sidecar::StructuredSidecar;
