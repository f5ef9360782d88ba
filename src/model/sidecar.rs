use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadados fora de banda do modo estruturado da variante A.
///
/// A posição do cabeçalho é descoberta por varredura no decode e não pode
/// ser recuperada da tabela editada; sem estes dois valores o rebuild é
/// impossível. O chamador carrega o sidecar junto com a coleção de
/// entradas (decode → edição → encode), nunca como leitura implícita
/// dentro do codec.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct StructuredSidecar {
    pub header_offset: u64,
    pub entry_count: u32,
}

impl StructuredSidecar {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let sidecar = serde_json::from_str::<StructuredSidecar>(&data)?;
        Ok(sidecar)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
