use serde::{Deserialize, Serialize};

/// As duas famílias de arquivo `.lng` suportadas.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "a",
            Variant::B => "b",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-formato da variante A. Escolhido sempre por flag explícita,
/// nunca inferido do conteúdo.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VariantAMode {
    Flat,
    Structured,
}

/// Endereçamento de uma entrada dentro do arquivo, por formato.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Slot {
    /// Variante A plana: faixa de bytes fixa + zeros de enchimento.
    Flat {
        offset: usize,
        max_len: usize,
        null_count: usize,
    },
    /// Variante A estruturada: registro (grupo, id).
    Record { group: u16, id: u16 },
    /// Variante B: posição dentro da tabela de grupos.
    /// `group_index == -1` marca a pseudo-entrada que carrega o
    /// código de idioma do cabeçalho.
    Grouped {
        group_index: i64,
        group_id: u32,
        entry_index: i64,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LangEntry {
    pub index: usize,

    pub slot: Slot,

    /// Byte de modo de codificação (variante A estruturada) ou tag opaca
    /// de 32 bits (variante B). Zero no modo plano.
    #[serde(default)]
    pub meta: u32,

    /// Byte de parâmetro extra, presente somente quando `meta == 1`
    /// no modo estruturado.
    #[serde(default)]
    pub param: Option<u8>,

    #[serde(default)]
    pub original: String,

    /// Vazio significa "mantém o original".
    #[serde(default)]
    pub translated: String,

    /// Tamanho em bytes como gravado no disco.
    #[serde(default)]
    pub raw_length: usize,
}

impl LangEntry {
    /// Texto que sai no rebuild: tradução se houver conteúdo, senão o original.
    pub fn outgoing_text(&self) -> &str {
        if self.has_translation() {
            self.translated.as_str()
        } else {
            self.original.as_str()
        }
    }

    pub fn has_translation(&self) -> bool {
        !self.translated.trim().is_empty()
    }

    /// Pseudo-entrada da variante B (carrega o código de idioma).
    pub fn is_pseudo(&self) -> bool {
        matches!(self.slot, Slot::Grouped { group_index: -1, .. })
    }
}

/// Metadados globais lidos do cabeçalho do arquivo.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileHeader {
    #[serde(default)]
    pub language_code: u32,
    #[serde(default)]
    pub group_count: u32,
    #[serde(default)]
    pub entry_count: u32,
    /// Posição do cabeçalho no modo estruturado (nem sempre é o byte 0).
    #[serde(default)]
    pub header_offset: Option<u64>,
}

/// Coleção ordenada de entradas: a representação intermediária
/// compartilhada pelos codecs e pela camada de renderização.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LangTable {
    pub variant: Variant,
    pub entries: Vec<LangEntry>,
}

impl LangTable {
    pub fn new(variant: Variant, entries: Vec<LangEntry>) -> Self {
        Self { variant, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
