use thiserror::Error;

/// Erros da biblioteca. Os códigos seguem a taxonomia do pipeline:
/// detecção → decode → edição externa → validação → encode.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Detecção inconclusiva. Não é fatal: o chamador pode repetir a
    /// operação informando a variante explicitamente.
    #[error("could not identify the language file format; pass the variant explicitly")]
    FormatUnknown,

    /// Variante pedida contradiz a detectada. Aborta antes de qualquer escrita.
    #[error("requested variant {requested} but the file looks like variant {detected}")]
    FormatMismatch {
        requested: &'static str,
        detected: &'static str,
    },

    /// Nenhum cabeçalho plausível no modo estruturado.
    #[error("no plausible table header found in {scanned} bytes")]
    MalformedHeader { scanned: usize },

    #[error("table has {found} entries but the persisted header expects {expected}")]
    EntryCountMismatch { expected: usize, found: usize },

    #[error("entry indices are not a dense sequence: expected index {expected}, found {found}")]
    IndexGap { expected: usize, found: usize },

    #[error("declared length {length} exceeds the {limit}-byte limit")]
    OversizedField { length: usize, limit: usize },

    /// Os tokens de substituição (%s, %d, %i, %f) são resolvidos pela engine
    /// em tempo de execução; perder ou inventar um corrompe o jogo.
    #[error("placeholder tokens changed in entry {index}: original has {original:?}, translation has {translated:?}")]
    PlaceholderMismatch {
        index: usize,
        original: Vec<String>,
        translated: Vec<String>,
    },

    #[error("structured rebuild requires the sidecar produced at extraction time")]
    SidecarMissing,

    #[error("flat rebuild requires the original language file")]
    OriginalMissing,

    #[error("invalid sidecar: {0}")]
    Sidecar(#[from] serde_json::Error),

    #[error("malformed table row {line}: {reason}")]
    Table { line: usize, reason: String },

    #[error("entry {index} does not carry {expected} addressing")]
    SlotKind {
        index: usize,
        expected: &'static str,
    },

    #[error("unknown encoding label: {0}")]
    UnknownEncodingLabel(String),

    #[error("unexpected end of file")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, Error>;
