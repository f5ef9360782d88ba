use crate::model::entry::Variant;

/// Menor prefixo que a detecção aceita examinar.
pub const MIN_PREFIX: usize = 16;

/// Limites de plausibilidade dos contadores do cabeçalho. São constantes
/// calibradas, não garantias de protocolo; entradas patológicas podem
/// enganar a classificação, por isso os valores ficam configuráveis.
#[derive(Debug, Clone, Copy)]
pub struct DetectLimits {
    /// Máximo aceitável para o contador de grupos da variante B.
    pub max_groups: u32,
    /// Máximo aceitável para o contador de entradas da variante A.
    pub max_entries: u32,
}

impl Default for DetectLimits {
    fn default() -> Self {
        Self {
            max_groups: 10_000,
            max_entries: 100_000,
        }
    }
}

/// Classifica o prefixo do arquivo. `None` é o resultado "desconhecido":
/// terminal mas não fatal, o chamador decide se força uma variante.
pub fn detect(bytes: &[u8]) -> Option<Variant> {
    detect_with(bytes, DetectLimits::default())
}

/// A ordem dos testes importa: o predicado da variante B tem o limite mais
/// estreito e resolve a ambiguidade, então roda primeiro. Cada variante lê
/// os inteiros na SUA ordem de bytes histórica (A big-endian, B
/// little-endian); a assimetria é propriedade dos formatos e não pode ser
/// unificada.
pub fn detect_with(bytes: &[u8], limits: DetectLimits) -> Option<Variant> {
    if bytes.len() < MIN_PREFIX {
        return None;
    }

    let word = |at: usize| -> [u8; 4] { bytes[at..at + 4].try_into().unwrap() };

    // Variante B: (código de idioma, contagem de grupos) little-endian
    let language = u32::from_le_bytes(word(0));
    let groups = u32::from_le_bytes(word(4));
    if language != 0 && (1..=limits.max_groups).contains(&groups) {
        return Some(Variant::B);
    }

    // Variante A: palavra zero seguida da contagem de entradas, big-endian
    let first = u32::from_be_bytes(word(0));
    let entries = u32::from_be_bytes(word(4));
    if first == 0 && (1..=limits.max_entries).contains(&entries) {
        return Some(Variant::A);
    }

    None
}
