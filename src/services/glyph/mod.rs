//! Conjuntos de glifos por variante e a cadeia de normalização que mapeia
//! texto arbitrário para o repertório que cada fonte consegue desenhar.

mod normalize;
mod tables;

pub use normalize::normalize;

/// O que fazer com um caractere que nenhum passo da cadeia resolveu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Variante A: descarta o caractere.
    Drop,
    /// Variante B: emite o caractere de reserva.
    Replace(char),
}

/// Repertório imutável de uma fonte + mapa manual de substituições.
/// Configuração constante de processo; nunca muta em tempo de execução.
pub struct GlyphSet {
    supported: &'static str,
    manual: &'static [(char, char)],
    fallback: Fallback,
}

impl GlyphSet {
    pub fn supports(&self, c: char) -> bool {
        self.supported.contains(c)
    }

    /// Substituição manual (glifos pontuados, ligaduras, acentos trocados).
    /// Consultada antes da decomposição porque nem toda substituição é
    /// redutível por remoção de diacrítico.
    pub fn manual_sub(&self, c: char) -> Option<char> {
        self.manual
            .iter()
            .find(|(from, _)| *from == c)
            .map(|(_, to)| *to)
    }

    pub fn fallback(&self) -> Fallback {
        self.fallback
    }
}

/// Fonte principal da variante A.
pub static VARIANT_A: GlyphSet = GlyphSet {
    supported: tables::VARIANT_A_GLYPHS,
    manual: tables::VARIANT_A_MANUAL,
    fallback: Fallback::Drop,
};

/// Fonte principal da variante B.
pub static VARIANT_B: GlyphSet = GlyphSet {
    supported: tables::VARIANT_B_GLYPHS,
    manual: tables::VARIANT_B_MANUAL,
    fallback: Fallback::Replace('?'),
};
