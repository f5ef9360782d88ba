use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::entry::{LangEntry, Slot};
use crate::services::glyph::{self, GlyphSet};

#[derive(Debug, Serialize, Deserialize)]
pub struct QaIssue {
    pub index: usize,
    pub code: String,
    pub message: String,
}

/// Tokens de substituição printf que a engine resolve em tempo de execução.
pub fn placeholder_tokens(text: &str) -> Vec<String> {
    let re = Regex::new(r"%[sdif]").unwrap();
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Igualdade de multiconjunto: a ordem pode mudar na tradução, a contagem
/// de cada token não.
fn same_multiset(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

/// Checagem dura usada no rebuild estruturado: perder ou inventar um token
/// corrompe (ou derruba) a engine, então a entrada inteira aborta o build.
pub fn check_placeholders(entry: &LangEntry) -> Result<()> {
    if !entry.has_translation() {
        return Ok(());
    }

    let original = placeholder_tokens(&entry.original);
    let translated = placeholder_tokens(&entry.translated);

    if same_multiset(&original, &translated) {
        Ok(())
    } else {
        Err(Error::PlaceholderMismatch {
            index: entry.index,
            original,
            translated,
        })
    }
}

/// Os índices precisam formar 0..N-1 sem buracos; reordenar ou remover
/// linhas da tabela quebra o rebuild.
pub fn ensure_dense(entries: &[LangEntry]) -> Result<()> {
    for (expected, entry) in entries.iter().enumerate() {
        if entry.index != expected {
            return Err(Error::IndexGap {
                expected,
                found: entry.index,
            });
        }
    }
    Ok(())
}

/// Passada consultiva sobre a tabela editada: nada aqui é fatal, são
/// avisos para o tradutor antes do rebuild.
pub fn run(entries: &[LangEntry], glyphs: &GlyphSet) -> Vec<QaIssue> {
    let mut issues = Vec::new();

    for e in entries {
        if e.is_pseudo() || !e.has_translation() {
            continue;
        }

        let translated = e.translated.trim();

        if translated == e.original.trim() {
            issues.push(QaIssue {
                index: e.index,
                code: "SAME_AS_ORIGINAL".to_string(),
                message: "translation is identical to the original text".to_string(),
            });
        }

        // entradas de faixa fixa: tradução maior que o espaço vai ser
        // truncada em silêncio no rebuild
        if let Slot::Flat { max_len, .. } = e.slot {
            let normalized = glyph::normalize(translated, glyphs);
            let (encoded, _) =
                crate::services::encoding::encode_text(&normalized, encoding_rs::WINDOWS_1252);
            if encoded.len() > max_len {
                issues.push(QaIssue {
                    index: e.index,
                    code: "TRANSLATION_TOO_LONG".to_string(),
                    message: format!(
                        "encoded translation has {} bytes, slot holds {}; it will be truncated",
                        encoded.len(),
                        max_len
                    ),
                });
            }
        }

        let original_tokens = placeholder_tokens(&e.original);
        let translated_tokens = placeholder_tokens(&e.translated);
        if !same_multiset(&original_tokens, &translated_tokens) {
            issues.push(QaIssue {
                index: e.index,
                code: "PLACEHOLDER_MISMATCH".to_string(),
                message: format!(
                    "original has {original_tokens:?}, translation has {translated_tokens:?}"
                ),
            });
        }

        let lost: Vec<char> = translated
            .chars()
            .filter(|&c| {
                if glyphs.supports(c) {
                    return false;
                }
                let n = glyph::normalize(&c.to_string(), glyphs);
                n.is_empty() || n == "?"
            })
            .collect();
        if !lost.is_empty() {
            issues.push(QaIssue {
                index: e.index,
                code: "UNSUPPORTED_GLYPHS".to_string(),
                message: format!("characters the font cannot render: {lost:?}"),
            });
        }
    }

    issues
}
