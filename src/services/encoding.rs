use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::entry::Variant;

/// Codificação de texto padrão de cada variante. A variante A grava bytes
/// compatíveis com windows-1252; a variante B grava UTF-8.
pub fn default_for(variant: Variant) -> &'static Encoding {
    match variant {
        Variant::A => WINDOWS_1252,
        Variant::B => UTF_8,
    }
}

/// Resolve um rótulo vindo da linha de comando ("latin-1", "utf-8", ...).
pub fn resolve_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::UnknownEncodingLabel(label.to_string()))
}

/// Decodifica bytes para texto. Bytes inválidos viram o caractere de
/// reposição e são contados, nunca um erro.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> (String, bool) {
    let (text, _, had_errors) = encoding.decode(bytes);
    (text.into_owned(), had_errors)
}

/// Codifica texto para bytes. Caracteres sem representação viram `?`
/// (um por caractere) e o total substituído é devolvido para o relatório.
pub fn encode_text(text: &str, encoding: &'static Encoding) -> (Vec<u8>, usize) {
    let (bytes, _, had_errors) = encoding.encode(text);
    if !had_errors {
        return (bytes.into_owned(), 0);
    }

    // caminho lento: substitui caractere a caractere
    let mut out = Vec::with_capacity(text.len());
    let mut replaced = 0usize;
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let (b, _, err) = encoding.encode(c.encode_utf8(&mut buf));
        if err {
            out.push(b'?');
            replaced += 1;
        } else {
            out.extend_from_slice(&b);
        }
    }
    (out, replaced)
}

#[derive(Debug, Serialize)]
pub struct EncodingCandidate {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct EncodingDetectionResult {
    pub best: String,
    pub confidence: f32,
    pub candidates: Vec<EncodingCandidate>,
}

/// Palpite de codificação para um bloco de bytes. Só orientação para o
/// operador; os codecs usam sempre a codificação pedida ou o padrão da
/// variante.
pub fn detect_from_bytes(bytes: &[u8]) -> EncodingDetectionResult {
    // BOM UTF-8 (EF BB BF)
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return EncodingDetectionResult {
            best: "utf-8-sig".into(),
            confidence: 0.99,
            candidates: vec![
                EncodingCandidate {
                    name: "utf-8-sig".into(),
                    confidence: 0.99,
                },
                EncodingCandidate {
                    name: "utf-8".into(),
                    confidence: 0.90,
                },
            ],
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);

    let encoding = detector.guess(None, true);
    let best = encoding.name().to_lowercase();
    let confidence = estimate_confidence(bytes, encoding);

    let mut candidates = vec![EncodingCandidate {
        name: best.clone(),
        confidence,
    }];

    // Ambiguidade comum neste domínio: texto todo ASCII serve para as duas
    // famílias, então o segundo palpite é sempre o par da outra variante.
    if best == "windows-1252" {
        candidates.push(EncodingCandidate {
            name: "utf-8".into(),
            confidence: (confidence - 0.10).max(0.0),
        });
    } else if best == "utf-8" {
        candidates.push(EncodingCandidate {
            name: "windows-1252".into(),
            confidence: (confidence - 0.10).max(0.0),
        });
    }

    EncodingDetectionResult {
        best,
        confidence,
        candidates,
    }
}

fn estimate_confidence(bytes: &[u8], encoding: &'static Encoding) -> f32 {
    let (text, _, had_errors) = encoding.decode(bytes);

    if had_errors {
        return 0.35;
    }

    let len = text.len();
    if len < 64 {
        0.55
    } else if len < 512 {
        0.70
    } else if len < 4096 {
        0.82
    } else {
        0.90
    }
}
