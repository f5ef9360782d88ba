use std::io::{Cursor, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::entry::{LangEntry, Slot};
use crate::model::sidecar::StructuredSidecar;

/// Faixa plausível para a contagem de entradas do cabeçalho.
pub const MAX_ENTRY_COUNT: u32 = 100_000;

/// Teto do bloco declarado de um registro; acima disso o registro é pulado.
pub const MAX_TEXT_LEN: usize = 8192;

#[derive(Debug, Clone)]
pub struct StructuredOptions {
    /// Política de conteúdo herdada das tabelas históricas: corta o texto
    /// explicativo depois do rótulo em maiúsculas. É com perdas e pode ser
    /// desligada; o decode em si não depende dela.
    pub trim_labels: bool,
    pub encoding: &'static Encoding,
}

impl Default for StructuredOptions {
    fn default() -> Self {
        Self {
            trim_labels: true,
            encoding: WINDOWS_1252,
        }
    }
}

#[derive(Debug)]
pub struct StructuredScan {
    pub entries: Vec<LangEntry>,
    pub sidecar: StructuredSidecar,
    /// Motivo de cada registro pulado, na ordem em que apareceram.
    pub skipped: Vec<Error>,
}

/// Bytes que sobrevivem ao filtro de conteúdo: ASCII imprimível mais os
/// valores acentuados (windows-1252) que a fonte da variante A usa. Tudo
/// fora disso é token de controle da engine e é descartado, não trocado.
fn allowed_byte(b: u8) -> bool {
    if (0x20..=0x7E).contains(&b) {
        return true;
    }
    const ACCENTED: &[u8] = &[
        0x99, // ™
        0x9C, // œ
        0xA1, // ¡
        0xA3, // £
        0xA5, // ¥
        0xA9, // ©
        0xAE, // ®
        0xBF, // ¿
        0xC1, 0xC3, 0xC8, 0xC9, 0xCC, 0xCD, // Á Ã È É Ì Í
        0xD1, 0xD2, 0xD3, 0xD5, 0xD9, 0xDA, 0xDC, 0xDF, // Ñ Ò Ó Õ Ù Ú Ü ß
        0xE0, 0xE1, 0xE2, 0xE3, 0xE7, 0xE8, 0xE9, 0xEA, // à á â ã ç è é ê
        0xEC, 0xED, 0xEE, 0xEF, // ì í î ï
        0xF1, 0xF2, 0xF3, 0xF4, 0xF5, // ñ ò ó ô õ
        0xF9, 0xFA, 0xFB, 0xFC, // ù ú û ü
    ];
    ACCENTED.contains(&b)
}

/// Corta o sufixo explicativo depois de um rótulo em maiúsculas no começo
/// do texto. Rótulo = sequência inicial de `[A-Z0-9_]` começando por letra,
/// com pelo menos dois caracteres; só corta se sobrar algo depois dele.
fn trim_after_label(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_uppercase() => {}
        _ => return text.to_string(),
    }

    let label_end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    if label_end >= 2 && label_end < text.len() {
        text[..label_end].to_string()
    } else {
        text.to_string()
    }
}

/// Varre o arquivo atrás do cabeçalho verdadeiro: um par big-endian
/// `(0, contagem)` plausível em offset alinhado a 4 bytes. O cabeçalho nem
/// sempre está no byte 0; a posição achada vira sidecar porque o rebuild
/// não consegue redescobri-la a partir da tabela editada.
fn locate_header(data: &[u8]) -> Option<(u64, u32)> {
    let mut off = 0usize;
    while off + 8 <= data.len() {
        let first = u32::from_be_bytes(data[off..off + 4].try_into().unwrap());
        let count = u32::from_be_bytes(data[off + 4..off + 8].try_into().unwrap());
        if first == 0 && (1..=MAX_ENTRY_COUNT).contains(&count) {
            return Some((off as u64, count));
        }
        off += 4;
    }
    None
}

/// Decodifica o modo estruturado da variante A. Fatal quando não há
/// cabeçalho plausível ou quando o arquivo trunca no meio dos registros —
/// os offsets derivam dos comprimentos acumulados, não existe fronteira de
/// recuperação.
pub fn parse(data: &[u8], opts: &StructuredOptions) -> Result<StructuredScan> {
    let (header_offset, entry_count) = locate_header(data).ok_or(Error::MalformedHeader {
        scanned: data.len(),
    })?;

    debug!(header_offset, entry_count, "structured header located");

    let mut rdr = Cursor::new(data);
    rdr.seek(SeekFrom::Start(header_offset + 8))?;

    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut skipped = Vec::new();
    let mut index = 0usize;

    for _ in 0..entry_count {
        let group = rdr.read_u16::<BigEndian>()?;
        let id = rdr.read_u16::<BigEndian>()?;
        let text_len = rdr.read_u32::<BigEndian>()? as usize;
        let block_start = rdr.position();

        if text_len > MAX_TEXT_LEN {
            warn!(group, id, text_len, "declared block over the cap, skipping record");
            skipped.push(Error::OversizedField {
                length: text_len,
                limit: MAX_TEXT_LEN,
            });
            rdr.seek(SeekFrom::Start(block_start + text_len as u64))?;
            continue;
        }

        let mut meta = 0u32;
        let mut param = None;
        let mut raw = Vec::new();

        if text_len > 0 {
            let mode = rdr.read_u8()?;
            meta = u32::from(mode);
            let mut consumed = 1usize;

            if mode == 1 {
                param = Some(rdr.read_u8()?);
                consumed += 1;
            }

            // lê byte a byte até o terminador ou o fim do bloco declarado
            let mut remaining = text_len.saturating_sub(consumed);
            while remaining > 0 {
                let b = rdr.read_u8()?;
                remaining -= 1;
                if b == 0x00 || b == b'\n' || b == b'\r' {
                    break;
                }
                raw.push(b);
            }
        }

        // resto do bloco declarado é pulado, nunca relido como registro
        let block_end = block_start + text_len as u64;
        if block_end > data.len() as u64 {
            return Err(Error::UnexpectedEof);
        }
        rdr.seek(SeekFrom::Start(block_end))?;

        raw.retain(|&b| allowed_byte(b));
        let (text, _) = crate::services::encoding::decode_bytes(&raw, opts.encoding);
        let text = if opts.trim_labels {
            trim_after_label(&text)
        } else {
            text
        };

        entries.push(LangEntry {
            index,
            slot: Slot::Record { group, id },
            meta,
            param,
            original: text,
            translated: String::new(),
            raw_length: text_len,
        });
        index += 1;
    }

    debug!(entries = entries.len(), skipped = skipped.len(), "structured scan done");

    Ok(StructuredScan {
        entries,
        sidecar: StructuredSidecar {
            header_offset,
            entry_count,
        },
        skipped,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn record(group: u16, id: u16, mode: u8, param: Option<u8>, text: &[u8]) -> Vec<u8> {
        let mut body = vec![mode];
        if let Some(p) = param {
            body.push(p);
        }
        body.extend_from_slice(text);

        let mut rec = Vec::new();
        rec.extend_from_slice(&group.to_be_bytes());
        rec.extend_from_slice(&id.to_be_bytes());
        rec.extend_from_slice(&(body.len() as u32).to_be_bytes());
        rec.extend_from_slice(&body);
        rec
    }

    pub(crate) fn file(padding: usize, records: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0u8; padding];
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&(records.len() as u32).to_be_bytes());
        for r in records {
            data.extend_from_slice(r);
        }
        data
    }

    #[test]
    fn header_is_found_past_the_padding() {
        let data = file(12, &[record(3, 7, 0, None, b"RESUME")]);
        let scan = parse(&data, &StructuredOptions::default()).unwrap();

        assert_eq!(scan.sidecar.header_offset, 12);
        assert_eq!(scan.sidecar.entry_count, 1);
        assert_eq!(scan.entries.len(), 1);

        let e = &scan.entries[0];
        assert_eq!(e.slot, Slot::Record { group: 3, id: 7 });
        assert_eq!(e.original, "RESUME");
        assert_eq!(e.meta, 0);
        assert_eq!(e.param, None);
    }

    #[test]
    fn missing_header_is_fatal() {
        let data = vec![0xFFu8; 64];
        assert!(matches!(
            parse(&data, &StructuredOptions::default()),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn mode_one_carries_a_parameter_byte() {
        let data = file(0, &[record(1, 2, 1, Some(9), b"PAUSE")]);
        let scan = parse(&data, &StructuredOptions::default()).unwrap();

        let e = &scan.entries[0];
        assert_eq!(e.meta, 1);
        assert_eq!(e.param, Some(9));
        assert_eq!(e.original, "PAUSE");
        // bloco = modo + parâmetro + texto
        assert_eq!(e.raw_length, 1 + 1 + 5);
    }

    #[test]
    fn text_stops_at_terminator_and_block_is_skipped() {
        let data = file(0, &[record(0, 1, 0, None, b"YES\x00garbage"), record(0, 2, 0, None, b"NO")]);
        let scan = parse(&data, &StructuredOptions::default()).unwrap();

        assert_eq!(scan.entries.len(), 2);
        assert_eq!(scan.entries[0].original, "YES");
        assert_eq!(scan.entries[1].original, "NO");
    }

    #[test]
    fn newline_terminators_also_stop_the_text() {
        let data = file(0, &[record(0, 1, 0, None, b"UP\ntail"), record(0, 2, 0, None, b"DOWN\rtail")]);
        let scan = parse(&data, &StructuredOptions::default()).unwrap();
        assert_eq!(scan.entries[0].original, "UP");
        assert_eq!(scan.entries[1].original, "DOWN");
    }

    #[test]
    fn control_bytes_are_dropped_not_replaced() {
        let data = file(0, &[record(0, 1, 0, None, b"A\x07B\x1BC")]);
        let scan = parse(&data, &StructuredOptions::default()).unwrap();
        assert_eq!(scan.entries[0].original, "ABC");
    }

    #[test]
    fn accented_bytes_survive_the_filter() {
        let data = file(0, &[record(0, 1, 0, None, &[0xC9, b'C', b'R', b'A', b'N'])]);
        let scan = parse(&data, &StructuredOptions::default()).unwrap();
        assert_eq!(scan.entries[0].original, "ÉCRAN");
    }

    #[test]
    fn label_trim_is_optional() {
        let raw = b"OPTIONS menu des options";

        let on = parse(&file(0, &[record(0, 1, 0, None, raw)]), &StructuredOptions::default()).unwrap();
        assert_eq!(on.entries[0].original, "OPTIONS");

        let opts = StructuredOptions {
            trim_labels: false,
            ..StructuredOptions::default()
        };
        let off = parse(&file(0, &[record(0, 1, 0, None, raw)]), &opts).unwrap();
        assert_eq!(off.entries[0].original, "OPTIONS menu des options");
    }

    #[test]
    fn non_label_text_is_not_trimmed() {
        let data = file(0, &[record(0, 1, 0, None, b"Press start")]);
        let scan = parse(&data, &StructuredOptions::default()).unwrap();
        assert_eq!(scan.entries[0].original, "Press start");
    }

    #[test]
    fn oversized_record_is_skipped_and_decode_continues() {
        // bloco declarado acima do teto, seguido de um registro válido
        let mut bad = Vec::new();
        bad.extend_from_slice(&5u16.to_be_bytes());
        bad.extend_from_slice(&6u16.to_be_bytes());
        let body = vec![b'x'; MAX_TEXT_LEN + 10];
        bad.extend_from_slice(&((body.len()) as u32).to_be_bytes());
        bad.extend_from_slice(&body);

        let good = record(7, 8, 0, None, b"STILL_HERE");
        let data = file(0, &[bad, good]);

        let scan = parse(&data, &StructuredOptions::default()).unwrap();
        assert_eq!(scan.skipped.len(), 1);
        assert!(matches!(
            scan.skipped[0],
            Error::OversizedField { limit: MAX_TEXT_LEN, .. }
        ));
        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.entries[0].slot, Slot::Record { group: 7, id: 8 });
        assert_eq!(scan.entries[0].original, "STILL_HERE");
    }

    #[test]
    fn truncated_records_are_fatal() {
        let mut data = file(0, &[record(0, 1, 0, None, b"OK")]);
        // o cabeçalho promete duas entradas mas só existe uma
        data[4..8].copy_from_slice(&2u32.to_be_bytes());
        assert!(parse(&data, &StructuredOptions::default()).is_err());
    }

    #[test]
    fn declared_block_longer_than_file_is_fatal() {
        let mut rec = Vec::new();
        rec.extend_from_slice(&0u16.to_be_bytes());
        rec.extend_from_slice(&1u16.to_be_bytes());
        rec.extend_from_slice(&100u32.to_be_bytes());
        rec.push(0); // modo, e nada além
        let data = file(0, &[rec]);
        assert!(parse(&data, &StructuredOptions::default()).is_err());
    }
}
