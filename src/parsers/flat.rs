use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::{debug, warn};

use crate::model::entry::{LangEntry, Slot};

/// Bytes de cabeçalho pulados por padrão antes da tabela de strings.
pub const DEFAULT_SKIP: usize = 28;

/// Tetos de segurança da varredura. Estourar qualquer um aborta a
/// varredura naquele ponto, preservando o que já foi encontrado.
pub const MAX_STRING_LEN: usize = 8192;
pub const MAX_STRINGS: usize = 50_000;

/// Uma sequência de zeros deste tamanho encerra a tabela.
pub const NULL_RUN_LIMIT: usize = 16;

#[derive(Debug, Clone)]
pub struct FlatOptions {
    pub skip: usize,
    pub encoding: &'static Encoding,
}

impl Default for FlatOptions {
    fn default() -> Self {
        Self {
            skip: DEFAULT_SKIP,
            encoding: WINDOWS_1252,
        }
    }
}

#[derive(Debug, Default)]
pub struct FlatScan {
    pub entries: Vec<LangEntry>,
    /// Varredura interrompida por teto de tamanho ou de quantidade.
    pub aborted: bool,
}

/// Decodifica o modo plano da variante A: strings terminadas em zero,
/// encontradas por varredura sequencial depois do cabeçalho. Cada entrada
/// registra a posição absoluta, o tamanho bruto e quantos zeros a seguem,
/// o suficiente para o rebuild recompor o leiaute byte a byte.
///
/// Falha de decodificação de uma string não derruba o lote; o formato não
/// tem auto-descrição, então a varredura é o único limite.
pub fn parse(data: &[u8], opts: &FlatOptions) -> FlatScan {
    let mut scan = FlatScan::default();

    if data.len() <= opts.skip {
        debug!(len = data.len(), skip = opts.skip, "file ends inside the header");
        return scan;
    }

    let content = &data[opts.skip..];
    let mut pos = 0usize;
    let mut null_run = 0usize;
    let mut index = 0usize;

    while pos < content.len() {
        if content[pos] == 0x00 {
            null_run += 1;
            if null_run >= NULL_RUN_LIMIT {
                break;
            }
            pos += 1;
            continue;
        }
        null_run = 0;

        // fim da string = primeiro zero; cauda sem terminador é ignorada
        let end = match content[pos..].iter().position(|&b| b == 0x00) {
            Some(rel) => pos + rel,
            None => break,
        };

        let size = end - pos;
        if size > MAX_STRING_LEN {
            warn!(offset = opts.skip + pos, size, "string over the size cap, stopping the scan");
            scan.aborted = true;
            break;
        }

        // zeros de enchimento logo depois da string
        let null_count = content[end..].iter().take_while(|&&b| b == 0x00).count();

        let raw = &content[pos..end];
        let (text, had_errors) = crate::services::encoding::decode_bytes(raw, opts.encoding);
        if had_errors {
            debug!(offset = opts.skip + pos, "replacement characters while decoding");
        }

        scan.entries.push(LangEntry {
            index,
            slot: Slot::Flat {
                offset: opts.skip + pos,
                max_len: size,
                null_count,
            },
            meta: 0,
            param: None,
            original: text,
            translated: String::new(),
            raw_length: size,
        });

        index += 1;
        pos = end + null_count;

        // enchimento no tamanho da sentinela também encerra a tabela
        if null_count >= NULL_RUN_LIMIT {
            break;
        }

        if index >= MAX_STRINGS {
            warn!("string count cap reached, stopping the scan");
            scan.aborted = true;
            break;
        }
    }

    debug!(entries = scan.entries.len(), aborted = scan.aborted, "flat scan done");
    scan
}
