use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use crate::error::Result;
use crate::model::entry::{FileHeader, LangEntry, Slot};

#[derive(Debug, Clone)]
pub struct GroupedOptions {
    pub encoding: &'static Encoding,
}

impl Default for GroupedOptions {
    fn default() -> Self {
        Self { encoding: UTF_8 }
    }
}

#[derive(Debug)]
pub struct GroupedScan {
    pub header: FileHeader,
    pub entries: Vec<LangEntry>,
}

/// Decodifica a variante B: `(código de idioma, grupos)` little-endian e
/// depois grupos de entradas com prefixo de comprimento. O formato é
/// estritamente auto-descritivo, então não há varredura nem heurística —
/// e também não há fronteira de recuperação: truncamento é fatal.
///
/// A primeira entrada emitida é a pseudo-entrada (`group_index == -1`) que
/// carrega o código de idioma, para ele sobreviver à ida e volta pela
/// representação externa. O texto decodificado não perde o NUL final:
/// o comprimento declarado é a verdade, e o rebuild sem edições tem de
/// reproduzir os bytes originais.
pub fn parse(data: &[u8], opts: &GroupedOptions) -> Result<GroupedScan> {
    let mut rdr = Cursor::new(data);

    let language_code = rdr.read_u32::<LittleEndian>()?;
    let group_count = rdr.read_u32::<LittleEndian>()?;

    let mut entries = Vec::new();
    entries.push(LangEntry {
        index: 0,
        slot: Slot::Grouped {
            group_index: -1,
            group_id: language_code,
            entry_index: -1,
        },
        meta: 0,
        param: None,
        original: format!("[Language Code: {language_code}]"),
        translated: String::new(),
        raw_length: 0,
    });

    let mut index = 1usize;
    let mut total_entries = 0u32;

    for group_index in 0..group_count {
        let group_id = rdr.read_u32::<LittleEndian>()?;
        let entry_count = rdr.read_u32::<LittleEndian>()?;

        for entry_index in 0..entry_count {
            let meta = rdr.read_u32::<LittleEndian>()?;
            let length = rdr.read_u32::<LittleEndian>()? as usize;

            let mut raw = vec![0u8; length];
            rdr.read_exact(&mut raw)?;

            let (text, had_errors) = crate::services::encoding::decode_bytes(&raw, opts.encoding);
            if had_errors {
                debug!(group_index, entry_index, "replacement characters while decoding");
            }

            entries.push(LangEntry {
                index,
                slot: Slot::Grouped {
                    group_index: i64::from(group_index),
                    group_id,
                    entry_index: i64::from(entry_index),
                },
                meta,
                param: None,
                original: text,
                translated: String::new(),
                raw_length: length,
            });
            index += 1;
        }
        total_entries += entry_count;
    }

    debug!(language_code, group_count, total_entries, "grouped scan done");

    Ok(GroupedScan {
        header: FileHeader {
            language_code,
            group_count,
            entry_count: total_entries,
            header_offset: None,
        },
        entries,
    })
}
