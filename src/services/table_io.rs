//! Ida e volta da coleção de entradas por texto delimitado.
//!
//! O CSV é a superfície de edição externa: a coluna `translated` é a única
//! que o tradutor mexe. Cada formato tem seu conjunto de colunas, herdado
//! das tabelas históricas. Quebras de linha e NUL dentro das células viram
//! sequências de barra (`\n`, `\r`, `\0`) para o arquivo continuar sendo
//! lido linha a linha.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::entry::{LangEntry, Slot, Variant, VariantAMode};

const FLAT_HEADER: &str = "index,offset,max_len,null_count,original,translated";
const STRUCTURED_HEADER: &str = "index,group,id,mode,param,original,translated";
const GROUPED_HEADER: &str = "group_index,group_id,entry_index,meta,original,translated";

const DELIMITER: char = ',';

fn header_for(variant: Variant, mode: VariantAMode) -> &'static str {
    match (variant, mode) {
        (Variant::A, VariantAMode::Flat) => FLAT_HEADER,
        (Variant::A, VariantAMode::Structured) => STRUCTURED_HEADER,
        (Variant::B, _) => GROUPED_HEADER,
    }
}

/// Grava a tabela em CSV. Devolve quantas linhas de dados saíram.
pub fn export_csv<P: AsRef<Path>>(
    entries: &[LangEntry],
    path: P,
    variant: Variant,
    mode: VariantAMode,
) -> Result<usize> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", header_for(variant, mode))?;

    for entry in entries {
        let original = escape_field(&entry.original);
        let translated = escape_field(&entry.translated);

        match &entry.slot {
            Slot::Flat {
                offset,
                max_len,
                null_count,
            } => writeln!(
                writer,
                "{},{},{},{},{},{}",
                entry.index, offset, max_len, null_count, original, translated
            )?,
            Slot::Record { group, id } => {
                let param = entry.param.map(|p| p.to_string()).unwrap_or_default();
                writeln!(
                    writer,
                    "{},{},{},{},{},{},{}",
                    entry.index, group, id, entry.meta, param, original, translated
                )?;
            }
            Slot::Grouped {
                group_index,
                group_id,
                entry_index,
            } => writeln!(
                writer,
                "{},{},{},{},{},{}",
                group_index, group_id, entry_index, entry.meta, original, translated
            )?,
        }
    }

    writer.flush()?;
    debug!(rows = entries.len(), "csv written");
    Ok(entries.len())
}

/// Lê a tabela editada de volta. A variante e o modo vêm do chamador;
/// o cabeçalho do arquivo só confirma que a tabela é do tipo esperado.
pub fn import_csv<P: AsRef<Path>>(
    path: P,
    variant: Variant,
    mode: VariantAMode,
) -> Result<Vec<LangEntry>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let expected_header = header_for(variant, mode);

    let mut entries = Vec::new();
    let mut lines = reader.lines().enumerate();

    match lines.next() {
        Some((_, Ok(header))) if header.trim() == expected_header => {}
        Some((_, Ok(header))) => {
            return Err(Error::Table {
                line: 1,
                reason: format!("unexpected header {header:?}, wanted {expected_header:?}"),
            })
        }
        Some((_, Err(e))) => return Err(e.into()),
        None => return Ok(entries),
    }

    for (i, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = i + 1;
        let fields = split_row(&line);

        let entry = match (variant, mode) {
            (Variant::A, VariantAMode::Flat) => parse_flat_row(row, &fields)?,
            (Variant::A, VariantAMode::Structured) => parse_structured_row(row, &fields)?,
            (Variant::B, _) => parse_grouped_row(row, &fields, entries.len())?,
        };
        entries.push(entry);
    }

    debug!(rows = entries.len(), "csv read");
    Ok(entries)
}

/// Listagem legível, só para conferência; o `build` não a lê de volta.
pub fn export_txt<P: AsRef<Path>>(entries: &[LangEntry], path: P) -> Result<usize> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for entry in entries {
        match &entry.slot {
            Slot::Grouped { group_index: -1, group_id, .. } => {
                writeln!(writer, "Language Code: {group_id}")?;
                writeln!(writer)?;
            }
            Slot::Grouped {
                group_index,
                group_id,
                entry_index,
            } => writeln!(
                writer,
                "Group {group_index:3} | ID {group_id:6} | Entry {entry_index:4} | meta 0x{:08X} | {}",
                entry.meta, entry.original
            )?,
            Slot::Flat { offset, .. } => writeln!(
                writer,
                "Index {:4} | offset {offset:6} | {}",
                entry.index, entry.original
            )?,
            Slot::Record { group, id } => writeln!(
                writer,
                "Index {:4} | group {group:3} | id {id:5} | {}",
                entry.index, entry.original
            )?,
        }
    }

    writer.flush()?;
    Ok(entries.len())
}

// ----------------------------------------------------------------------
// linhas
// ----------------------------------------------------------------------

fn parse_flat_row(row: usize, fields: &[String]) -> Result<LangEntry> {
    if fields.len() != 6 {
        return Err(bad_row(row, "expected 6 columns"));
    }
    Ok(LangEntry {
        index: number(row, &fields[0], "index")?,
        slot: Slot::Flat {
            offset: number(row, &fields[1], "offset")?,
            max_len: number(row, &fields[2], "max_len")?,
            null_count: number(row, &fields[3], "null_count")?,
        },
        meta: 0,
        param: None,
        original: unescape_field(&fields[4]),
        translated: unescape_field(&fields[5]),
        raw_length: number(row, &fields[2], "max_len")?,
    })
}

fn parse_structured_row(row: usize, fields: &[String]) -> Result<LangEntry> {
    if fields.len() != 7 {
        return Err(bad_row(row, "expected 7 columns"));
    }
    let param = if fields[4].trim().is_empty() {
        None
    } else {
        Some(number::<u8>(row, &fields[4], "param")?)
    };
    Ok(LangEntry {
        index: number(row, &fields[0], "index")?,
        slot: Slot::Record {
            group: number(row, &fields[1], "group")?,
            id: number(row, &fields[2], "id")?,
        },
        meta: number(row, &fields[3], "mode")?,
        param,
        original: unescape_field(&fields[5]),
        translated: unescape_field(&fields[6]),
        raw_length: 0,
    })
}

fn parse_grouped_row(row: usize, fields: &[String], index: usize) -> Result<LangEntry> {
    if fields.len() != 6 {
        return Err(bad_row(row, "expected 6 columns"));
    }
    Ok(LangEntry {
        index,
        slot: Slot::Grouped {
            group_index: number(row, &fields[0], "group_index")?,
            group_id: number(row, &fields[1], "group_id")?,
            entry_index: number(row, &fields[2], "entry_index")?,
        },
        meta: number(row, &fields[3], "meta")?,
        param: None,
        original: unescape_field(&fields[4]),
        translated: unescape_field(&fields[5]),
        raw_length: 0,
    })
}

fn number<T: std::str::FromStr>(row: usize, field: &str, name: &str) -> Result<T> {
    field
        .trim()
        .parse::<T>()
        .map_err(|_| bad_row(row, &format!("column {name} is not a number: {field:?}")))
}

fn bad_row(row: usize, reason: &str) -> Error {
    Error::Table {
        line: row,
        reason: reason.to_string(),
    }
}

// ----------------------------------------------------------------------
// campos
// ----------------------------------------------------------------------

/// Escapa um campo para a linha CSV: barras primeiro, depois os controles,
/// e por último as aspas quando o delimitador aparece no texto.
fn escape_field(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\u{0}', "\\0");

    if escaped.contains(DELIMITER) || escaped.contains('"') {
        format!("\"{}\"", escaped.replace('"', "\"\""))
    } else {
        escaped
    }
}

fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\u{0}'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Divide a linha respeitando aspas; aspas duplas dentro de campo citado
/// voltam a ser uma. A divisão ingênua por vírgula quebraria no primeiro
/// diálogo com vírgula.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    cur.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                cur.push(c);
            }
        } else if c == '"' && cur.is_empty() {
            in_quotes = true;
        } else if c == DELIMITER {
            fields.push(std::mem::take(&mut cur));
        } else {
            cur.push(c);
        }
    }
    fields.push(cur);
    fields
}
