use std::collections::BTreeMap;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use encoding_rs::Encoding;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::entry::{LangEntry, Slot};
use crate::model::sidecar::StructuredSidecar;
use crate::services::glyph::{self, GlyphSet};
use crate::services::{encoding, qa};

/// Contadores do que o rebuild fez, para o chamador relatar.
#[derive(Debug, Default, Serialize)]
pub struct BuildReport {
    /// Entradas gravadas (ou remendadas) na saída.
    pub written: usize,
    /// Entradas deixadas intocadas byte a byte.
    pub untouched: usize,
    /// Traduções cortadas para caber na faixa fixa.
    pub truncated: usize,
    /// Entradas puladas (faixa fora do arquivo, slot errado).
    pub skipped: usize,
    /// Caracteres trocados por `?` na codificação de bytes.
    pub replaced_chars: usize,
}

/// Rebuild do modo plano da variante A: remenda o arquivo original no
/// lugar. O cabeçalho e o enchimento nunca são regenerados; entrada sem
/// tradução não é tocada, o que preserva conteúdo binário que o decode
/// não entendeu. O arquivo de saída tem sempre o tamanho do original.
pub fn patch_flat(
    original: &[u8],
    entries: &[LangEntry],
    glyphs: &GlyphSet,
    text_encoding: &'static Encoding,
) -> Result<(Vec<u8>, BuildReport)> {
    let mut data = original.to_vec();
    let mut report = BuildReport::default();

    for entry in entries {
        if !entry.has_translation() {
            report.untouched += 1;
            continue;
        }

        let (offset, max_len, null_count) = match entry.slot {
            Slot::Flat {
                offset,
                max_len,
                null_count,
            } => (offset, max_len, null_count),
            _ => {
                warn!(index = entry.index, "entry without flat addressing, skipping");
                report.skipped += 1;
                continue;
            }
        };

        let slot_end = offset
            .checked_add(max_len)
            .and_then(|v| v.checked_add(null_count));
        match slot_end {
            Some(end) if end <= data.len() => {}
            _ => {
                warn!(index = entry.index, offset, "slot is outside the file, skipping");
                report.skipped += 1;
                continue;
            }
        }

        let normalized = glyph::normalize(&entry.translated, glyphs);
        let (mut encoded, replaced) = encoding::encode_text(&normalized, text_encoding);
        report.replaced_chars += replaced;

        if encoded.len() > max_len {
            // corte silencioso: a faixa no disco é fixa
            encoded.truncate(max_len);
            report.truncated += 1;
        }

        data[offset..offset + encoded.len()].copy_from_slice(&encoded);
        for b in &mut data[offset + encoded.len()..offset + encoded.len() + null_count] {
            *b = 0;
        }

        report.written += 1;
    }

    info!(
        written = report.written,
        untouched = report.untouched,
        truncated = report.truncated,
        "flat patch done"
    );
    Ok((data, report))
}

/// Rebuild do modo estruturado da variante A. Tudo ou nada: a forma da
/// coleção tem de bater com o cabeçalho persistido no sidecar, e tokens de
/// substituição não podem mudar. O arquivo sai com o mesmo enchimento
/// inicial e o cabeçalho na mesma posição de origem.
pub fn build_structured(
    entries: &[LangEntry],
    sidecar: &StructuredSidecar,
    glyphs: &GlyphSet,
    text_encoding: &'static Encoding,
) -> Result<(Vec<u8>, BuildReport)> {
    qa::ensure_dense(entries)?;
    if entries.len() != sidecar.entry_count as usize {
        return Err(Error::EntryCountMismatch {
            expected: sidecar.entry_count as usize,
            found: entries.len(),
        });
    }

    let mut report = BuildReport::default();
    let mut out = vec![0u8; sidecar.header_offset as usize];
    out.write_u32::<BigEndian>(0)?;
    out.write_u32::<BigEndian>(sidecar.entry_count)?;

    for entry in entries {
        let (group, id) = match entry.slot {
            Slot::Record { group, id } => (group, id),
            _ => {
                return Err(Error::SlotKind {
                    index: entry.index,
                    expected: "record",
                })
            }
        };

        // tokens %s/%d/%i/%f são resolvidos pela engine: modo 1 exige o
        // mesmo multiconjunto na tradução
        if entry.meta == 1 {
            qa::check_placeholders(entry)?;
        }

        let normalized = glyph::normalize(entry.outgoing_text(), glyphs);
        let (encoded, replaced) = encoding::encode_text(&normalized, text_encoding);
        report.replaced_chars += replaced;

        let mode = entry.meta as u8;
        let with_param = mode == 1;
        let text_len = 1 + usize::from(with_param) + encoded.len();

        out.write_u16::<BigEndian>(group)?;
        out.write_u16::<BigEndian>(id)?;
        out.write_u32::<BigEndian>(text_len as u32)?;
        out.write_u8(mode)?;
        if with_param {
            out.write_u8(entry.param.unwrap_or(0))?;
        }
        out.extend_from_slice(&encoded);

        if entry.has_translation() {
            report.written += 1;
        } else {
            report.untouched += 1;
        }
    }

    info!(entries = entries.len(), "structured build done");
    Ok((out, report))
}

#[derive(Debug, Clone, Default)]
pub struct GroupedBuildOptions {
    /// Acrescenta um NUL ao fim do texto codificado quando ele ainda não
    /// termina em NUL.
    pub add_null: bool,
}

/// Rebuild da variante B. Grupos e entradas são tratados como vetores
/// densos de tamanho `max(índice)+1`; buraco vira grupo/entrada vazio
/// (`meta = 0`, comprimento zero), então a saída é sempre uma tabela
/// completa que a engine carrega, mesmo vinda de uma edição esparsa.
///
/// Só a tradução passa pela cadeia de glifos; original intocado é
/// reemitido tal e qual, para o ciclo decode→encode sem edições devolver
/// os bytes de entrada.
pub fn build_grouped(
    entries: &[LangEntry],
    glyphs: &GlyphSet,
    text_encoding: &'static Encoding,
    opts: &GroupedBuildOptions,
) -> Result<(Vec<u8>, BuildReport)> {
    let mut report = BuildReport::default();

    let mut language_code = 0u32;
    let mut found_pseudo = false;
    let mut groups: BTreeMap<i64, (u32, BTreeMap<i64, &LangEntry>)> = BTreeMap::new();

    for entry in entries {
        let (group_index, group_id, entry_index) = match entry.slot {
            Slot::Grouped {
                group_index,
                group_id,
                entry_index,
            } => (group_index, group_id, entry_index),
            _ => {
                return Err(Error::SlotKind {
                    index: entry.index,
                    expected: "grouped",
                })
            }
        };

        if group_index == -1 {
            language_code = group_id;
            found_pseudo = true;
            continue;
        }
        if group_index < 0 || entry_index < 0 {
            return Err(Error::SlotKind {
                index: entry.index,
                expected: "grouped",
            });
        }

        groups
            .entry(group_index)
            .or_insert_with(|| (group_id, BTreeMap::new()))
            .1
            .insert(entry_index, entry);
    }

    if !found_pseudo {
        warn!("no language-code pseudo-entry in the table, writing 0");
    }

    let group_count = groups.keys().next_back().map_or(0, |&g| g + 1) as u32;

    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(language_code)?;
    out.write_u32::<LittleEndian>(group_count)?;

    for g in 0..i64::from(group_count) {
        let (group_id, group_entries) = match groups.get(&g) {
            Some((gid, map)) => (*gid, Some(map)),
            None => (0, None),
        };

        let entry_count = group_entries
            .and_then(|m| m.keys().next_back().copied())
            .map_or(0, |e| e + 1) as u32;

        out.write_u32::<LittleEndian>(group_id)?;
        out.write_u32::<LittleEndian>(entry_count)?;

        for e in 0..i64::from(entry_count) {
            let entry = group_entries.and_then(|m| m.get(&e).copied());

            let (meta, mut encoded) = match entry {
                Some(entry) if entry.has_translation() => {
                    let normalized = glyph::normalize(&entry.translated, glyphs);
                    let (bytes, replaced) = encoding::encode_text(&normalized, text_encoding);
                    report.replaced_chars += replaced;
                    report.written += 1;
                    (entry.meta, bytes)
                }
                Some(entry) => {
                    let (bytes, replaced) = encoding::encode_text(&entry.original, text_encoding);
                    report.replaced_chars += replaced;
                    report.untouched += 1;
                    (entry.meta, bytes)
                }
                None => {
                    debug!(group = g, entry = e, "index gap filled with an empty entry");
                    (0, Vec::new())
                }
            };

            if opts.add_null && entry.is_some() && encoded.last() != Some(&0) {
                encoded.push(0);
            }

            out.write_u32::<LittleEndian>(meta)?;
            out.write_u32::<LittleEndian>(encoded.len() as u32)?;
            out.extend_from_slice(&encoded);
        }
    }

    info!(
        language_code,
        group_count,
        written = report.written,
        "grouped build done"
    );
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entry::LangEntry;
    use crate::parsers::{flat, grouped, structured};
    use crate::services::glyph::{VARIANT_A, VARIANT_B};
    use encoding_rs::{UTF_8, WINDOWS_1252};
    use pretty_assertions::assert_eq;

    // ------------------------------------------------------------------
    // modo plano
    // ------------------------------------------------------------------

    fn flat_file() -> Vec<u8> {
        let mut data = vec![0u8; flat::DEFAULT_SKIP];
        data[..4].copy_from_slice(b"HDR\x01");
        data.extend_from_slice(b"Hello\x00\x00\x00");
        data.extend_from_slice(b"World!\x00");
        data.extend(std::iter::repeat(0u8).take(flat::NULL_RUN_LIMIT));
        data
    }

    #[test]
    fn untouched_flat_entries_round_trip_byte_identical() {
        let original = flat_file();
        let scan = flat::parse(&original, &flat::FlatOptions::default());

        let (rebuilt, report) =
            patch_flat(&original, &scan.entries, &VARIANT_A, WINDOWS_1252).unwrap();

        assert_eq!(rebuilt, original);
        assert_eq!(report.written, 0);
        assert_eq!(report.untouched, scan.entries.len());
    }

    #[test]
    fn flat_patch_overwrites_only_the_edited_slot() {
        let original = flat_file();
        let mut scan = flat::parse(&original, &flat::FlatOptions::default());
        scan.entries[0].translated = "Salut".into();

        let (rebuilt, report) =
            patch_flat(&original, &scan.entries, &VARIANT_A, WINDOWS_1252).unwrap();

        assert_eq!(rebuilt.len(), original.len());
        assert_eq!(&rebuilt[flat::DEFAULT_SKIP..flat::DEFAULT_SKIP + 5], b"Salut");
        // o resto do arquivo fica intacto
        assert_eq!(&rebuilt[flat::DEFAULT_SKIP + 5..], &original[flat::DEFAULT_SKIP + 5..]);
        assert_eq!(report.written, 1);
        assert_eq!(report.untouched, 1);
    }

    #[test]
    fn flat_patch_truncates_to_the_slot() {
        let original = flat_file();
        let mut scan = flat::parse(&original, &flat::FlatOptions::default());
        scan.entries[0].translated = "Bonjour tout le monde".into();

        let (rebuilt, report) =
            patch_flat(&original, &scan.entries, &VARIANT_A, WINDOWS_1252).unwrap();

        assert_eq!(rebuilt.len(), original.len());
        assert_eq!(&rebuilt[flat::DEFAULT_SKIP..flat::DEFAULT_SKIP + 5], b"Bonjo");
        assert_eq!(report.truncated, 1);
    }

    #[test]
    fn flat_patch_repads_the_null_region() {
        let original = flat_file();
        let mut scan = flat::parse(&original, &flat::FlatOptions::default());
        scan.entries[0].translated = "Oi".into();

        let (rebuilt, _) =
            patch_flat(&original, &scan.entries, &VARIANT_A, WINDOWS_1252).unwrap();

        let start = flat::DEFAULT_SKIP;
        assert_eq!(&rebuilt[start..start + 2], b"Oi");
        // zeros regravados logo depois do texto novo
        assert_eq!(&rebuilt[start + 2..start + 2 + 3], &[0, 0, 0]);
    }

    #[test]
    fn flat_slot_outside_the_file_is_skipped() {
        let original = flat_file();
        let entry = LangEntry {
            index: 0,
            slot: Slot::Flat {
                offset: original.len(),
                max_len: 8,
                null_count: 1,
            },
            meta: 0,
            param: None,
            original: "x".into(),
            translated: "y".into(),
            raw_length: 8,
        };

        let (rebuilt, report) =
            patch_flat(&original, &[entry], &VARIANT_A, WINDOWS_1252).unwrap();
        assert_eq!(rebuilt, original);
        assert_eq!(report.skipped, 1);
    }

    // ------------------------------------------------------------------
    // modo estruturado
    // ------------------------------------------------------------------

    fn structured_scan() -> (Vec<u8>, structured::StructuredScan) {
        let data = structured::tests::file(
            8,
            &[
                structured::tests::record(3, 7, 1, Some(2), b"Press %s to continue"),
                structured::tests::record(3, 8, 0, None, b"OPTIONS"),
            ],
        );
        let opts = structured::StructuredOptions {
            trim_labels: false,
            ..structured::StructuredOptions::default()
        };
        let scan = structured::parse(&data, &opts).unwrap();
        (data, scan)
    }

    #[test]
    fn structured_build_round_trips_through_parse() {
        let (_, scan) = structured_scan();
        let (rebuilt, _) =
            build_structured(&scan.entries, &scan.sidecar, &VARIANT_A, WINDOWS_1252).unwrap();

        let opts = structured::StructuredOptions {
            trim_labels: false,
            ..structured::StructuredOptions::default()
        };
        let reparsed = structured::parse(&rebuilt, &opts).unwrap();

        assert_eq!(reparsed.sidecar, scan.sidecar);
        assert_eq!(reparsed.entries.len(), scan.entries.len());
        for (a, b) in scan.entries.iter().zip(reparsed.entries.iter()) {
            assert_eq!(a.slot, b.slot);
            assert_eq!(a.meta, b.meta);
            assert_eq!(a.param, b.param);
            assert_eq!(a.original, b.original);
        }
    }

    #[test]
    fn structured_build_keeps_placeholders_or_aborts() {
        let (_, mut scan) = structured_scan();

        scan.entries[0].translated = "Appuyez sur %s pour continuer".into();
        assert!(
            build_structured(&scan.entries, &scan.sidecar, &VARIANT_A, WINDOWS_1252).is_ok()
        );

        scan.entries[0].translated = "Appuyez pour continuer".into();
        assert!(matches!(
            build_structured(&scan.entries, &scan.sidecar, &VARIANT_A, WINDOWS_1252),
            Err(Error::PlaceholderMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn structured_build_recomputes_text_len() {
        let (_, mut scan) = structured_scan();
        scan.entries[1].translated = "OPÇÕES".into();

        let (rebuilt, _) =
            build_structured(&scan.entries, &scan.sidecar, &VARIANT_A, WINDOWS_1252).unwrap();

        let opts = structured::StructuredOptions {
            trim_labels: false,
            ..structured::StructuredOptions::default()
        };
        let reparsed = structured::parse(&rebuilt, &opts).unwrap();
        // a fonte da variante A não tem Ç maiúsculo: o mapa manual troca
        // por C; Õ existe e sobrevive ao filtro de bytes
        assert_eq!(reparsed.entries[1].original, "OPCÕES");
        assert_eq!(reparsed.entries[1].raw_length, 1 + 6);
    }

    #[test]
    fn structured_build_validates_the_shape() {
        let (_, scan) = structured_scan();

        // contagem diferente do cabeçalho persistido
        let short = &scan.entries[..1];
        assert!(matches!(
            build_structured(short, &scan.sidecar, &VARIANT_A, WINDOWS_1252),
            Err(Error::EntryCountMismatch { expected: 2, found: 1 })
        ));

        // buraco na sequência de índices
        let mut gapped = scan.entries.clone();
        gapped[1].index = 5;
        assert!(matches!(
            build_structured(&gapped, &scan.sidecar, &VARIANT_A, WINDOWS_1252),
            Err(Error::IndexGap { .. })
        ));
    }

    #[test]
    fn structured_build_restores_the_header_position() {
        let (original, scan) = structured_scan();
        let (rebuilt, _) =
            build_structured(&scan.entries, &scan.sidecar, &VARIANT_A, WINDOWS_1252).unwrap();

        // mesmo enchimento e mesmo cabeçalho nos primeiros bytes
        assert_eq!(&rebuilt[..16], &original[..16]);
    }

    // ------------------------------------------------------------------
    // variante B
    // ------------------------------------------------------------------

    #[test]
    fn grouped_no_edit_round_trip_is_byte_identical() {
        let original = grouped::tests::sample_file();
        let scan = grouped::parse(&original, &grouped::GroupedOptions::default()).unwrap();

        let (rebuilt, report) = build_grouped(
            &scan.entries,
            &VARIANT_B,
            UTF_8,
            &GroupedBuildOptions::default(),
        )
        .unwrap();

        assert_eq!(rebuilt, original);
        assert_eq!(report.written, 0);
    }

    #[test]
    fn grouped_translation_is_normalized_and_written() {
        let original = grouped::tests::sample_file();
        let mut scan = grouped::parse(&original, &grouped::GroupedOptions::default()).unwrap();
        scan.entries[1].translated = "Dzień".into();

        let (rebuilt, _) = build_grouped(
            &scan.entries,
            &VARIANT_B,
            UTF_8,
            &GroupedBuildOptions::default(),
        )
        .unwrap();

        let reparsed = grouped::parse(&rebuilt, &grouped::GroupedOptions::default()).unwrap();
        // ń decompõe para n na fonte da variante B
        assert_eq!(reparsed.entries[1].original, "Dzien");
    }

    #[test]
    fn grouped_gaps_become_empty_groups_and_entries() {
        let pseudo = LangEntry {
            index: 0,
            slot: Slot::Grouped {
                group_index: -1,
                group_id: 7,
                entry_index: -1,
            },
            meta: 0,
            param: None,
            original: "[Language Code: 7]".into(),
            translated: String::new(),
            raw_length: 0,
        };
        // só existe o grupo 2, entrada 1: tudo antes vira enchimento
        let lone = LangEntry {
            index: 1,
            slot: Slot::Grouped {
                group_index: 2,
                group_id: 77,
                entry_index: 1,
            },
            meta: 9,
            param: None,
            original: "end".into(),
            translated: String::new(),
            raw_length: 3,
        };

        let (rebuilt, _) = build_grouped(
            &[pseudo, lone],
            &VARIANT_B,
            UTF_8,
            &GroupedBuildOptions::default(),
        )
        .unwrap();

        let scan = grouped::parse(&rebuilt, &grouped::GroupedOptions::default()).unwrap();
        assert_eq!(scan.header.language_code, 7);
        assert_eq!(scan.header.group_count, 3);
        // grupo 2 tem duas entradas: a sintética e a real
        let real = scan.entries.last().unwrap();
        assert_eq!(
            real.slot,
            Slot::Grouped {
                group_index: 2,
                group_id: 77,
                entry_index: 1,
            }
        );
        assert_eq!(real.original, "end");
        assert_eq!(real.meta, 9);
        // a sintética é vazia com meta 0
        let synthetic = &scan.entries[scan.entries.len() - 2];
        assert_eq!(synthetic.original, "");
        assert_eq!(synthetic.meta, 0);
        assert_eq!(synthetic.raw_length, 0);
    }

    #[test]
    fn grouped_add_null_appends_once() {
        let original = grouped::tests::sample_file();
        let scan = grouped::parse(&original, &grouped::GroupedOptions::default()).unwrap();

        let opts = GroupedBuildOptions { add_null: true };
        let (rebuilt, _) = build_grouped(&scan.entries, &VARIANT_B, UTF_8, &opts).unwrap();

        let reparsed = grouped::parse(&rebuilt, &grouped::GroupedOptions::default()).unwrap();
        assert_eq!(reparsed.entries[1].original, "Bonjo\u{0}");
        assert_eq!(reparsed.entries[1].raw_length, 6);

        // reconstruir de novo com add_null não duplica o terminador
        let (again, _) = build_grouped(&reparsed.entries, &VARIANT_B, UTF_8, &opts).unwrap();
        assert_eq!(again, rebuilt);
    }
}
