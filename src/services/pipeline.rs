use encoding_rs::Encoding;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::entry::{LangEntry, LangTable, Variant, VariantAMode};
use crate::model::sidecar::StructuredSidecar;
use crate::parsers::{detect, flat, grouped, structured};
use crate::services::rebuild::{self, BuildReport};
use crate::services::{encoding, glyph};

pub struct ExtractConfig {
    /// Variante pedida pelo chamador; `None` deixa a detecção decidir.
    pub variant: Option<Variant>,
    /// Sub-modo da variante A (flag explícita, nunca inferido).
    pub mode: VariantAMode,
    /// Bytes de cabeçalho do modo plano.
    pub skip: usize,
    /// Codificação de texto; `None` usa o padrão da variante.
    pub encoding: Option<&'static Encoding>,
    /// Política de corte de rótulo do modo estruturado.
    pub trim_labels: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            variant: None,
            mode: VariantAMode::Flat,
            skip: flat::DEFAULT_SKIP,
            encoding: None,
            trim_labels: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtractReport {
    pub detected: Option<Variant>,
    pub entries: usize,
    /// Registros pulados (modo estruturado) ou varredura abortada (plano).
    pub skipped: usize,
    pub aborted: bool,
}

pub struct ExtractOutcome {
    pub table: LangTable,
    /// Presente só no modo estruturado; o chamador guarda e devolve no build.
    pub sidecar: Option<StructuredSidecar>,
    pub report: ExtractReport,
}

/// Concilia a variante pedida com a detectada. Contradição é fatal antes
/// de qualquer leitura de entrada; detecção inconclusiva sem pedido
/// explícito também para aqui.
fn resolve_variant(requested: Option<Variant>, detected: Option<Variant>) -> Result<Variant> {
    match (requested, detected) {
        (Some(r), Some(d)) if r != d => Err(Error::FormatMismatch {
            requested: r.as_str(),
            detected: d.as_str(),
        }),
        (Some(r), _) => Ok(r),
        (None, Some(d)) => Ok(d),
        (None, None) => Err(Error::FormatUnknown),
    }
}

/// detecção → decode. Só consome bytes; abrir e fechar arquivos é papel
/// do chamador.
pub fn extract(data: &[u8], cfg: &ExtractConfig) -> Result<ExtractOutcome> {
    let detected = detect::detect(data);
    let variant = resolve_variant(cfg.variant, detected)?;
    let text_encoding = cfg.encoding.unwrap_or_else(|| encoding::default_for(variant));

    info!(%variant, ?detected, "extracting");

    match (variant, cfg.mode) {
        (Variant::A, VariantAMode::Flat) => {
            let opts = flat::FlatOptions {
                skip: cfg.skip,
                encoding: text_encoding,
            };
            let scan = flat::parse(data, &opts);
            let report = ExtractReport {
                detected,
                entries: scan.entries.len(),
                skipped: 0,
                aborted: scan.aborted,
            };
            Ok(ExtractOutcome {
                table: LangTable::new(variant, scan.entries),
                sidecar: None,
                report,
            })
        }
        (Variant::A, VariantAMode::Structured) => {
            let opts = structured::StructuredOptions {
                trim_labels: cfg.trim_labels,
                encoding: text_encoding,
            };
            let scan = structured::parse(data, &opts)?;
            for reason in &scan.skipped {
                warn!(%reason, "record skipped during decode");
            }
            let report = ExtractReport {
                detected,
                entries: scan.entries.len(),
                skipped: scan.skipped.len(),
                aborted: false,
            };
            Ok(ExtractOutcome {
                table: LangTable::new(variant, scan.entries),
                sidecar: Some(scan.sidecar),
                report,
            })
        }
        (Variant::B, _) => {
            let opts = grouped::GroupedOptions {
                encoding: text_encoding,
            };
            let scan = grouped::parse(data, &opts)?;
            let report = ExtractReport {
                detected,
                entries: scan.entries.len(),
                skipped: 0,
                aborted: false,
            };
            Ok(ExtractOutcome {
                table: LangTable::new(variant, scan.entries),
                sidecar: None,
                report,
            })
        }
    }
}

pub struct BuildConfig {
    pub variant: Variant,
    pub mode: VariantAMode,
    pub encoding: Option<&'static Encoding>,
    /// Bytes do arquivo original; obrigatório no modo plano (remendo).
    pub original: Option<Vec<u8>>,
    /// Metadados do decode; obrigatório no modo estruturado.
    pub sidecar: Option<StructuredSidecar>,
    pub add_null: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            variant: Variant::B,
            mode: VariantAMode::Flat,
            encoding: None,
            original: None,
            sidecar: None,
            add_null: false,
        }
    }
}

/// validação → encode. Falha de forma ou de token nunca emite arquivo.
pub fn build(entries: &[LangEntry], cfg: &BuildConfig) -> Result<(Vec<u8>, BuildReport)> {
    let text_encoding = cfg
        .encoding
        .unwrap_or_else(|| encoding::default_for(cfg.variant));

    info!(variant = %cfg.variant, entries = entries.len(), "building");

    match (cfg.variant, cfg.mode) {
        (Variant::A, VariantAMode::Flat) => {
            let original = cfg.original.as_deref().ok_or(Error::OriginalMissing)?;
            rebuild::patch_flat(original, entries, &glyph::VARIANT_A, text_encoding)
        }
        (Variant::A, VariantAMode::Structured) => {
            let sidecar = cfg.sidecar.as_ref().ok_or(Error::SidecarMissing)?;
            rebuild::build_structured(entries, sidecar, &glyph::VARIANT_A, text_encoding)
        }
        (Variant::B, _) => {
            if cfg.sidecar.is_some() {
                warn!("sidecar ignored for variant b");
            }
            let opts = rebuild::GroupedBuildOptions {
                add_null: cfg.add_null,
            };
            rebuild::build_grouped(entries, &glyph::VARIANT_B, text_encoding, &opts)
        }
    }
}
