use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use lng_core::error::Result;
use lng_core::model::entry::{Variant, VariantAMode};
use lng_core::model::sidecar::StructuredSidecar;
use lng_core::parsers::detect;
use lng_core::services::{encoding, pipeline, qa, table_io};

#[derive(Parser)]
#[command(name = "lng-tool")]
#[command(about = "Extract and rebuild .lng localization tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum VariantArg {
    A,
    B,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::A => Variant::A,
            VariantArg::B => Variant::B,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum ModeArg {
    /// Strings terminadas em zero em posições varridas (variante A).
    Flat,
    /// Registros grupo/id com prefixo de comprimento (variante A).
    Structured,
}

impl From<ModeArg> for VariantAMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Flat => VariantAMode::Flat,
            ModeArg::Structured => VariantAMode::Structured,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum RenderArg {
    Csv,
    Txt,
    Both,
}

#[derive(Subcommand)]
enum Commands {
    /// Extrai um arquivo .lng para CSV (e/ou TXT de conferência)
    Extract {
        /// Arquivo .lng de entrada
        input: PathBuf,

        /// Prefixo dos arquivos de saída (prefixo.csv, prefixo.txt)
        prefix: String,

        /// Variante do arquivo; sem ela, vale a detecção automática
        #[arg(long)]
        variant: Option<VariantArg>,

        /// Sub-modo da variante A
        #[arg(long, default_value = "flat")]
        mode: ModeArg,

        /// Bytes de cabeçalho pulados no modo plano
        #[arg(long, default_value_t = lng_core::parsers::flat::DEFAULT_SKIP)]
        skip: usize,

        /// O que gerar
        #[arg(short = 'f', long, default_value = "both")]
        format: RenderArg,

        /// Codificação do texto (padrão: windows-1252 para A, utf-8 para B)
        #[arg(long)]
        encoding: Option<String>,

        /// Não corta o texto depois do rótulo em maiúsculas (modo estruturado)
        #[arg(long)]
        keep_labels: bool,
    },

    /// Reconstrói um arquivo .lng a partir do CSV editado
    Build {
        /// CSV editado
        table: PathBuf,

        /// Arquivo .lng de saída
        output: PathBuf,

        #[arg(long)]
        variant: VariantArg,

        #[arg(long, default_value = "flat")]
        mode: ModeArg,

        /// Arquivo .lng original (obrigatório no modo plano)
        #[arg(long)]
        original: Option<PathBuf>,

        /// Sidecar do modo estruturado; por padrão procura
        /// <tabela>.sidecar.json ao lado do CSV
        #[arg(long)]
        sidecar: Option<PathBuf>,

        /// Acrescenta um terminador NUL aos textos da variante B
        #[arg(long)]
        add_null: bool,

        #[arg(long)]
        encoding: Option<String>,
    },

    /// Mostra a variante detectada e um palpite de codificação
    Detect {
        /// Arquivo .lng de entrada
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Extract {
            input,
            prefix,
            variant,
            mode,
            skip,
            format,
            encoding: encoding_label,
            keep_labels,
        } => cmd_extract(
            &input,
            &prefix,
            variant,
            mode,
            skip,
            format,
            encoding_label.as_deref(),
            keep_labels,
        ),
        Commands::Build {
            table,
            output,
            variant,
            mode,
            original,
            sidecar,
            add_null,
            encoding: encoding_label,
        } => cmd_build(
            &table,
            &output,
            variant,
            mode,
            original.as_deref(),
            sidecar.as_deref(),
            add_null,
            encoding_label.as_deref(),
        ),
        Commands::Detect { input } => cmd_detect(&input),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_extract(
    input: &Path,
    prefix: &str,
    variant: Option<VariantArg>,
    mode: ModeArg,
    skip: usize,
    format: RenderArg,
    encoding_label: Option<&str>,
    keep_labels: bool,
) -> Result<()> {
    let data = std::fs::read(input)?;

    let cfg = pipeline::ExtractConfig {
        variant: variant.map(Variant::from),
        mode: mode.into(),
        skip,
        encoding: encoding_label.map(encoding::resolve_label).transpose()?,
        trim_labels: !keep_labels,
    };

    let outcome = pipeline::extract(&data, &cfg)?;

    let mut generated = Vec::new();

    if matches!(format, RenderArg::Csv | RenderArg::Both) {
        let csv_path = format!("{prefix}.csv");
        table_io::export_csv(&outcome.table.entries, &csv_path, outcome.table.variant, cfg.mode)?;
        generated.push(csv_path);
    }

    if matches!(format, RenderArg::Txt | RenderArg::Both) {
        let txt_path = format!("{prefix}.txt");
        table_io::export_txt(&outcome.table.entries, &txt_path)?;
        generated.push(txt_path);
    }

    if let Some(sidecar) = outcome.sidecar {
        let sidecar_path = format!("{prefix}.sidecar.json");
        sidecar.save(Path::new(&sidecar_path))?;
        generated.push(sidecar_path);
    }

    println!(
        "Extracted {} entries (variant {})",
        outcome.report.entries, outcome.table.variant
    );
    if outcome.report.aborted {
        println!("warning: scan stopped early at a size cap; table may be incomplete");
    }
    if outcome.report.skipped > 0 {
        println!(
            "warning: {} oversized records skipped; rebuilding this file will be refused",
            outcome.report.skipped
        );
    }
    println!("Generated: {}", generated.join(", "));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_build(
    table: &Path,
    output: &Path,
    variant: VariantArg,
    mode: ModeArg,
    original: Option<&Path>,
    sidecar: Option<&Path>,
    add_null: bool,
    encoding_label: Option<&str>,
) -> Result<()> {
    let variant = Variant::from(variant);
    let mode = VariantAMode::from(mode);

    let entries = table_io::import_csv(table, variant, mode)?;

    // avisos antes do rebuild; nada aqui é fatal
    let glyphs = match variant {
        Variant::A => &lng_core::services::glyph::VARIANT_A,
        Variant::B => &lng_core::services::glyph::VARIANT_B,
    };
    for issue in qa::run(&entries, glyphs) {
        eprintln!("warning: entry {}: [{}] {}", issue.index, issue.code, issue.message);
    }

    let sidecar_value = match (variant, mode) {
        (Variant::A, VariantAMode::Structured) => Some(load_sidecar(table, sidecar)?),
        _ => None,
    };

    let cfg = pipeline::BuildConfig {
        variant,
        mode,
        encoding: encoding_label.map(encoding::resolve_label).transpose()?,
        original: original.map(std::fs::read).transpose()?,
        sidecar: sidecar_value,
        add_null,
    };

    let (bytes, report) = pipeline::build(&entries, &cfg)?;
    std::fs::write(output, &bytes)?;

    println!("Rebuilt {} ({} bytes)", output.display(), bytes.len());
    println!(
        "  written: {}, untouched: {}, truncated: {}, skipped: {}",
        report.written, report.untouched, report.truncated, report.skipped
    );
    if report.replaced_chars > 0 {
        println!("  {} characters replaced during byte encoding", report.replaced_chars);
    }
    Ok(())
}

/// Sidecar explícito ou o irmão `<tabela>.sidecar.json` do CSV.
fn load_sidecar(table: &Path, explicit: Option<&Path>) -> Result<StructuredSidecar> {
    if let Some(path) = explicit {
        return StructuredSidecar::load(path);
    }
    let implied = table.with_extension("sidecar.json");
    if implied.exists() {
        return StructuredSidecar::load(&implied);
    }
    Err(lng_core::Error::SidecarMissing)
}

fn cmd_detect(input: &Path) -> Result<()> {
    let data = std::fs::read(input)?;

    match detect::detect(&data) {
        Some(variant) => println!("Detected: variant {variant}"),
        None => println!("Detected: unknown (pass --variant a or --variant b to extract)"),
    }

    let guess = encoding::detect_from_bytes(&data);
    println!(
        "Text encoding guess: {} (confidence {:.2})",
        guess.best, guess.confidence
    );
    Ok(())
}
