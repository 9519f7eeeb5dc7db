use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use consumo_pdf::{Branding, Customization, Engine, Error, Summary};
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "consumo-pdf")]
#[command(version, about = "Render a consumption report PDF from a JSON summary", long_about = None)]
struct Cli {
    /// Summary JSON (items, totals, universe, selectedIds, companyName)
    summary: PathBuf,

    /// Output PDF path (default: summary path with a .pdf extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Branding JSON (colors, header/footer text, letterhead, fonts)
    #[arg(short, long)]
    branding: Option<PathBuf>,

    /// Customization JSON (section switches, observations, generatedAt)
    #[arg(short, long)]
    customization: Option<PathBuf>,

    /// Company name shown in the header
    #[arg(long)]
    company: Option<String>,

    /// Document title
    #[arg(long)]
    title: Option<String>,

    /// Section to leave out: summary, detail, charts, movements, observations, universe (can be repeated)
    #[arg(long, value_name = "SECTION")]
    exclude: Vec<String>,

    /// TrueType font for regular text
    #[arg(long)]
    font: Option<PathBuf>,

    /// TrueType font for bold text
    #[arg(long)]
    font_bold: Option<PathBuf>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn run(cli: Cli) -> Result<(), Error> {
    let summary: Summary = read_json(&cli.summary)?;
    let mut branding: Branding = match &cli.branding {
        Some(path) => read_json(path)?,
        None => Branding::default(),
    };
    let mut customization: Customization = match &cli.customization {
        Some(path) => read_json(path)?,
        None => Customization::default(),
    };

    if let Some(company) = cli.company {
        branding.company_name = company;
    }
    if let Some(font) = cli.font {
        branding.font_regular = Some(font);
    }
    if let Some(font) = cli.font_bold {
        branding.font_bold = Some(font);
    }
    if cli.title.is_some() {
        customization.title = cli.title;
    }
    for section in &cli.exclude {
        if !customization.disable(section) {
            log::warn!("Unknown section '{section}' in --exclude, ignoring");
        }
    }

    let output = cli
        .output
        .unwrap_or_else(|| cli.summary.with_extension("pdf"));
    let engine = Engine::new(&branding)?;
    let report = engine.compile(&summary, &branding, &customization)?;
    report.save(&output)?;
    println!(
        "Wrote {} ({} page(s), {} bytes)",
        output.display(),
        report.page_count,
        report.pdf.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
