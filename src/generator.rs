// ABOUTME: End-to-end deck generation for deckmark
// ABOUTME: Runs config, markdown parsing, layout discovery, slide building and PPTX output in order

use crate::builder::{build_slide, Slide};
use crate::config::ResolvedConfig;
use crate::errors::{DeckError, Result};
use crate::images::{AssetDir, AssetResolver};
use crate::layouts::{discover_layouts, emu_to_inches, LayoutRegistry};
use crate::markdown::{parse_document, ParsedDocument};
use crate::pptx::PptxTemplate;
use crate::utils::{ensure_parent_directory_exists, validate_directory_exists, validate_file_exists};
use log::info;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub output: PathBuf,
    pub template: PathBuf,
    pub slides: usize,
}

/// Build every slide of `document`, stopping at the first failure.
///
/// Errors are wrapped with the 1-based slide index and its layout name.
pub fn build_deck(
    document: &ParsedDocument,
    registry: &LayoutRegistry,
    config: &ResolvedConfig,
    assets: &impl AssetResolver,
) -> Result<Vec<Slide>> {
    document
        .slides
        .iter()
        .enumerate()
        .map(|(i, record)| {
            info!("Building slide {} with layout '{}'", i + 1, record.layout_name);
            build_slide(record, registry, config, assets).map_err(|e| e.in_slide(i + 1, &record.layout_name))
        })
        .collect()
}

/// Template for this run: the document's `template` key wins over `paths.template`.
pub fn template_for(document: &ParsedDocument, config: &ResolvedConfig) -> Result<PathBuf> {
    match &document.meta.template {
        Some(template) => {
            info!("Document selects template {}", template);
            Ok(config.resolve_path(template))
        }
        None => config.template_path(),
    }
}

/// Generate the output deck described by `config`.
pub fn generate(config: &ResolvedConfig) -> Result<GenerationReport> {
    let content_path = config.content_path()?;
    validate_file_exists(&content_path)?;
    info!("Reading content from {:?}", content_path);
    let text = fs::read_to_string(&content_path).map_err(DeckError::FileReadError)?;
    let document = parse_document(&text)?;
    info!("Parsed {} slides", document.slides.len());

    let template_path = template_for(&document, config)?;
    let template = PptxTemplate::open(&template_path)?;
    let registry = discover_layouts(&template)?;

    let assets_dir = config.assets_dir();
    if config.get_str("paths.assets_dir").is_some() {
        validate_directory_exists(&assets_dir)?;
    }
    let assets = AssetDir::new(assets_dir);
    let slides = build_deck(&document, &registry, config, &assets)?;

    let output = config.output_path()?;
    ensure_parent_directory_exists(&output)?;
    template.save(&slides, &document.meta, &output)?;

    Ok(GenerationReport {
        output,
        template: template.path().to_path_buf(),
        slides: slides.len(),
    })
}

/// Human-readable inventory of a template's layouts and placeholders.
pub fn describe_template(path: &Path) -> Result<String> {
    let template = PptxTemplate::open(path)?;
    let registry = discover_layouts(&template)?;

    let mut out = String::new();
    let _ = writeln!(out, "Template: {}", path.display());
    let _ = writeln!(out, "{} layouts", registry.len());
    for layout in registry.layouts() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} ({})", layout.name, layout.handle.part);
        for ph in &layout.placeholders {
            let geometry = match ph.frame {
                Some(f) => format!(
                    "at ({:.2}in, {:.2}in) size {:.2}in x {:.2}in",
                    emu_to_inches(f.x),
                    emu_to_inches(f.y),
                    emu_to_inches(f.cx),
                    emu_to_inches(f.cy)
                ),
                None => "no geometry".to_string(),
            };
            let _ = writeln!(
                out,
                "  - {} [{}] idx={} '{}' {}",
                ph.kind,
                ph.ph_type.as_deref().unwrap_or("obj"),
                ph.index,
                ph.name,
                geometry
            );
        }
    }
    Ok(out)
}
