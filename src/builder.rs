// ABOUTME: Slide builder turning parsed slide records into backend-neutral slides
// ABOUTME: Resolves placeholders, formats text runs and applies configured styling

use crate::config::ResolvedConfig;
use crate::errors::Result;
use crate::images::{self, AssetResolver, CaptionBox, FitMode, ImagePlacement};
use crate::layouts::{LayoutHandle, LayoutRegistry, PlaceholderDescriptor};
use crate::markdown::{scalar_string, ContentNode, ImageRef, SlideRecord};
use crate::placeholders::{PlaceholderRole, ResolutionPass};
use crate::rich_text::{self, StyledRun};
use log::{debug, info};
use serde_yaml::Value;

const DEFAULT_BULLET_CHAR: &str = "\u{2022}";
const DEFAULT_NUMBERING: &str = "arabicPeriod";

/// Paragraph bullet setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bullet {
    /// Explicitly no bullet, overriding the placeholder's list style
    None,
    Char(String),
    AutoNumber { scheme: String, start: u32 },
}

/// One paragraph of a text shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<StyledRun>,
    /// Outline level, 0-based
    pub level: u32,
    /// `None` keeps whatever the placeholder's list style says
    pub bullet: Option<Bullet>,
    pub font_pt: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub space_before_pt: Option<f64>,
    pub line_spacing_pt: Option<f64>,
}

impl Paragraph {
    fn new(runs: Vec<StyledRun>) -> Self {
        Self {
            runs,
            level: 0,
            bullet: None,
            font_pt: None,
            bold: None,
            italic: None,
            space_before_pt: None,
            line_spacing_pt: None,
        }
    }

    /// Plain text of the paragraph.
    pub fn text(&self) -> String {
        rich_text::plain_text(&self.runs)
    }
}

/// Text placed into a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct TextShape {
    pub role: PlaceholderRole,
    pub placeholder: PlaceholderDescriptor,
    pub paragraphs: Vec<Paragraph>,
}

/// A picture placed into a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureShape {
    pub placeholder: PlaceholderDescriptor,
    pub placement: ImagePlacement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlideShape {
    Text(TextShape),
    Picture(PictureShape),
    Caption(CaptionBox),
}

/// A fully resolved slide, ready for a document backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub layout_name: String,
    pub layout: LayoutHandle,
    pub section: Option<String>,
    pub shapes: Vec<SlideShape>,
}

impl Slide {
    /// Text shapes filling placeholders of the given role.
    pub fn text_shapes(&self, role: PlaceholderRole) -> impl Iterator<Item = &TextShape> {
        self.shapes.iter().filter_map(move |shape| match shape {
            SlideShape::Text(text) if text.role == role => Some(text),
            _ => None,
        })
    }

    pub fn pictures(&self) -> impl Iterator<Item = &PictureShape> {
        self.shapes.iter().filter_map(|shape| match shape {
            SlideShape::Picture(picture) => Some(picture),
            _ => None,
        })
    }

    pub fn captions(&self) -> impl Iterator<Item = &CaptionBox> {
        self.shapes.iter().filter_map(|shape| match shape {
            SlideShape::Caption(caption) => Some(caption),
            _ => None,
        })
    }
}

/// Placeholder names requested by the slide's `placeholders` metadata.
#[derive(Debug, Default)]
struct NameHints {
    title: Option<String>,
    body: Option<String>,
    pictures: Vec<Option<String>>,
}

impl NameHints {
    fn from_record(record: &SlideRecord) -> Self {
        let Some(map) = record.metadata.get("placeholders").and_then(Value::as_mapping) else {
            return Self::default();
        };
        let pictures = match map.get("pictures") {
            Some(Value::Sequence(items)) => items.iter().map(scalar_string).collect(),
            Some(single) => vec![scalar_string(single)],
            None => Vec::new(),
        };
        Self {
            title: map.get("title").and_then(scalar_string),
            body: map.get("body").and_then(scalar_string),
            pictures,
        }
    }
}

/// Build one slide from its record.
///
/// Fails on the first unresolvable element; nothing is produced for the slide
/// in that case.
pub fn build_slide(
    record: &SlideRecord,
    registry: &LayoutRegistry,
    config: &ResolvedConfig,
    assets: &impl AssetResolver,
) -> Result<Slide> {
    let layout = registry.lookup(&record.layout_name)?;
    let mut pass = ResolutionPass::new(layout);
    let hints = NameHints::from_record(record);
    let mut shapes = Vec::new();

    if let Some(title) = record.title.as_deref() {
        let placeholder = pass.resolve(PlaceholderRole::Title, 0, hints.title.as_deref())?;
        shapes.push(SlideShape::Text(TextShape {
            role: PlaceholderRole::Title,
            placeholder: placeholder.clone(),
            paragraphs: vec![title_paragraph(title, &layout.name, config)],
        }));
    }

    if !record.body.is_empty() {
        let placeholder = pass.resolve(PlaceholderRole::Body, 0, hints.body.as_deref())?;
        shapes.push(SlideShape::Text(TextShape {
            role: PlaceholderRole::Body,
            placeholder: placeholder.clone(),
            paragraphs: body_paragraphs(&record.body, &layout.name, config),
        }));
    }

    if !record.images.is_empty() {
        let refs = with_slide_caption(record);
        let mut placeholders = Vec::with_capacity(refs.len());
        for ordinal in 0..refs.len() {
            let name = hints.pictures.get(ordinal).cloned().flatten();
            placeholders.push(pass.resolve(PlaceholderRole::Picture, ordinal, name.as_deref())?);
        }
        let areas: Vec<_> = placeholders.iter().map(|ph| ph.frame).collect();
        let mode = FitMode::parse(record.meta_str("image_fit").as_deref());
        let placements =
            images::place_images(&refs, &areas, &layout.name, mode, config, assets)?;
        for (placeholder, mut placement) in placeholders.into_iter().zip(placements) {
            let caption = placement.caption.take();
            shapes.push(SlideShape::Picture(PictureShape {
                placeholder: placeholder.clone(),
                placement,
            }));
            if let Some(caption) = caption {
                shapes.push(SlideShape::Caption(caption));
            }
        }
    }

    info!(
        "Built slide on layout '{}' with {} shapes",
        layout.name,
        shapes.len()
    );
    Ok(Slide {
        layout_name: layout.name.clone(),
        layout: layout.handle.clone(),
        section: record.section.clone(),
        shapes,
    })
}

/// Images of the record, with the slide-level `caption` given to the first
/// image lacking one.
fn with_slide_caption(record: &SlideRecord) -> Vec<ImageRef> {
    let mut images = record.images.clone();
    if let Some(caption) = record.meta_str("caption") {
        if let Some(image) = images.iter_mut().find(|i| i.caption.is_none()) {
            image.caption = Some(caption);
        }
    }
    images
}

fn title_paragraph(title: &str, layout_name: &str, config: &ResolvedConfig) -> Paragraph {
    let mut paragraph = Paragraph::new(rich_text::format(title));
    paragraph.font_pt = config.font_pt(layout_name, "title");
    paragraph.bold = config.formatting_flag(layout_name, "title", "bold");
    paragraph.italic = config.formatting_flag(layout_name, "title", "italic");
    paragraph
}

fn bullet_char(config: &ResolvedConfig) -> String {
    config
        .get_str("bullets.char")
        .unwrap_or(DEFAULT_BULLET_CHAR)
        .to_string()
}

fn numbering_scheme(config: &ResolvedConfig) -> String {
    config
        .get_str("bullets.numbering_type")
        .unwrap_or(DEFAULT_NUMBERING)
        .to_string()
}

/// Turn body nodes into paragraphs for a single text placeholder.
pub fn body_paragraphs(
    nodes: &[ContentNode],
    layout_name: &str,
    config: &ResolvedConfig,
) -> Vec<Paragraph> {
    let paragraph_gap = config.spacing_pt(layout_name, "paragraph_pt");
    let line_spacing = config.spacing_pt(layout_name, "line_pt");
    let bullet = bullet_char(config);
    let scheme = numbering_scheme(config);
    // Start number of the open numbered list at each indent
    let mut list_starts: Vec<Option<u32>> = Vec::new();

    let mut paragraphs = Vec::with_capacity(nodes.len());
    for node in nodes {
        let (mut paragraph, font_kind, format_level) = match node {
            ContentNode::Heading { level, text } => {
                list_starts.clear();
                let mut p = Paragraph::new(rich_text::format(text));
                p.bullet = Some(Bullet::None);
                (p, format!("h{}", level), format!("h{}", level))
            }
            ContentNode::Paragraph(text) => {
                list_starts.clear();
                let mut p = Paragraph::new(rich_text::format(text));
                p.bullet = Some(Bullet::None);
                (p, "body".to_string(), "body".to_string())
            }
            ContentNode::BulletItem { indent, text } => {
                list_starts.truncate(indent + 1);
                list_starts.resize(indent + 1, None);
                list_starts[*indent] = None;
                let mut p = Paragraph::new(rich_text::format(text));
                p.level = *indent as u32;
                p.bullet = Some(Bullet::Char(bullet.clone()));
                (p, "bullet".to_string(), format!("level_{}", indent))
            }
            ContentNode::NumberedItem { indent, number, text } => {
                list_starts.truncate(indent + 1);
                list_starts.resize(indent + 1, None);
                let start = *list_starts[*indent].get_or_insert(*number);
                let mut p = Paragraph::new(rich_text::format(text));
                p.level = *indent as u32;
                p.bullet = Some(Bullet::AutoNumber {
                    scheme: scheme.clone(),
                    start,
                });
                (p, "numbered".to_string(), format!("level_{}", indent))
            }
            ContentNode::Spacer => {
                let mut p = Paragraph::new(Vec::new());
                p.bullet = Some(Bullet::None);
                p.font_pt = config.font_pt(layout_name, "spacer");
                p.space_before_pt = config.spacing_pt(layout_name, "spacer_pt");
                paragraphs.push(p);
                continue;
            }
        };

        paragraph.font_pt = config.font_pt(layout_name, &font_kind);
        paragraph.bold = config.formatting_flag(layout_name, &format_level, "bold");
        paragraph.italic = config.formatting_flag(layout_name, &format_level, "italic");
        if !paragraphs.is_empty() {
            paragraph.space_before_pt = paragraph_gap;
        }
        paragraph.line_spacing_pt = line_spacing;
        debug!(
            "Body paragraph ({}, level {}): {:?}",
            font_kind,
            paragraph.level,
            paragraph.text()
        );
        paragraphs.push(paragraph);
    }
    paragraphs
}
