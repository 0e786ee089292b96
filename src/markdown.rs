// ABOUTME: Markdown parser for slide decks with per-slide YAML frontmatter
// ABOUTME: Splits a document into slide records holding typed content nodes

use crate::errors::{DeckError, Result};
use log::{debug, info};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

const SEPARATOR: &str = "---";

/// One typed line of slide body content; text is raw and not yet formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Heading { level: u8, text: String },
    Paragraph(String),
    BulletItem { indent: usize, text: String },
    /// `number` is the literal ordinal written in the source, kept as the list start
    NumberedItem { indent: usize, number: u32, text: String },
    Spacer,
}

/// An image reference taken from frontmatter or from the slide body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageRef {
    pub src: String,
    pub caption: Option<String>,
    /// Space-separated style class names, e.g. `border-thin rounded-lg`
    pub class: Option<String>,
    /// Inline style keys such as `border_enabled`, highest precedence
    pub style_overrides: Mapping,
}

impl ImageRef {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Self::default()
        }
    }

    fn from_value(value: &Value, slide: usize) -> Result<Self> {
        match value {
            Value::String(src) => Ok(Self::new(src.as_str())),
            Value::Mapping(map) => {
                let mut image = ImageRef::default();
                for (key, value) in map {
                    match key.as_str() {
                        Some("src") => {
                            image.src = scalar_string(value).unwrap_or_default();
                        }
                        Some("data-caption") | Some("caption") => {
                            image.caption = scalar_string(value);
                        }
                        Some("class") => image.class = scalar_string(value),
                        _ => {
                            image.style_overrides.insert(key.clone(), value.clone());
                        }
                    }
                }
                if image.src.trim().is_empty() {
                    return Err(DeckError::ValidationError(format!(
                        "Slide {}: image entry has no 'src'",
                        slide
                    )));
                }
                Ok(image)
            }
            _ => Err(DeckError::ValidationError(format!(
                "Slide {}: image entries must be a path or a mapping with 'src'",
                slide
            ))),
        }
    }
}

/// One parsed slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideRecord {
    pub layout_name: String,
    /// Frontmatter `title`, else the first level 1 or 2 heading of the body
    pub title: Option<String>,
    pub images: Vec<ImageRef>,
    pub body: Vec<ContentNode>,
    /// Frontmatter keys other than `layout`, `title` and `images`, verbatim
    pub metadata: Mapping,
    pub section: Option<String>,
}

impl SlideRecord {
    pub fn new(layout_name: impl Into<String>) -> Self {
        Self {
            layout_name: layout_name.into(),
            title: None,
            images: Vec::new(),
            body: Vec::new(),
            metadata: Mapping::new(),
            section: None,
        }
    }

    /// A metadata value as a string, if it is a scalar.
    pub fn meta_str(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(scalar_string)
    }
}

/// Document-level frontmatter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    /// Template path override, relative to the project root
    pub template: Option<String>,
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub meta: DocumentMeta,
    pub slides: Vec<SlideRecord>,
}

/// Parse a whole document into its metadata and slides.
pub fn parse_document(text: &str) -> Result<ParsedDocument> {
    let text = text.replace("\r\n", "\n");
    let lines: Vec<&str> = text.split('\n').collect();

    let (meta, rest) = split_document_frontmatter(&lines)?;
    let blocks = split_into_slides(rest);

    let mut slides = Vec::with_capacity(blocks.len());
    for (i, block) in blocks.iter().enumerate() {
        let slide = parse_slide(block, i + 1)?;
        debug!(
            "Slide {}: layout='{}', title={:?}, {} nodes, {} images",
            i + 1,
            slide.layout_name,
            slide.title,
            slide.body.len(),
            slide.images.len()
        );
        slides.push(slide);
    }
    info!("Parsed {} slides from markdown", slides.len());

    Ok(ParsedDocument { meta, slides })
}

/// Parse a document into slide records, discarding document metadata.
pub fn parse_markdown(text: &str) -> Result<Vec<SlideRecord>> {
    Ok(parse_document(text)?.slides)
}

/// Render a scalar YAML value as a string.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn closing_delimiter(lines: &[&str]) -> Option<usize> {
    lines
        .iter()
        .skip(1)
        .position(|l| l.trim() == SEPARATOR)
        .map(|p| p + 1)
}

fn parse_frontmatter(lines: &[&str], context: &str) -> Result<Mapping> {
    let yaml = lines.join("\n");
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(&yaml) {
        Ok(Value::Mapping(map)) => Ok(map),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(DeckError::ValidationError(format!(
            "{} must be a YAML mapping",
            context
        ))),
        Err(source) => Err(DeckError::YamlError {
            context: context.to_string(),
            source,
        }),
    }
}

/// Peel off the document frontmatter. A leading block with a `layout` key
/// belongs to the first slide and is left in place.
fn split_document_frontmatter<'a>(lines: &'a [&'a str]) -> Result<(DocumentMeta, &'a [&'a str])> {
    if lines.first().map(|l| l.trim()) != Some(SEPARATOR) {
        return Ok((DocumentMeta::default(), lines));
    }
    let Some(end) = closing_delimiter(lines) else {
        return Ok((DocumentMeta::default(), lines));
    };
    let mut map = parse_frontmatter(&lines[1..end], "document frontmatter")?;
    if map.contains_key("layout") {
        return Ok((DocumentMeta::default(), lines));
    }

    let mut take = |key: &str| map.remove(key).as_ref().and_then(scalar_string);
    let meta = DocumentMeta {
        title: take("title"),
        author: take("author"),
        date: take("date"),
        template: take("template"),
        extra: Mapping::new(),
    };
    let meta = DocumentMeta { extra: map, ..meta };
    debug!("Document frontmatter: {:?}", meta);
    Ok((meta, &lines[end + 1..]))
}

fn looks_like_yaml_start(lines: &[&str], separator_at: usize) -> bool {
    lines[separator_at + 1..]
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map_or(false, |next| next.contains(':') && !next.starts_with('#'))
}

/// Split into slide blocks. `---` is both the slide separator and the slide
/// frontmatter delimiter: a separator followed by `key:` lines opens
/// frontmatter, the next separator closes it, and any other separator after
/// content ends the slide. Blank blocks are dropped.
fn split_into_slides<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut slides = Vec::new();
    let mut current: Vec<&'a str> = Vec::new();
    let mut in_frontmatter = false;
    let is_blank = |block: &[&str]| block.iter().all(|l| l.trim().is_empty());

    for (i, &line) in lines.iter().enumerate() {
        if line.trim() != SEPARATOR {
            current.push(line);
            continue;
        }
        if in_frontmatter {
            current.push(line);
            in_frontmatter = false;
            continue;
        }
        if !is_blank(&current) {
            slides.push(std::mem::take(&mut current));
        }
        current.clear();
        if looks_like_yaml_start(lines, i) {
            in_frontmatter = true;
            current.push(line);
        }
    }
    if !is_blank(&current) {
        slides.push(current);
    }
    slides
}

fn parse_slide(block: &[&str], index: usize) -> Result<SlideRecord> {
    let start = block
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(block.len());
    let block = &block[start..];

    let (mut frontmatter, body_lines) = match block.first() {
        Some(first) if first.trim() == SEPARATOR => match closing_delimiter(block) {
            Some(end) => (
                parse_frontmatter(&block[1..end], &format!("slide {} frontmatter", index))?,
                &block[end + 1..],
            ),
            None => (Mapping::new(), block),
        },
        _ => (Mapping::new(), block),
    };

    let layout_name = match frontmatter.remove("layout") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        _ => return Err(DeckError::MissingLayout { slide: index }),
    };

    let mut slide = SlideRecord::new(layout_name);
    let fm_title = frontmatter.remove("title").as_ref().and_then(scalar_string);
    match frontmatter.remove("images") {
        None | Some(Value::Null) => {}
        Some(Value::Sequence(items)) => {
            for item in &items {
                slide.images.push(ImageRef::from_value(item, index)?);
            }
        }
        Some(single) => slide.images.push(ImageRef::from_value(&single, index)?),
    }
    slide.metadata = frontmatter;

    let body = parse_body(body_lines);
    slide.title = fm_title.or(body.title);
    slide.body = body.nodes;
    slide.images.extend(body.images);
    slide.section = body.section;
    Ok(slide)
}

#[derive(Debug, Default)]
struct ParsedBody {
    title: Option<String>,
    nodes: Vec<ContentNode>,
    images: Vec<ImageRef>,
    section: Option<String>,
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("Invalid heading regex"))
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*+]\s+(.*)$").expect("Invalid bullet regex"))
}

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,9})[.)]\s+(.*)$").expect("Invalid numbered item regex"))
}

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^<!--\s*section:\s*(.+?)\s*-->$").expect("Invalid section marker regex")
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<!--.*-->$").expect("Invalid comment regex"))
}

fn md_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^!\[([^\]]*)\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)$"#)
            .expect("Invalid image regex")
    })
}

fn img_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^<img\s[^>]*>$").expect("Invalid img tag regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("Invalid attribute regex")
    })
}

/// Leading whitespace width in columns, a tab counting as two.
fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum()
}

fn parse_image_line(line: &str) -> Option<ImageRef> {
    if let Some(caps) = md_image_re().captures(line) {
        let mut image = ImageRef::new(&caps[2]);
        let alt = caps[1].trim();
        if !alt.is_empty() {
            image.caption = Some(alt.to_string());
        }
        return Some(image);
    }
    if !img_tag_re().is_match(line) {
        return None;
    }
    let mut image = ImageRef::default();
    for caps in attr_re().captures_iter(line) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str())
            .to_string();
        match caps[1].to_ascii_lowercase().as_str() {
            "src" => image.src = value,
            "data-caption" => image.caption = Some(value),
            "class" => image.class = Some(value),
            "alt" => {}
            other => {
                image
                    .style_overrides
                    .insert(Value::String(other.to_string()), attribute_value(value));
            }
        }
    }
    (!image.src.is_empty()).then_some(image)
}

/// Numbers and booleans in tag attributes are typed the way YAML would type them.
fn attribute_value(raw: String) -> Value {
    match serde_yaml::from_str::<Value>(&raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_))) => value,
        _ => Value::String(raw),
    }
}

fn parse_body(lines: &[&str]) -> ParsedBody {
    let mut body = ParsedBody::default();
    let mut started = false;
    let mut title_taken = false;

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() {
            if started {
                body.nodes.push(ContentNode::Spacer);
            }
            continue;
        }
        if let Some(caps) = section_re().captures(line) {
            body.section = Some(caps[1].to_string());
            continue;
        }
        if comment_re().is_match(line) {
            continue;
        }
        if let Some(image) = parse_image_line(line) {
            body.images.push(image);
            continue;
        }

        let indent = indent_width(raw) / 2;
        let node = if let Some(caps) = heading_re().captures(line) {
            let level = caps[1].len() as u8;
            let text = caps[2].trim().to_string();
            if !title_taken && level <= 2 {
                title_taken = true;
                body.title = Some(text);
                continue;
            }
            ContentNode::Heading { level, text }
        } else if let Some(caps) = bullet_re().captures(line) {
            ContentNode::BulletItem {
                indent,
                text: caps[1].trim_end().to_string(),
            }
        } else if let Some(caps) = numbered_re().captures(line) {
            ContentNode::NumberedItem {
                indent,
                number: caps[1].parse().unwrap_or(1),
                text: caps[2].trim_end().to_string(),
            }
        } else {
            ContentNode::Paragraph(line.to_string())
        };
        body.nodes.push(node);
        started = true;
    }

    while body.nodes.last() == Some(&ContentNode::Spacer) {
        body.nodes.pop();
    }
    body
}
