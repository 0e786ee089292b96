// ABOUTME: PPTX document backend for deckmark
// ABOUTME: Reads layouts from a .pptx template and writes generated slides into a copy of it

use crate::builder::Slide;
use crate::errors::{DeckError, Result};
use crate::layouts::{Frame, LayoutEntry, LayoutHandle, PlaceholderDescriptor, PlaceholderKind, TemplateSource};
use crate::markdown::DocumentMeta;
use crate::slide_xml::render_slide;
use crate::utils::validate_file_exists;
use log::{debug, info, warn};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use zip::{write::FileOptions, ZipArchive, ZipWriter};

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const CT_CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

const SECTION_LIST_URI: &str = "{521415D9-36F7-43E2-AB2F-B90AF26B5E84}";
const FIRST_SLIDE_ID: u32 = 256;

/// One entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn internal(id: &str, rel_type: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        }
    }

    pub fn external(id: &str, rel_type: &str, target: &str) -> Self {
        Self {
            external: true,
            ..Self::internal(id, rel_type, target)
        }
    }
}

/// Render a relationship list as a `.rels` part.
pub fn relationships_xml(relationships: &[Relationship]) -> String {
    let mut entries = String::new();
    for rel in relationships {
        entries.push_str(&format!(
            r#"    <Relationship Id="{}" Type="{}" Target="{}"{}/>
"#,
            escape(rel.id.as_str()),
            escape(rel.rel_type.as_str()),
            escape(rel.target.as_str()),
            if rel.external { r#" TargetMode="External""# } else { "" }
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
{}</Relationships>"#,
        entries
    )
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// The namespaced `r:id` attribute, as opposed to a plain `id`.
fn relationship_id(e: &BytesStart) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// First free numeric `rIdN` after the highest one in use.
fn next_relationship_number(relationships: &[Relationship]) -> u32 {
    relationships
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
        + 1
}

fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut relationships = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute(&e, b"Id")?.unwrap_or_default();
                let rel_type = attribute(&e, b"Type")?.unwrap_or_default();
                let target = attribute(&e, b"Target")?.unwrap_or_default();
                let external = attribute(&e, b"TargetMode")?.as_deref() == Some("External");
                relationships.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(relationships)
}

/// `r:id` values of every element named `element`, in document order.
fn relationship_ids(xml: &[u8], element: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut ids = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == element => {
                if let Some(id) = relationship_id(&e)? {
                    ids.push(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ids)
}

/// Path of the `.rels` part that belongs to `part`.
pub fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative target from `source_part` to `target_part`, both package paths.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dirs: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_segments: Vec<&str> = target_part.split('/').collect();
    let (target_dirs, file) = target_segments.split_at(target_segments.len() - 1);
    let common = source_dirs
        .iter()
        .zip(target_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = vec![".."; source_dirs.len() - common];
    parts.extend_from_slice(&target_dirs[common..]);
    parts.extend_from_slice(file);
    parts.join("/")
}

/// A placeholder shape read from a layout or master part.
#[derive(Debug, Clone)]
struct ScannedPlaceholder {
    name: String,
    ph_type: Option<String>,
    index: u32,
    frame: Option<Frame>,
}

#[derive(Debug, Default)]
struct ScannedPart {
    name: Option<String>,
    placeholders: Vec<ScannedPlaceholder>,
}

#[derive(Debug, Default)]
struct ShapeState {
    name: Option<String>,
    ph: Option<(Option<String>, u32)>,
    offset: Option<(i64, i64)>,
    extent: Option<(i64, i64)>,
    in_xfrm: bool,
}

fn parse_i64(e: &BytesStart, name: &[u8]) -> Result<Option<i64>> {
    Ok(attribute(e, name)?.and_then(|v| v.parse().ok()))
}

/// Scan a slide layout or master for its name and placeholder shapes.
fn scan_part(xml: &[u8]) -> Result<ScannedPart> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut scanned = ScannedPart::default();
    let mut shape: Option<ShapeState> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"cSld" if scanned.name.is_none() => scanned.name = attribute(&e, b"name")?,
                b"sp" | b"pic" => shape = Some(ShapeState::default()),
                b"cNvPr" => {
                    if let Some(state) = shape.as_mut().filter(|s| s.name.is_none()) {
                        state.name = attribute(&e, b"name")?;
                    }
                }
                b"ph" => {
                    if let Some(state) = shape.as_mut() {
                        let ph_type = attribute(&e, b"type")?;
                        let index = attribute(&e, b"idx")?.and_then(|v| v.parse().ok()).unwrap_or(0);
                        state.ph = Some((ph_type, index));
                    }
                }
                b"xfrm" => {
                    if let Some(state) = shape.as_mut() {
                        state.in_xfrm = true;
                    }
                }
                b"off" => {
                    if let Some(state) = shape.as_mut().filter(|s| s.in_xfrm && s.offset.is_none()) {
                        if let (Some(x), Some(y)) = (parse_i64(&e, b"x")?, parse_i64(&e, b"y")?) {
                            state.offset = Some((x, y));
                        }
                    }
                }
                b"ext" => {
                    if let Some(state) = shape.as_mut().filter(|s| s.in_xfrm && s.extent.is_none()) {
                        if let (Some(cx), Some(cy)) = (parse_i64(&e, b"cx")?, parse_i64(&e, b"cy")?) {
                            state.extent = Some((cx, cy));
                        }
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"xfrm" => {
                    if let Some(state) = shape.as_mut() {
                        state.in_xfrm = false;
                    }
                }
                b"sp" | b"pic" => {
                    if let Some(ShapeState {
                        name,
                        ph: Some((ph_type, index)),
                        offset,
                        extent,
                        ..
                    }) = shape.take()
                    {
                        let frame = match (offset, extent) {
                            (Some((x, y)), Some((cx, cy))) => Some(Frame { x, y, cx, cy }),
                            _ => None,
                        };
                        scanned.placeholders.push(ScannedPlaceholder {
                            name: name.unwrap_or_default(),
                            ph_type,
                            index,
                            frame,
                        });
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(scanned)
}

/// Master placeholder a layout placeholder inherits geometry from.
fn master_slot(ph_type: Option<&str>) -> &'static str {
    match ph_type {
        Some("title") | Some("ctrTitle") => "title",
        Some("dt") => "dt",
        Some("ftr") => "ftr",
        Some("sldNum") => "sldNum",
        _ => "body",
    }
}

fn file_stem(part: &str) -> String {
    let file = part.rsplit('/').next().unwrap_or(part);
    file.trim_end_matches(".xml").to_string()
}

#[derive(Debug, Default)]
struct ContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);
        let mut types = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"Default" => {
                        if let (Some(ext), Some(ct)) = (attribute(&e, b"Extension")?, attribute(&e, b"ContentType")?) {
                            types.defaults.insert(ext.to_ascii_lowercase(), ct);
                        }
                    }
                    b"Override" => {
                        if let (Some(part), Some(ct)) = (attribute(&e, b"PartName")?, attribute(&e, b"ContentType")?) {
                            types.overrides.push((part, ct));
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(types)
    }

    fn set_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part);
        self.overrides.retain(|(name, _)| *name != part_name);
        self.overrides.push((part_name, content_type.to_string()));
    }

    fn to_xml(&self) -> String {
        let mut entries = String::new();
        for (ext, ct) in &self.defaults {
            entries.push_str(&format!(
                "    <Default Extension=\"{}\" ContentType=\"{}\"/>\n",
                escape(ext.as_str()),
                escape(ct.as_str())
            ));
        }
        for (part, ct) in &self.overrides {
            entries.push_str(&format!(
                "    <Override PartName=\"{}\" ContentType=\"{}\"/>\n",
                escape(part.as_str()),
                escape(ct.as_str())
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
{}</Types>"#,
            entries
        )
    }
}

fn image_content_type(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "svg" => Some("image/svg+xml"),
        "emf" => Some("image/x-emf"),
        "wmf" => Some("image/x-wmf"),
        _ => None,
    }
}

/// Parts that reference the template's own slides and are dropped on save.
fn is_slide_bound_part(part: &str) -> bool {
    ["ppt/slides/", "ppt/notesSlides/", "ppt/comments/"]
        .iter()
        .any(|prefix| part.starts_with(prefix))
}

fn sld_id_list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<p:sldIdLst\s*/>|<p:sldIdLst>.*?</p:sldIdLst>").expect("Invalid slide id list regex")
    })
}

fn cust_show_list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<p:custShowLst\s*/>|<p:custShowLst>.*?</p:custShowLst>")
            .expect("Invalid custom show regex")
    })
}

fn section_ext_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<p:ext uri="\{521415D9-36F7-43E2-AB2F-B90AF26B5E84\}">.*?</p:ext>"#)
            .expect("Invalid section list regex")
    })
}

/// Sections as (name, slide ids). Slides before the first marker fall into
/// a default section; unmarked slides stay in the current section.
fn group_sections(slides: &[Slide]) -> Vec<(String, Vec<u32>)> {
    if slides.iter().all(|s| s.section.is_none()) {
        return Vec::new();
    }
    let mut sections: Vec<(String, Vec<u32>)> = Vec::new();
    for (i, slide) in slides.iter().enumerate() {
        let id = FIRST_SLIDE_ID + i as u32;
        match &slide.section {
            Some(name) => sections.push((name.clone(), vec![id])),
            None => match sections.last_mut() {
                Some((_, ids)) => ids.push(id),
                None => sections.push(("Default Section".to_string(), vec![id])),
            },
        }
    }
    sections
}

fn section_list_ext(sections: &[(String, Vec<u32>)]) -> String {
    let mut xml = format!(
        r#"<p:ext uri="{}"><p14:sectionLst xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main">"#,
        SECTION_LIST_URI
    );
    for (name, ids) in sections {
        xml.push_str(&format!(
            r#"<p14:section name="{}" id="{{{}}}"><p14:sldIdLst>"#,
            escape(name.as_str()),
            uuid::Uuid::new_v4().to_string().to_uppercase()
        ));
        for id in ids {
            xml.push_str(&format!(r#"<p14:sldId id="{}"/>"#, id));
        }
        xml.push_str("</p14:sldIdLst></p14:section>");
    }
    xml.push_str("</p14:sectionLst></p:ext>");
    xml
}

/// Rewrite presentation.xml to list exactly the generated slides.
fn rewrite_presentation(xml: &str, slide_rids: &[String], sections: &[(String, Vec<u32>)]) -> Result<String> {
    let mut list = String::from("<p:sldIdLst>");
    for (i, rid) in slide_rids.iter().enumerate() {
        list.push_str(&format!(
            r#"<p:sldId id="{}" r:id="{}"/>"#,
            FIRST_SLIDE_ID + i as u32,
            rid
        ));
    }
    list.push_str("</p:sldIdLst>");

    let mut out = if sld_id_list_regex().is_match(xml) {
        sld_id_list_regex().replace(xml, regex::NoExpand(&list)).into_owned()
    } else {
        let anchor = xml.find("<p:sldSz").ok_or_else(|| {
            DeckError::PptxError("presentation.xml has neither a slide list nor a slide size".to_string())
        })?;
        format!("{}{}{}", &xml[..anchor], list, &xml[anchor..])
    };

    out = cust_show_list_regex().replace_all(&out, "").into_owned();
    out = section_ext_regex().replace_all(&out, "").into_owned();
    out = out.replace("<p:extLst></p:extLst>", "");

    if !sections.is_empty() {
        let ext = section_list_ext(sections);
        if let Some(pos) = out.find("</p:extLst>") {
            out.insert_str(pos, &ext);
        } else if let Some(pos) = out.rfind("</p:presentation>") {
            out.insert_str(pos, &format!("<p:extLst>{}</p:extLst>", ext));
        }
    }
    Ok(out)
}

fn core_properties_xml(meta: &DocumentMeta) -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let title = meta.title.as_deref().unwrap_or("Presentation");
    let creator = meta.author.as_deref().unwrap_or("deckmark");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <dc:title>{title}</dc:title>
    <dc:creator>{creator}</dc:creator>
    <cp:lastModifiedBy>deckmark</cp:lastModifiedBy>
    <cp:revision>1</cp:revision>
    <dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>
    <dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>
</cp:coreProperties>"#,
        title = escape(title),
        creator = escape(creator),
        now = now
    )
}

/// Images copied into the output package, one part per source file.
#[derive(Debug, Default)]
struct MediaStore {
    parts: Vec<(String, Vec<u8>)>,
    by_path: HashMap<PathBuf, String>,
}

impl MediaStore {
    fn add(&mut self, path: &Path, existing: &HashSet<String>) -> Result<String> {
        if let Some(part) = self.by_path.get(path) {
            return Ok(part.clone());
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "png".to_string());
        let mut n = self.parts.len() + 1;
        let mut part = format!("ppt/media/deckmark_image{}.{}", n, ext);
        while existing.contains(&part) {
            n += 1;
            part = format!("ppt/media/deckmark_image{}.{}", n, ext);
        }
        let bytes = fs::read(path).map_err(|e| DeckError::ImageError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!("Embedding {:?} as {}", path, part);
        self.parts.push((part.clone(), bytes));
        self.by_path.insert(path.to_path_buf(), part.clone());
        Ok(part)
    }

    fn extensions(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter_map(|(part, _)| part.rsplit_once('.').map(|(_, ext)| ext))
    }
}

/// An opened `.pptx` template, held in memory as its package parts.
#[derive(Debug, Clone)]
pub struct PptxTemplate {
    path: PathBuf,
    order: Vec<String>,
    parts: HashMap<String, Vec<u8>>,
}

impl PptxTemplate {
    /// Open a template and read every part of its package.
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening template {:?}", path);
        validate_file_exists(path)?;
        let file = fs::File::open(path).map_err(DeckError::FileReadError)?;
        let mut archive = ZipArchive::new(file)?;

        let mut order = Vec::new();
        let mut parts = HashMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes).map_err(DeckError::FileReadError)?;
            order.push(name.clone());
            parts.insert(name, bytes);
        }
        debug!("Template has {} parts", order.len());

        Ok(Self {
            path: path.to_path_buf(),
            order,
            parts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn part(&self, name: &str) -> Result<&[u8]> {
        self.parts
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DeckError::PptxError(format!("Template is missing part {}", name)))
    }

    fn relationships(&self, part: &str) -> Result<Vec<Relationship>> {
        match self.parts.get(&rels_path(part)) {
            Some(xml) => parse_relationships(xml),
            None => Ok(Vec::new()),
        }
    }

    /// Package path of the main presentation part.
    pub fn presentation_part(&self) -> Result<String> {
        let package_rels = self.relationships("")?;
        Ok(package_rels
            .iter()
            .find(|r| r.rel_type == REL_OFFICE_DOCUMENT)
            .map(|r| resolve_target("", &r.target))
            .unwrap_or_else(|| "ppt/presentation.xml".to_string()))
    }

    /// Targets of `source`'s relationships named in `ids`, in that order.
    fn follow(&self, source: &str, ids: &[String]) -> Result<Vec<String>> {
        let rels = self.relationships(source)?;
        let mut targets = Vec::new();
        for id in ids {
            match rels.iter().find(|r| &r.id == id) {
                Some(rel) => targets.push(resolve_target(source, &rel.target)),
                None => warn!("{} references missing relationship {}", source, id),
            }
        }
        Ok(targets)
    }

    /// Write `slides` into a copy of this template at `output`.
    ///
    /// The template's own slides are removed; layouts, masters, themes and
    /// media are carried over unchanged.
    pub fn save(&self, slides: &[Slide], meta: &DocumentMeta, output: &Path) -> Result<()> {
        info!("Writing {} slides to {:?}", slides.len(), output);
        let presentation = self.presentation_part()?;
        let presentation_rels_path = rels_path(&presentation);

        let mut content_types = match self.parts.get("[Content_Types].xml") {
            Some(xml) => ContentTypes::parse(xml)?,
            None => return Err(DeckError::PptxError("Template has no [Content_Types].xml".to_string())),
        };
        content_types
            .overrides
            .retain(|(part, _)| !is_slide_bound_part(part.trim_start_matches('/')));

        let mut presentation_rels: Vec<Relationship> = self
            .relationships(&presentation)?
            .into_iter()
            .filter(|r| r.rel_type != REL_SLIDE)
            .collect();
        let mut next_rid = next_relationship_number(&presentation_rels);

        let existing: HashSet<String> = self.order.iter().cloned().collect();
        let mut media = MediaStore::default();
        let mut new_parts: Vec<(String, Vec<u8>)> = Vec::new();
        let mut slide_rids = Vec::new();

        for (i, slide) in slides.iter().enumerate() {
            let slide_part = format!("ppt/slides/slide{}.xml", i + 1);
            let layout_target = relative_target(&slide_part, &slide.layout.part);
            let mut embed = |path: &Path| -> Result<String> {
                let media_part = media.add(path, &existing)?;
                Ok(relative_target(&slide_part, &media_part))
            };
            let rendered = render_slide(slide, &layout_target, &mut embed)?;

            info!("Creating slide XML: {}", slide_part);
            new_parts.push((rels_path(&slide_part), relationships_xml(&rendered.relationships).into_bytes()));
            new_parts.push((slide_part.clone(), rendered.xml.into_bytes()));
            content_types.set_override(&slide_part, CT_SLIDE);

            let rid = format!("rId{}", next_rid);
            next_rid += 1;
            presentation_rels.push(Relationship::internal(
                &rid,
                REL_SLIDE,
                &relative_target(&presentation, &slide_part),
            ));
            slide_rids.push(rid);
        }

        for ext in media.extensions() {
            if !content_types.defaults.contains_key(ext) {
                if let Some(ct) = image_content_type(ext) {
                    content_types.defaults.insert(ext.to_string(), ct.to_string());
                }
            }
        }
        content_types
            .defaults
            .entry("rels".to_string())
            .or_insert_with(|| CT_RELATIONSHIPS.to_string());
        content_types.set_override("docProps/core.xml", CT_CORE_PROPERTIES);

        let presentation_xml = String::from_utf8_lossy(self.part(&presentation)?).into_owned();
        let presentation_xml = rewrite_presentation(&presentation_xml, &slide_rids, &group_sections(slides))?;

        let mut package_rels = self.relationships("")?;
        if !package_rels.iter().any(|r| r.rel_type == REL_CORE_PROPERTIES) {
            let id = format!("rId{}", next_relationship_number(&package_rels));
            package_rels.push(Relationship::internal(&id, REL_CORE_PROPERTIES, "docProps/core.xml"));
        }

        let mut replaced: HashMap<String, Vec<u8>> = HashMap::new();
        replaced.insert("[Content_Types].xml".to_string(), content_types.to_xml().into_bytes());
        replaced.insert(presentation.clone(), presentation_xml.into_bytes());
        replaced.insert(presentation_rels_path, relationships_xml(&presentation_rels).into_bytes());
        replaced.insert(rels_path(""), relationships_xml(&package_rels).into_bytes());
        replaced.insert("docProps/core.xml".to_string(), core_properties_xml(meta).into_bytes());

        let file = fs::File::create(output).map_err(DeckError::FileReadError)?;
        let mut zip = ZipWriter::new(file);

        info!("Creating PPTX structure: [Content_Types].xml");
        zip.start_file("[Content_Types].xml", FileOptions::default())?;
        zip.write_all(&replaced["[Content_Types].xml"])?;

        let mut written: HashSet<String> = HashSet::new();
        written.insert("[Content_Types].xml".to_string());
        for name in &self.order {
            if written.contains(name) || is_slide_bound_part(name) {
                continue;
            }
            let bytes = replaced.get(name).or_else(|| self.parts.get(name));
            if let Some(bytes) = bytes {
                debug!("Copying part {}", name);
                zip.start_file(name.as_str(), FileOptions::default())?;
                zip.write_all(bytes)?;
                written.insert(name.clone());
            }
        }
        for (name, bytes) in replaced.iter().filter(|(name, _)| !written.contains(*name)) {
            info!("Creating PPTX structure: {}", name);
            zip.start_file(name.as_str(), FileOptions::default())?;
            zip.write_all(bytes)?;
        }
        for (name, bytes) in new_parts.iter().chain(media.parts.iter()) {
            debug!("Adding part {}", name);
            zip.start_file(name.as_str(), FileOptions::default())?;
            zip.write_all(bytes)?;
        }

        info!("Finalizing PPTX file");
        zip.finish()?;
        info!("PPTX file created at {:?}", output);
        Ok(())
    }
}

impl TemplateSource for PptxTemplate {
    fn layout_entries(&self) -> Result<Vec<LayoutEntry>> {
        let presentation = self.presentation_part()?;
        let master_ids = relationship_ids(self.part(&presentation)?, b"sldMasterId")?;
        let mut entries = Vec::new();

        for master in self.follow(&presentation, &master_ids)? {
            let master_xml = self.part(&master)?;
            let master_frames: HashMap<&'static str, Frame> = scan_part(master_xml)?
                .placeholders
                .into_iter()
                .filter_map(|ph| ph.frame.map(|f| (master_slot(ph.ph_type.as_deref()), f)))
                .collect();

            let layout_ids = relationship_ids(master_xml, b"sldLayoutId")?;
            for layout_part in self.follow(&master, &layout_ids)? {
                let scanned = scan_part(self.part(&layout_part)?)?;
                let name = scanned.name.unwrap_or_else(|| file_stem(&layout_part));
                let total_placeholders = scanned.placeholders.len();
                let placeholders: Vec<PlaceholderDescriptor> = scanned
                    .placeholders
                    .into_iter()
                    .filter_map(|ph| {
                        let kind = PlaceholderKind::from_ooxml(ph.ph_type.as_deref())?;
                        let frame = ph
                            .frame
                            .or_else(|| master_frames.get(master_slot(ph.ph_type.as_deref())).copied());
                        let mut descriptor = PlaceholderDescriptor::new(kind, ph.name, ph.index);
                        descriptor.ph_type = ph.ph_type;
                        descriptor.frame = frame;
                        Some(descriptor)
                    })
                    .collect();
                debug!("Found layout '{}' in {}", name, layout_part);
                entries.push(LayoutEntry {
                    name,
                    handle: LayoutHandle {
                        position: entries.len(),
                        part: layout_part,
                    },
                    placeholders,
                    total_placeholders,
                });
            }
        }
        Ok(entries)
    }
}
