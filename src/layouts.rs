// ABOUTME: Layout registry for presentation templates
// ABOUTME: Indexes a template's layouts by name together with their placeholder inventories

use crate::errors::{DeckError, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;

/// English Metric Units per inch
pub const EMU_PER_INCH: i64 = 914_400;

/// Semantic type of a placeholder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    Title,
    Body,
    Picture,
    Other,
}

impl PlaceholderKind {
    /// Map an OOXML `<p:ph type="...">` value onto a kind.
    ///
    /// Returns `None` for slide furniture (date, footer, slide number, header)
    /// which never takes part in content mapping. An absent type means `obj`.
    pub fn from_ooxml(ph_type: Option<&str>) -> Option<Self> {
        match ph_type.unwrap_or("obj") {
            "title" | "ctrTitle" => Some(Self::Title),
            "body" | "subTitle" | "obj" => Some(Self::Body),
            "pic" => Some(Self::Picture),
            "dt" | "ftr" | "sldNum" | "hdr" => None,
            _ => Some(Self::Other),
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Title => "Title",
            Self::Body => "Body",
            Self::Picture => "Picture",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Position and size of a shape, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Frame {
    pub fn from_inches(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            x: inches_to_emu(left),
            y: inches_to_emu(top),
            cx: inches_to_emu(width),
            cy: inches_to_emu(height),
        }
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.cy
    }
}

pub fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH as f64).round() as i64
}

pub fn emu_to_inches(emu: i64) -> f64 {
    emu as f64 / EMU_PER_INCH as f64
}

/// One placeholder slot declared by a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderDescriptor {
    pub kind: PlaceholderKind,
    /// Raw OOXML placeholder type, e.g. `ctrTitle` or `obj`
    pub ph_type: Option<String>,
    pub name: String,
    /// Template-native placeholder index, the last-resort tie-break
    pub index: u32,
    /// Geometry declared by the layout, or inherited from the master
    pub frame: Option<Frame>,
}

impl PlaceholderDescriptor {
    pub fn new(kind: PlaceholderKind, name: impl Into<String>, index: u32) -> Self {
        Self {
            kind,
            ph_type: None,
            name: name.into(),
            index,
            frame: None,
        }
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// Opaque reference to a layout inside the template document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutHandle {
    /// Position of the layout in template order
    pub position: usize,
    /// Package part holding the layout, e.g. `ppt/slideLayouts/slideLayout2.xml`
    pub part: String,
}

/// A layout entry as reported by a template, before indexing.
#[derive(Debug, Clone)]
pub struct LayoutEntry {
    pub name: String,
    pub handle: LayoutHandle,
    /// Fillable placeholders; date, footer, header and slide number are not listed
    pub placeholders: Vec<PlaceholderDescriptor>,
    /// Every placeholder shape on the layout, footers included
    pub total_placeholders: usize,
}

/// Anything that can enumerate its layouts; the `.pptx` backend is one.
pub trait TemplateSource {
    fn layout_entries(&self) -> Result<Vec<LayoutEntry>>;
}

/// A discovered layout with its placeholder inventory ordered by index.
#[derive(Debug, Clone)]
pub struct LayoutDescriptor {
    pub name: String,
    pub handle: LayoutHandle,
    pub placeholders: Vec<PlaceholderDescriptor>,
}

impl LayoutDescriptor {
    pub fn new(
        name: impl Into<String>,
        handle: LayoutHandle,
        mut placeholders: Vec<PlaceholderDescriptor>,
    ) -> Self {
        // Stable: placeholders sharing an index keep document order
        placeholders.sort_by_key(|ph| ph.index);
        Self {
            name: name.into(),
            handle,
            placeholders,
        }
    }

    /// Placeholders of one kind, in index order.
    pub fn placeholders_of(&self, kind: PlaceholderKind) -> impl Iterator<Item = &PlaceholderDescriptor> {
        self.placeholders.iter().filter(move |ph| ph.kind == kind)
    }

    /// Human-readable listing used in diagnostics.
    pub fn describe_placeholders(&self) -> String {
        if self.placeholders.is_empty() {
            return "  (none)".to_string();
        }
        self.placeholders
            .iter()
            .map(|ph| format!("  - name='{}', type={}, idx={}", ph.name, ph.kind, ph.index))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Name-indexed, read-only view of a template's layouts.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: Vec<LayoutDescriptor>,
    by_name: HashMap<String, usize>,
}

impl LayoutRegistry {
    /// Build a registry from already-described layouts.
    ///
    /// Layouts without any placeholder shape are skipped; a layout holding only
    /// footers is kept with an empty inventory. On duplicate names the first wins.
    pub fn from_entries(entries: Vec<LayoutEntry>) -> Self {
        let mut registry = Self::default();
        for entry in entries {
            if entry.total_placeholders == 0 {
                debug!(
                    "Skipping layout '{}' ({}): no placeholders",
                    entry.name, entry.handle.part
                );
                continue;
            }
            if let Some(&existing) = registry.by_name.get(&entry.name) {
                warn!(
                    "Duplicate layout name '{}' at position {}; keeping first occurrence at position {}",
                    entry.name, entry.handle.position, registry.layouts[existing].handle.position
                );
                continue;
            }
            debug!(
                "Registered layout '{}' at position {} ({} placeholders)",
                entry.name,
                entry.handle.position,
                entry.placeholders.len()
            );
            registry
                .by_name
                .insert(entry.name.clone(), registry.layouts.len());
            registry
                .layouts
                .push(LayoutDescriptor::new(entry.name, entry.handle, entry.placeholders));
        }
        registry
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, name: &str) -> Result<&LayoutDescriptor> {
        self.by_name
            .get(name)
            .map(|&i| &self.layouts[i])
            .ok_or_else(|| DeckError::LayoutNotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Sorted layout names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Layouts in template order.
    pub fn layouts(&self) -> &[LayoutDescriptor] {
        &self.layouts
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

/// Inspect a template once and index its layouts by name.
pub fn discover_layouts(template: &impl TemplateSource) -> Result<LayoutRegistry> {
    let entries = template.layout_entries()?;
    let total = entries.len();
    let registry = LayoutRegistry::from_entries(entries);
    info!(
        "Layout registry built: {} of {} layouts usable",
        registry.len(),
        total
    );
    debug!("Available layouts: {:?}", registry.names());
    Ok(registry)
}
