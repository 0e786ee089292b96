// ABOUTME: Image placement and styling for slides
// ABOUTME: Fits images into their areas and resolves border, corner and caption styles

use crate::config::{layout_key, merge_trees, ResolvedConfig};
use crate::errors::{DeckError, Result};
use crate::layouts::{inches_to_emu, Frame};
use crate::markdown::ImageRef;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Border and corner styling for one picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStyle {
    pub border_enabled: bool,
    pub border_width_pt: f64,
    /// Hex RGB, with or without a leading `#`
    pub border_color: String,
    pub rounded_enabled: bool,
    pub corner_radius_in: f64,
}

impl Default for ImageStyle {
    fn default() -> Self {
        Self {
            border_enabled: true,
            border_width_pt: 2.0,
            border_color: "#44546A".to_string(),
            rounded_enabled: true,
            corner_radius_in: 0.1,
        }
    }
}

impl ImageStyle {
    /// Border color as six upper-case hex digits.
    pub fn border_rgb(&self) -> Result<String> {
        normalize_hex(&self.border_color)
    }

    /// `roundRect` adjust value for the corner radius, capped at 50%.
    pub fn corner_adj(&self) -> i64 {
        ((self.corner_radius_in * 100_000.0).round() as i64).clamp(0, 50_000)
    }

    /// Border width in EMU (12700 per point).
    pub fn border_width_emu(&self) -> i64 {
        (self.border_width_pt * 12_700.0).round() as i64
    }
}

/// Caption text box styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_pt: f64,
    pub color: String,
    pub gap_in: f64,
    pub height_in: f64,
    /// `left`, `center` or `right`
    pub align: String,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_pt: 12.0,
            color: "#333333".to_string(),
            gap_in: 0.05,
            height_in: 0.6,
            align: "left".to_string(),
        }
    }
}

impl CaptionStyle {
    pub fn rgb(&self) -> Result<String> {
        normalize_hex(&self.color)
    }
}

fn normalize_hex(color: &str) -> Result<String> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(hex.to_ascii_uppercase())
    } else {
        Err(DeckError::ValidationError(format!(
            "Invalid color '{}': expected six hex digits like #44546A",
            color
        )))
    }
}

/// How an image fills its area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Scale to fit inside the area, centered
    #[default]
    Contain,
    /// Fill the area, cropping the overflow
    Cover,
}

impl FitMode {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("contain") => Self::Contain,
            Some("cover") => Self::Cover,
            Some(other) => {
                warn!("Unknown image_fit '{}', using contain", other);
                Self::Contain
            }
        }
    }
}

/// Fractions of the source image to crop, in 1/1000 of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Crop {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

/// A caption text box under a picture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionBox {
    pub frame: Frame,
    pub lines: Vec<String>,
    pub style: CaptionStyle,
}

/// Everything a backend needs to draw one picture.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    pub src: String,
    pub path: PathBuf,
    pub frame: Frame,
    pub crop: Option<Crop>,
    pub style: ImageStyle,
    pub caption: Option<CaptionBox>,
}

/// Locates image files and reads their pixel size.
pub trait AssetResolver {
    /// Resolve an image source to an existing file.
    fn resolve(&self, src: &str) -> Result<PathBuf>;
    /// Pixel width and height.
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}

/// Resolves image sources against an assets directory on disk.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetResolver for AssetDir {
    fn resolve(&self, src: &str) -> Result<PathBuf> {
        let candidate = Path::new(src);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        if path.is_file() {
            Ok(path)
        } else {
            Err(DeckError::AssetNotFound(path))
        }
    }

    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|e| DeckError::ImageError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Overrides for a style class name, if it is a known one.
pub fn class_overrides(class: &str) -> Option<Mapping> {
    let (key, value) = match class {
        "no-border" => ("border_enabled", Value::Bool(false)),
        "no-rounded" => ("rounded_enabled", Value::Bool(false)),
        "border-thin" => ("border_width_pt", Value::Number(1i64.into())),
        "border-thick" => ("border_width_pt", Value::Number(4i64.into())),
        "border-light" => ("border_color", Value::String("#B4C6E7".into())),
        "border-dark" => ("border_color", Value::String("#2F3E4E".into())),
        "rounded-sm" => ("corner_radius_in", Value::Number(0.05f64.into())),
        "rounded-lg" => ("corner_radius_in", Value::Number(0.2f64.into())),
        _ => return None,
    };
    let mut overrides = Mapping::new();
    overrides.insert(Value::String(key.to_string()), value);
    Some(overrides)
}

fn per_source_overrides<'c>(config: &'c ResolvedConfig, src: &str) -> Option<&'c Value> {
    let table = config.get("image_styles.per_image_src")?.as_mapping()?;
    table.get(src).or_else(|| {
        Path::new(src)
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| table.get(name))
    })
}

/// Resolve the style of one image.
///
/// Precedence, lowest to highest: built-in defaults, `image_styles.defaults`,
/// `image_styles.per_image_src.<src or file name>`, the image's style classes,
/// the image's inline keys. Later layers replace whole values.
pub fn resolve_style(image: &ImageRef, config: &ResolvedConfig) -> Result<ImageStyle> {
    let to_value = |style: &ImageStyle| {
        serde_yaml::to_value(style).map_err(|source| DeckError::YamlError {
            context: "image style defaults".to_string(),
            source,
        })
    };
    let mut tree = to_value(&ImageStyle::default())?;

    if let Some(defaults) = config.get("image_styles.defaults") {
        tree = merge_trees(tree, defaults.clone());
    }
    if let Some(per_source) = per_source_overrides(config, &image.src) {
        debug!("Per-source style overrides for {}", image.src);
        tree = merge_trees(tree, per_source.clone());
    }
    for class in image.class.iter().flat_map(|c| c.split_whitespace()) {
        match class_overrides(class) {
            Some(overrides) => tree = merge_trees(tree, Value::Mapping(overrides)),
            None => debug!("Ignoring unknown image class '{}'", class),
        }
    }
    if !image.style_overrides.is_empty() {
        tree = merge_trees(tree, Value::Mapping(image.style_overrides.clone()));
    }

    serde_yaml::from_value(tree).map_err(|source| DeckError::YamlError {
        context: format!("image style for '{}'", image.src),
        source,
    })
}

/// Caption style from `image_styles.caption`.
pub fn caption_style(config: &ResolvedConfig) -> Result<CaptionStyle> {
    match config.get("image_styles.caption") {
        None => Ok(CaptionStyle::default()),
        Some(value) => {
            let base = serde_yaml::to_value(CaptionStyle::default()).map_err(|source| {
                DeckError::YamlError {
                    context: "caption style defaults".to_string(),
                    source,
                }
            })?;
            serde_yaml::from_value(merge_trees(base, value.clone())).map_err(|source| {
                DeckError::YamlError {
                    context: "image_styles.caption".to_string(),
                    source,
                }
            })
        }
    }
}

/// Split caption text into lines on `\n` (literal or escaped) and on "; ".
pub fn caption_lines(caption: &str) -> Vec<String> {
    caption
        .replace("\\n", "\n")
        .replace("; ", "\n")
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The fallback image region for a layout, from `images.<layout key>.*`.
pub fn layout_region(layout_name: &str, config: &ResolvedConfig) -> (Frame, i64) {
    let get = |name: &str, default: f64| {
        config
            .layout_value("images", layout_name, name)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    };
    let frame = Frame::from_inches(
        get("left_in", 0.5),
        get("top_in", 1.5),
        get("width_in", 12.33),
        get("height_in", 5.0),
    );
    debug!(
        "Image region for '{}' ({}): {:?}",
        layout_name,
        layout_key(layout_name),
        frame
    );
    (frame, inches_to_emu(get("gap_in", 0.25)))
}

/// Split a region into `count` equal columns separated by `gap`.
pub fn distribute(region: Frame, count: usize, gap: i64) -> Vec<Frame> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as i64;
    let width = ((region.cx - gap * (n - 1)) / n).max(1);
    (0..n)
        .map(|i| Frame {
            x: region.x + i * (width + gap),
            y: region.y,
            cx: width,
            cy: region.cy,
        })
        .collect()
}

/// Fit an image of `pixels` into `area`.
pub fn fit(area: Frame, pixels: (u32, u32), mode: FitMode) -> (Frame, Option<Crop>) {
    let (px_w, px_h) = pixels;
    if px_w == 0 || px_h == 0 || area.cx <= 0 || area.cy <= 0 {
        return (area, None);
    }
    let image_ratio = px_w as f64 / px_h as f64;
    let area_ratio = area.cx as f64 / area.cy as f64;

    match mode {
        FitMode::Contain => {
            let (cx, cy) = if image_ratio > area_ratio {
                (area.cx, (area.cx as f64 / image_ratio).round() as i64)
            } else {
                ((area.cy as f64 * image_ratio).round() as i64, area.cy)
            };
            let frame = Frame {
                x: area.x + (area.cx - cx) / 2,
                y: area.y + (area.cy - cy) / 2,
                cx,
                cy,
            };
            (frame, None)
        }
        FitMode::Cover => {
            // Crop the overflowing axis evenly on both sides
            let crop = if image_ratio > area_ratio {
                let keep = area_ratio / image_ratio;
                let side = ((1.0 - keep) / 2.0 * 100_000.0).round() as i64;
                Crop { left: side, right: side, ..Crop::default() }
            } else {
                let keep = image_ratio / area_ratio;
                let side = ((1.0 - keep) / 2.0 * 100_000.0).round() as i64;
                Crop { top: side, bottom: side, ..Crop::default() }
            };
            let crop = (crop != Crop::default()).then_some(crop);
            (area, crop)
        }
    }
}

/// Compute placements for a slide's images.
///
/// `areas[i]` is the frame of the placeholder image `i` was resolved to, if
/// that placeholder has geometry. Images without one share the layout's
/// configured region, split evenly in input order.
pub fn place_images(
    images: &[ImageRef],
    areas: &[Option<Frame>],
    layout_name: &str,
    mode: FitMode,
    config: &ResolvedConfig,
    assets: &impl AssetResolver,
) -> Result<Vec<ImagePlacement>> {
    let unplaced = (0..images.len())
        .filter(|&i| areas.get(i).copied().flatten().is_none())
        .count();
    let mut shared = if unplaced > 0 {
        let (region, gap) = layout_region(layout_name, config);
        distribute(region, unplaced, gap).into_iter()
    } else {
        Vec::new().into_iter()
    };
    let caption_style = caption_style(config)?;

    let mut placements = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        let path = assets.resolve(&image.src)?;
        let area = match areas.get(i).copied().flatten() {
            Some(area) => area,
            None => shared.next().ok_or_else(|| {
                DeckError::ValidationError(format!("no area left for image '{}'", image.src))
            })?,
        };
        let pixels = assets.dimensions(&path)?;
        let (frame, crop) = fit(area, pixels, mode);
        let style = resolve_style(image, config)?;
        style.border_rgb()?;

        let caption = match image.caption.as_deref().map(caption_lines) {
            Some(lines) if !lines.is_empty() => {
                caption_style.rgb()?;
                Some(CaptionBox {
                    frame: Frame {
                        x: frame.x,
                        y: frame.bottom() + inches_to_emu(caption_style.gap_in),
                        cx: frame.cx,
                        cy: inches_to_emu(caption_style.height_in),
                    },
                    lines,
                    style: caption_style.clone(),
                })
            }
            _ => None,
        };

        debug!(
            "Image '{}' ({}x{} px) placed at {:?} ({:?})",
            image.src, pixels.0, pixels.1, frame, mode
        );
        placements.push(ImagePlacement {
            src: image.src.clone(),
            path,
            frame,
            crop,
            style,
            caption,
        });
    }
    Ok(placements)
}
