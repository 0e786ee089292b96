// ABOUTME: Error types for the deckmark application
// ABOUTME: Provides structured error handling for each stage of the pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("YAML error in {context}: {source}")]
    YamlError {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown layout '{name}'. Available layouts: {}", available.join(", "))]
    LayoutNotFound { name: String, available: Vec<String> },

    #[error("Slide {slide} is missing the required 'layout' key in its frontmatter")]
    MissingLayout { slide: usize },

    #[error("No placeholder found for {wanted} on layout '{layout}'.\nAvailable placeholders:\n{available}")]
    PlaceholderNotFound {
        layout: String,
        wanted: String,
        available: String,
    },

    #[error("Image asset not found: {0}")]
    AssetNotFound(PathBuf),

    #[error("Unreadable image {path}: {message}")]
    ImageError { path: PathBuf, message: String },

    #[error("Slide {index} ({layout}): {source}")]
    Slide {
        index: usize,
        layout: String,
        #[source]
        source: Box<DeckError>,
    },

    #[error("XML error: {0}")]
    XmlError(String),

    #[error("PPTX error: {0}")]
    PptxError(String),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Path not found: {0}")]
    PathNotFoundError(PathBuf),
}

impl DeckError {
    /// Attach the 1-based slide index and layout name to an error raised while building a slide.
    pub fn in_slide(self, index: usize, layout: &str) -> Self {
        match self {
            // Already carries slide context
            DeckError::Slide { .. } | DeckError::MissingLayout { .. } => self,
            other => DeckError::Slide {
                index,
                layout: layout.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through slide context.
    pub fn root(&self) -> &DeckError {
        match self {
            DeckError::Slide { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<zip::result::ZipError> for DeckError {
    fn from(err: zip::result::ZipError) -> Self {
        DeckError::PptxError(format!("ZIP operation failed: {}", err))
    }
}

impl From<quick_xml::Error> for DeckError {
    fn from(err: quick_xml::Error) -> Self {
        DeckError::XmlError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
