// ABOUTME: Library module for the deckmark program.
// ABOUTME: Turns Markdown slide decks into PowerPoint files built on a template's layouts.

// Reexport modules
pub mod builder;
pub mod config;
pub mod errors;
pub mod generator;
pub mod images;
pub mod layouts;
pub mod markdown;
pub mod placeholders;
pub mod pptx;
pub mod rich_text;
pub mod slide_xml;
pub mod utils;

// Reexport common types and functions
pub use builder::{build_slide, Slide, SlideShape};
pub use config::{merge_config, ConfigLayers, ConfigLoader, ResolvedConfig};
pub use errors::{DeckError, Result};
pub use generator::{build_deck, describe_template, generate, GenerationReport};
pub use images::{AssetDir, AssetResolver};
pub use layouts::{discover_layouts, LayoutRegistry, TemplateSource};
pub use markdown::{parse_document, parse_markdown, ContentNode, ParsedDocument, SlideRecord};
pub use pptx::PptxTemplate;
pub use rich_text::{format, StyledRun};
