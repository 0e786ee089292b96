// ABOUTME: Configuration module for the deckmark application
// ABOUTME: Loads YAML config layers, deep-merges them and resolves dotted keys and paths

use crate::errors::{DeckError, Result};
use crate::utils;
use log::{debug, info};
use serde_yaml::{Mapping, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the main configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// The configuration layers, lowest precedence first.
///
/// Missing layers are treated as empty mappings.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    pub template_defaults: Option<Value>,
    pub main: Option<Value>,
    pub style_overrides: Option<Value>,
    /// Values set on the command line; applied after every file layer
    pub overrides: Option<Value>,
    /// Directory of the main config file, anchor for `paths.project_root`
    pub config_dir: PathBuf,
}

impl ConfigLayers {
    pub fn new(
        template_defaults: Option<Value>,
        main: Option<Value>,
        style_overrides: Option<Value>,
    ) -> Self {
        Self {
            template_defaults,
            main,
            style_overrides,
            overrides: None,
            config_dir: PathBuf::from("."),
        }
    }

    /// Set a dotted key in the override layer, e.g. `paths.output`.
    pub fn set_override(&mut self, dotted_key: &str, value: Value) {
        let mut tree = self
            .overrides
            .take()
            .unwrap_or_else(|| Value::Mapping(Mapping::new()));
        insert_dotted(&mut tree, dotted_key, value);
        self.overrides = Some(tree);
    }
}

/// Recursively merge `overlay` into `base`.
///
/// Two mappings at the same key merge key by key; any other pair is resolved
/// by taking the overlay value whole, so sequences are replaced, never joined.
pub fn merge_trees(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => merge_trees(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn layer_root(name: &str, layer: Option<Value>) -> Result<Value> {
    match layer {
        None | Some(Value::Null) => Ok(Value::Mapping(Mapping::new())),
        Some(value @ Value::Mapping(_)) => Ok(value),
        Some(other) => Err(DeckError::ConfigError(format!(
            "{} layer must be a mapping, got {}",
            name,
            value_kind(&other)
        ))),
    }
}

/// Merge the configuration layers into one resolved configuration.
///
/// Precedence, lowest to highest: template defaults, main config, style
/// overrides, command-line overrides.
pub fn merge_config(layers: ConfigLayers) -> Result<ResolvedConfig> {
    let mut tree = layer_root("template defaults", layers.template_defaults)?;
    for (name, layer) in [
        ("main config", layers.main),
        ("style overrides", layers.style_overrides),
        ("command-line overrides", layers.overrides),
    ] {
        tree = merge_trees(tree, layer_root(name, layer)?);
    }

    let project_root = match lookup(&tree, "paths.project_root") {
        Some(Value::String(root)) => layers.config_dir.join(root),
        Some(other) => {
            return Err(DeckError::ConfigError(format!(
                "paths.project_root must be a string, got {}",
                value_kind(other)
            )))
        }
        None => layers.config_dir.clone(),
    };
    debug!("Resolved project root: {:?}", project_root);

    Ok(ResolvedConfig { tree, project_root })
}

/// Read-only view over the merged configuration tree.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    tree: Value,
    project_root: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            tree: Value::Mapping(Mapping::new()),
            project_root: PathBuf::from("."),
        }
    }
}

impl ResolvedConfig {
    /// The merged tree
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Look up a value by dotted key, e.g. `fonts.title.title_pt`.
    pub fn get(&self, dotted_key: &str) -> Option<&Value> {
        lookup(&self.tree, dotted_key)
    }

    /// Look up a value that has no default.
    pub fn require(&self, dotted_key: &str) -> Result<&Value> {
        self.get(dotted_key).ok_or_else(|| {
            DeckError::ConfigError(format!("required key '{}' is not set", dotted_key))
        })
    }

    pub fn get_str(&self, dotted_key: &str) -> Option<&str> {
        self.get(dotted_key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, dotted_key: &str) -> Option<bool> {
        self.get(dotted_key).and_then(Value::as_bool)
    }

    /// Numeric lookup accepting both integer and float YAML scalars.
    pub fn get_f64(&self, dotted_key: &str) -> Option<f64> {
        self.get(dotted_key).and_then(Value::as_f64)
    }

    pub fn get_u32(&self, dotted_key: &str) -> Option<u32> {
        self.get(dotted_key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Look up `<section>.<layout key>.<rest>`, falling back to `<section>.default.<rest>`.
    pub fn layout_value(&self, section: &str, layout_name: &str, rest: &str) -> Option<&Value> {
        self.get(&format!("{}.{}.{}", section, layout_key(layout_name), rest))
            .or_else(|| self.get(&format!("{}.default.{}", section, rest)))
    }

    /// Point size for a node kind on a layout, from `fonts.<layout key>.<kind>_pt`.
    pub fn font_pt(&self, layout_name: &str, kind: &str) -> Option<f64> {
        self.layout_value("fonts", layout_name, &format!("{}_pt", kind))
            .and_then(Value::as_f64)
    }

    /// Boolean formatting flag, from `formatting.<layout key>.<level>.<flag>`.
    pub fn formatting_flag(&self, layout_name: &str, level: &str, flag: &str) -> Option<bool> {
        self.layout_value("formatting", layout_name, &format!("{}.{}", level, flag))
            .and_then(Value::as_bool)
    }

    /// Spacing value in points, from `spacing.<layout key>.<name>`.
    pub fn spacing_pt(&self, layout_name: &str, name: &str) -> Option<f64> {
        self.layout_value("spacing", layout_name, name)
            .and_then(Value::as_f64)
    }

    /// Resolve a path relative to the project root unless it is absolute.
    pub fn resolve_path(&self, value: &str) -> PathBuf {
        let path = Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Resolved value of `paths.<key>`.
    pub fn path(&self, key: &str) -> Result<PathBuf> {
        let dotted = format!("paths.{}", key);
        match self.require(&dotted)? {
            Value::String(value) => Ok(self.resolve_path(value)),
            other => Err(DeckError::ConfigError(format!(
                "{} must be a string, got {}",
                dotted,
                value_kind(other)
            ))),
        }
    }

    pub fn template_path(&self) -> Result<PathBuf> {
        self.path("template")
    }

    pub fn content_path(&self) -> Result<PathBuf> {
        self.path("content")
    }

    pub fn output_path(&self) -> Result<PathBuf> {
        self.path("output")
    }

    /// Directory that image sources are resolved against; the project root when unset.
    pub fn assets_dir(&self) -> PathBuf {
        match self.get_str("paths.assets_dir") {
            Some(dir) => self.resolve_path(dir),
            None => self.project_root.clone(),
        }
    }

    /// Log filter from `settings.logging.level`, lower-cased for env_logger.
    pub fn log_level(&self) -> String {
        self.get_str("settings.logging.level")
            .unwrap_or("info")
            .to_lowercase()
    }
}

/// Normalize a layout name into a config key: "Title and Content" -> "title_and_content".
pub fn layout_key(layout_name: &str) -> String {
    let mut key = String::with_capacity(layout_name.len());
    let mut pending_sep = false;
    for ch in layout_name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}

fn lookup<'a>(tree: &'a Value, dotted_key: &str) -> Option<&'a Value> {
    let mut current = tree;
    for part in dotted_key.split('.') {
        current = current.as_mapping()?.get(part)?;
    }
    Some(current)
}

fn insert_dotted(tree: &mut Value, dotted_key: &str, value: Value) {
    if !tree.is_mapping() {
        *tree = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = tree {
        match dotted_key.split_once('.') {
            None => {
                map.insert(Value::String(dotted_key.to_string()), value);
            }
            Some((head, rest)) => {
                let child = map
                    .entry(Value::String(head.to_string()))
                    .or_insert_with(|| Value::Mapping(Mapping::new()));
                insert_dotted(child, rest, value);
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Parse a YAML document into a tree.
pub fn parse_yaml(text: &str, context: &str) -> Result<Value> {
    serde_yaml::from_str(text).map_err(|source| DeckError::YamlError {
        context: context.to_string(),
        source,
    })
}

/// Load a YAML file into a tree.
pub fn load_yaml_file(path: &Path) -> Result<Value> {
    utils::validate_file_exists(path)?;
    let text = fs::read_to_string(path).map_err(DeckError::FileReadError)?;
    parse_yaml(&text, &path.display().to_string())
}

/// Load an optional YAML layer; a missing file yields no layer.
fn load_optional_layer(path: &Path) -> Result<Option<Value>> {
    if path.is_file() {
        debug!("Loading config layer: {:?}", path);
        load_yaml_file(path).map(Some)
    } else {
        debug!("Config layer not present: {:?}", path);
        Ok(None)
    }
}

/// Loads the three configuration layers from disk.
pub struct ConfigLoader {
    pub config_path: PathBuf,
    pub style_overrides_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            style_overrides_path: None,
        }
    }

    /// Main config path from `DECKMARK_CONFIG`, falling back to `config.yaml`.
    pub fn from_env() -> Self {
        let config_path = env::var("DECKMARK_CONFIG")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        Self::new(config_path)
    }

    pub fn with_style_overrides(mut self, path: Option<PathBuf>) -> Self {
        self.style_overrides_path = path;
        self
    }

    /// Read every layer. `paths.template_config` and `paths.styles_overrides`
    /// in the main config are resolved against its project root.
    pub fn load_layers(&self) -> Result<ConfigLayers> {
        info!("Loading configuration from {:?}", self.config_path);
        let main = load_yaml_file(&self.config_path)?;
        let config_dir = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // Path keys of the main layer resolve the other layers' locations
        let main_only = merge_config(ConfigLayers {
            main: Some(main.clone()),
            config_dir: config_dir.clone(),
            ..ConfigLayers::default()
        })?;

        let template_defaults = match main_only.get_str("paths.template_config") {
            Some(path) => load_optional_layer(&main_only.resolve_path(path))?,
            None => None,
        };

        let style_path = match &self.style_overrides_path {
            Some(path) => Some(path.clone()),
            None => main_only
                .get_str("paths.styles_overrides")
                .map(|p| main_only.resolve_path(p)),
        };
        let style_overrides = match style_path {
            Some(path) => load_optional_layer(&path)?,
            None => None,
        };

        Ok(ConfigLayers {
            template_defaults,
            main: Some(main),
            style_overrides,
            overrides: None,
            config_dir,
        })
    }

    /// Load and merge in one step.
    pub fn load(&self) -> Result<ResolvedConfig> {
        merge_config(self.load_layers()?)
    }
}
