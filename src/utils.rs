// ABOUTME: Filesystem helpers for deckmark
// ABOUTME: Validates input paths and prepares output locations

use crate::errors::{DeckError, Result};
use std::path::Path;

/// Validate that a file exists
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(DeckError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(DeckError::ValidationError(format!(
            "Path is not a file: {:?}",
            path
        )));
    }
    Ok(())
}

/// Validate that a directory exists
pub fn validate_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(DeckError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(DeckError::ValidationError(format!(
            "Path is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(DeckError::FileReadError)?;
    } else if !path.is_dir() {
        return Err(DeckError::ValidationError(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure the directory an output file is written into exists
pub fn ensure_parent_directory_exists(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        ensure_directory_exists(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_file_exists() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("deck.md");
        assert!(matches!(
            validate_file_exists(&file),
            Err(DeckError::PathNotFoundError(_))
        ));
        std::fs::write(&file, "x").unwrap();
        assert!(validate_file_exists(&file).is_ok());
        assert!(matches!(
            validate_file_exists(dir.path()),
            Err(DeckError::ValidationError(_))
        ));
        assert!(validate_directory_exists(dir.path()).is_ok());
        assert!(validate_directory_exists(&file).is_err());
    }

    #[test]
    fn test_ensure_parent_directory_exists() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out").join("nested").join("deck.pptx");
        ensure_parent_directory_exists(&output).unwrap();
        assert!(output.parent().unwrap().is_dir());
        // Bare file names have an empty parent
        ensure_parent_directory_exists(Path::new("deck.pptx")).unwrap();
    }
}
