mod common;

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_command(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_deckmark"))
        .current_dir(dir)
        .env_remove("DECKMARK_CONFIG")
        .args(args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_generate_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let deck = "---\nlayout: Text\n---\n# Hello\n- from the CLI\n";
    let config_path = common::write_project(temp_dir.path(), deck, "settings:\n  logging:\n    level: warn\n");

    let output = run_command(
        temp_dir.path(),
        &["generate", "--config", config_path.to_str().unwrap()],
    );
    assert!(output.status.success(), "Command failed: {:?}", output);

    let pptx = temp_dir.path().join("out").join("deck.pptx");
    assert!(pptx.exists(), "Output file was not created");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Generated 1 slides"), "Unexpected output: {}", stdout);
    assert!(common::read_part(&pptx, "ppt/slides/slide1.xml").contains("<a:t>from the CLI</a:t>"));
}

#[test]
fn test_cli_paths_override_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = common::write_project(temp_dir.path(), "---\nlayout: Text\n---\n# Config deck\n", "");
    fs::write(temp_dir.path().join("other.md"), "---\nlayout: Title\n---\n# Flag deck\n").unwrap();

    // Default config.yaml in the working directory, relative flag paths
    let output = run_command(
        temp_dir.path(),
        &["generate", "--content", "other.md", "--output", "flag.pptx"],
    );
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(config_path.exists());

    let pptx = temp_dir.path().join("flag.pptx");
    assert!(pptx.exists(), "Output file was not created");
    assert!(!temp_dir.path().join("out").join("deck.pptx").exists());
    assert!(common::read_part(&pptx, "ppt/slides/slide1.xml").contains("<a:t>Flag deck</a:t>"));
}

#[test]
fn test_generate_reports_failing_slide() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let deck = "---\nlayout: Text\n---\n# Fine\n---\nlayout: Missing\n---\n# Broken\n";
    let config_path = common::write_project(temp_dir.path(), deck, "");

    let output = run_command(
        temp_dir.path(),
        &["generate", "--config", config_path.to_str().unwrap()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Slide 2 (Missing)"), "Unexpected stderr: {}", stderr);
    assert!(stderr.contains("Unknown layout 'Missing'"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_layouts_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let template = temp_dir.path().join("template.pptx");
    common::write_template(&template);

    let output = run_command(temp_dir.path(), &["layouts", template.to_str().unwrap()]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Title (ppt/slideLayouts/slideLayout1.xml)"));
    assert!(stdout.contains("Text (ppt/slideLayouts/slideLayout2.xml)"));
    assert!(stdout.contains("Body [subTitle] idx=1 'Subtitle 2'"));
}
