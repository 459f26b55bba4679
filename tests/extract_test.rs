// File extraction tests

use std::path::Path;

use glitch::offload::{FileExtractor, FileKind, TextExtractor};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_file_kind_by_extension() {
    assert_eq!(FileKind::from_path(Path::new("a.PDF")), Some(FileKind::Pdf));
    assert_eq!(FileKind::from_path(Path::new("index.htm")), Some(FileKind::Html));
    assert_eq!(FileKind::from_path(Path::new("data.json")), Some(FileKind::Json));
    assert_eq!(FileKind::from_path(Path::new("main.rs")), Some(FileKind::Text));
    assert_eq!(FileKind::from_path(Path::new("photo.png")), None);
    assert_eq!(FileKind::from_path(Path::new("Makefile")), None);
}

#[test]
fn test_plain_text_is_returned_as_is() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "notes.txt", "line one\nline two\n");

    assert_eq!(TextExtractor.extract(&path).unwrap(), "line one\nline two\n");
}

#[test]
fn test_json_is_pretty_printed() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "data.json", r#"{"a":1}"#);

    assert_eq!(TextExtractor.extract(&path).unwrap(), "{\n  \"a\": 1\n}");
}

#[test]
fn test_invalid_json_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "data.json", "{not json");

    let err = TextExtractor.extract(&path).unwrap_err();
    assert!(err.to_string().contains("Invalid JSON"));
}

#[test]
fn test_html_yields_visible_text() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "page.html",
        "<html><body><h1>Hello</h1>\n<p>big   world</p></body></html>",
    );

    assert_eq!(TextExtractor.extract(&path).unwrap(), "Hello big world");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = TextExtractor
        .extract(&dir.path().join("nope.txt"))
        .unwrap_err();

    assert!(err.to_string().starts_with("File does not exist"));
}

#[test]
fn test_unsupported_type_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "archive.zip", "PK");

    let err = TextExtractor.extract(&path).unwrap_err();
    assert!(err.to_string().starts_with("Unsupported file type"));
}
