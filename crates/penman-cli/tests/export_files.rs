//! Integration tests for `penman export`.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const DOCUMENT: &str = "<h1>Statement</h1><p>Hello &amp; welcome</p><ul><li>One</li></ul>";

fn write_input(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let input = dir.path().join("draft.html");
    fs::write(&input, content).unwrap();
    input
}

#[test]
fn test_export_txt_uses_label_and_date() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let input = write_input(&home, DOCUMENT);

    cargo_bin_cmd!("penman")
        .env("PENMAN_HOME", home.path())
        .args(["export", "--format", "txt", "--type", "personal-statement"])
        .args(["--date", "2024-05-01", "--input"])
        .arg(&input)
        .arg("--out-dir")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("个人陈述_2024-05-01.txt"));

    let text = fs::read_to_string(out.path().join("个人陈述_2024-05-01.txt")).unwrap();
    assert_eq!(text, "StatementHello & welcomeOne");
}

#[test]
fn test_export_docx_writes_rtf() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let input = write_input(&home, DOCUMENT);

    cargo_bin_cmd!("penman")
        .env("PENMAN_HOME", home.path())
        .args(["export", "--format", "DOCX", "--type", "research_proposal"])
        .args(["--date", "2024-05-01", "--input"])
        .arg(&input)
        .arg("--out-dir")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("研究计划_2024-05-01.rtf"));

    let rtf = fs::read_to_string(out.path().join("研究计划_2024-05-01.rtf")).unwrap();
    assert!(rtf.starts_with(r"{\rtf1\ansi\deff0 {\fonttbl {\f0 Times New Roman;}}\f0\fs24"));
    assert!(rtf.contains(r"\b Statement\b0 \par\par "));
    assert!(rtf.contains(r"Hello & welcome\par "));
    assert!(rtf.ends_with('}'));
}

#[test]
fn test_export_unknown_type_uses_raw_key() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let input = write_input(&home, DOCUMENT);

    cargo_bin_cmd!("penman")
        .env("PENMAN_HOME", home.path())
        .args(["export", "--format", "txt", "--type", "cover_letter"])
        .args(["--date", "2024-05-01", "--input"])
        .arg(&input)
        .arg("--out-dir")
        .arg(out.path())
        .assert()
        .success();

    assert!(out.path().join("cover_letter_2024-05-01.txt").exists());
}

#[test]
fn test_export_empty_document_fails_without_file() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let input = write_input(&home, "   \n");

    cargo_bin_cmd!("penman")
        .env("PENMAN_HOME", home.path())
        .args(["export", "--format", "txt", "--input"])
        .arg(&input)
        .arg("--out-dir")
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty"));

    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_export_unsupported_format() {
    let home = TempDir::new().unwrap();
    let input = write_input(&home, DOCUMENT);

    cargo_bin_cmd!("penman")
        .env("PENMAN_HOME", home.path())
        .args(["export", "--format", "odt", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported format: odt"));
}

#[test]
fn test_export_invalid_date() {
    let home = TempDir::new().unwrap();
    let input = write_input(&home, DOCUMENT);

    cargo_bin_cmd!("penman")
        .env("PENMAN_HOME", home.path())
        .args(["export", "--format", "txt", "--date", "01/05/2024", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected YYYY-MM-DD"));
}

#[test]
fn test_export_pdf_with_missing_font_fails() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let input = write_input(&home, DOCUMENT);
    fs::write(
        home.path().join("config.toml"),
        "[export]\nfont_path = \"/nonexistent/font.ttf\"\n",
    )
    .unwrap();

    cargo_bin_cmd!("penman")
        .env("PENMAN_HOME", home.path())
        .args(["export", "--format", "pdf", "--input"])
        .arg(&input)
        .arg("--out-dir")
        .arg(out.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("font"));

    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}
