//! Integration tests for the draw-blocks CLI

use assert_cmd::cargo::cargo_bin_cmd;
use image::{ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use std::path::Path;

fn write_fixture(dir: &Path) {
    RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]))
        .save_with_format(dir.join("shelf.png"), ImageFormat::Png)
        .unwrap();
    std::fs::write(
        dir.join("boxes.json"),
        r#"{"compartments": [
            {"label": "top", "box_2d": [0, 0, 500, 500]},
            {"x1": 500, "y1": 500, "x2": 1000, "y2": 1000}
        ]}"#,
    )
    .unwrap();
}

#[test]
fn test_draws_with_default_output() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let mut cmd = cargo_bin_cmd!("draw-blocks");
    cmd.arg(dir.path().join("shelf.png"))
        .arg(dir.path().join("boxes.json"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Image dimensions: 200x100 pixels"))
        .stdout(predicate::str::contains("Scale factors: x=0.200, y=0.100"))
        .stdout(predicate::str::contains("Total blocks: 2"))
        .stdout(predicate::str::contains("(0,0) → (100,50) [100x50px]"))
        .stdout(predicate::str::contains("(100,50) → (199,99)"));

    let output = dir.path().join("shelf_annotated.jpg");
    let annotated = image::open(&output).unwrap();
    assert_eq!((annotated.width(), annotated.height()), (200, 100));
}

#[test]
fn test_flags_and_png_output() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let output = dir.path().join("out.png");

    let mut cmd = cargo_bin_cmd!("draw-blocks");
    cmd.arg("-i")
        .arg(dir.path().join("shelf.png"))
        .arg("-j")
        .arg(dir.path().join("boxes.json"))
        .arg("-o")
        .arg(&output)
        .arg("--line-width")
        .arg("2");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("out.png"));

    // Outline in the first palette color; the interior away from the label is untouched.
    let annotated = image::open(&output).unwrap().to_rgba8();
    assert_eq!(annotated.get_pixel(0, 0).0, [0xf9, 0x73, 0x16, 0xff]);
    assert_eq!(annotated.get_pixel(90, 45).0, [255, 255, 255, 255]);
}

#[test]
fn test_missing_image_file() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let mut cmd = cargo_bin_cmd!("draw-blocks");
    cmd.arg(dir.path().join("nope.jpg"))
        .arg(dir.path().join("boxes.json"));

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Error: Image not found"));
}

#[test]
fn test_invalid_detection_file() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    std::fs::write(dir.path().join("bad.json"), r#"{"items": []}"#).unwrap();

    let mut cmd = cargo_bin_cmd!("draw-blocks");
    cmd.arg(dir.path().join("shelf.png"))
        .arg(dir.path().join("bad.json"));

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("shelf_compartments"));
}

#[test]
fn test_no_arguments_is_usage_error() {
    let mut cmd = cargo_bin_cmd!("draw-blocks");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Image file is required"));
}

#[test]
fn test_missing_json_is_usage_error() {
    let mut cmd = cargo_bin_cmd!("draw-blocks");
    cmd.arg("shelf.png");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("JSON file is required"));
}
