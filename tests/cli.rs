//! End-to-end checks of the `fish_classifier` binary

use std::path::Path;
use std::process::{Command, Output};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

fn fish_classifier(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fish_classifier"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .unwrap_or_else(|e| panic!("run fish_classifier: {e}"))
}

fn write_species(root: &Path, name: &str, count: usize) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        RgbImage::from_pixel(12, 12, Rgb([40 * i as u8, 90, 160]))
            .save(dir.join(format!("img_{i:03}.png")))
            .unwrap();
    }
}

#[test]
fn failed_weight_fetch_writes_no_artifacts() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let out = dir.path().join("out");
    write_species(&data, "Boal", 5);
    write_species(&data, "Rui", 5);

    let result = fish_classifier(&[
        "train",
        "--data-dir",
        data.to_str().unwrap(),
        "--output-dir",
        out.to_str().unwrap(),
        "--weights-file",
        dir.path().join("missing.pth").to_str().unwrap(),
    ]);

    assert!(!result.status.success());
    assert!(!out.join("class_indices.json").exists());
    assert!(!out.join("fish_classification_model.mpk").exists());
}

#[test]
fn lookup_works_without_a_trained_model() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let info = dir.path().join("info");
    write_species(&data, "Rui", 2);
    std::fs::create_dir_all(&info).unwrap();
    std::fs::write(info.join("Rui.txt"), "Rohu carp.").unwrap();

    let config = dir.path().join("config.json");
    let json = serde_json::json!({
        "paths": {
            "dataset_dir": data,
            "info_dir": info,
            "output_dir": dir.path().join("no_model"),
        }
    });
    std::fs::write(&config, json.to_string()).unwrap();

    let result = fish_classifier(&["--config", config.to_str().unwrap(), "lookup", "Rui"]);

    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    let stdout = String::from_utf8(result.stdout).unwrap();
    assert!(stdout.starts_with("Information on Rui:\nRohu carp.\n"), "{stdout}");
    assert!(stdout.contains("Rui Image (128x128)"));
    assert!(!stdout.contains("INFO"));
}
