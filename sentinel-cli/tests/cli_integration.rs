use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use image::{ImageBuffer, Rgb, RgbImage};
use sentinel_utils::fixture_path;
use serde_json::Value;
use tempfile::tempdir;

const CRIME_CSV: &str = "\
state_name,registeration_circles,total_crime_against_women
Uttar Pradesh,Agra,42
Uttar Pradesh,Somecity,600
Uttar Pradesh,Lucknow,250
";

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn run_crime(region: &str) -> Result<Value, Box<dyn Error>> {
    let work_dir = tempdir()?;
    let csv_path = work_dir.path().join("crime.csv");
    let json_path = work_dir.path().join("alert.json");
    fs::write(&csv_path, CRIME_CSV)?;

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("crime")
        .arg("--region")
        .arg(region)
        .arg("--crime-data")
        .arg(&csv_path)
        .arg("--json")
        .arg(&json_path);
    cmd.assert().success();
    read_json(&json_path)
}

#[test]
fn crime_alert_reports_high_tier() -> Result<(), Box<dyn Error>> {
    let alert = run_crime("somecity")?;
    assert_eq!(alert["alert"], "High");
    assert_eq!(alert["indicator"], "Red");
    assert_eq!(alert["region"], "somecity");
    Ok(())
}

#[test]
fn crime_alert_defaults_to_low() -> Result<(), Box<dyn Error>> {
    let alert = run_crime("Atlantis")?;
    assert_eq!(alert["alert"], "Low");
    assert_eq!(alert["indicator"], "Green");
    Ok(())
}

#[test]
fn faces_fails_fast_when_cascade_is_missing() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("sample.png");
    let img = ImageBuffer::from_fn(32, 32, |x, y| {
        let r = ((x + y) % 255) as u8;
        Rgb([r, 128, 255u8.saturating_sub(r)])
    });
    img.save(&image_path)?;

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("faces")
        .arg("--input")
        .arg(&image_path)
        .arg("--cascade")
        .arg(work_dir.path().join("missing.xml"));
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(
        stderr.contains("cascade file not found"),
        "unexpected stderr: {stderr}"
    );
    Ok(())
}

#[test]
fn faces_rejects_directory_without_images() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    fs::write(work_dir.path().join("notes.txt"), "nothing to see")?;

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("faces")
        .arg("--input")
        .arg(work_dir.path());
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("no images found"), "unexpected stderr: {stderr}");
    Ok(())
}

#[test]
fn distance_rejects_invalid_coordinates() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let json_path = work_dir.path().join("distance.json");

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("distance")
        .arg("--latitude")
        .arg("95.0")
        .arg("--longitude")
        .arg("77.1")
        .arg("--json")
        .arg(&json_path);
    cmd.assert().code(2);

    let record = read_json(&json_path)?;
    assert_eq!(record["kind"], "invalid_coordinates");
    assert!(record.get("police_distance").is_none());
    Ok(())
}

#[test]
fn station_requires_its_model_files() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("station")
        .arg("--latitude")
        .arg("28.7041")
        .arg("--longitude")
        .arg("77.1025");
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("station labels"), "unexpected stderr: {stderr}");
    Ok(())
}

#[test]
fn sos_is_sent_even_without_station_models() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let json_path = work_dir.path().join("sos.json");

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("sos")
        .arg("--username")
        .arg("asha")
        .arg("--mobile")
        .arg("9876543210")
        .arg("--address")
        .arg("12 Mall Road")
        .arg("--latitude")
        .arg("26.8467")
        .arg("--longitude")
        .arg("80.9462")
        .arg("--json")
        .arg(&json_path);
    cmd.assert().success();

    let record = read_json(&json_path)?;
    assert_eq!(record["status"], "SOS sent!");
    assert_eq!(record["username"], "asha");
    assert_eq!(
        record["message"],
        "Emergency! Please help me at (address: 12 Mall Road, Latitude: 26.8467, Longitude: 80.9462, mobile: 9876543210)"
    );
    assert!(record.get("nearest_station").is_none());
    Ok(())
}

#[test]
fn invalid_scale_factor_is_rejected() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("crime")
        .arg("--region")
        .arg("agra")
        .arg("--scale-factor")
        .arg("0.9");
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("scale_factor"), "unexpected stderr: {stderr}");
    Ok(())
}

/// Red-toned face block with the dark eye band the fixture cascade looks for.
fn banded_face() -> RgbImage {
    RgbImage::from_fn(160, 160, |x, y| {
        if !(44..116).contains(&x) || !(40..112).contains(&y) {
            return Rgb([128, 128, 128]);
        }
        match (y - 40) / 3 {
            6..10 => Rgb([90, 20, 10]),
            0..14 => Rgb([230, 120, 40]),
            _ => Rgb([200, 100, 50]),
        }
    })
}

#[test]
fn faces_counts_with_fixture_models() -> Result<(), Box<dyn Error>> {
    let (Ok(cascade), Ok(gender)) = (
        fixture_path("cascades/frontal_bands.xml"),
        fixture_path("models/gender_redness.onnx"),
    ) else {
        eprintln!("skipping faces fixture test; fixtures missing");
        return Ok(());
    };
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("face.png");
    banded_face().save(&image_path)?;
    let json_path = work_dir.path().join("faces.json");

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("faces")
        .arg("--input")
        .arg(&image_path)
        .arg("--cascade")
        .arg(&cascade)
        .arg("--gender-model")
        .arg(&gender)
        .arg("--json")
        .arg(&json_path);
    cmd.assert().success();

    let records = read_json(&json_path)?;
    let record = &records[0];
    assert_eq!(record["num_males"], 1);
    assert_eq!(record["num_females"], 0);
    assert_eq!(record["total_faces"], 1);
    Ok(())
}

#[test]
fn station_resolves_with_fixture_model() -> Result<(), Box<dyn Error>> {
    let (Ok(model), Ok(labels), Ok(facilities)) = (
        fixture_path("models/station_index.onnx"),
        fixture_path("data/station_labels.json"),
        fixture_path("data/police_stations.csv"),
    ) else {
        eprintln!("skipping station fixture test; fixtures missing");
        return Ok(());
    };
    let work_dir = tempdir()?;
    let json_path = work_dir.path().join("station.json");

    let mut cmd = cargo_bin_cmd!("sentinel-cli");
    cmd.current_dir(work_dir.path())
        .arg("station")
        .arg("--latitude")
        .arg("28.7041")
        .arg("--longitude")
        .arg("77.1025")
        .arg("--station-model")
        .arg(&model)
        .arg("--station-labels")
        .arg(&labels)
        .arg("--facilities")
        .arg(&facilities)
        .arg("--json")
        .arg(&json_path);
    cmd.assert().success();

    let record = read_json(&json_path)?;
    assert_eq!(record["police_station"], "ROHINI SECTOR 3");
    assert_eq!(record["contact_number"], "01127053333");
    Ok(())
}
