//! Opens the viewer on a directory of JSON responses.
//!
//! ```text
//! cargo run --example viewer [DATA_DIR] [OPTIONS_JSON]
//! ```
//!
//! Without a data directory, two synthetic datasets are written to a
//! temporary directory first. The directory layout is
//! `data_names.json` plus `<dataname>/<property>.json`.

use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};

use cloudlens::*;
use serde_json::json;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let root = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => write_sample_data().map_err(CloudlensError::from)?,
    };
    let options = match args.next() {
        Some(path) => Options::from_json_file(path)?,
        None => Options {
            title: "cloudlens viewer".to_string(),
            normalize_extent: Some(200.0),
            ..Options::default()
        },
    };

    log::info!("serving datasets from {}", root.display());
    run(Box::new(DirectoryProvider::new(root)), options)
}

/// Three labeled blobs with their Gaussian components, and a spiral.
fn write_sample_data() -> std::io::Result<PathBuf> {
    let root = std::env::temp_dir().join("cloudlens-demo");
    write_json(&root.join("data_names.json"), &json!({ "data_name": ["blobs", "spiral"] }))?;

    let centers = [[-40.0f32, 0.0, 0.0], [30.0, 20.0, -10.0], [10.0, -30.0, 25.0]];
    let spreads = [[12.0f32, 4.0, 4.0], [5.0, 9.0, 5.0], [6.0, 6.0, 14.0]];
    let mut points = Vec::new();
    let mut labels = Vec::new();
    let mut density = Vec::new();
    for (label, (center, spread)) in centers.iter().zip(&spreads).enumerate() {
        for i in 0..400 {
            let t = i as f32 * 0.618_034;
            let (u, v, w) = ((t * TAU).sin(), (t * 3.7).cos(), ((t * 1.3) % 2.0) - 1.0);
            let offset = [u * spread[0] * w.abs().sqrt(), v * spread[1], w * spread[2]];
            points.push([
                center[0] + offset[0],
                center[1] + offset[1],
                center[2] + offset[2],
            ]);
            labels.push(label as i64);
            density.push(1.0 - (u * u + v * v + w * w) / 3.0);
        }
    }
    let covariances: Vec<_> = spreads
        .iter()
        .map(|s| {
            json!([
                [s[0] * s[0] * 0.25, 0.0, 0.0],
                [0.0, s[1] * s[1] * 0.25, 0.0],
                [0.0, 0.0, s[2] * s[2] * 0.25]
            ])
        })
        .collect();
    let gaussians = json!({ "means": centers, "covariances": covariances });

    write_json(
        &root.join("blobs").join("density.json"),
        &json!({
            "point_cloud": points,
            "values": density,
            "min_value": 0.0,
            "max_value": 1.0,
            "explanation_text": "Estimated density",
            "gaussians": gaussians,
        }),
    )?;
    write_json(
        &root.join("blobs").join("shape.json"),
        &json!({
            "point_cloud": points,
            "labels": labels,
            "min_value": 0.0,
            "max_value": 2.0,
            "explanation_text": "Component label",
            "gaussians": gaussians,
        }),
    )?;

    let spiral: Vec<[f32; 3]> = (0..2000)
        .map(|i| {
            let t = i as f32 / 2000.0;
            let angle = t * 6.0 * TAU;
            [50.0 * t * angle.cos(), 80.0 * t - 40.0, 50.0 * t * angle.sin()]
        })
        .collect();
    let heights: Vec<f32> = spiral.iter().map(|p| p[1]).collect();
    for (property, text) in [("density", "Height"), ("shape", "Height (shape)")] {
        write_json(
            &root.join("spiral").join(format!("{property}.json")),
            &json!({
                "point_cloud": spiral,
                "values": heights,
                "min_value": -40.0,
                "max_value": 40.0,
                "explanation_text": text,
            }),
        )?;
    }

    Ok(root)
}

fn write_json(path: &Path, value: &serde_json::Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, value.to_string())
}
