//! Full pipeline walkthrough on the mock backend.
//!
//! Drives the plugin surface end to end without hardware: initialize, feed
//! frames, take a picture, record a short clip, destroy.
//!
//! Run with: cargo run --example mock_pipeline

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use camera_bridge::{CameraPlugin, Dimensions, MockBackend, Sample};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camera_bridge=debug".into()),
        )
        .init();

    let backend = MockBackend::new();
    let mut plugin = CameraPlugin::new(Arc::new(backend.clone()));

    let reply = plugin.handle("listDevices", json!({})).await;
    println!("devices: {}", reply["devices"]);

    let reply = plugin.handle("initialize", json!({"type": 1})).await;
    println!(
        "initialized: texture {} at {}x{}",
        reply["textureId"], reply["size"]["width"], reply["size"]["height"]
    );

    // Feed 30 fake frames, as a camera thread would
    let feeder = {
        let backend = backend.clone();
        tokio::spawn(async move {
            for n in 0..30u64 {
                let pts = Duration::from_millis(n * 33);
                backend
                    .inject(Sample::video(pts, vec![n as u8; 64], Dimensions::new(8, 8)))
                    .await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let reply = plugin
        .handle("takePicture", json!({"pictureFormat": "jpeg"}))
        .await;
    println!(
        "still captured: {} bytes",
        reply["imageData"].as_array().map_or(0, |a| a.len())
    );

    let url = std::env::temp_dir().join("mock_pipeline_demo.mp4");
    plugin
        .handle("startRecording", json!({"url": url.to_str().unwrap()}))
        .await;
    println!("recording to {}", url.display());

    feeder.await.unwrap();

    let reply = plugin.handle("stopRecording", json!(null)).await;
    match reply["videoData"].as_array() {
        Some(bytes) => println!("recorded {} bytes at {}", bytes.len(), reply["url"]),
        None => println!("recording failed: {}", reply["error"]),
    }

    plugin.handle("destroy", json!(null)).await;
    let _ = std::fs::remove_file(&url);
    println!("done");
}
