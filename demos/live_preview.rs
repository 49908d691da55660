//! Live preview from a real camera.
//!
//! Opens the first system camera through the native backend and prints
//! preview frame stats for a few seconds.
//!
//! Run with: cargo run --example live_preview --features native

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use camera_bridge::{CameraPlugin, NativeBackend};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camera_bridge=info".into()),
        )
        .init();

    let mut plugin = CameraPlugin::new(Arc::new(NativeBackend::new()));

    let reply = plugin.handle("listDevices", json!({"deviceType": "video"})).await;
    println!("cameras: {}", reply["devices"]);

    let reply = plugin.handle("initialize", json!({"type": 1})).await;
    if !reply["error"].is_null() {
        eprintln!("initialize failed: {}", reply["error"]);
        return;
    }
    println!(
        "streaming at {}x{}",
        reply["size"]["width"], reply["size"]["height"]
    );

    let mut preview = plugin.preview().expect("session is live");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut frames = 0u64;

    while tokio::time::Instant::now() < deadline {
        if tokio::time::timeout(Duration::from_secs(1), preview.changed())
            .await
            .map_or(true, |changed| changed.is_err())
        {
            break;
        }
        if let Some(frame) = preview.borrow_and_update().clone() {
            frames += 1;
            if frames % 30 == 0 {
                println!(
                    "frame {}: {}x{}, {} bytes",
                    frames,
                    frame.width,
                    frame.height,
                    frame.data.len()
                );
            }
        }
    }

    println!("saw {frames} frames");
    plugin.handle("destroy", json!(null)).await;
}
