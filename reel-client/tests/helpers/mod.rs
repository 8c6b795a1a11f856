//! Shared helpers for reel-client integration tests

#![allow(dead_code)]

pub mod mock_backend;

use std::future::Future;
use std::time::Duration;

use reel_client::ImageFile;
use serde_json::{json, Value};

/// Timeline payload with one image segment and caption per image
pub fn timeline_json(images: usize) -> Value {
    let image_segments: Vec<Value> = (0..images)
        .map(|i| {
            json!({
                "ordering": i,
                "startTime": i as f64 * 3.0,
                "duration": 3.0,
                "transition": {"effect": "fade", "easing": "ease-in-out"}
            })
        })
        .collect();
    let text_segments: Vec<Value> = (0..images)
        .map(|i| {
            json!({
                "text": format!("Room {}", i + 1),
                "startTime": i as f64 * 3.0,
                "duration": 3.0,
                "position": "bottom"
            })
        })
        .collect();

    json!({
        "metadata": {
            "totalDuration": images as f64 * 3.0,
            "aspectRatio": "9:16",
            "fps": "30",
            "resolution": [1080, 1920]
        },
        "theme": {"style": "luxury", "grading": "warm"},
        "timeline": {
            "totalDuration": images as f64 * 3.0,
            "imageSegments": image_segments,
            "textSegments": text_segments
        },
        "music": {"enabled": true, "genre": "ambient", "volume": 0.3}
    })
}

pub fn jpeg(name: &str) -> ImageFile {
    ImageFile::new(name, vec![0xFF, 0xD8, 0xFF, 0xE0, name.len() as u8])
}

/// Poll `check` until it returns true or two seconds pass
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
