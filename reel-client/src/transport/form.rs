//! Multipart request bodies
//!
//! Both stages upload the prompt and every image under the repeated `image`
//! field. The render stage adds the approved timeline and the push-channel
//! client id.

use reel_common::TimelineComposition;
use reqwest::multipart::{Form, Part};

use crate::error::TransportError;
use crate::models::ImageFile;

pub const FIELD_PROMPT: &str = "prompt";
pub const FIELD_IMAGE: &str = "image";
pub const FIELD_TIMELINE: &str = "timeline";
pub const FIELD_CLIENT_ID: &str = "client_id";

/// Body for the timeline request
pub fn timeline_form(prompt: &str, images: &[ImageFile]) -> Result<Form, TransportError> {
    images_form(prompt, images)
}

/// Body for a render request
pub fn render_form(
    prompt: &str,
    images: &[ImageFile],
    timeline: &TimelineComposition,
    client_id: &str,
) -> Result<Form, TransportError> {
    let timeline_json = serde_json::to_string(timeline)
        .map_err(|e| TransportError::Encode(format!("timeline: {}", e)))?;

    Ok(images_form(prompt, images)?
        .text(FIELD_TIMELINE, timeline_json)
        .text(FIELD_CLIENT_ID, client_id.to_string()))
}

fn images_form(prompt: &str, images: &[ImageFile]) -> Result<Form, TransportError> {
    let mut form = Form::new().text(FIELD_PROMPT, prompt.to_string());
    for image in images {
        form = form.part(FIELD_IMAGE, image_part(image)?);
    }
    Ok(form)
}

fn image_part(image: &ImageFile) -> Result<Part, TransportError> {
    Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.content_type)
        .map_err(|e| {
            TransportError::Encode(format!(
                "content type '{}' of {}: {}",
                image.content_type, image.file_name, e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_content_type() {
        let image = ImageFile {
            file_name: "a.jpg".to_string(),
            content_type: "not a mime".to_string(),
            bytes: vec![1],
        };
        match timeline_form("tour", &[image]) {
            Err(TransportError::Encode(msg)) => assert!(msg.contains("a.jpg")),
            other => panic!("expected encode error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_accepts_inferred_content_types() {
        let images = vec![
            ImageFile::new("a.jpg", vec![1]),
            ImageFile::new("b.png", vec![2]),
            ImageFile::new("scan", vec![3]),
        ];
        assert!(timeline_form("tour", &images).is_ok());
    }
}
