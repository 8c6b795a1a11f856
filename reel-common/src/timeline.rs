//! Timeline composition wire model
//!
//! The timeline endpoint proposes a composition: ordered image segments,
//! caption segments, and rendering metadata. The same structure is sent back
//! (possibly user-edited) with the render request.
//!
//! Serialization uses camelCase keys to match the backend JSON. Optional
//! fields are omitted when absent so that a validated composition
//! re-serializes to the same shape it was accepted from.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Complete timeline composition returned by the timeline endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineComposition {
    pub metadata: Metadata,
    pub theme: Theme,
    pub timeline: Timeline,
    pub music: Music,
}

/// Output format metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Total video duration (seconds)
    pub total_duration: f64,
    /// e.g. "9:16"
    pub aspect_ratio: String,
    /// Frame rate as sent by the backend (string, e.g. "30")
    pub fps: String,
    /// Width and height in pixels
    pub resolution: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub style: String,
    pub grading: String,
}

/// Segment lists with their shared duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub total_duration: f64,
    pub image_segments: Vec<ImageSegment>,
    pub text_segments: Vec<TextSegment>,
}

/// One image on screen
///
/// `ordering` is the position in the visual sequence and also the index of
/// the user-supplied source image the segment shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSegment {
    pub ordering: u32,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub effect: String,
    pub easing: String,
}

/// One caption on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    pub text: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_source: Option<String>,
}

/// Background music settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Music {
    pub enabled: bool,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl TimelineComposition {
    /// Image segments sorted into visual order (ascending `ordering`)
    pub fn ordered_image_segments(&self) -> Vec<&ImageSegment> {
        let mut segments: Vec<&ImageSegment> = self.timeline.image_segments.iter().collect();
        segments.sort_by_key(|s| s.ordering);
        segments
    }

    /// Text segments sorted by start time
    pub fn ordered_text_segments(&self) -> Vec<&TextSegment> {
        let mut segments: Vec<&TextSegment> = self.timeline.text_segments.iter().collect();
        segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        segments
    }

    /// Pair each image segment with the caption at the same visual position
    ///
    /// Fewer captions than images yields `None` for the trailing images;
    /// surplus captions are left unpaired.
    pub fn caption_pairs(&self) -> Vec<(&ImageSegment, Option<&TextSegment>)> {
        let texts = self.ordered_text_segments();
        self.ordered_image_segments()
            .into_iter()
            .enumerate()
            .map(|(position, image)| (image, texts.get(position).copied()))
            .collect()
    }

    /// Replace the caption text at a visual position
    pub fn set_caption(&mut self, position: usize, text: impl Into<String>) -> Result<()> {
        let mut indices: Vec<usize> = (0..self.timeline.text_segments.len()).collect();
        indices.sort_by(|&a, &b| {
            self.timeline.text_segments[a]
                .start_time
                .total_cmp(&self.timeline.text_segments[b].start_time)
        });

        let index = indices.get(position).copied().ok_or_else(|| {
            Error::InvalidInput(format!(
                "caption position {} out of range ({} captions)",
                position,
                indices.len()
            ))
        })?;
        self.timeline.text_segments[index].text = text.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(ordering: u32, start: f64) -> ImageSegment {
        ImageSegment {
            ordering,
            start_time: start,
            duration: 3.0,
            image_index: None,
            transition: None,
        }
    }

    fn caption(text: &str, start: f64) -> TextSegment {
        TextSegment {
            text: text.to_string(),
            start_time: start,
            duration: 3.0,
            position: None,
            narrative_source: None,
        }
    }

    fn composition(images: Vec<ImageSegment>, texts: Vec<TextSegment>) -> TimelineComposition {
        TimelineComposition {
            metadata: Metadata {
                total_duration: 9.0,
                aspect_ratio: "9:16".to_string(),
                fps: "30".to_string(),
                resolution: [1080.0, 1920.0],
            },
            theme: Theme {
                style: "modern".to_string(),
                grading: "warm".to_string(),
            },
            timeline: Timeline {
                total_duration: 9.0,
                image_segments: images,
                text_segments: texts,
            },
            music: Music {
                enabled: true,
                genre: "ambient".to_string(),
                volume: None,
            },
        }
    }

    #[test]
    fn test_ordered_image_segments_sorts_by_ordering() {
        let tc = composition(vec![image(2, 6.0), image(0, 0.0), image(1, 3.0)], vec![]);
        let orderings: Vec<u32> = tc.ordered_image_segments().iter().map(|s| s.ordering).collect();
        assert_eq!(orderings, vec![0, 1, 2]);
    }

    #[test]
    fn test_caption_pairs_tolerates_fewer_captions() {
        let tc = composition(
            vec![image(0, 0.0), image(1, 3.0), image(2, 6.0)],
            vec![caption("Kitchen", 0.0)],
        );
        let pairs = tc.caption_pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].1.map(|t| t.text.as_str()), Some("Kitchen"));
        assert!(pairs[1].1.is_none());
        assert!(pairs[2].1.is_none());
    }

    #[test]
    fn test_caption_pairs_tolerates_surplus_captions() {
        let tc = composition(
            vec![image(0, 0.0)],
            vec![caption("Garden", 3.0), caption("Entry", 0.0)],
        );
        let pairs = tc.caption_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1.map(|t| t.text.as_str()), Some("Entry"));
    }

    #[test]
    fn test_set_caption_uses_visual_position() {
        let mut tc = composition(
            vec![image(0, 0.0), image(1, 3.0)],
            vec![caption("second", 3.0), caption("first", 0.0)],
        );
        tc.set_caption(1, "Sunny patio").expect("position 1 exists");
        let pairs = tc.caption_pairs();
        assert_eq!(pairs[1].1.map(|t| t.text.as_str()), Some("Sunny patio"));
        assert_eq!(pairs[0].1.map(|t| t.text.as_str()), Some("first"));
    }

    #[test]
    fn test_set_caption_out_of_range() {
        let mut tc = composition(vec![image(0, 0.0)], vec![caption("only", 0.0)]);
        assert!(matches!(tc.set_caption(3, "x"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_optional_fields_omitted_when_absent() {
        let tc = composition(vec![image(0, 0.0)], vec![caption("a", 0.0)]);
        let json = serde_json::to_value(&tc).expect("serializes");
        let segment = &json["timeline"]["imageSegments"][0];
        assert!(segment.get("imageIndex").is_none());
        assert!(segment.get("transition").is_none());
        assert!(json["music"].get("volume").is_none());
        assert_eq!(json["metadata"]["aspectRatio"], "9:16");
    }
}
