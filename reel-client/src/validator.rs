//! Response Validator
//!
//! Checks a raw JSON payload against one of the known response shapes before
//! the rest of the client trusts it. The caller names the shape it expects
//! (the stage that issued the request knows); the payload is never inspected to
//! guess what it is.
//!
//! # Schema policy
//! - Required keys must be present with the declared JSON type
//! - Unknown extra keys are tolerated and dropped from the typed value
//! - `metadata.resolution` is closed: exactly two numbers
//! - `imageSegments[*].ordering` is a unique non-negative integer
//!
//! All issues are collected; each carries a field path such as
//! `timeline.imageSegments[2].ordering`.

use reel_common::timeline::{
    ImageSegment, Metadata, Music, TextSegment, Theme, Timeline, TimelineComposition, Transition,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::models::VideoResult;

/// Response shapes the validator knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    TimelineComposition,
    VideoResult,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseKind::TimelineComposition => f.write_str("timeline composition"),
            ResponseKind::VideoResult => f.write_str("video result"),
        }
    }
}

/// A validated, typed response
#[derive(Debug, Clone, PartialEq)]
pub enum TypedResponse {
    Timeline(TimelineComposition),
    Video(VideoResult),
}

/// One field-level problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Payload rejected by the validator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.issues))]
pub struct ValidationError {
    pub kind: ResponseKind,
    pub issues: Vec<ValidationIssue>,
}

fn describe(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate `payload` as the given kind
pub fn validate(kind: ResponseKind, payload: &Value) -> Result<TypedResponse, ValidationError> {
    match kind {
        ResponseKind::TimelineComposition => validate_timeline(payload).map(TypedResponse::Timeline),
        ResponseKind::VideoResult => validate_video(payload).map(TypedResponse::Video),
    }
}

/// Validate a timeline-composition payload
pub fn validate_timeline(payload: &Value) -> Result<TimelineComposition, ValidationError> {
    let mut checker = Checker::default();
    let composition = checker.composition(payload);
    checker.finish(ResponseKind::TimelineComposition, composition)
}

/// Validate a final-video payload (`{videoUrl}`)
pub fn validate_video(payload: &Value) -> Result<VideoResult, ValidationError> {
    let mut checker = Checker::default();
    let video = checker.video(payload);
    checker.finish(ResponseKind::VideoResult, video)
}

/// Re-validate an already typed composition (e.g. after user edits)
pub fn revalidate_timeline(
    composition: &TimelineComposition,
) -> Result<TimelineComposition, ValidationError> {
    match serde_json::to_value(composition) {
        Ok(value) => validate_timeline(&value),
        Err(e) => Err(ValidationError {
            kind: ResponseKind::TimelineComposition,
            issues: vec![ValidationIssue {
                path: ROOT.to_string(),
                message: format!("not serializable: {}", e),
            }],
        }),
    }
}

const ROOT: &str = "response";

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct Checker {
    issues: Vec<ValidationIssue>,
}

impl Checker {
    fn finish<T>(self, kind: ResponseKind, value: Option<T>) -> Result<T, ValidationError> {
        match value {
            Some(value) if self.issues.is_empty() => Ok(value),
            _ => Err(ValidationError {
                kind,
                issues: self.issues,
            }),
        }
    }

    fn push(&mut self, path: &str, message: impl Into<String>) {
        let path = if path.is_empty() { ROOT } else { path };
        self.issues.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn expected(&mut self, path: &str, expected: &str, found: &Value) {
        self.push(path, format!("expected {}, found {}", expected, type_name(found)));
    }

    // ----- primitives -------------------------------------------------------

    fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.expected(path, "object", other);
                None
            }
        }
    }

    fn field<'a>(&mut self, obj: &'a Map<String, Value>, path: &str, key: &str) -> Option<&'a Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.push(&join(path, key), "missing required field");
        }
        value
    }

    fn number(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<f64> {
        let value = self.field(obj, path, key)?;
        match value.as_f64() {
            Some(n) => Some(n),
            None => {
                self.expected(&join(path, key), "number", value);
                None
            }
        }
    }

    fn string(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<String> {
        let value = self.field(obj, path, key)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.expected(&join(path, key), "string", value);
                None
            }
        }
    }

    fn boolean(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<bool> {
        let value = self.field(obj, path, key)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.expected(&join(path, key), "boolean", value);
                None
            }
        }
    }

    fn index_value(&mut self, value: &Value, path: &str) -> Option<u32> {
        let Some(n) = value.as_f64() else {
            self.expected(path, "number", value);
            return None;
        };
        if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
            self.push(path, format!("expected non-negative integer, found {}", n));
            return None;
        }
        Some(n as u32)
    }

    fn index(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<u32> {
        let value = self.field(obj, path, key)?;
        self.index_value(value, &join(path, key))
    }

    /// Optional field: absent or null is `Some(None)`, a type mismatch is `None`
    fn optional<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
        obj.get(key).filter(|v| !v.is_null())
    }

    fn opt_number(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<Option<f64>> {
        match Self::optional(obj, key) {
            None => Some(None),
            Some(value) => match value.as_f64() {
                Some(n) => Some(Some(n)),
                None => {
                    self.expected(&join(path, key), "number", value);
                    None
                }
            },
        }
    }

    fn opt_string(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<Option<String>> {
        match Self::optional(obj, key) {
            None => Some(None),
            Some(value) => match value.as_str() {
                Some(s) => Some(Some(s.to_string())),
                None => {
                    self.expected(&join(path, key), "string", value);
                    None
                }
            },
        }
    }

    fn opt_index(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> Option<Option<u32>> {
        match Self::optional(obj, key) {
            None => Some(None),
            Some(value) => self.index_value(value, &join(path, key)).map(Some),
        }
    }

    fn array_of<T>(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        mut element: impl FnMut(&mut Self, &Value, &str) -> Option<T>,
    ) -> Option<Vec<T>> {
        let value = self.field(obj, path, key)?;
        let array_path = join(path, key);
        let Some(items) = value.as_array() else {
            self.expected(&array_path, "array", value);
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        let mut complete = true;
        for (i, item) in items.iter().enumerate() {
            match element(self, item, &format!("{}[{}]", array_path, i)) {
                Some(v) => out.push(v),
                None => complete = false,
            }
        }
        complete.then_some(out)
    }

    // ----- timeline composition ---------------------------------------------

    fn composition(&mut self, value: &Value) -> Option<TimelineComposition> {
        let obj = self.object(value, "")?;

        let metadata = self
            .field(obj, "", "metadata")
            .and_then(|v| self.metadata(v, "metadata"));
        let theme = self.field(obj, "", "theme").and_then(|v| self.theme(v, "theme"));
        let timeline = self
            .field(obj, "", "timeline")
            .and_then(|v| self.timeline(v, "timeline"));
        let music = self.field(obj, "", "music").and_then(|v| self.music(v, "music"));

        Some(TimelineComposition {
            metadata: metadata?,
            theme: theme?,
            timeline: timeline?,
            music: music?,
        })
    }

    fn metadata(&mut self, value: &Value, path: &str) -> Option<Metadata> {
        let obj = self.object(value, path)?;
        let total_duration = self.number(obj, path, "totalDuration");
        let aspect_ratio = self.string(obj, path, "aspectRatio");
        let fps = self.string(obj, path, "fps");
        let resolution = self.resolution(obj, path);

        Some(Metadata {
            total_duration: total_duration?,
            aspect_ratio: aspect_ratio?,
            fps: fps?,
            resolution: resolution?,
        })
    }

    fn resolution(&mut self, obj: &Map<String, Value>, path: &str) -> Option<[f64; 2]> {
        let dims = self.array_of(obj, path, "resolution", |c, v, p| match v.as_f64() {
            Some(n) => Some(n),
            None => {
                c.expected(p, "number", v);
                None
            }
        })?;
        match dims.as_slice() {
            [width, height] => Some([*width, *height]),
            _ => {
                self.push(
                    &join(path, "resolution"),
                    format!("expected exactly 2 numbers, found {}", dims.len()),
                );
                None
            }
        }
    }

    fn theme(&mut self, value: &Value, path: &str) -> Option<Theme> {
        let obj = self.object(value, path)?;
        let style = self.string(obj, path, "style");
        let grading = self.string(obj, path, "grading");
        Some(Theme {
            style: style?,
            grading: grading?,
        })
    }

    fn timeline(&mut self, value: &Value, path: &str) -> Option<Timeline> {
        let obj = self.object(value, path)?;
        let total_duration = self.number(obj, path, "totalDuration");
        let image_segments = self.image_segments(obj, path);
        let text_segments = self.array_of(obj, path, "textSegments", Self::text_segment);

        Some(Timeline {
            total_duration: total_duration?,
            image_segments: image_segments?,
            text_segments: text_segments?,
        })
    }

    fn image_segments(&mut self, obj: &Map<String, Value>, path: &str) -> Option<Vec<ImageSegment>> {
        let mut seen = HashSet::new();
        let mut unique = true;
        let segments = self.array_of(obj, path, "imageSegments", |c, v, p| {
            let segment = c.image_segment(v, p)?;
            if !seen.insert(segment.ordering) {
                c.push(&join(p, "ordering"), format!("duplicate value {}", segment.ordering));
                unique = false;
            }
            Some(segment)
        })?;
        unique.then_some(segments)
    }

    fn image_segment(&mut self, value: &Value, path: &str) -> Option<ImageSegment> {
        let obj = self.object(value, path)?;
        let ordering = self.index(obj, path, "ordering");
        let start_time = self.number(obj, path, "startTime");
        let duration = self.number(obj, path, "duration");
        let image_index = self.opt_index(obj, path, "imageIndex");
        let transition = match Self::optional(obj, "transition") {
            None => Some(None),
            Some(v) => self.transition(v, &join(path, "transition")).map(Some),
        };

        Some(ImageSegment {
            ordering: ordering?,
            start_time: start_time?,
            duration: duration?,
            image_index: image_index?,
            transition: transition?,
        })
    }

    fn transition(&mut self, value: &Value, path: &str) -> Option<Transition> {
        let obj = self.object(value, path)?;
        let effect = self.string(obj, path, "effect");
        let easing = self.string(obj, path, "easing");
        Some(Transition {
            effect: effect?,
            easing: easing?,
        })
    }

    fn text_segment(&mut self, value: &Value, path: &str) -> Option<TextSegment> {
        let obj = self.object(value, path)?;
        let text = self.string(obj, path, "text");
        let start_time = self.number(obj, path, "startTime");
        let duration = self.number(obj, path, "duration");
        let position = self.opt_string(obj, path, "position");
        let narrative_source = self.opt_string(obj, path, "narrativeSource");

        Some(TextSegment {
            text: text?,
            start_time: start_time?,
            duration: duration?,
            position: position?,
            narrative_source: narrative_source?,
        })
    }

    fn music(&mut self, value: &Value, path: &str) -> Option<Music> {
        let obj = self.object(value, path)?;
        let enabled = self.boolean(obj, path, "enabled");
        let genre = self.string(obj, path, "genre");
        let volume = self.opt_number(obj, path, "volume");
        Some(Music {
            enabled: enabled?,
            genre: genre?,
            volume: volume?,
        })
    }

    // ----- video result -----------------------------------------------------

    fn video(&mut self, value: &Value) -> Option<VideoResult> {
        let obj = self.object(value, "")?;
        let url = self.string(obj, "", "videoUrl")?;
        if url.trim().is_empty() {
            self.push("videoUrl", "expected non-empty string");
            return None;
        }
        Some(VideoResult { video_url: url })
    }
}
