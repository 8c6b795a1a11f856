//! Data models for the submission workflow

mod message;
mod submission;

pub use message::{Message, Role};
pub use submission::{
    content_type_for, ImageFile, Pipeline, RequestStage, StageTransition, VideoResult,
};
