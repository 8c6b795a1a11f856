//! Submission Orchestrator
//!
//! State machine that sequences the submission flow:
//! collect inputs → request timeline → user approval → render → video.
//!
//! The orchestrator owns the stage, the held timeline, the current video and
//! the message log. It drives the push channel (connect before the render
//! request, disconnect once the render settles) but never owns its events.
//!
//! # Concurrency
//! One request at a time: the busy check and the stage change happen under a
//! single write lock, so two racing calls cannot both start. The lock is
//! released while the network request runs.
//!
//! # Cancellation
//! Dropping a request future before it settles (a timeout, `select!`) moves
//! the in-flight stage to `Failed` with [`SubmissionError::Cancelled`] and
//! closes the push channel, so the workflow never stays busy.

pub mod views;

pub use views::{NotificationView, TimelineUpdateView, VideoProgressView};

use reel_common::{client_id, TimelineComposition};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::channel::LiveEventChannel;
use crate::config::ClientConfig;
use crate::error::{SubmissionError, SubmissionResult};
use crate::models::{ImageFile, Message, Pipeline, RequestStage, StageTransition, VideoResult};
use crate::transport::{MediaStore, TransportAdapter};
use crate::validator;

pub const REVIEW_MESSAGE: &str =
    "Please review the generated timeline below. Approve to start video rendering.";
pub const VIDEO_READY_MESSAGE: &str = "Your property video is ready!";
const ERROR_MESSAGE_PREFIX: &str = "Sorry, there was an error generating your property video";

struct OrchestratorState {
    stage: RequestStage,
    timeline: Option<TimelineComposition>,
    video: Option<VideoResult>,
    messages: Vec<Message>,
    transitions: Vec<StageTransition>,
}

impl OrchestratorState {
    fn new() -> Self {
        Self {
            stage: RequestStage::Idle,
            timeline: None,
            video: None,
            messages: Vec::new(),
            transitions: Vec::new(),
        }
    }

    fn transition_to(&mut self, new_stage: RequestStage) -> StageTransition {
        let transition = StageTransition {
            old_stage: self.stage,
            new_stage,
            transitioned_at: chrono::Utc::now(),
        };
        info!(from = %self.stage, to = %new_stage, "Submission stage changed");
        self.stage = new_stage;
        self.transitions.push(transition.clone());
        transition
    }

    /// Reject when a request already owns the workflow
    fn ensure_not_busy(&self) -> SubmissionResult<()> {
        if self.stage.is_in_flight() {
            warn!(stage = %self.stage, "Rejecting call while busy");
            return Err(SubmissionError::Busy(self.stage));
        }
        Ok(())
    }

    fn fail(&mut self, error: &SubmissionError) {
        self.transition_to(RequestStage::Failed);
        self.messages
            .push(Message::assistant(format!("{}: {}", ERROR_MESSAGE_PREFIX, error)));
    }
}

struct Inner {
    transport: TransportAdapter,
    channel: LiveEventChannel,
    state: RwLock<OrchestratorState>,
}

impl Inner {
    /// Settle a request whose future was dropped mid-flight
    async fn abandon(&self, stage: RequestStage) {
        if stage == RequestStage::AwaitingVideo {
            self.channel.disconnect().await;
        }
        let mut state = self.state.write().await;
        if state.stage == stage {
            state.fail(&SubmissionError::Cancelled(stage));
        }
    }
}

/// Marks one in-flight stage; settles it as cancelled unless disarmed
struct InFlight {
    inner: Arc<Inner>,
    stage: RequestStage,
    settled: bool,
}

impl InFlight {
    fn new(inner: &Arc<Inner>, stage: RequestStage) -> Self {
        Self {
            inner: Arc::clone(inner),
            stage,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(stage = %self.stage, "Request dropped before it settled");
        let inner = Arc::clone(&self.inner);
        let stage = self.stage;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { inner.abandon(stage).await });
            }
            Err(_) => {
                // No runtime left to run the reader either; settle the stage only
                if let Ok(mut state) = inner.state.try_write() {
                    if state.stage == stage {
                        state.fail(&SubmissionError::Cancelled(stage));
                    }
                }
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let released = self.transport.media().release_all();
        if released > 0 {
            debug!(released, "Released transient media on drop");
        }
    }
}

/// Cloneable handle to one submission workflow
#[derive(Clone)]
pub struct SubmissionOrchestrator {
    inner: Arc<Inner>,
}

impl SubmissionOrchestrator {
    pub fn new(config: ClientConfig) -> SubmissionResult<Self> {
        Ok(Self::with_transport(TransportAdapter::new(config)?))
    }

    /// Build around an existing adapter; the push channel shares its HTTP client
    pub fn with_transport(transport: TransportAdapter) -> Self {
        let channel = LiveEventChannel::new(transport.http_client().clone())
            .with_handshake_timeout(transport.config().push_handshake_timeout);
        Self {
            inner: Arc::new(Inner {
                transport,
                channel,
                state: RwLock::new(OrchestratorState::new()),
            }),
        }
    }

    /// Upload prompt and images and negotiate a timeline
    ///
    /// Input errors leave the stage unchanged. Any other failure moves to
    /// `Failed` with an assistant message; the caller's inputs are untouched.
    pub async fn submit_timeline(
        &self,
        prompt: &str,
        images: &[ImageFile],
    ) -> SubmissionResult<TimelineComposition> {
        check_inputs(prompt, images)?;

        let in_flight = {
            let mut state = self.inner.state.write().await;
            state.ensure_not_busy()?;
            state.timeline = None;
            state.transition_to(RequestStage::AwaitingTimeline);
            state.messages.push(Message::user(prompt));
            InFlight::new(&self.inner, RequestStage::AwaitingTimeline)
        };

        let result = self.inner.transport.request_timeline(prompt, images).await;

        {
            let mut state = self.inner.state.write().await;
            match &result {
                Ok(timeline) => {
                    state.timeline = Some(timeline.clone());
                    state.transition_to(RequestStage::TimelineReady);
                    state.messages.push(Message::assistant(REVIEW_MESSAGE));
                }
                Err(e) => {
                    warn!(error = %e, "Timeline request failed");
                    state.fail(e);
                }
            }
        }
        in_flight.settle();
        result
    }

    /// Render the approved timeline through a pipeline
    ///
    /// Allowed from `TimelineReady`, and from `VideoReady` or `Failed` while
    /// a timeline is held. The push channel is opened before the render
    /// request and closed once it settles on either path; channel problems
    /// never fail the render.
    pub async fn request_video(
        &self,
        pipeline: Pipeline,
        prompt: &str,
        images: &[ImageFile],
        timeline: &TimelineComposition,
    ) -> SubmissionResult<VideoResult> {
        check_inputs(prompt, images)?;
        let approved = validator::revalidate_timeline(timeline)?;

        let in_flight = {
            let mut state = self.inner.state.write().await;
            state.ensure_not_busy()?;
            match state.stage {
                RequestStage::TimelineReady => {}
                RequestStage::VideoReady | RequestStage::Failed if state.timeline.is_some() => {}
                stage => {
                    return Err(SubmissionError::InvalidStage {
                        action: "request a video",
                        stage,
                    })
                }
            }
            state.timeline = Some(approved.clone());
            state.transition_to(RequestStage::AwaitingVideo);
            InFlight::new(&self.inner, RequestStage::AwaitingVideo)
        };

        // Progress from an earlier render must not leak into this one
        self.inner.channel.clear_events().await;
        let client_id = client_id::generate();
        let events_url = self.inner.transport.config().events_url();
        if let Err(e) = self
            .inner
            .channel
            .connect(&events_url, Some(client_id.clone()))
            .await
        {
            warn!(client_id = %client_id, error = %e, "Rendering without live progress");
        }

        let result = self
            .inner
            .transport
            .request_render(pipeline, prompt, images, &approved, &client_id)
            .await;

        self.inner.channel.disconnect().await;

        {
            let mut state = self.inner.state.write().await;
            match &result {
                Ok(video) => {
                    if let Some(previous) = state.video.replace(video.clone()) {
                        self.release_if_transient(&previous);
                    }
                    state.transition_to(RequestStage::VideoReady);
                    state.messages.push(Message::assistant_with_video(
                        VIDEO_READY_MESSAGE,
                        video.video_url.clone(),
                    ));
                    info!(client_id = %client_id, video = %video.video_url, "Render complete");
                }
                Err(e) => {
                    warn!(client_id = %client_id, error = %e, "Render failed");
                    state.fail(e);
                }
            }
        }
        in_flight.settle();
        result
    }

    /// Render the held timeline as-is
    pub async fn approve(
        &self,
        pipeline: Pipeline,
        prompt: &str,
        images: &[ImageFile],
    ) -> SubmissionResult<VideoResult> {
        let timeline = {
            let state = self.inner.state.read().await;
            state.timeline.clone().ok_or(SubmissionError::InvalidStage {
                action: "approve a timeline",
                stage: state.stage,
            })?
        };
        self.request_video(pipeline, prompt, images, &timeline).await
    }

    /// Replace the held timeline with a user-edited one
    pub async fn replace_timeline(&self, timeline: TimelineComposition) -> SubmissionResult<()> {
        let edited = validator::revalidate_timeline(&timeline)?;

        let mut state = self.inner.state.write().await;
        if state.stage != RequestStage::TimelineReady {
            return Err(SubmissionError::InvalidStage {
                action: "edit the timeline",
                stage: state.stage,
            });
        }
        state.timeline = Some(edited);
        debug!("Held timeline replaced");
        Ok(())
    }

    /// Hold a previously saved timeline as if the backend had just proposed it
    ///
    /// Allowed from any stage that is not in flight; moves to `TimelineReady`.
    pub async fn load_timeline(&self, timeline: TimelineComposition) -> SubmissionResult<()> {
        let loaded = validator::revalidate_timeline(&timeline)?;

        let mut state = self.inner.state.write().await;
        state.ensure_not_busy()?;
        state.timeline = Some(loaded);
        if state.stage != RequestStage::TimelineReady {
            state.transition_to(RequestStage::TimelineReady);
        }
        debug!("Saved timeline loaded");
        Ok(())
    }

    /// Return to `Idle`, dropping the timeline and releasing the video
    pub async fn reset(&self) -> SubmissionResult<()> {
        let mut state = self.inner.state.write().await;
        state.ensure_not_busy()?;
        if let Some(video) = state.video.take() {
            self.release_if_transient(&video);
        }
        state.timeline = None;
        if state.stage != RequestStage::Idle {
            state.transition_to(RequestStage::Idle);
        }
        Ok(())
    }

    /// Release every transient reference and close the channel
    ///
    /// Returns how many references were released.
    pub async fn shutdown(&self) -> usize {
        self.inner.channel.disconnect().await;
        self.inner.state.write().await.video = None;
        let released = self.inner.transport.media().release_all();
        info!(released, "Submission orchestrator shut down");
        released
    }

    fn release_if_transient(&self, video: &VideoResult) {
        if video.is_transient() && self.inner.transport.media().release(&video.video_url) {
            debug!(video = %video.video_url, "Released superseded video");
        }
    }

    pub async fn stage(&self) -> RequestStage {
        self.inner.state.read().await.stage
    }

    pub async fn timeline(&self) -> Option<TimelineComposition> {
        self.inner.state.read().await.timeline.clone()
    }

    pub async fn video(&self) -> Option<VideoResult> {
        self.inner.state.read().await.video.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.state.read().await.messages.clone()
    }

    pub async fn transitions(&self) -> Vec<StageTransition> {
        self.inner.state.read().await.transitions.clone()
    }

    /// Read-only handle to the push channel
    pub fn channel(&self) -> &LiveEventChannel {
        &self.inner.channel
    }

    pub fn transport(&self) -> &TransportAdapter {
        &self.inner.transport
    }

    pub fn media(&self) -> &MediaStore {
        self.inner.transport.media()
    }

    pub async fn progress_view(&self) -> VideoProgressView {
        VideoProgressView::from_snapshot(&self.inner.channel.snapshot().await)
    }

    pub async fn notification_view(&self) -> NotificationView {
        NotificationView::from_snapshot(&self.inner.channel.snapshot().await)
    }

    pub async fn timeline_update_view(&self) -> TimelineUpdateView {
        TimelineUpdateView::from_snapshot(&self.inner.channel.snapshot().await)
    }
}

fn check_inputs(prompt: &str, images: &[ImageFile]) -> SubmissionResult<()> {
    if prompt.trim().is_empty() {
        return Err(SubmissionError::InputValidation(
            "Please enter a prompt describing the video".to_string(),
        ));
    }
    if images.is_empty() {
        return Err(SubmissionError::InputValidation(
            "Please select at least one image".to_string(),
        ));
    }
    Ok(())
}
