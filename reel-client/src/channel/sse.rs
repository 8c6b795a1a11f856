//! Server-sent events frame decoder
//!
//! Incremental parser for the `text/event-stream` format. Bytes arrive in
//! arbitrary chunks; complete frames are returned as soon as their blank
//! terminator line is seen.
//!
//! Supported fields: `event`, `data` (multi-line, joined with `\n`), `id`.
//! Comment lines (`:` prefix) and `retry` are ignored. A frame without any
//! `data` line is not dispatched.

use tracing::warn;

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    /// Event name, `message` when the frame carried no `event` field
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Longest unterminated line kept before the partial frame is discarded
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Stateful decoder; feed it chunks with [`SseDecoder::push`]
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes after the last line terminator
    pending: Vec<u8>,
    /// Leading byte-order mark already handled
    bom_checked: bool,
    /// Previous line ended with a bare `\r`; a following `\n` belongs to it
    skip_lf: bool,
    event: Option<String>,
    data: Option<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every frame it completes
    ///
    /// Lines end in `\n`, `\r\n` or a bare `\r`. A line that grows past
    /// [`MAX_PENDING_BYTES`] without a terminator is dropped with its frame.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);

        if !self.bom_checked {
            if self.pending.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(&self.pending) {
                return Vec::new();
            }
            if self.pending.starts_with(UTF8_BOM) {
                self.pending.drain(..UTF8_BOM.len());
            }
            self.bom_checked = true;
        }

        let mut frames = Vec::new();
        loop {
            if self.skip_lf {
                match self.pending.first() {
                    None => break,
                    Some(b'\n') => {
                        self.pending.remove(0);
                    }
                    Some(_) => {}
                }
                self.skip_lf = false;
            }

            let Some(pos) = self.pending.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            if line.pop() == Some(b'\r') {
                self.skip_lf = true;
            }
            // Lines end on an ASCII byte, so multi-byte characters are never split
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            warn!(
                pending = self.pending.len(),
                "Discarding oversized push stream line"
            );
            self.pending.clear();
            self.event = None;
            self.data = None;
            self.id = None;
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        let data = self.data.take()?;
        Some(SseFrame { event, data, id })
    }
}
