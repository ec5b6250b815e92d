//! Multi-line error report aggregation
//!
//! The unit reports active alarms as a frame: `*EA` opens it, each `*EB`
//! carries one line and `*EZ` closes it. Lines outside an open frame are
//! dropped and only the most recently completed frame is kept.

use hrv_codec::{DataKey, Message};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordered error lines from one completed report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorFrame {
    lines: Vec<String>,
}

impl ErrorFrame {
    /// Frame holding `lines`
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Error lines in arrival order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// No active errors
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of error lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// What the aggregator did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not an error-frame message; store it as a regular value
    PassThrough,
    /// Absorbed into the frame protocol
    Consumed,
    /// Closed a frame
    Completed(ErrorFrame),
}

#[derive(Debug, Default)]
struct FrameBuffer {
    collecting: bool,
    current: Vec<String>,
    last: Option<ErrorFrame>,
}

/// Folds `*EA`/`*EB`/`*EZ` messages into [`ErrorFrame`] completions
#[derive(Debug, Default)]
pub struct ErrorFrameAggregator {
    inner: Mutex<FrameBuffer>,
}

impl ErrorFrameAggregator {
    /// Empty aggregator, not collecting
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the working buffer and start collecting
    pub fn begin(&self) {
        let mut inner = self.inner.lock();
        if inner.collecting && !inner.current.is_empty() {
            debug!(
                "Discarding partial error frame of {} lines",
                inner.current.len()
            );
        }
        inner.current.clear();
        inner.collecting = true;
    }

    /// Append a line if a frame is open; returns whether it was kept
    pub fn add_line(&self, line: impl Into<String>) -> bool {
        let mut inner = self.inner.lock();
        if inner.collecting {
            inner.current.push(line.into());
            true
        } else {
            false
        }
    }

    /// Close the frame and keep it as the last completed one
    pub fn end(&self) -> ErrorFrame {
        let mut inner = self.inner.lock();
        let frame = ErrorFrame::new(std::mem::take(&mut inner.current));
        inner.collecting = false;
        inner.last = Some(frame.clone());
        frame
    }

    /// Route one decoded message through the frame protocol
    pub fn process(&self, message: &Message) -> FrameOutcome {
        match message.key {
            DataKey::ErrorFrameStart => {
                self.begin();
                FrameOutcome::Consumed
            }
            DataKey::ErrorMessage => {
                if !self.add_line(message.payload.as_str()) {
                    debug!("Dropping error line outside a frame: {:?}", message.payload);
                }
                FrameOutcome::Consumed
            }
            DataKey::ErrorFrameEnd => FrameOutcome::Completed(self.end()),
            _ => FrameOutcome::PassThrough,
        }
    }

    /// Whether a frame is currently open
    pub fn is_collecting(&self) -> bool {
        self.inner.lock().collecting
    }

    /// Most recently completed frame
    pub fn last_frame(&self) -> Option<ErrorFrame> {
        self.inner.lock().last.clone()
    }
}
