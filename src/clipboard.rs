// ============================================================================
// CLIPBOARD: copying color strings and the transient "copied" note
// ============================================================================

use crate::color::ColorField;
use crate::error::ClipboardError;

/// How long the "copied" note stays next to a copy button, in seconds.
pub const COPY_NOTICE_SECS: f64 = 2.0;

pub trait ClipboardWriter {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// OS clipboard via arboard. A fresh handle is opened per write.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardWriter for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clip =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clip.set_text(text.to_owned())
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}

/// Which copy button last succeeded, and until when its note is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CopyFeedback {
    shown: Option<(ColorField, f64)>,
}

impl CopyFeedback {
    /// Show the note for `field` starting at `now` (seconds, host clock).
    pub fn show(&mut self, field: ColorField, now: f64) {
        self.shown = Some((field, now + COPY_NOTICE_SECS));
    }

    /// Field whose note is visible at `now`. Expired notes are dropped.
    pub fn visible(&mut self, now: f64) -> Option<ColorField> {
        match self.shown {
            Some((field, until)) if now < until => Some(field),
            Some(_) => {
                self.shown = None;
                None
            }
            None => None,
        }
    }

    /// Seconds until the current note expires, for scheduling a repaint.
    pub fn remaining(&self, now: f64) -> Option<f64> {
        self.shown
            .map(|(_, until)| until - now)
            .filter(|left| *left > 0.0)
    }
}
