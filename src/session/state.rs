use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::image::EncodedImage;

/// Request lifecycle of the session. At most one generation call is in
/// flight, so `Refining` and `Editing` are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Phase {
    #[default]
    Idle,
    Refining,
    Editing,
}

/// Work order returned by [`DiagramSession::begin_refine`]: the image to send
/// and the epoch the eventual response must present to be applied.
#[derive(Debug, Clone)]
pub struct RefineTicket {
    pub epoch: u64,
    pub image: EncodedImage,
}

/// Work order returned by [`DiagramSession::begin_edit`]. `base` is the
/// chained image (latest edit, falling back to the refined diagram).
#[derive(Debug, Clone)]
pub struct EditTicket {
    pub epoch: u64,
    pub base: EncodedImage,
    pub instruction: String,
}

/// Serializable view of the session for the frontend. Images travel as
/// data URLs; `downloadable` gates the save action.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub original: Option<String>,
    pub refined: Option<String>,
    pub edited: Option<String>,
    pub phase: Phase,
    pub last_error: Option<String>,
    pub pending_instruction: Option<String>,
    pub downloadable: bool,
}

/// The three-stage diagram pipeline (original → refined → edited) and its
/// request lifecycle.
///
/// Transitions are synchronous; the async generation call happens outside
/// the lock and its result comes back through `complete_refine`/`complete_edit`,
/// which compare the ticket's epoch against the session's current one. The
/// epoch is bumped whenever the task identity changes (new original, reset),
/// so responses belonging to a superseded task are silently dropped.
#[derive(Debug, Default)]
pub struct DiagramSession {
    original: Option<EncodedImage>,
    refined: Option<EncodedImage>,
    edited: Option<EncodedImage>,
    phase: Phase,
    last_error: Option<String>,
    pending_instruction: Option<String>,
    epoch: u64,
}

impl DiagramSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The combined set-original + start-refine transition. Acquiring an
    /// original image always triggers refinement, so the two are a single
    /// atomic step rather than independently invokable ones.
    ///
    /// Returns `None` (a silent no-op) while a generation call is in flight.
    /// Otherwise installs the new original, clears every downstream stage,
    /// starts a fresh task epoch and enters `Refining`.
    pub fn begin_refine(&mut self, image: EncodedImage) -> Option<RefineTicket> {
        if self.phase != Phase::Idle {
            tracing::debug!("begin_refine ignored: generation already in flight");
            return None;
        }

        self.epoch += 1;
        self.original = Some(image.clone());
        self.refined = None;
        self.edited = None;
        self.last_error = None;
        self.pending_instruction = None;
        self.phase = Phase::Refining;

        Some(RefineTicket {
            epoch: self.epoch,
            image,
        })
    }

    /// Apply the outcome of a refine call. A stale epoch (the session was
    /// reset or re-seeded while the call was in flight) is dropped without
    /// touching any state. Success seeds both `refined` and `edited`;
    /// failure records the error and leaves the stages absent. Either way
    /// the phase returns to `Idle`.
    pub fn complete_refine(&mut self, epoch: u64, outcome: Result<EncodedImage, String>) {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, "stale refine response dropped");
            return;
        }

        match outcome {
            Ok(image) => {
                self.refined = Some(image.clone());
                self.edited = Some(image);
            }
            Err(message) => {
                self.last_error = Some(format!("Failed to refine diagram. {message}"));
            }
        }
        self.phase = Phase::Idle;
    }

    /// Start an edit. Whitespace-only instructions, calls while busy, and
    /// calls before a refined diagram exists are all silent no-ops — the
    /// frontend gates these, so they are not errors worth surfacing.
    pub fn begin_edit(&mut self, instruction: &str) -> Option<EditTicket> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return None;
        }
        if self.phase != Phase::Idle {
            tracing::debug!("begin_edit ignored: generation already in flight");
            return None;
        }
        // Edits chain: the latest successful edit is the base, not the
        // refined diagram and never the original sketch.
        let base = self.edited.clone().or_else(|| self.refined.clone())?;

        self.last_error = None;
        self.pending_instruction = None;
        self.phase = Phase::Editing;

        Some(EditTicket {
            epoch: self.epoch,
            base,
            instruction: instruction.to_string(),
        })
    }

    /// Apply the outcome of an edit call. Epoch-guarded like
    /// [`complete_refine`](Self::complete_refine). A failed edit leaves the
    /// previous `edited` image in place, so failures never destroy work.
    pub fn complete_edit(&mut self, epoch: u64, outcome: Result<EncodedImage, String>) {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, "stale edit response dropped");
            return;
        }

        match outcome {
            Ok(image) => {
                self.edited = Some(image);
            }
            Err(message) => {
                self.last_error = Some(format!("Failed to edit diagram. {message}"));
            }
        }
        self.phase = Phase::Idle;
    }

    /// Discard the whole task. Allowed at any time; the epoch bump ensures
    /// any response still in flight is dropped on arrival.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.original = None;
        self.refined = None;
        self.edited = None;
        self.last_error = None;
        self.pending_instruction = None;
        self.phase = Phase::Idle;
    }

    /// Store the latest voice transcript as the proposed instruction.
    /// Last write wins; submitting is still an explicit user action.
    pub fn set_pending_instruction(&mut self, text: impl Into<String>) {
        self.pending_instruction = Some(text.into());
    }

    pub fn edited(&self) -> Option<&EncodedImage> {
        self.edited.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            original: self.original.as_ref().map(EncodedImage::to_data_url),
            refined: self.refined.as_ref().map(EncodedImage::to_data_url),
            edited: self.edited.as_ref().map(EncodedImage::to_data_url),
            phase: self.phase,
            last_error: self.last_error.clone(),
            pending_instruction: self.pending_instruction.clone(),
            downloadable: self.edited.is_some(),
        }
    }
}
