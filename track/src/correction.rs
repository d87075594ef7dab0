//! Manual label correction as an explicit state machine.
//!
//! Automatic splitting cannot be perfect, so every frame may be offered to
//! an operator for correction before it is frozen. The session is driven by
//! external events (edit committed, next frame, stop-and-save, save) rather
//! than by any UI toolkit: an editor thread sends [`SessionEvent`]s over a
//! channel, the session polls cooperatively and re-derives a self-consistent
//! labeling after every action.
//!
//! The invariant the session maintains: leaving the loop always yields a
//! connectivity-respecting, uniquely labeled frame — a raw unchecked edit is
//! never accepted. Retracking always starts from the frame's *entry* state
//! (previous labeling and entry counter), so repeated retracking without
//! further edits is byte-identical.

use crate::overlap::maximal_overlap_based_labeling;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use ndarray::Array2;
use shared::image_proc::regions::remove_small_components_in_labels;
use std::time::Duration;

/// Outcome of offering one frame for review.
#[derive(Debug, Clone)]
pub struct Review {
    /// The accepted, self-consistent labeling for the frame
    pub labels: Array2<u32>,
    /// Updated identity counter
    pub max_index: u32,
    /// Whether the operator requested the run to stop after this frame
    pub stopped: bool,
}

/// The narrow interface through which the pipeline offers frames for review.
///
/// Automated runs plug in [`NoopReviewer`]; interactive runs plug in
/// [`ManualCorrectionSession`].
pub trait Reviewer {
    /// Offer frame `t`'s labeling for review and block (cooperatively) until
    /// the frame is done.
    fn submit_for_review(
        &mut self,
        t: usize,
        labels: Array2<u32>,
        previous: Option<&Array2<u32>>,
        max_index: u32,
    ) -> Review;
}

/// Accepts every frame unchanged; used for non-interactive runs.
pub struct NoopReviewer;

impl Reviewer for NoopReviewer {
    fn submit_for_review(
        &mut self,
        _t: usize,
        labels: Array2<u32>,
        _previous: Option<&Array2<u32>>,
        max_index: u32,
    ) -> Review {
        Review {
            labels,
            max_index,
            stopped: false,
        }
    }
}

/// States of the correction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for operator actions
    Editing,
    /// Re-deriving a consistent labeling from an edited raster
    Retracking,
    /// The current frame is finished, the run continues
    FrameDone,
    /// The operator requested the run to stop
    Stopped,
}

/// Operator actions, each carrying the edited raster they apply to.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Re-derive labels from the edit and continue editing
    UpdateLabels(Array2<u32>),
    /// Accept the edit and advance to the next frame
    NextFrame(Array2<u32>),
    /// Accept the edit, persist, and stop the run
    StopAndSave(Array2<u32>),
    /// Persist the current state without leaving the loop
    Save(Array2<u32>),
}

/// Interactive review session fed by an external editor.
pub struct ManualCorrectionSession {
    events: Receiver<SessionEvent>,
    /// Consistent labelings are echoed here after every retracking so the
    /// editor can refresh its display
    updates: Option<Sender<Array2<u32>>>,
    /// Labelings to persist are emitted here; persistence itself is owned
    /// by the external I/O layer
    saves: Option<Sender<Array2<u32>>>,
    min_object_area_px: usize,
    poll_interval: Duration,
    state: SessionState,
}

impl ManualCorrectionSession {
    pub fn new(events: Receiver<SessionEvent>, min_object_area_px: usize) -> Self {
        Self {
            events,
            updates: None,
            saves: None,
            min_object_area_px,
            poll_interval: Duration::from_millis(100),
            state: SessionState::Editing,
        }
    }

    /// Echo retracked labelings to the editor through this channel.
    pub fn with_update_channel(mut self, updates: Sender<Array2<u32>>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Emit labelings to persist through this channel.
    pub fn with_save_channel(mut self, saves: Sender<Array2<u32>>) -> Self {
        self.saves = Some(saves);
        self
    }

    /// Override the cooperative polling interval (mainly for tests).
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Current state of the session loop.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Re-derive a self-consistent labeling from an edited raster.
    ///
    /// Editing may leave small unconnected pixel groups and labels that no
    /// longer respect connectivity, so the raster is re-segmented: small
    /// components are dropped, then identities are re-assigned by maximal
    /// overlap against the frame's entry reference. For frame 0 the edited
    /// raster itself is the reference, which preserves painted identities.
    pub fn retrack(
        &self,
        edited: Array2<u32>,
        previous: Option<&Array2<u32>>,
        entry_max_index: u32,
    ) -> (Array2<u32>, u32) {
        let mut cleaned = edited;
        remove_small_components_in_labels(&mut cleaned, self.min_object_area_px);

        let mask = cleaned.mapv(|label| label > 0);

        let self_reference;
        let reference = match previous {
            Some(previous) => previous,
            None => {
                self_reference = cleaned.clone();
                &self_reference
            }
        };

        let base_index = entry_max_index.max(reference.iter().copied().max().unwrap_or(0));
        let result =
            maximal_overlap_based_labeling(&reference.view(), &mask.view(), base_index);

        (result.labeling, result.max_index)
    }
}

impl Reviewer for ManualCorrectionSession {
    /// Cooperative polling loop over the event channel.
    ///
    /// Every event passes through retracking before it takes effect, so a
    /// malformed edit cannot produce an inconsistent label image. A
    /// disconnected channel counts as a stop request: the last consistent
    /// labeling is returned with the stopped flag set.
    fn submit_for_review(
        &mut self,
        t: usize,
        labels: Array2<u32>,
        previous: Option<&Array2<u32>>,
        max_index: u32,
    ) -> Review {
        let mut current = labels;
        let mut current_max = max_index;
        self.state = SessionState::Editing;

        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.state = SessionState::Retracking;
                    match event {
                        SessionEvent::UpdateLabels(edited) => {
                            let (labels, new_max) = self.retrack(edited, previous, max_index);
                            current = labels;
                            current_max = new_max;
                            if let Some(updates) = &self.updates {
                                updates.send(current.clone()).ok();
                            }
                            self.state = SessionState::Editing;
                        }
                        SessionEvent::Save(edited) => {
                            let (labels, new_max) = self.retrack(edited, previous, max_index);
                            current = labels;
                            current_max = new_max;
                            if let Some(saves) = &self.saves {
                                saves.send(current.clone()).ok();
                            }
                            self.state = SessionState::Editing;
                        }
                        SessionEvent::NextFrame(edited) => {
                            let (labels, new_max) = self.retrack(edited, previous, max_index);
                            self.state = SessionState::FrameDone;
                            return Review {
                                labels,
                                max_index: new_max,
                                stopped: false,
                            };
                        }
                        SessionEvent::StopAndSave(edited) => {
                            let (labels, new_max) = self.retrack(edited, previous, max_index);
                            if let Some(saves) = &self.saves {
                                saves.send(labels.clone()).ok();
                            }
                            self.state = SessionState::Stopped;
                            return Review {
                                labels,
                                max_index: new_max,
                                stopped: true,
                            };
                        }
                    }
                }
                Err(TryRecvError::Empty) => {
                    std::thread::sleep(self.poll_interval);
                }
                Err(TryRecvError::Disconnected) => {
                    log::warn!("correction session for frame {t} lost its editor, stopping");
                    self.state = SessionState::Stopped;
                    return Review {
                        labels: current,
                        max_index: current_max,
                        stopped: true,
                    };
                }
            }
        }
    }
}
