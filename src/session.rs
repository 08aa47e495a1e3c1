//! Scan session: the state machine that sequences intake, extraction and
//! normalization for one screen.
//!
//! ```text
//!            select_image            extract / retry
//!   Idle ───────────────▶ Previewing ───────────────▶ Processing
//!    ▲                        ▲                        │      │
//!    │ reset (any state)      │ call future dropped     │ ok   │ err
//!    │                        └────────────────────────┤      ▼
//!    │                                        Succeeded(p)  Failed(e) ── retry ──▶ Processing
//!    └──────────── commit ────────────────────────┘
//! ```
//!
//! At most one extraction is in flight per session. The `Processing` state is
//! entered before the call is issued and left on every exit path: success,
//! each error kind, and a dropped future (through [`ProcessingGuard`]).
//! While processing, further `extract`/`retry`/`select_image` calls are
//! rejected with [`ScanError::Busy`] without touching the transport.
//!
//! `reset` is always available. It does not cancel the transport call; it
//! bumps a generation counter so that a result arriving afterwards is
//! dropped and reported as [`ScanError::Abandoned`].

use crate::config::ScanConfig;
use crate::error::{ExtractionError, ScanError};
use crate::medicine_list::{MedicineId, MedicineSink};
use crate::output::NormalizedPrescription;
use crate::pipeline::extract;
use crate::pipeline::intake::{self, ImageSource, SourceImage};
use crate::pipeline::normalize::normalize;
use crate::pipeline::transport::{ExtractionTransport, HttpTransport};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Where a scan currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    /// Nothing selected.
    Idle,
    /// An image is held and can be submitted.
    Previewing,
    /// An extraction call is in flight.
    Processing,
    /// The last call succeeded.
    Succeeded(NormalizedPrescription),
    /// The last call failed; the image is still held for a retry.
    Failed(ExtractionError),
}

impl ScanState {
    /// Short lowercase name, for logs and UI keys.
    pub fn label(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Previewing => "previewing",
            ScanState::Processing => "processing",
            ScanState::Succeeded(_) => "succeeded",
            ScanState::Failed(_) => "failed",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, ScanState::Processing)
    }

    pub fn result(&self) -> Option<&NormalizedPrescription> {
        match self {
            ScanState::Succeeded(p) => Some(p),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ExtractionError> {
        match self {
            ScanState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

struct Inner {
    state: ScanState,
    image: Option<Arc<SourceImage>>,
    /// Bumped by every call start and every reset.
    generation: u64,
}

/// One prescription-scan screen: holds the selected photo, the current
/// state, and the transport used to reach the OCR service.
///
/// `ScanSession` is `Send + Sync`; share it behind an `Arc` between the
/// task driving the UI and the task awaiting the call.
pub struct ScanSession {
    transport: Arc<dyn ExtractionTransport>,
    max_image_bytes: usize,
    callback: ProgressCallback,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ScanSession")
            .field("state", &inner.state.label())
            .field("has_image", &inner.image.is_some())
            .field("generation", &inner.generation)
            .finish()
    }
}

impl ScanSession {
    /// Create a session from `config`, building an [`HttpTransport`] unless
    /// the config carries its own transport.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let transport: Arc<dyn ExtractionTransport> = match config.transport {
            Some(ref t) => Arc::clone(t),
            None => Arc::new(HttpTransport::new(config)?),
        };
        Ok(Self {
            transport,
            max_image_bytes: config.max_image_bytes,
            callback: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
            inner: Mutex::new(Inner {
                state: ScanState::Idle,
                image: None,
                generation: 0,
            }),
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ScanState {
        self.lock().state.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.lock().state.is_processing()
    }

    /// The retained photo, if one is selected.
    pub fn image(&self) -> Option<Arc<SourceImage>> {
        self.lock().image.clone()
    }

    /// Validate and retain a new photo, replacing any previous one.
    ///
    /// On failure the session is left as it was.
    pub async fn select_image(&self, source: ImageSource) -> Result<Arc<SourceImage>, ScanError> {
        if self.is_processing() {
            return Err(ScanError::Busy);
        }
        let image = Arc::new(intake::acquire(source, self.max_image_bytes).await?);

        {
            let mut inner = self.lock();
            if inner.state.is_processing() {
                return Err(ScanError::Busy);
            }
            inner.image = Some(Arc::clone(&image));
            inner.state = ScanState::Previewing;
        }
        self.notify(&ScanState::Previewing);
        Ok(image)
    }

    /// Select `source` and immediately extract it.
    pub async fn submit(&self, source: ImageSource) -> Result<NormalizedPrescription, ScanError> {
        self.select_image(source).await?;
        self.extract().await
    }

    /// Send the retained photo to the OCR service and normalize the answer.
    ///
    /// # Errors
    /// - [`ScanError::Busy`]: a call is already in flight; nothing is sent
    /// - [`ScanError::NoImage`]: no photo selected
    /// - [`ScanError::Extraction`]: the call failed; state becomes `Failed`
    /// - [`ScanError::Abandoned`]: the session was reset meanwhile
    pub async fn extract(&self) -> Result<NormalizedPrescription, ScanError> {
        let (image, generation) = {
            let mut inner = self.lock();
            if inner.state.is_processing() {
                debug!("Extraction rejected: already processing");
                return Err(ScanError::Busy);
            }
            let image = inner.image.clone().ok_or(ScanError::NoImage)?;
            inner.generation += 1;
            inner.state = ScanState::Processing;
            (image, inner.generation)
        };
        self.notify(&ScanState::Processing);

        let guard = ProcessingGuard {
            session: self,
            generation,
            armed: true,
        };

        info!("Extracting prescription ({} bytes)", image.len());
        self.callback.on_request_start(image.len());
        let outcome = extract::extract(self.transport.as_ref(), &image)
            .await
            .map(|raw| normalize(&raw));

        guard.finish(outcome)
    }

    /// Re-send the retained photo. Identical to [`extract`](Self::extract);
    /// there is no attempt counter and no backoff.
    pub async fn retry(&self) -> Result<NormalizedPrescription, ScanError> {
        self.extract().await
    }

    /// Drop the image, result and error and return to `Idle`.
    ///
    /// Any in-flight call keeps running, but its result will be discarded.
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            if inner.state.is_processing() {
                debug!("Reset while processing; the pending result will be discarded");
            }
            inner.generation += 1;
            inner.image = None;
            inner.state = ScanState::Idle;
        }
        self.notify(&ScanState::Idle);
    }

    /// Hand the extracted prescription to `sink` and return to `Idle`.
    pub fn commit(&self, sink: &mut dyn MedicineSink) -> Result<Vec<MedicineId>, ScanError> {
        let prescription = self.take_result()?;
        Ok(hand_off(prescription, sink))
    }

    /// Hand a user-edited copy of the extracted prescription to `sink` and
    /// return to `Idle`.
    ///
    /// Only valid once an extraction has succeeded.
    pub fn commit_edited(
        &self,
        prescription: NormalizedPrescription,
        sink: &mut dyn MedicineSink,
    ) -> Result<Vec<MedicineId>, ScanError> {
        self.take_result()?;
        Ok(hand_off(prescription, sink))
    }

    /// Take the succeeded result and reset in one step, so no extraction can
    /// start between the check and the reset.
    fn take_result(&self) -> Result<NormalizedPrescription, ScanError> {
        let mut inner = self.lock();
        let prescription = match std::mem::replace(&mut inner.state, ScanState::Idle) {
            ScanState::Succeeded(p) => p,
            other => {
                let err = if other.is_processing() {
                    ScanError::Busy
                } else {
                    ScanError::NothingToCommit
                };
                inner.state = other;
                return Err(err);
            }
        };
        inner.generation += 1;
        inner.image = None;
        drop(inner);

        self.notify(&ScanState::Idle);
        Ok(prescription)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, state: &ScanState) {
        debug!("Scan state → {}", state.label());
        self.callback.on_state_change(state);
    }
}

/// Runs with the session lock released; the session is already `Idle`.
fn hand_off(prescription: NormalizedPrescription, sink: &mut dyn MedicineSink) -> Vec<MedicineId> {
    let ids = sink.add_prescription(prescription);
    info!("Committed {} medicines", ids.len());
    ids
}

/// Leaves `Processing` for exactly one call, however the call ends.
///
/// [`finish`](Self::finish) records the outcome. If the call future is
/// dropped before that, `Drop` returns the session to `Previewing` so the
/// processing flag cannot stay set.
struct ProcessingGuard<'a> {
    session: &'a ScanSession,
    generation: u64,
    armed: bool,
}

impl ProcessingGuard<'_> {
    fn finish(
        mut self,
        outcome: Result<NormalizedPrescription, ExtractionError>,
    ) -> Result<NormalizedPrescription, ScanError> {
        self.armed = false;

        let state = {
            let mut inner = self.session.lock();
            if inner.generation != self.generation || !inner.state.is_processing() {
                drop(inner);
                warn!("Extraction result arrived after reset; discarding");
                self.session.callback.on_result_discarded();
                return Err(ScanError::Abandoned);
            }
            inner.state = match outcome {
                Ok(ref p) => ScanState::Succeeded(p.clone()),
                Err(ref e) => ScanState::Failed(e.clone()),
            };
            inner.state.clone()
        };
        self.session.notify(&state);

        match outcome {
            Ok(p) => {
                info!(
                    "Prescription from '{}' with {} medicines",
                    p.pharmacy_name,
                    p.medicines.len()
                );
                Ok(p)
            }
            Err(e) => {
                warn!("Extraction failed: {}", e);
                Err(e.into())
            }
        }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let state = {
            let mut inner = self.session.lock();
            if inner.generation != self.generation || !inner.state.is_processing() {
                return;
            }
            inner.state = if inner.image.is_some() {
                ScanState::Previewing
            } else {
                ScanState::Idle
            };
            inner.state.clone()
        };
        warn!("Extraction call dropped before completing");
        self.session.notify(&state);
    }
}
