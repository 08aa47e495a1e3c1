//! Pipeline stages for prescription extraction.
//!
//! Each submodule implements exactly one transformation step, executed in
//! strict sequence per submitted photo:
//!
//! ```text
//! intake ──▶ extract ──▶ normalize
//! (file)     (HTTP)      (pure)
//! ```
//!
//! 1. [`intake`]: validate the selected file is an image and hold its
//!    bytes plus a renderable preview ([`encode`])
//! 2. [`extract`]: one multipart request/response exchange with the OCR
//!    service through a [`transport::ExtractionTransport`]; the only stage
//!    with network I/O
//! 3. [`normalize`]: total, side-effect-free mapping of the loosely typed
//!    response onto [`crate::output::NormalizedPrescription`]
//!
//! Sequencing, single-flight gating and retry live in [`crate::session`].

pub mod encode;
pub mod extract;
pub mod intake;
pub mod normalize;
pub mod transport;
