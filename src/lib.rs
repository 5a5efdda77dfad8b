// SPDX-License-Identifier: GPL-3.0-only

//! capture-core - the camera capture core of a video calling engine
//!
//! This library owns everything between a platform camera provider and the
//! call's encoded video stream: device selection and hot-plug handling,
//! capture format negotiation, band selection against the call's bitrate
//! and macroblock budgets, encoder lifecycle, and the preview surface
//! state machine.
//!
//! # Architecture
//!
//! - [`capture`]: the capture orchestrator, capability provider trait,
//!   format negotiation, band tables, and the surface registry
//! - [`media`]: encoder backends and the encoder lifecycle manager
//! - [`config`]: persisted capture preferences
//!
//! Hosts construct a [`CaptureController`] with their platform's
//! [`CaptureProvider`] and encoder backends, express run intents
//! (previewing, recording, privacy), and observe [`CaptureEvent`]s.

pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;

// Re-export commonly used types
pub use capture::{
    CaptureController, CaptureDevice, CaptureEvent, CaptureProvider, CapturedFrame, Dimensions,
    EncodedFrame, FrameDuration, ProviderEvent, SurfaceId, SurfaceState, VideoCodec,
};
pub use config::CaptureConfig;
pub use errors::{CaptureError, CaptureResult, EncoderError};
pub use media::encoders::{EncoderBackend, EncoderManager, EncoderSettings, EncoderSink};
