// SPDX-License-Identifier: GPL-3.0-only

//! Media encoding
//!
//! Only the encoder side lives here. Decoding of remote video is the
//! session layer's concern and never touches the capture core.

pub mod encoders;

pub use encoders::{EncoderBackend, EncoderManager, EncoderSettings, EncoderSink, VideoEncoder};
