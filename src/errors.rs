// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture core

use crate::capture::types::{ProviderError, VideoCodec};
use std::fmt;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Top-level error type for capture operations
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Capability-provider errors (device open, format, session)
    Provider(ProviderError),
    /// Encoder lifecycle errors
    Encoder(EncoderError),
    /// Configuration load/store errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Encoder-specific errors
#[derive(Debug, Clone)]
pub enum EncoderError {
    /// No backend supports the requested codec
    CodecNotSupported(VideoCodec),
    /// Encoder instance creation failed
    CreateFailed(String),
    /// A settings update was rejected by the live instance
    UpdateFailed(String),
    /// A single frame failed to encode
    EncodeFailed(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Provider(e) => write!(f, "Provider error: {}", e),
            CaptureError::Encoder(e) => write!(f, "Encoder error: {}", e),
            CaptureError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CaptureError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for EncoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderError::CodecNotSupported(codec) => write!(f, "Codec not supported: {}", codec),
            EncoderError::CreateFailed(msg) => write!(f, "Failed to create encoder: {}", msg),
            EncoderError::UpdateFailed(msg) => write!(f, "Failed to update encoder: {}", msg),
            EncoderError::EncodeFailed(msg) => write!(f, "Failed to encode frame: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}
impl std::error::Error for EncoderError {}

impl From<ProviderError> for CaptureError {
    fn from(err: ProviderError) -> Self {
        CaptureError::Provider(err)
    }
}

impl From<EncoderError> for CaptureError {
    fn from(err: EncoderError) -> Self {
        CaptureError::Encoder(err)
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Config(err.to_string())
    }
}
