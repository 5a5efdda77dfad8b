// SPDX-License-Identifier: GPL-3.0-only

//! Video encoder abstraction
//!
//! Hosts register one [`EncoderBackend`] per codec implementation they ship
//! (hardware session, software library). The [`EncoderManager`] probes the
//! backends for supported codecs, creates an instance lazily on the first
//! frame, and tears it down on structural changes so the next frame
//! recreates it against the new codec or dimensions.

pub mod manager;

pub use manager::EncoderManager;

use crate::capture::types::{
    CapturedFrame, Dimensions, EncodedFrame, FrameDuration, VideoCodec, VideoFill, VideoProfile,
};
use crate::errors::EncoderError;
use std::sync::Arc;

/// Non-structural encoder settings
///
/// Changing any of these reconfigures the live instance in place. Codec and
/// target dimensions are structural and live on the manager instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSettings {
    pub target_frame_duration: FrameDuration,
    pub profile: VideoProfile,
    pub level: i32,
    /// Target bitrate in bits/s
    pub target_bit_rate: u32,
    /// Maximum encoded packet size in bytes; 0 means unbounded
    pub max_packet_size: u32,
    /// Frames between forced keyframes; `u32::MAX` disables periodic refresh
    pub intra_frame_interval: u32,
    pub fill: VideoFill,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            target_frame_duration: FrameDuration::default(),
            profile: VideoProfile::default(),
            level: 0,
            target_bit_rate: 0,
            max_packet_size: 0,
            intra_frame_interval: u32::MAX,
            fill: VideoFill::default(),
        }
    }
}

/// Receives every encode result, success or failure
pub type EncoderSink = Arc<dyn Fn(Result<EncodedFrame, EncoderError>) + Send + Sync>;

/// One live encoder instance
pub trait VideoEncoder: Send {
    fn codec(&self) -> VideoCodec;

    /// Apply non-structural settings to the live instance
    fn update_settings(&mut self, settings: &EncoderSettings) -> Result<(), EncoderError>;

    /// Encode one frame, forcing a keyframe when requested
    fn encode(
        &mut self,
        frame: &CapturedFrame,
        force_keyframe: bool,
    ) -> Result<EncodedFrame, EncoderError>;
}

/// A factory for encoder instances of the codecs it supports
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Codecs this backend can create encoders for, probed at call time
    fn supported_codecs(&self) -> Vec<VideoCodec>;

    /// Create an instance for the codec at the given encode dimensions
    fn create(
        &self,
        codec: VideoCodec,
        dimensions: Dimensions,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, EncoderError>;
}
