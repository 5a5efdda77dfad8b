// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the capture core

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Video frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width and height exchanged (portrait/landscape swap)
    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    /// True when either dimension is zero (no usable size advertised)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Frame duration as a fraction of a second (num/denom seconds)
///
/// Stores an exact duration so NTSC-style rates survive round trips:
/// 1001/30000 s is 29.97 fps, not 30. A target duration of 1/30 s means
/// the call wants 30 frames per second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameDuration {
    pub num: u32,
    pub denom: u32,
}

impl FrameDuration {
    pub const fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Duration for an integer frame rate (e.g. 30 becomes 1/30 s)
    pub const fn from_fps(fps: u32) -> Self {
        Self::new(1, fps)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Frames per second implied by this duration
    pub fn fps(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            self.denom as f64 / self.num as f64
        }
    }
}

impl Default for FrameDuration {
    fn default() -> Self {
        Self { num: 1, denom: 30 }
    }
}

impl PartialEq for FrameDuration {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for FrameDuration {}

impl PartialOrd for FrameDuration {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameDuration {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Cross-multiply to compare fractions without rounding
        let lhs = self.num as u64 * other.denom as u64;
        let rhs = other.num as u64 * self.denom as u64;
        lhs.cmp(&rhs)
    }
}

impl std::fmt::Display for FrameDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}s", self.num, self.denom)
    }
}

/// Capture orientation relative to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl Orientation {
    /// True when capture is rotated sideways relative to the sensor
    pub fn is_portrait(&self) -> bool {
        matches!(self, Orientation::Portrait | Orientation::PortraitUpsideDown)
    }
}

/// How video is fitted into a surface or encode target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoFill {
    /// Letterbox to preserve aspect ratio
    Fit,
    /// Crop to fill the target (default for calls)
    #[default]
    Fill,
    /// Stretch without preserving aspect ratio
    Stretch,
}

/// Video codec families handled by the capture core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    /// Legacy H.263 (fixed CIF capture, no band adaptation)
    H263,
    H264,
    Hevc,
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::H263 => write!(f, "H.263"),
            VideoCodec::H264 => write!(f, "H.264"),
            VideoCodec::Hevc => write!(f, "H.265"),
        }
    }
}

/// Encoder profile requested by the call-quality layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoProfile {
    #[default]
    H264Baseline,
    H264Main,
    H264Extended,
    H264High,
    HevcMain,
    HevcMain10,
}

/// Supported frame-duration range advertised by a device format
///
/// `min_frame_duration` corresponds to the fastest supported frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateRange {
    pub min_frame_duration: FrameDuration,
    pub max_frame_duration: FrameDuration,
}

impl FrameRateRange {
    pub const fn new(min_frame_duration: FrameDuration, max_frame_duration: FrameDuration) -> Self {
        Self {
            min_frame_duration,
            max_frame_duration,
        }
    }

    /// True when the target duration falls inside this range
    pub fn contains(&self, target: FrameDuration) -> bool {
        target >= self.min_frame_duration && target <= self.max_frame_duration
    }
}

/// One capture format exposed by an open device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFormat {
    pub width: u32,
    pub height: u32,
    /// Frame-duration ranges this format can run at
    pub frame_rate_ranges: Vec<FrameRateRange>,
    /// Formats reserved for unrelated hardware effects are never selected
    /// by the biggest-format pass
    pub reserved_for_effects: bool,
}

impl DeviceFormat {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn pixels(&self) -> u64 {
        self.dimensions().pixels()
    }

    /// True when any advertised range contains the target duration
    pub fn supports_frame_duration(&self, target: FrameDuration) -> bool {
        self.frame_rate_ranges.iter().any(|r| r.contains(target))
    }
}

impl std::fmt::Display for DeviceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Physical placement of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePosition {
    Front,
    Back,
    #[default]
    Unspecified,
}

/// A camera device known to the capability provider
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureDevice {
    /// Stable unique identifier, also used for the persisted default
    pub id: String,
    pub name: String,
    pub position: DevicePosition,
}

/// A raw frame delivered by the capture hardware
///
/// `timestamp` is the presentation time relative to session start; it feeds
/// the measured-frame-rate window and the encoder.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, may include padding
    pub stride: u32,
    pub timestamp: Duration,
}

/// An encoded frame handed to the sink callback
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Arc<[u8]>,
    pub codec: VideoCodec,
    pub keyframe: bool,
    pub dimensions: Dimensions,
    pub timestamp: Duration,
}

/// Why the capture session became transiently unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionReason {
    /// Camera unavailable while the app is backgrounded; the host puts the
    /// call on hold instead of showing privacy
    NotAvailableInBackground,
    /// Another client claimed the device
    InUseByAnotherClient,
    /// Multiple foreground apps are competing for the camera
    NotAvailableWithMultipleForegroundApps,
    /// System thermal or load pressure
    SystemPressure,
}

/// Asynchronous events surfaced by the capability provider
///
/// The host observes its platform's device/session notifications and feeds
/// them to [`CaptureController::handle_provider_event`].
///
/// [`CaptureController::handle_provider_event`]: crate::capture::CaptureController::handle_provider_event
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// The running session reported a mid-session failure
    RuntimeError(String),
    /// A new camera was plugged in
    DeviceConnected(CaptureDevice),
    /// A camera disappeared; carries the device id
    DeviceDisconnected(String),
    /// The session became transiently unavailable
    Interrupted(InterruptionReason),
    InterruptionEnded,
}

/// Result type for capability-provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error types for capability-provider operations
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Requested device is not known to the provider
    DeviceNotFound(String),
    /// Opening the device input failed
    OpenFailed(String),
    /// The device rejected the requested format or frame duration
    FormatNotSupported(String),
    /// The running session failed
    SessionFailed(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::DeviceNotFound(id) => write!(f, "Device not found: {}", id),
            ProviderError::OpenFailed(msg) => write!(f, "Failed to open device: {}", msg),
            ProviderError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            ProviderError::SessionFailed(msg) => write!(f, "Capture session failed: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}
