// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture core
//!
//! The capture core owns a platform capability provider behind the
//! [`CaptureProvider`] trait and drives it from a dedicated worker thread.
//! Around it sit the pure policy modules: device format negotiation
//! ([`format`]), capture band selection ([`bands`]), and the preview
//! surface registry ([`surface`]). The [`CaptureController`] ties them
//! together and is the only entry point hosts use.
//!
//! Hardware access is abstracted, not implemented, here: hosts supply a
//! `CaptureProvider` for their platform (V4L2, AVFoundation, a test mock)
//! and feed its async notifications back in as [`ProviderEvent`]s.

pub mod bands;
pub mod controller;
pub mod format;
pub mod surface;
pub mod types;
pub mod worker;

pub use bands::{CaptureBand, CaptureBudget, band_table, choose_capture_band};
pub use controller::CaptureController;
pub use format::{FormatIntent, biggest_format, clamp_frame_duration, negotiate_format};
pub use surface::{CaptureEvent, SurfaceId, SurfaceRegistry, SurfaceState};
pub use types::{
    CaptureDevice, CapturedFrame, DeviceFormat, DevicePosition, Dimensions, EncodedFrame,
    FrameDuration, FrameRateRange, InterruptionReason, Orientation, ProviderError, ProviderEvent,
    ProviderResult, VideoCodec, VideoFill,
};
pub use worker::CaptureQueue;

/// Callback invoked by the provider for every captured frame
///
/// Runs on the provider's delivery context, never on the capture queue.
pub type FrameCallback = Box<dyn FnMut(CapturedFrame) + Send>;

/// Platform camera access
///
/// One provider instance represents one capture session. The controller
/// serializes every call through its capture queue, so implementations do
/// not need internal locking beyond what frame delivery requires.
pub trait CaptureProvider: Send {
    /// List the cameras currently known to the platform
    fn enumerate_devices(&self) -> Vec<CaptureDevice>;

    /// Open the given device as the session input, replacing any previous one
    fn open_input(&mut self, device: &CaptureDevice) -> ProviderResult<()>;

    /// Close the session input if one is open
    fn close_input(&mut self);

    /// True when a device input is open
    fn is_open(&self) -> bool;

    /// Capture formats of the open device; empty when no device is open
    fn formats(&self) -> Vec<DeviceFormat>;

    /// The format currently locked on the open device
    fn active_format(&self) -> Option<DeviceFormat>;

    /// Lock a capture format and frame-duration bounds on the open device
    fn apply_format(
        &mut self,
        format: &DeviceFormat,
        min_frame_duration: FrameDuration,
        max_frame_duration: FrameDuration,
    ) -> ProviderResult<()>;

    /// Install the frame delivery callback
    fn set_frame_callback(&mut self, callback: FrameCallback);

    /// Start the hardware session
    fn start_running(&mut self) -> ProviderResult<()>;

    /// Stop the hardware session
    fn stop_running(&mut self);

    /// True while the hardware session is running
    fn is_running(&self) -> bool;
}
