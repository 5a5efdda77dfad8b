// SPDX-License-Identifier: GPL-3.0-only

//! Capture orchestration
//!
//! The controller derives one `enabled` bit from the host's run intents
//! (`(previewing || recording) && !privacy`) and reconciles the hardware
//! session against it: every intent change funnels through the same
//! enable/disable path, so a transition produces at most one hardware
//! start or stop regardless of how many intents flipped. All provider
//! access is serialized on the capture queue; the controller itself is an
//! owner-thread component and takes `&mut self` for every intent change.

use super::CaptureProvider;
use super::bands::{CaptureBudget, band_table, choose_capture_band};
use super::format::{biggest_format, clamp_frame_duration};
use super::surface::{CaptureEvent, SurfaceId, SurfaceRegistry, SurfaceState};
use super::types::{
    CaptureDevice, DevicePosition, Dimensions, FrameDuration, InterruptionReason, Orientation,
    ProviderEvent, VideoCodec, VideoFill, VideoProfile,
};
use super::worker::CaptureQueue;
use crate::config::CaptureConfig;
use crate::constants::{
    DEFAULT_TARGET_DIMENSIONS, DEFAULT_TARGET_FRAME_DURATION, EVENT_CHANNEL_CAPACITY,
};
use crate::errors::CaptureResult;
use crate::media::encoders::{EncoderBackend, EncoderManager, EncoderSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Flags shared with the capture queue and the frame delivery thread
#[derive(Default)]
struct SharedFlags {
    enabled: AtomicBool,
    recording: AtomicBool,
    privacy: AtomicBool,
    interrupted: AtomicBool,
    receiving_video: AtomicBool,
    /// Session run state, written only by the queued start/stop jobs
    running: AtomicBool,
}

type SharedProvider = Arc<Mutex<Box<dyn CaptureProvider>>>;

/// Orchestrates the capture session, surfaces, and encoder
pub struct CaptureController {
    provider: SharedProvider,
    shared: Arc<SharedFlags>,
    surfaces: SurfaceRegistry,
    encoder: Arc<EncoderManager>,
    events: broadcast::Sender<CaptureEvent>,
    queue: CaptureQueue,
    config: CaptureConfig,

    recording: bool,
    privacy: bool,
    interrupted: bool,

    target_dimensions: Dimensions,
    target_frame_duration: FrameDuration,
    orientation: Orientation,
    fill: VideoFill,
    forced_codec: Option<VideoCodec>,

    current_device: Option<CaptureDevice>,
    /// Dimensions of the format last locked on the device
    capture_format: Dimensions,
}

impl CaptureController {
    pub fn new(
        mut provider: Box<dyn CaptureProvider>,
        backends: Vec<Box<dyn EncoderBackend>>,
        config: CaptureConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(SharedFlags::default());
        let surfaces = SurfaceRegistry::new(events.clone());
        let encoder = Arc::new(EncoderManager::new(backends));

        // Frame hook runs on the provider's delivery context
        {
            let shared = Arc::clone(&shared);
            let surfaces = surfaces.clone();
            let encoder = Arc::clone(&encoder);
            provider.set_frame_callback(Box::new(move |frame| {
                if shared.enabled.load(Ordering::SeqCst)
                    && !shared.interrupted.load(Ordering::SeqCst)
                    && !shared.receiving_video.swap(true, Ordering::SeqCst)
                {
                    surfaces.set_all(SurfaceState::Video);
                }

                if shared.recording.load(Ordering::SeqCst)
                    && !shared.privacy.load(Ordering::SeqCst)
                    && !shared.interrupted.load(Ordering::SeqCst)
                {
                    encoder.encode_frame(&frame);
                }
            }));
        }

        Self {
            provider: Arc::new(Mutex::new(provider)),
            shared,
            surfaces,
            encoder,
            events,
            queue: CaptureQueue::new("capture"),
            config,
            recording: false,
            privacy: false,
            interrupted: false,
            target_dimensions: DEFAULT_TARGET_DIMENSIONS,
            target_frame_duration: DEFAULT_TARGET_FRAME_DURATION,
            orientation: Orientation::default(),
            fill: VideoFill::default(),
            forced_codec: None,
            current_device: None,
            capture_format: Dimensions::default(),
        }
    }

    /// Subscribe to capture and surface events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    // Run intents

    /// Attach a preview surface; previewing while any surface is attached
    pub fn attach_surface(&mut self, video_dimensions: Dimensions) -> SurfaceId {
        let id = self.surfaces.attach(video_dimensions);
        if self.privacy || self.interrupted {
            self.surfaces.set_state(id, SurfaceState::Privacy);
        } else if self.shared.enabled.load(Ordering::SeqCst) {
            self.surfaces.set_state(id, SurfaceState::CameraStarting);
            if self.shared.receiving_video.load(Ordering::SeqCst) {
                self.surfaces.set_state(id, SurfaceState::Video);
            }
        }
        self.update_enabled();
        id
    }

    pub fn detach_surface(&mut self, id: SurfaceId) {
        self.surfaces.detach(id);
        self.update_enabled();
    }

    pub fn surface_state(&self, id: SurfaceId) -> Option<SurfaceState> {
        self.surfaces.state_of(id)
    }

    pub fn set_recording(&mut self, recording: bool) {
        if self.recording == recording {
            return;
        }
        info!(recording, "Recording intent changed");
        self.recording = recording;
        self.shared.recording.store(recording, Ordering::SeqCst);
        if recording {
            // Codec support may have changed since the last call
            self.encoder.recompute_supported();
            self.encoder.request_keyframe();
        } else {
            self.encoder.invalidate();
        }
        self.update_enabled();
    }

    pub fn set_privacy(&mut self, privacy: bool) {
        if self.privacy == privacy {
            return;
        }
        info!(privacy, "Privacy changed");
        self.privacy = privacy;
        self.shared.privacy.store(privacy, Ordering::SeqCst);

        let effective = privacy || self.interrupted;
        let _ = self.events.send(CaptureEvent::PrivacyChanged { privacy: effective });
        if effective {
            self.surfaces.set_all(SurfaceState::Privacy);
        } else if self.check_enabled() {
            self.surfaces.set_all(SurfaceState::CameraStarting);
            self.shared.receiving_video.store(false, Ordering::SeqCst);
        } else {
            self.surfaces.set_all(SurfaceState::Inactive);
        }
        self.update_enabled();
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    // Devices

    /// Cameras currently known to the provider
    pub fn devices(&self) -> Vec<CaptureDevice> {
        let provider = Arc::clone(&self.provider);
        self.queue
            .run_sync(move || provider.lock().unwrap().enumerate_devices())
    }

    pub fn current_device(&self) -> Option<CaptureDevice> {
        self.current_device.clone()
    }

    /// Switch to a device, or to no device at all
    ///
    /// Passing `None` closes the input and marks all surfaces errored;
    /// capture resumes when a device is connected or chosen. A successful
    /// switch remembers the device as the session default.
    pub fn set_device(&mut self, device: Option<CaptureDevice>) -> CaptureResult<()> {
        let provider = Arc::clone(&self.provider);
        let shared = Arc::clone(&self.shared);
        let surfaces = self.surfaces.clone();
        let target = self.target_frame_duration;
        let requested = device.clone();

        let result = self.queue.run_sync(move || -> CaptureResult<Option<Dimensions>> {
            let mut provider = provider.lock().unwrap();
            provider.close_input();
            shared.receiving_video.store(false, Ordering::SeqCst);

            let Some(device) = requested else {
                surfaces.set_error_all("no capture device");
                return Ok(None);
            };

            if let Err(e) = provider.open_input(&device) {
                warn!(device = %device.name, error = %e, "Failed to open capture device");
                surfaces.set_error_all(&e.to_string());
                return Err(e.into());
            }

            surfaces.mark_camera_starting();
            reconfigure_locked(provider.as_mut(), target)
        });

        match result {
            Ok(locked) => {
                if let Some(device) = &device {
                    info!(device = %device.name, "Capture device changed");
                    self.config.default_device_id = Some(device.id.clone());
                }
                self.current_device = device;
                if let Some(dimensions) = locked {
                    self.capture_format = dimensions;
                    let _ = self
                        .events
                        .send(CaptureEvent::CaptureFormatChanged { dimensions });
                }
                // A device adopted mid-call needs the session brought up
                if self.shared.enabled.load(Ordering::SeqCst) {
                    self.try_start();
                }
                Ok(())
            }
            Err(e) => {
                self.current_device = None;
                Err(e)
            }
        }
    }

    /// Cycle to the next enumerated device, wrapping around
    ///
    /// With no device open this behaves like initial adoption: persisted
    /// default, then front camera, then the first enumerated device.
    pub fn select_next_device(&mut self) -> CaptureResult<()> {
        let current = self.current_device.as_ref().map(|d| d.id.clone());
        let next = self.next_capture_device(current.as_deref());
        self.set_device(next)
    }

    /// Persist the current preferences, including the default device
    pub fn save_config(&self) -> CaptureResult<()> {
        self.config.save()
    }

    // Provider notifications

    /// Feed an async provider notification into the orchestrator
    pub fn handle_provider_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::RuntimeError(message) => {
                warn!(error = %message, "Capture session runtime error");
                if self.shared.enabled.load(Ordering::SeqCst) {
                    self.try_start();
                }
            }
            ProviderEvent::DeviceConnected(device) => {
                debug!(device = %device.name, "Capture device connected");
                if self.current_device.is_none() && self.shared.enabled.load(Ordering::SeqCst) {
                    if let Err(e) = self.set_device(Some(device)) {
                        warn!(error = %e, "Failed to adopt connected device");
                    }
                }
            }
            ProviderEvent::DeviceDisconnected(id) => {
                if self.current_device.as_ref().is_none_or(|d| d.id != id) {
                    return;
                }
                info!(device = %id, "Current capture device disconnected");
                self.current_device = None;
                if self.shared.enabled.load(Ordering::SeqCst) {
                    let next = self.next_capture_device(Some(&id));
                    if let Err(e) = self.set_device(next) {
                        warn!(error = %e, "Failed to switch to replacement device");
                    }
                } else {
                    let _ = self.set_device(None);
                }
            }
            ProviderEvent::Interrupted(reason) => {
                if reason == InterruptionReason::NotAvailableInBackground {
                    // The host puts the call on hold instead
                    debug!("Ignoring background interruption");
                    return;
                }
                info!(reason = ?reason, "Capture interrupted");
                self.set_interrupted(true);
            }
            ProviderEvent::InterruptionEnded => {
                info!("Capture interruption ended");
                self.set_interrupted(false);
            }
        }
    }

    // Target format

    pub fn set_target_dimensions(&mut self, dimensions: Dimensions) {
        if self.target_dimensions == dimensions {
            debug!(dimensions = %dimensions, "Target dimensions unchanged");
            return;
        }
        info!(dimensions = %dimensions, "Target dimensions changed");
        self.target_dimensions = dimensions;
        self.encoder.set_target_dimensions(dimensions);
        self.surfaces.set_video_dimensions_all(dimensions);
        let _ = self
            .events
            .send(CaptureEvent::TargetDimensionsChanged { dimensions });
    }

    pub fn target_dimensions(&self) -> Dimensions {
        self.target_dimensions
    }

    pub fn set_target_frame_duration(&mut self, duration: FrameDuration) {
        if self.target_frame_duration == duration {
            return;
        }
        self.target_frame_duration = duration;
        self.encoder
            .apply_settings(|s| s.target_frame_duration = duration);
        self.dispatch_reconfigure();
    }

    /// Orientation changes renegotiate the format; they never reopen the device
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if self.orientation == orientation {
            return;
        }
        self.orientation = orientation;
        self.dispatch_reconfigure();
    }

    /// Fill changes renegotiate the format like orientation changes do
    pub fn set_fill(&mut self, fill: VideoFill) {
        if self.fill == fill {
            return;
        }
        self.fill = fill;
        self.encoder.apply_settings(|s| s.fill = fill);
        self.dispatch_reconfigure();
    }

    pub fn fill(&self) -> VideoFill {
        self.fill
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Dimensions of the format currently locked on the device
    pub fn capture_size(&self) -> Dimensions {
        self.capture_format
    }

    // Encoder

    pub fn set_codec(&mut self, codec: VideoCodec) {
        self.encoder.set_codec(Some(codec));
        self.encoder.request_keyframe();
    }

    pub fn set_profile(&mut self, profile: VideoProfile, level: i32) {
        self.encoder.apply_settings(|s| {
            s.profile = profile;
            s.level = level;
        });
    }

    pub fn set_target_bit_rate(&mut self, bit_rate: u32) {
        self.encoder.apply_settings(|s| s.target_bit_rate = bit_rate);
    }

    pub fn set_max_packet_size(&mut self, max_packet_size: u32) {
        self.encoder.apply_settings(|s| s.max_packet_size = max_packet_size);
    }

    pub fn set_intra_frame_interval(&mut self, interval: u32) {
        self.encoder.apply_settings(|s| s.intra_frame_interval = interval);
    }

    pub fn request_keyframe(&self) {
        self.encoder.request_keyframe();
    }

    /// Install the sink receiving encoded frames; `None` disables encoding
    pub fn set_frame_sink(&self, sink: Option<EncoderSink>) {
        self.encoder.set_sink(sink);
    }

    /// Pin the negotiable codec set to a single codec, or clear the pin
    pub fn set_forced_codec(&mut self, codec: Option<VideoCodec>) {
        self.forced_codec = codec;
    }

    /// Codecs offered to the remote party
    pub fn available_codecs(&self) -> Vec<VideoCodec> {
        if let Some(forced) = self.forced_codec {
            return vec![forced];
        }
        self.encoder
            .supported_codecs()
            .into_iter()
            .filter(|c| *c != VideoCodec::Hevc || self.config.enable_hevc)
            .collect()
    }

    /// Frame rate measured over the recent delivery window, in fps
    pub fn measured_frame_rate(&self) -> Option<f64> {
        self.encoder.measured_frame_rate()
    }

    // Band selection

    /// Pick the capture size and frame duration for the given budget
    ///
    /// With no device open, or a legacy codec, capture stays at CIF. The
    /// widescreen preference only applies while local capture orientation
    /// agrees with the remote party's declared preference (unless the host
    /// pinned it), and the result is swapped to portrait when both sides
    /// capture and prefer portrait.
    pub fn calculate_capture_size(
        &self,
        codec: VideoCodec,
        budget: &CaptureBudget,
        preferred_size: Dimensions,
    ) -> (Dimensions, FrameDuration) {
        if self.current_device.is_none() || codec == VideoCodec::H263 {
            return (DEFAULT_TARGET_DIMENSIONS, DEFAULT_TARGET_FRAME_DURATION);
        }

        let captures_portrait = self.orientation.is_portrait();
        let remote_prefers_portrait = preferred_size.is_portrait();
        let widescreen = self.config.prefer_widescreen
            && (!self.config.auto_adjust_widescreen
                || captures_portrait == remote_prefers_portrait);

        let table = band_table(codec, widescreen, captures_portrait, remote_prefers_portrait);
        let band = choose_capture_band(table, budget, self.capture_format);

        let mut dimensions = band.dimensions();
        if captures_portrait && remote_prefers_portrait {
            dimensions = dimensions.swapped();
        }
        (dimensions, band.frame_duration)
    }

    /// Block until all queued capture work has run
    pub fn flush(&self) {
        self.queue.flush();
    }

    // Internals

    fn check_enabled(&self) -> bool {
        (self.surfaces.any_active() || self.recording) && !self.privacy
    }

    fn update_enabled(&mut self) {
        let new = self.check_enabled();
        let old = self.shared.enabled.swap(new, Ordering::SeqCst);
        self.did_set_enabled(old, new);
    }

    fn did_set_enabled(&mut self, old: bool, new: bool) {
        // An unchanged intent with the session already matching is a no-op;
        // a mismatch means the session needs reconciling either way
        if old == new && self.shared.running.load(Ordering::SeqCst) == new {
            return;
        }

        if new {
            debug!("Capture enabled");
            self.shared.receiving_video.store(false, Ordering::SeqCst);
            self.surfaces.mark_camera_starting();
            if self.current_device.is_none() {
                match self.next_capture_device(None) {
                    Some(device) => {
                        if let Err(e) = self.set_device(Some(device)) {
                            warn!(error = %e, "Failed to open initial capture device");
                        }
                    }
                    None => self.surfaces.set_error_all("no capture device"),
                }
            }
            self.encoder.request_keyframe();
            self.try_start();
            let _ = self.events.send(CaptureEvent::CaptureBegan);
        } else {
            debug!("Capture disabled");
            self.shared.receiving_video.store(false, Ordering::SeqCst);
            // A stopped session never observes the end of an interruption,
            // so a pending one must not shadow the next call
            self.set_interrupted(false);
            self.try_stop();
            let _ = self.events.send(CaptureEvent::CaptureStopped);
        }
    }

    fn set_interrupted(&mut self, interrupted: bool) {
        if self.interrupted == interrupted {
            return;
        }
        self.interrupted = interrupted;
        self.shared.interrupted.store(interrupted, Ordering::SeqCst);

        // The session keeps running; only the published state changes
        let effective = self.privacy || interrupted;
        let _ = self.events.send(CaptureEvent::PrivacyChanged { privacy: effective });
        if effective {
            self.shared.receiving_video.store(false, Ordering::SeqCst);
            self.surfaces.set_all(SurfaceState::Privacy);
        } else if self.shared.enabled.load(Ordering::SeqCst) {
            self.surfaces.set_all(SurfaceState::CameraStarting);
            self.encoder.request_keyframe();
        } else {
            self.surfaces.set_all(SurfaceState::Inactive);
        }
    }

    /// Start the session on the capture queue, unless intent changed again
    fn try_start(&self) {
        let provider = Arc::clone(&self.provider);
        let shared = Arc::clone(&self.shared);
        let surfaces = self.surfaces.clone();
        self.queue.dispatch(move || {
            if !shared.enabled.load(Ordering::SeqCst) {
                return;
            }
            let mut provider = provider.lock().unwrap();
            if provider.is_running() || !provider.is_open() {
                return;
            }
            match provider.start_running() {
                Ok(()) => shared.running.store(true, Ordering::SeqCst),
                Err(e) => {
                    warn!(error = %e, "Failed to start capture session");
                    shared.running.store(false, Ordering::SeqCst);
                    surfaces.set_error_all(&e.to_string());
                }
            }
        });
    }

    /// Stop the session on the capture queue, unless intent changed again
    fn try_stop(&self) {
        let provider = Arc::clone(&self.provider);
        let shared = Arc::clone(&self.shared);
        self.queue.dispatch(move || {
            if shared.enabled.load(Ordering::SeqCst) {
                return;
            }
            let mut provider = provider.lock().unwrap();
            if provider.is_running() {
                provider.stop_running();
            }
            shared.running.store(false, Ordering::SeqCst);
        });
    }

    /// The device to adopt next
    ///
    /// After a disconnect the device following the lost one (cyclically) is
    /// preferred; otherwise the persisted default, then a front camera,
    /// then whatever enumerates first.
    fn next_capture_device(&self, after: Option<&str>) -> Option<CaptureDevice> {
        let devices = self.devices();
        if devices.is_empty() {
            return None;
        }

        if let Some(id) = after {
            if let Some(pos) = devices.iter().position(|d| d.id == id) {
                return devices.get((pos + 1) % devices.len()).cloned();
            }
        }

        if let Some(default_id) = &self.config.default_device_id {
            if let Some(device) = devices.iter().find(|d| &d.id == default_id) {
                return Some(device.clone());
            }
        }

        devices
            .iter()
            .find(|d| d.position == DevicePosition::Front)
            .cloned()
            .or_else(|| devices.first().cloned())
    }

    fn dispatch_reconfigure(&self) {
        let provider = Arc::clone(&self.provider);
        let target = self.target_frame_duration;
        self.queue.dispatch(move || {
            let mut provider = provider.lock().unwrap();
            if let Err(e) = reconfigure_locked(provider.as_mut(), target) {
                warn!(error = %e, "Failed to reconfigure capture format");
            }
        });
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let provider = Arc::clone(&self.provider);
        self.queue.dispatch(move || {
            let mut provider = provider.lock().unwrap();
            if provider.is_running() {
                provider.stop_running();
            }
            provider.close_input();
        });
        // The queue joins its thread on drop, after the stop above ran
    }
}

/// Lock the best capture format on the open device
///
/// Capture always locks the biggest usable format and crops in software;
/// the frame duration is the target when supported, else the fastest the
/// format offers. Returns the locked dimensions, or `None` when no device
/// is open or it advertises no formats.
fn reconfigure_locked(
    provider: &mut dyn CaptureProvider,
    target: FrameDuration,
) -> CaptureResult<Option<Dimensions>> {
    if !provider.is_open() {
        return Ok(None);
    }

    let formats = provider.formats();
    let Some(best) = biggest_format(&formats) else {
        return Ok(None);
    };

    let duration = clamp_frame_duration(best, target).unwrap_or(target);
    let dimensions = best.dimensions();
    debug!(format = %best, duration = %duration, "Locking capture format");
    provider.apply_format(best, duration, duration)?;
    Ok(Some(dimensions))
}
