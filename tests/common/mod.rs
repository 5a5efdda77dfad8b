// SPDX-License-Identifier: GPL-3.0-only

//! Shared test doubles for controller integration tests

use capture_core::capture::types::{
    CaptureDevice, CapturedFrame, DeviceFormat, DevicePosition, Dimensions, EncodedFrame,
    FrameDuration, FrameRateRange, ProviderError, ProviderResult, VideoCodec,
};
use capture_core::capture::{CaptureProvider, FrameCallback};
use capture_core::errors::EncoderError;
use capture_core::media::encoders::{EncoderBackend, EncoderSettings, VideoEncoder};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Hardware state and call counters shared with the test body
#[derive(Default)]
pub struct MockInner {
    pub devices: Vec<CaptureDevice>,
    pub formats: Vec<DeviceFormat>,
    pub open_device: Option<CaptureDevice>,
    pub running: bool,
    pub applied_format: Option<(DeviceFormat, FrameDuration)>,
    pub callback: Option<FrameCallback>,
    pub start_calls: u32,
    pub stop_calls: u32,
    pub open_calls: u32,
    pub apply_calls: u32,
    pub fail_open: bool,
    pub hold_start: Arc<AtomicBool>,
}

/// A scripted capture provider backed by shared state
#[derive(Clone)]
pub struct MockProvider {
    pub inner: Arc<Mutex<MockInner>>,
}

impl MockProvider {
    pub fn new(devices: Vec<CaptureDevice>, formats: Vec<DeviceFormat>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                devices,
                formats,
                ..MockInner::default()
            })),
        }
    }

    /// Deliver one frame through the installed callback
    ///
    /// The callback is taken out of the lock first so it may call back
    /// into anything holding provider state.
    pub fn emit_frame(&self, timestamp_ms: u64) {
        let callback = self.inner.lock().unwrap().callback.take();
        if let Some(mut callback) = callback {
            callback(CapturedFrame {
                data: Arc::from(&[0u8; 64][..]),
                width: 1280,
                height: 720,
                stride: 1280,
                timestamp: Duration::from_millis(timestamp_ms),
            });
            self.inner.lock().unwrap().callback = Some(callback);
        }
    }

    pub fn start_calls(&self) -> u32 {
        self.inner.lock().unwrap().start_calls
    }

    pub fn stop_calls(&self) -> u32 {
        self.inner.lock().unwrap().stop_calls
    }

    pub fn open_calls(&self) -> u32 {
        self.inner.lock().unwrap().open_calls
    }

    pub fn apply_calls(&self) -> u32 {
        self.inner.lock().unwrap().apply_calls
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn open_device_id(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .open_device
            .as_ref()
            .map(|d| d.id.clone())
    }

    pub fn applied_format(&self) -> Option<(DeviceFormat, FrameDuration)> {
        self.inner.lock().unwrap().applied_format.clone()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inner.lock().unwrap().fail_open = fail;
    }

    /// Park the next `start_running` until the returned gate is cleared
    pub fn hold_start(&self) -> Arc<AtomicBool> {
        let gate = Arc::clone(&self.inner.lock().unwrap().hold_start);
        gate.store(true, Ordering::SeqCst);
        gate
    }

    /// Simulate the session dying without a stop call
    pub fn kill_session(&self) {
        self.inner.lock().unwrap().running = false;
    }

    pub fn remove_device(&self, id: &str) {
        self.inner.lock().unwrap().devices.retain(|d| d.id != id);
    }

    pub fn add_device(&self, device: CaptureDevice) {
        self.inner.lock().unwrap().devices.push(device);
    }
}

impl CaptureProvider for MockProvider {
    fn enumerate_devices(&self) -> Vec<CaptureDevice> {
        self.inner.lock().unwrap().devices.clone()
    }

    fn open_input(&mut self, device: &CaptureDevice) -> ProviderResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.open_calls += 1;
        if inner.fail_open {
            return Err(ProviderError::OpenFailed("scripted failure".to_string()));
        }
        inner.open_device = Some(device.clone());
        Ok(())
    }

    fn close_input(&mut self) {
        self.inner.lock().unwrap().open_device = None;
    }

    fn is_open(&self) -> bool {
        self.inner.lock().unwrap().open_device.is_some()
    }

    fn formats(&self) -> Vec<DeviceFormat> {
        let inner = self.inner.lock().unwrap();
        if inner.open_device.is_some() {
            inner.formats.clone()
        } else {
            Vec::new()
        }
    }

    fn active_format(&self) -> Option<DeviceFormat> {
        self.inner
            .lock()
            .unwrap()
            .applied_format
            .as_ref()
            .map(|(f, _)| f.clone())
    }

    fn apply_format(
        &mut self,
        format: &DeviceFormat,
        min_frame_duration: FrameDuration,
        _max_frame_duration: FrameDuration,
    ) -> ProviderResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.apply_calls += 1;
        inner.applied_format = Some((format.clone(), min_frame_duration));
        Ok(())
    }

    fn set_frame_callback(&mut self, callback: FrameCallback) {
        self.inner.lock().unwrap().callback = Some(callback);
    }

    fn start_running(&mut self) -> ProviderResult<()> {
        let gate = Arc::clone(&self.inner.lock().unwrap().hold_start);
        while gate.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        let mut inner = self.inner.lock().unwrap();
        inner.start_calls += 1;
        inner.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stop_calls += 1;
        inner.running = false;
    }

    fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }
}

#[derive(Default)]
pub struct EncoderStats {
    pub created: AtomicU32,
    pub encoded: AtomicU32,
    pub forced_keyframes: AtomicU32,
    pub updates: AtomicU32,
    pub fail_next_encode: AtomicBool,
}

/// An encoder backend recording activity in shared counters
pub struct MockEncoderBackend {
    pub stats: Arc<EncoderStats>,
    pub codecs: Vec<VideoCodec>,
}

impl MockEncoderBackend {
    pub fn h264(stats: Arc<EncoderStats>) -> Self {
        Self {
            stats,
            codecs: vec![VideoCodec::H264],
        }
    }
}

struct MockEncoder {
    stats: Arc<EncoderStats>,
    codec: VideoCodec,
    dimensions: Dimensions,
}

impl VideoEncoder for MockEncoder {
    fn codec(&self) -> VideoCodec {
        self.codec
    }

    fn update_settings(&mut self, _settings: &EncoderSettings) -> Result<(), EncoderError> {
        self.stats.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn encode(
        &mut self,
        frame: &CapturedFrame,
        force_keyframe: bool,
    ) -> Result<EncodedFrame, EncoderError> {
        if self.stats.fail_next_encode.swap(false, Ordering::SeqCst) {
            return Err(EncoderError::EncodeFailed("scripted failure".to_string()));
        }
        self.stats.encoded.fetch_add(1, Ordering::SeqCst);
        if force_keyframe {
            self.stats.forced_keyframes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(EncodedFrame {
            data: Arc::from(&b"payload"[..]),
            codec: self.codec,
            keyframe: force_keyframe,
            dimensions: self.dimensions,
            timestamp: frame.timestamp,
        })
    }
}

impl EncoderBackend for MockEncoderBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn supported_codecs(&self) -> Vec<VideoCodec> {
        self.codecs.clone()
    }

    fn create(
        &self,
        codec: VideoCodec,
        dimensions: Dimensions,
        _settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, EncoderError> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockEncoder {
            stats: Arc::clone(&self.stats),
            codec,
            dimensions,
        }))
    }
}

pub fn device(id: &str, position: DevicePosition) -> CaptureDevice {
    CaptureDevice {
        id: id.to_string(),
        name: format!("Camera {id}"),
        position,
    }
}

pub fn format(width: u32, height: u32, max_fps: u32) -> DeviceFormat {
    DeviceFormat {
        width,
        height,
        frame_rate_ranges: vec![FrameRateRange::new(
            FrameDuration::from_fps(max_fps),
            FrameDuration::from_fps(1),
        )],
        reserved_for_effects: false,
    }
}
