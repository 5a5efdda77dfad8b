// SPDX-License-Identifier: GPL-3.0-only

//! Encoder lifecycle management
//!
//! The manager separates structural changes (codec, target dimensions),
//! which destroy the live instance so the next frame lazily recreates it,
//! from non-structural settings, which are batched behind an invalidation
//! flag and applied to the live instance before the next encode. Keyframe
//! requests are sticky until consumed by an encode.

use super::{EncoderBackend, EncoderSettings, EncoderSink, VideoEncoder};
use crate::capture::types::{CapturedFrame, Dimensions, VideoCodec};
use crate::constants::{DEFAULT_TARGET_DIMENSIONS, FRAME_RATE_WINDOW};
use crate::errors::EncoderError;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

struct EncoderState {
    encoder: Option<Box<dyn VideoEncoder>>,
    codec: Option<VideoCodec>,
    target_dimensions: Dimensions,
    settings: EncoderSettings,
    settings_invalidated: bool,
    last_frame_time: Option<Duration>,
    frame_deltas: VecDeque<f64>,
}

/// Owns the live encoder instance and its pending settings
///
/// Mutators are cheap and callable from any thread; the heavy work
/// (creation, reconfiguration, encoding) happens inside [`encode_frame`]
/// on the frame delivery thread.
///
/// [`encode_frame`]: EncoderManager::encode_frame
pub struct EncoderManager {
    backends: Vec<Box<dyn EncoderBackend>>,
    state: Mutex<EncoderState>,
    keyframe_requested: Mutex<bool>,
    supported: Mutex<Option<Vec<VideoCodec>>>,
    sink: Mutex<Option<EncoderSink>>,
}

impl EncoderManager {
    pub fn new(backends: Vec<Box<dyn EncoderBackend>>) -> Self {
        Self {
            backends,
            state: Mutex::new(EncoderState {
                encoder: None,
                codec: None,
                target_dimensions: DEFAULT_TARGET_DIMENSIONS,
                settings: EncoderSettings::default(),
                settings_invalidated: false,
                last_frame_time: None,
                frame_deltas: VecDeque::with_capacity(FRAME_RATE_WINDOW),
            }),
            keyframe_requested: Mutex::new(false),
            supported: Mutex::new(None),
            sink: Mutex::new(None),
        }
    }

    /// Install the sink receiving encode results; `None` disables encoding
    pub fn set_sink(&self, sink: Option<EncoderSink>) {
        *self.sink.lock().unwrap() = sink;
    }

    /// Switch codecs; a change destroys the live instance
    pub fn set_codec(&self, codec: Option<VideoCodec>) {
        let mut state = self.state.lock().unwrap();
        if state.codec == codec {
            return;
        }
        info!(codec = ?codec, "Encoder codec changed");
        state.codec = codec;
        state.encoder = None;
    }

    pub fn codec(&self) -> Option<VideoCodec> {
        self.state.lock().unwrap().codec
    }

    /// Change the encode target; a change destroys the live instance
    pub fn set_target_dimensions(&self, dimensions: Dimensions) {
        let mut state = self.state.lock().unwrap();
        if state.target_dimensions == dimensions {
            return;
        }
        info!(dimensions = %dimensions, "Encoder target dimensions changed");
        state.target_dimensions = dimensions;
        state.encoder = None;
    }

    pub fn target_dimensions(&self) -> Dimensions {
        self.state.lock().unwrap().target_dimensions
    }

    /// Stage new non-structural settings for the next encode
    pub fn apply_settings<F>(&self, update: F)
    where
        F: FnOnce(&mut EncoderSettings),
    {
        let mut state = self.state.lock().unwrap();
        let before = state.settings;
        update(&mut state.settings);
        if state.settings != before {
            state.settings_invalidated = true;
        }
    }

    pub fn settings(&self) -> EncoderSettings {
        self.state.lock().unwrap().settings
    }

    /// Ask for a keyframe; sticky until the next encode consumes it
    pub fn request_keyframe(&self) {
        *self.keyframe_requested.lock().unwrap() = true;
    }

    /// Destroy the live instance so the next frame recreates it
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap();
        if state.encoder.is_some() {
            debug!("Dropping live encoder instance");
        }
        state.encoder = None;
        state.last_frame_time = None;
        state.frame_deltas.clear();
    }

    /// Codecs at least one backend supports, probed once and cached
    pub fn supported_codecs(&self) -> Vec<VideoCodec> {
        let mut cached = self.supported.lock().unwrap();
        if let Some(codecs) = cached.as_ref() {
            return codecs.clone();
        }

        let mut codecs = Vec::new();
        for backend in &self.backends {
            for codec in backend.supported_codecs() {
                if !codecs.contains(&codec) {
                    codecs.push(codec);
                }
            }
        }
        info!(codecs = ?codecs, "Probed encoder backends");
        *cached = Some(codecs.clone());
        codecs
    }

    /// Drop the cached probe so the next query re-asks the backends
    pub fn recompute_supported(&self) {
        *self.supported.lock().unwrap() = None;
    }

    /// Frame rate measured over the recent delivery window, in fps
    pub fn measured_frame_rate(&self) -> Option<f64> {
        let state = self.state.lock().unwrap();
        if state.frame_deltas.is_empty() {
            return None;
        }
        let sum: f64 = state.frame_deltas.iter().sum();
        let mean = sum / state.frame_deltas.len() as f64;
        if mean > 0.0 { Some(1.0 / mean) } else { None }
    }

    /// Encode one captured frame and forward the result to the sink
    ///
    /// Returns without touching the encoder when no sink is installed.
    /// Creates the instance lazily from the first capable backend, applies
    /// any invalidated settings first, and destroys the instance when a
    /// frame fails to encode so the next frame starts clean.
    pub fn encode_frame(&self, frame: &CapturedFrame) {
        let Some(sink) = self.sink.lock().unwrap().clone() else {
            return;
        };

        let mut state = self.state.lock().unwrap();
        self.record_frame_time(&mut state, frame.timestamp);

        let Some(codec) = state.codec else {
            return;
        };

        if state.encoder.is_none() {
            let dimensions = state.target_dimensions;
            let settings = state.settings;
            match self.create_encoder(codec, dimensions, &settings) {
                Ok(encoder) => {
                    state.encoder = Some(encoder);
                    state.settings_invalidated = false;
                }
                Err(e) => {
                    drop(state);
                    sink(Err(e));
                    return;
                }
            }
        }

        if state.settings_invalidated {
            let settings = state.settings;
            if let Some(encoder) = state.encoder.as_mut() {
                if let Err(e) = encoder.update_settings(&settings) {
                    warn!(error = %e, "Encoder settings update failed, recreating");
                    state.encoder = None;
                    drop(state);
                    sink(Err(e));
                    return;
                }
            }
            state.settings_invalidated = false;
        }

        let force_keyframe = {
            let mut requested = self.keyframe_requested.lock().unwrap();
            std::mem::take(&mut *requested)
        };

        let result = state
            .encoder
            .as_mut()
            .map(|encoder| encoder.encode(frame, force_keyframe));

        if let Some(result) = result {
            if result.is_err() {
                // A failed frame leaves the instance in an unknown state
                warn!("Frame encode failed, dropping encoder instance");
                state.encoder = None;
            }
            drop(state);
            sink(result);
        }
    }

    fn record_frame_time(&self, state: &mut EncoderState, timestamp: Duration) {
        if let Some(last) = state.last_frame_time {
            if let Some(delta) = timestamp.checked_sub(last) {
                if state.frame_deltas.len() == FRAME_RATE_WINDOW {
                    state.frame_deltas.pop_front();
                }
                state.frame_deltas.push_back(delta.as_secs_f64());
            }
        }
        state.last_frame_time = Some(timestamp);
    }

    fn create_encoder(
        &self,
        codec: VideoCodec,
        dimensions: Dimensions,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, EncoderError> {
        for backend in &self.backends {
            if backend.supported_codecs().contains(&codec) {
                debug!(backend = backend.name(), codec = %codec, dimensions = %dimensions, "Creating encoder");
                return backend.create(codec, dimensions, settings);
            }
        }
        Err(EncoderError::CodecNotSupported(codec))
    }
}
