// SPDX-License-Identifier: GPL-3.0-only

//! Preview surface state publishing
//!
//! Each attached preview surface runs a small state machine
//! (`inactive -> camera-starting -> {error | privacy | video}`) fed by
//! orchestrator events. Surfaces are registered explicitly and held by id
//! only, so the registry never extends a view's lifetime, and detached
//! entries are recycled by the next attach. Every transition is published
//! on a broadcast channel so any number of observers can follow along.

use super::types::Dimensions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Identity of an attached preview surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u32);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Display state of a preview surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    /// Not showing anything
    #[default]
    Inactive,
    /// Device is open, waiting for the first frame
    CameraStarting,
    /// Device open or session failure; the cause is kept for display
    Error,
    /// Privacy shield (user privacy or capture interruption)
    Privacy,
    /// Live video is flowing
    Video,
}

impl std::fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceState::Inactive => write!(f, "inactive"),
            SurfaceState::CameraStarting => write!(f, "camera-starting"),
            SurfaceState::Error => write!(f, "error"),
            SurfaceState::Privacy => write!(f, "privacy"),
            SurfaceState::Video => write!(f, "video"),
        }
    }
}

/// Events broadcast by the capture core
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// The hardware session is being started
    CaptureBegan,
    /// The hardware session is being stopped
    CaptureStopped,
    /// Effective privacy (user privacy or interruption) changed
    PrivacyChanged { privacy: bool },
    /// The encode target changed; surfaces re-layout to the new aspect
    TargetDimensionsChanged { dimensions: Dimensions },
    /// The locked device capture format changed; the call-quality layer
    /// recalculates the capture band off this
    CaptureFormatChanged { dimensions: Dimensions },
    SurfaceStateChanged { surface: SurfaceId, state: SurfaceState },
    SurfaceDimensionsChanged { surface: SurfaceId, dimensions: Dimensions },
}

#[derive(Debug, Default)]
struct SurfaceEntry {
    state: SurfaceState,
    active: bool,
    video_dimensions: Dimensions,
    last_error: Option<String>,
}

#[derive(Default)]
struct RegistryInner {
    surfaces: HashMap<SurfaceId, SurfaceEntry>,
    recycled: Vec<SurfaceId>,
    next_id: u32,
}

/// Registry of attached preview surfaces
///
/// Clones share the same underlying map; the orchestrator and the capture
/// thread both hold one.
#[derive(Clone)]
pub struct SurfaceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    events: broadcast::Sender<CaptureEvent>,
}

impl SurfaceRegistry {
    pub fn new(events: broadcast::Sender<CaptureEvent>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            events,
        }
    }

    /// Attach a surface, reusing a recycled entry when one exists
    pub fn attach(&self, video_dimensions: Dimensions) -> SurfaceId {
        let mut inner = self.inner.lock().unwrap();
        let id = if let Some(id) = inner.recycled.pop() {
            id
        } else {
            let id = SurfaceId(inner.next_id);
            inner.next_id += 1;
            inner.surfaces.insert(id, SurfaceEntry::default());
            id
        };

        let entry = inner.surfaces.get_mut(&id).unwrap();
        entry.active = true;
        entry.state = SurfaceState::Inactive;
        entry.last_error = None;
        entry.video_dimensions = video_dimensions;

        debug!(surface = %id, "Surface attached");
        id
    }

    /// Detach a surface and recycle its entry
    pub fn detach(&self, id: SurfaceId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.surfaces.get_mut(&id) {
            if !entry.active {
                return;
            }
            entry.active = false;
            if entry.state != SurfaceState::Inactive {
                entry.state = SurfaceState::Inactive;
                let _ = self.events.send(CaptureEvent::SurfaceStateChanged {
                    surface: id,
                    state: SurfaceState::Inactive,
                });
            }
            inner.recycled.push(id);
            debug!(surface = %id, "Surface detached");
        }
    }

    /// True when at least one surface is attached and active
    pub fn any_active(&self) -> bool {
        self.inner
            .lock()
            .unwrap()
            .surfaces
            .values()
            .any(|entry| entry.active)
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .surfaces
            .values()
            .filter(|entry| entry.active)
            .count()
    }

    /// Move one surface to a new state, publishing the transition
    ///
    /// `video` is only reachable from `camera-starting`; all other states
    /// are reachable from anywhere. No-op when the state is unchanged.
    pub fn set_state(&self, id: SurfaceId, state: SurfaceState) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.surfaces.get_mut(&id) {
            if entry.active {
                Self::transition(&self.events, id, entry, state);
            }
        }
    }

    /// Move every active surface to a new state
    pub fn set_all(&self, state: SurfaceState) {
        let mut inner = self.inner.lock().unwrap();
        for (id, entry) in inner.surfaces.iter_mut() {
            if entry.active {
                Self::transition(&self.events, *id, entry, state);
            }
        }
    }

    /// Mark every active surface camera-starting, except those showing privacy
    pub fn mark_camera_starting(&self) {
        let mut inner = self.inner.lock().unwrap();
        for (id, entry) in inner.surfaces.iter_mut() {
            if entry.active && entry.state != SurfaceState::Privacy {
                Self::transition(&self.events, *id, entry, SurfaceState::CameraStarting);
            }
        }
    }

    /// Mark every active surface errored, keeping the cause for display
    pub fn set_error_all(&self, cause: &str) {
        let mut inner = self.inner.lock().unwrap();
        for (id, entry) in inner.surfaces.iter_mut() {
            if entry.active {
                entry.last_error = Some(cause.to_string());
                Self::transition(&self.events, *id, entry, SurfaceState::Error);
            }
        }
    }

    /// Update the advertised video dimensions on every active surface
    pub fn set_video_dimensions_all(&self, dimensions: Dimensions) {
        let mut inner = self.inner.lock().unwrap();
        for (id, entry) in inner.surfaces.iter_mut() {
            if entry.active && entry.video_dimensions != dimensions {
                entry.video_dimensions = dimensions;
                let _ = self.events.send(CaptureEvent::SurfaceDimensionsChanged {
                    surface: *id,
                    dimensions,
                });
            }
        }
    }

    pub fn state_of(&self, id: SurfaceId) -> Option<SurfaceState> {
        self.inner
            .lock()
            .unwrap()
            .surfaces
            .get(&id)
            .map(|entry| entry.state)
    }

    pub fn error_of(&self, id: SurfaceId) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .surfaces
            .get(&id)
            .and_then(|entry| entry.last_error.clone())
    }

    pub fn video_dimensions_of(&self, id: SurfaceId) -> Option<Dimensions> {
        self.inner
            .lock()
            .unwrap()
            .surfaces
            .get(&id)
            .map(|entry| entry.video_dimensions)
    }

    fn transition(
        events: &broadcast::Sender<CaptureEvent>,
        id: SurfaceId,
        entry: &mut SurfaceEntry,
        state: SurfaceState,
    ) {
        if entry.state == state {
            return;
        }
        if state == SurfaceState::Video && entry.state != SurfaceState::CameraStarting {
            debug!(surface = %id, from = %entry.state, "Ignoring video transition before camera-starting");
            return;
        }

        entry.state = state;
        if state != SurfaceState::Error {
            entry.last_error = None;
        }
        let _ = events.send(CaptureEvent::SurfaceStateChanged { surface: id, state });
    }
}
