// SPDX-License-Identifier: GPL-3.0-only

//! Capture-core constants

use crate::capture::types::{Dimensions, FrameDuration};

/// Default encode target before the call-quality layer supplies one (CIF)
pub const DEFAULT_TARGET_DIMENSIONS: Dimensions = Dimensions::new(352, 288);

/// Default target frame duration (30 fps)
pub const DEFAULT_TARGET_FRAME_DURATION: FrameDuration = FrameDuration::new(1, 30);

/// Number of inter-frame deltas kept for the measured frame rate
pub const FRAME_RATE_WINDOW: usize = 30;

/// Capacity of the broadcast event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Largest dimensions the biggest-format selector will lock on a device
pub const MAX_CAPTURE_DIMENSIONS: Dimensions = Dimensions::new(1920, 1080);

/// Macroblock edge in pixels, used for encoder budget accounting
pub const MACROBLOCK_SIZE: u32 = 16;
