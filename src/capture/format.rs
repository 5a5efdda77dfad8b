// SPDX-License-Identifier: GPL-3.0-only

//! Device format negotiation
//!
//! Pure functions over a capability snapshot (the formats of the currently
//! open device). Two selectors exist:
//!
//! - [`negotiate_format`] matches the encode target directly, for providers
//!   that cannot over-capture and crop.
//! - [`biggest_format`] maximizes capture fidelity before software cropping,
//!   independent of the encode target; this is what the orchestrator locks
//!   on the device.
//!
//! With no device open there is no snapshot and negotiation is a no-op;
//! callers tolerate `None`.

use super::types::{DeviceFormat, Dimensions, FrameDuration, Orientation, VideoFill};
use crate::constants::MAX_CAPTURE_DIMENSIONS;
use std::cmp::Ordering;

/// The target the negotiator matches formats against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatIntent {
    pub target_dimensions: Dimensions,
    pub target_frame_duration: FrameDuration,
    pub orientation: Orientation,
    pub fill: VideoFill,
}

/// Select the device format best matching the intent
///
/// Priority order: supports the target frame duration, fits at least one
/// target dimension, fits both target dimensions (preferred when cropping
/// to fill, avoided otherwise to minimize visible zoom), then smallest
/// total pixel count.
pub fn negotiate_format<'a>(
    formats: &'a [DeviceFormat],
    intent: &FormatIntent,
) -> Option<&'a DeviceFormat> {
    formats.iter().max_by(|a, b| compare_for_intent(a, b, intent))
}

fn compare_for_intent(a: &DeviceFormat, b: &DeviceFormat, intent: &FormatIntent) -> Ordering {
    // In portrait the capture hardware is sideways relative to the target
    let orient = |format: &DeviceFormat| -> Dimensions {
        if intent.orientation.is_portrait() {
            format.dimensions().swapped()
        } else {
            format.dimensions()
        }
    };
    let size_a = orient(a);
    let size_b = orient(b);
    let target = intent.target_dimensions;

    let supports_rate_a = a.supports_frame_duration(intent.target_frame_duration);
    let supports_rate_b = b.supports_frame_duration(intent.target_frame_duration);
    if supports_rate_a != supports_rate_b {
        return supports_rate_a.cmp(&supports_rate_b);
    }

    let fits_one = |size: Dimensions| size.width >= target.width || size.height >= target.height;
    if fits_one(size_a) != fits_one(size_b) {
        return fits_one(size_a).cmp(&fits_one(size_b));
    }

    let fits_both = |size: Dimensions| size.width >= target.width && size.height >= target.height;
    if fits_both(size_a) != fits_both(size_b) {
        // Cropping to fill wants the over-fitting format; otherwise the
        // under-fitting one shows less zoom after cropping.
        let prefer_fitting = intent.fill == VideoFill::Fill;
        return (fits_both(size_a) == prefer_fitting).cmp(&(fits_both(size_b) == prefer_fitting));
    }

    // Smallest pixel count wins to avoid wasting device/encoder throughput
    size_b.pixels().cmp(&size_a.pixels())
}

/// Select the largest usable format, capped at 1920x1080
///
/// Formats reserved for unrelated hardware effects are excluded. Formats
/// above the cap are only chosen when nothing at or below it exists.
pub fn biggest_format(formats: &[DeviceFormat]) -> Option<&DeviceFormat> {
    formats
        .iter()
        .filter(|f| !f.reserved_for_effects)
        .max_by(|a, b| {
            let over = |f: &DeviceFormat| {
                f.width > MAX_CAPTURE_DIMENSIONS.width || f.height > MAX_CAPTURE_DIMENSIONS.height
            };
            if over(b) {
                return Ordering::Greater;
            }
            if over(a) {
                return Ordering::Less;
            }
            a.pixels().cmp(&b.pixels())
        })
}

/// The frame duration to lock after selecting a format
///
/// Returns the target duration when any advertised range contains it;
/// otherwise the fastest supported duration (the smallest advertised
/// minimum). Returns `None` when the format advertises no ranges.
pub fn clamp_frame_duration(format: &DeviceFormat, target: FrameDuration) -> Option<FrameDuration> {
    let mut best: Option<FrameDuration> = None;
    for range in &format.frame_rate_ranges {
        if range.contains(target) {
            return Some(target);
        }
        match best {
            None => best = Some(range.min_frame_duration),
            Some(current) if current > range.min_frame_duration => {
                best = Some(range.min_frame_duration);
            }
            Some(_) => {}
        }
    }
    best
}
