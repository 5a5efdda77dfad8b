// SPDX-License-Identifier: GPL-3.0-only

//! Capture band tables and band selection
//!
//! A band is a (resolution, bitrate, frame-duration) tier used to adapt
//! capture to the call's bitrate/macroblock budget. Tables are ordered
//! smallest to largest, per codec family and aspect family; selection walks
//! the table and keeps the largest band that fits every budget.

use super::types::{Dimensions, FrameDuration, VideoCodec};
use crate::constants::MACROBLOCK_SIZE;
use tracing::warn;

/// One capture tier: resolution, minimum bitrate to be worthwhile, and the
/// frame duration the tier is costed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureBand {
    pub width: u32,
    pub height: u32,
    /// Bitrate floor in bits/s; 0 means the tier has no floor and is always
    /// admissible by budget
    pub bit_rate: u32,
    pub frame_duration: FrameDuration,
}

impl CaptureBand {
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bit_rate: 0,
            frame_duration: FrameDuration::new(1, 30),
        }
    }

    pub const fn with_bit_rate(width: u32, height: u32, bit_rate: u32) -> Self {
        Self {
            width,
            height,
            bit_rate,
            frame_duration: FrameDuration::new(1, 30),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Budgets supplied by the call-quality layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureBudget {
    /// Negotiated bitrate in bits/s
    pub bit_rate: u32,
    pub max_macroblocks_per_frame: u64,
    pub max_macroblocks_per_second: u64,
}

/// Legacy codecs always capture CIF
pub const BANDS_LEGACY: [CaptureBand; 1] = [CaptureBand::new(352, 288)];

pub const BANDS_H264_16X9: [CaptureBand; 6] = [
    CaptureBand::new(432, 240),
    CaptureBand::new(640, 360),
    CaptureBand::new(864, 480),
    CaptureBand::new(1280, 720),
    CaptureBand::with_bit_rate(1680, 896, 2_048_000),
    CaptureBand::with_bit_rate(1920, 1080, 3_072_000),
];

pub const BANDS_H264_4X3: [CaptureBand; 4] = [
    CaptureBand::new(320, 240),
    CaptureBand::new(480, 360),
    CaptureBand::new(640, 480),
    CaptureBand::new(960, 720),
];

pub const BANDS_H264_1X1: [CaptureBand; 4] = [
    CaptureBand::new(240, 240),
    CaptureBand::new(360, 360),
    CaptureBand::new(480, 480),
    CaptureBand::new(720, 720),
];

pub const BANDS_H265_16X9: [CaptureBand; 6] = [
    CaptureBand::with_bit_rate(432, 240, 64_000),
    CaptureBand::with_bit_rate(640, 360, 128_000),
    CaptureBand::with_bit_rate(864, 480, 192_000),
    CaptureBand::with_bit_rate(1280, 720, 640_000),
    CaptureBand::with_bit_rate(1680, 896, 1_768_000),
    CaptureBand::with_bit_rate(1920, 1080, 2_048_000),
];

pub const BANDS_H265_4X3: [CaptureBand; 4] = [
    CaptureBand::with_bit_rate(320, 240, 64_000),
    CaptureBand::with_bit_rate(480, 360, 128_000),
    CaptureBand::with_bit_rate(640, 480, 192_000),
    CaptureBand::with_bit_rate(960, 720, 640_000),
];

pub const BANDS_H265_1X1: [CaptureBand; 4] = BANDS_H264_1X1;

/// Macroblocks per frame at the given dimensions
pub fn macroblocks_per_frame(dimensions: Dimensions) -> u64 {
    let across = dimensions.width.div_ceil(MACROBLOCK_SIZE) as u64;
    let down = dimensions.height.div_ceil(MACROBLOCK_SIZE) as u64;
    across * down
}

/// Pick the band table for a codec and aspect situation
///
/// Widescreen preference selects the 16:9 family. Otherwise, when local
/// capture orientation agrees with the remote party's declared preference
/// the 4:3 family applies; a disagreement (or an unknown remote preference
/// treated as disagreement by the caller) falls back to square bands so the
/// picture survives either rotation.
pub fn band_table(
    codec: VideoCodec,
    widescreen: bool,
    captures_portrait: bool,
    remote_prefers_portrait: bool,
) -> &'static [CaptureBand] {
    match codec {
        VideoCodec::H263 => &BANDS_LEGACY,
        VideoCodec::H264 => {
            if widescreen {
                &BANDS_H264_16X9
            } else if captures_portrait == remote_prefers_portrait {
                &BANDS_H264_4X3
            } else {
                &BANDS_H264_1X1
            }
        }
        VideoCodec::Hevc => {
            if widescreen {
                &BANDS_H265_16X9
            } else if captures_portrait == remote_prefers_portrait {
                &BANDS_H265_4X3
            } else {
                &BANDS_H265_1X1
            }
        }
    }
}

/// Pick the largest band that fits every budget
///
/// A band fits when its macroblock cost per frame and per second (at the
/// band's own frame duration) stay within the budgets, its bitrate floor is
/// within the bitrate budget, and it does not out-resolve the opened device
/// format (`opened_format` of zero size means no device cap applies).
///
/// Never fails: when nothing fits, the smallest tier is returned so capture
/// can always proceed.
pub fn choose_capture_band(
    table: &[CaptureBand],
    budget: &CaptureBudget,
    opened_format: Dimensions,
) -> CaptureBand {
    let fits = |band: &CaptureBand| -> bool {
        let per_frame = macroblocks_per_frame(band.dimensions());
        let per_second = if band.frame_duration.num == 0 {
            0
        } else {
            per_frame.saturating_mul(band.frame_duration.denom as u64)
                / band.frame_duration.num as u64
        };

        per_frame <= budget.max_macroblocks_per_frame
            && per_second <= budget.max_macroblocks_per_second
            && band.bit_rate <= budget.bit_rate
            && (opened_format.is_empty() || band.dimensions().pixels() <= opened_format.pixels())
    };

    let mut chosen = None;
    for band in table {
        if fits(band) {
            chosen = Some(*band);
        }
    }

    chosen.unwrap_or_else(|| {
        let smallest = table.first().copied().unwrap_or(BANDS_LEGACY[0]);
        warn!(
            band = %smallest.dimensions(),
            bit_rate = budget.bit_rate,
            "No capture band fits the budget, falling back to smallest tier"
        );
        smallest
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(bit_rate: u32, per_frame: u64, per_second: u64) -> CaptureBudget {
        CaptureBudget {
            bit_rate,
            max_macroblocks_per_frame: per_frame,
            max_macroblocks_per_second: per_second,
        }
    }

    const NO_CAP: Dimensions = Dimensions::new(0, 0);

    #[test]
    fn macroblock_counts_round_up() {
        assert_eq!(macroblocks_per_frame(Dimensions::new(352, 288)), 22 * 18);
        assert_eq!(macroblocks_per_frame(Dimensions::new(1920, 1080)), 120 * 68);
    }

    #[test]
    fn generous_budget_selects_largest_band() {
        let band = choose_capture_band(
            &BANDS_H264_16X9,
            &budget(4_000_000, u64::MAX, u64::MAX),
            NO_CAP,
        );
        assert_eq!(band.dimensions(), Dimensions::new(1920, 1080));
    }

    #[test]
    fn macroblock_budget_limits_band() {
        // 1280x720 is 80x45 = 3600 macroblocks per frame
        let band = choose_capture_band(
            &BANDS_H264_16X9,
            &budget(4_000_000, 3_600, u64::MAX),
            NO_CAP,
        );
        assert_eq!(band.dimensions(), Dimensions::new(1280, 720));
    }

    #[test]
    fn per_second_budget_limits_band() {
        // 864x480 at 30fps costs 54*30*30 = 48600 mb/s
        let band = choose_capture_band(
            &BANDS_H264_16X9,
            &budget(4_000_000, u64::MAX, 50_000),
            NO_CAP,
        );
        assert_eq!(band.dimensions(), Dimensions::new(864, 480));
    }

    #[test]
    fn bitrate_floor_limits_band() {
        // 1680x896 needs 2.048 Mbps, 1280x720 has no floor
        let band = choose_capture_band(
            &BANDS_H264_16X9,
            &budget(1_000_000, u64::MAX, u64::MAX),
            NO_CAP,
        );
        assert_eq!(band.dimensions(), Dimensions::new(1280, 720));
    }

    #[test]
    fn opened_format_caps_band() {
        let band = choose_capture_band(
            &BANDS_H264_16X9,
            &budget(4_000_000, u64::MAX, u64::MAX),
            Dimensions::new(1280, 720),
        );
        assert_eq!(band.dimensions(), Dimensions::new(1280, 720));
    }

    #[test]
    fn infeasible_budget_falls_back_to_smallest() {
        let band = choose_capture_band(&BANDS_H264_16X9, &budget(0, 1, 1), NO_CAP);
        assert_eq!(band.dimensions(), Dimensions::new(432, 240));
    }

    #[test]
    fn selection_is_monotonic_in_budget() {
        let opened = Dimensions::new(1920, 1080);
        let mut last_pixels = 0;
        for bit_rate in [0, 64_000, 500_000, 1_000_000, 2_048_000, 4_000_000] {
            let band = choose_capture_band(
                &BANDS_H265_16X9,
                &budget(bit_rate, u64::MAX, u64::MAX),
                opened,
            );
            assert!(
                band.dimensions().pixels() >= last_pixels,
                "band shrank when budget grew"
            );
            last_pixels = band.dimensions().pixels();
        }
    }

    #[test]
    fn hevc_table_selected_for_widescreen() {
        let table = band_table(VideoCodec::Hevc, true, false, false);
        assert_eq!(table, &BANDS_H265_16X9[..]);
    }

    #[test]
    fn orientation_mismatch_selects_square_bands() {
        let table = band_table(VideoCodec::H264, false, true, false);
        assert_eq!(table, &BANDS_H264_1X1[..]);
        let matching = band_table(VideoCodec::H264, false, true, true);
        assert_eq!(matching, &BANDS_H264_4X3[..]);
    }

    #[test]
    fn legacy_codec_is_fixed_cif() {
        let table = band_table(VideoCodec::H263, true, false, false);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].dimensions(), Dimensions::new(352, 288));
    }
}
