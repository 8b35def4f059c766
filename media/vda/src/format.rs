// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::convert::TryFrom;

use enumn::N;
use serde::Deserialize;
use serde::Serialize;

use crate::error::*;

/// Represents a video codec profile.
///
/// Each value corresponds to Chrome's
/// [`VideoCodecProfile`](https://cs.chromium.org/chromium/src/media/base/video_codecs.h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, N, Serialize, Deserialize)]
#[repr(i32)]
pub enum Profile {
    #[serde(rename = "h264-baseline")]
    H264ProfileBaseline = 0,
    #[serde(rename = "h264-main")]
    H264ProfileMain = 1,
    #[serde(rename = "h264-extended")]
    H264ProfileExtended = 2,
    #[serde(rename = "h264-high")]
    H264ProfileHigh = 3,
    #[serde(rename = "vp8")]
    VP8 = 11,
    #[serde(rename = "vp9-profile0")]
    VP9Profile0 = 12,
    #[serde(rename = "vp9-profile1")]
    VP9Profile1 = 13,
    #[serde(rename = "vp9-profile2")]
    VP9Profile2 = 14,
    #[serde(rename = "vp9-profile3")]
    VP9Profile3 = 15,
    #[serde(rename = "hevc-main")]
    HevcProfileMain = 16,
}

impl TryFrom<i32> for Profile {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        Profile::n(value).ok_or(Error::UnknownProfile(value))
    }
}

/// Represents a raw pixel format the accelerator can decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum PixelFormat {
    YV12 = 0,
    NV12 = 1,
}

impl TryFrom<u32> for PixelFormat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        PixelFormat::n(value).ok_or(Error::UnknownPixelFormat(value))
    }
}

impl PixelFormat {
    /// Number of memory planes a frame of this format is made of.
    pub fn num_planes(self) -> usize {
        match self {
            PixelFormat::NV12 => 2,
            PixelFormat::YV12 => 3,
        }
    }

    /// Returns a tightly packed plane layout for a `width`x`height` frame.
    pub fn plane_layout(self, width: u32, height: u32) -> Vec<FramePlane> {
        let (w, h) = (width as i32, height as i32);
        match self {
            PixelFormat::NV12 => vec![
                FramePlane {
                    offset: 0,
                    stride: w,
                },
                FramePlane {
                    offset: w * h,
                    stride: w,
                },
            ],
            PixelFormat::YV12 => vec![
                FramePlane {
                    offset: 0,
                    stride: w,
                },
                FramePlane {
                    offset: w * h,
                    stride: w / 2,
                },
                FramePlane {
                    offset: w * h + (w / 2) * (h / 2),
                    stride: w / 2,
                },
            ],
        }
    }
}

/// Layout of one plane of a picture buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramePlane {
    pub offset: i32,
    pub stride: i32,
}

/// Opaque handle to the memory backing a buffer.
///
/// Handles are duplicated rather than moved when a buffer is shared with the accelerator, so that
/// the owner of the buffer keeps being able to identify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(pub u64);

/// Represents an input video format for the accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    pub profile: Profile,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_from_raw_value() {
        assert_eq!(Profile::try_from(12).unwrap(), Profile::VP9Profile0);
        assert!(matches!(
            Profile::try_from(42),
            Err(Error::UnknownProfile(42))
        ));
    }

    #[test]
    fn nv12_layout() {
        let planes = PixelFormat::NV12.plane_layout(320, 240);
        assert_eq!(planes.len(), PixelFormat::NV12.num_planes());
        assert_eq!(planes[1].offset, 320 * 240);
        assert_eq!(planes[1].stride, 320);
    }

    #[test]
    fn yv12_layout() {
        let planes = PixelFormat::YV12.plane_layout(320, 240);
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[2].offset, 320 * 240 + 160 * 120);
        assert_eq!(planes[2].stride, 160);
    }
}
