// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Data structures that describe the decoded pictures.

use std::fmt;
use std::fmt::Display;

use vda::PixelFormat;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Whether the rectangle is non-empty and lies within a picture of `size`.
    pub fn fits_in(&self, size: Size) -> bool {
        !self.is_empty()
            && self.left >= 0
            && self.top >= 0
            && self.right as i64 <= size.width as i64
            && self.bottom as i64 <= size.height as i64
    }
}

/// Format of the pictures produced by the accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub pixel_format: PixelFormat,
    pub min_num_buffers: u32,
    pub coded_size: Size,
    pub visible_rect: Rect,
}

impl Default for VideoFormat {
    fn default() -> Self {
        VideoFormat {
            pixel_format: PixelFormat::NV12,
            min_num_buffers: 0,
            coded_size: Default::default(),
            visible_rect: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_fits_in_coded_size() {
        let size = Size::new(320, 240);
        let rect = Rect {
            left: 0,
            top: 0,
            right: 320,
            bottom: 180,
        };
        assert!(rect.fits_in(size));
        assert!(!Rect { right: 321, ..rect }.fits_in(size));
        assert!(!Rect { left: 320, ..rect }.fits_in(size));
        assert!(!Rect::default().fits_in(size));
    }
}
