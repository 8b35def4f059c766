// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Events reported by a VDA.

use std::fmt::{self, Display};

/// Represents a response from the VDA.
///
/// Each value corresponds to a value of [`VideoDecodeAccelerator::Result`](https://cs.chromium.org/chromium/src/components/arc/common/video_decode_accelerator.mojom?rcl=128dc1f18791dc4593b9fd671aab84cb72bf6830&l=84).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Response {
    Success = 0,
    IllegalState = 1,
    InvalidArgument = 2,
    UnreadableInput = 3,
    PlatformFailure = 4,
    InsufficientResources = 5,
    Cancelled = 6,
}

impl Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::Response::*;
        match self {
            Success => write!(f, "success"),
            IllegalState => write!(f, "illegal state"),
            InvalidArgument => write!(f, "invalid argument"),
            UnreadableInput => write!(f, "unreadable input"),
            PlatformFailure => write!(f, "platform failure"),
            InsufficientResources => write!(f, "insufficient resources"),
            Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Represents a notified event from the VDA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Requests the users to provide output buffers.
    ///
    /// Every picture buffer previously given to the VDA is implicitly dismissed.
    ProvidePictureBuffers {
        min_num_buffers: u32,
        width: i32,
        height: i32,
        visible_rect_left: i32,
        visible_rect_top: i32,
        visible_rect_right: i32,
        visible_rect_bottom: i32,
    },
    /// The VDA will not use the picture buffer `buffer_id` anymore.
    DismissPictureBuffer { buffer_id: i32 },
    /// Notifies the user of a decoded frame ready for display.
    /// These events will arrive in display order.
    PictureReady {
        buffer_id: i32,
        bitstream_id: i32,
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
    /// Notifies the end of bitstream buffer.
    NotifyEndOfBitstreamBuffer { bitstream_id: i32 },
    NotifyError(Response),
    /// Notifies the result of operation issued by `DecodeAccelerator::reset`.
    ResetResponse(Response),
    /// Notifies the result of operation issued by `DecodeAccelerator::flush`.
    FlushResponse(Response),
}

/// Receives the events of a VDA.
///
/// The VDA may call `post` from any thread, including from within one of its own methods. The
/// implementation is expected to hand the event over to whoever drives the VDA rather than acting
/// on it in place.
pub trait EventSink: Send + Sync {
    fn post(&self, event: Event);
}
