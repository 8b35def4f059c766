// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::event::*;
use crate::format::*;

/// Represents decoding capabilities of a VDA.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub input_formats: Vec<InputFormat>,
    pub output_formats: Vec<PixelFormat>,
}

impl Capabilities {
    pub fn supports_profile(&self, profile: Profile) -> bool {
        self.input_formats.iter().any(|f| f.profile == profile)
    }

    pub fn supports_output(&self, format: PixelFormat) -> bool {
        self.output_formats.contains(&format)
    }
}

/// A chunk of compressed stream handed over to the VDA.
///
/// Only `data[offset..offset + bytes_used]` is to be decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitstreamBuffer {
    pub data: Vec<u8>,
    pub offset: u32,
    pub bytes_used: u32,
}

impl BitstreamBuffer {
    pub fn payload(&self) -> &[u8] {
        let start = (self.offset as usize).min(self.data.len());
        let end = start
            .saturating_add(self.bytes_used as usize)
            .min(self.data.len());
        &self.data[start..end]
    }
}

/// An output buffer imported into the VDA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureBuffer {
    pub id: i32,
    pub format: PixelFormat,
    pub handle: BufferHandle,
    pub planes: Vec<FramePlane>,
}

/// A video decode accelerator.
///
/// All methods return immediately. Their outcome is reported asynchronously through the
/// `EventSink` given to `initialize()`.
pub trait DecodeAccelerator: Send {
    /// Returns what the accelerator is able to decode.
    fn capabilities(&self) -> Capabilities;

    /// Prepares the accelerator for a stream of `profile`. Events of the session are posted to
    /// `events` until `destroy()` is called.
    fn initialize(&mut self, profile: Profile, events: Box<dyn EventSink>) -> Response;

    /// Queues `buffer` for decoding. A `NotifyEndOfBitstreamBuffer` event with `bitstream_id` is
    /// emitted once the buffer is not used anymore, and a `PictureReady` event carrying the same
    /// id for each picture decoded from it.
    fn decode(&mut self, bitstream_id: i32, buffer: BitstreamBuffer);

    /// Announces how many picture buffers will follow in reply to `ProvidePictureBuffers`.
    fn assign_picture_buffers(&mut self, count: u32);

    /// Gives the accelerator a picture buffer to decode into.
    fn import_buffer_for_picture(&mut self, picture: PictureBuffer);

    /// Gives back a picture buffer previously returned through `PictureReady`.
    fn reuse_picture_buffer(&mut self, picture_buffer_id: i32);

    /// Decodes everything queued so far, then emits `FlushResponse`.
    fn flush(&mut self);

    /// Drops everything queued so far, then emits `ResetResponse`.
    fn reset(&mut self);

    /// Ends the session. No event is emitted afterwards.
    fn destroy(&mut self);
}
