// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A software VDA that does not decode anything.
//!
//! Every bitstream buffer is returned right away and produces exactly one picture, which is
//! written into the oldest free picture buffer as soon as one is available. This makes the event
//! flow deterministic, which is what tests of VDA clients need.

use std::collections::BTreeSet;
use std::collections::VecDeque;

use log::debug;
use log::warn;

use super::accelerator::*;
use super::event::*;
use crate::format::*;

const DEFAULT_WIDTH: i32 = 320;
const DEFAULT_HEIGHT: i32 = 240;
const DEFAULT_MIN_NUM_BUFFERS: u32 = 4;

pub struct FakeDecodeAccelerator {
    width: i32,
    height: i32,
    min_num_buffers: u32,
    events: Option<Box<dyn EventSink>>,
    // Whether `ProvidePictureBuffers` has been sent for the current session.
    requested_buffers: bool,
    known_buffers: BTreeSet<i32>,
    free_buffers: VecDeque<i32>,
    // Bitstream ids whose picture is waiting for a free picture buffer.
    pending_pictures: VecDeque<i32>,
    flushing: bool,
}

impl Default for FakeDecodeAccelerator {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_MIN_NUM_BUFFERS)
    }
}

impl FakeDecodeAccelerator {
    /// Creates a fake VDA that asks for `min_num_buffers` buffers of `width`x`height`.
    pub fn new(width: i32, height: i32, min_num_buffers: u32) -> Self {
        FakeDecodeAccelerator {
            width,
            height,
            min_num_buffers,
            events: None,
            requested_buffers: false,
            known_buffers: Default::default(),
            free_buffers: Default::default(),
            pending_pictures: Default::default(),
            flushing: false,
        }
    }

    fn post(&self, event: Event) {
        match &self.events {
            Some(events) => events.post(event),
            None => warn!("fake VDA has no session, dropping {:?}", event),
        }
    }

    fn output_pending_pictures(&mut self) {
        while !self.pending_pictures.is_empty() && !self.free_buffers.is_empty() {
            let (bitstream_id, buffer_id) = match (
                self.pending_pictures.pop_front(),
                self.free_buffers.pop_front(),
            ) {
                (Some(b), Some(p)) => (b, p),
                _ => break,
            };
            self.post(Event::PictureReady {
                buffer_id,
                bitstream_id,
                left: 0,
                top: 0,
                right: self.width,
                bottom: self.height,
            });
        }

        if self.flushing && self.pending_pictures.is_empty() {
            self.flushing = false;
            self.post(Event::FlushResponse(Response::Success));
        }
    }
}

impl DecodeAccelerator for FakeDecodeAccelerator {
    fn capabilities(&self) -> Capabilities {
        let input_formats = [
            Profile::H264ProfileBaseline,
            Profile::H264ProfileMain,
            Profile::H264ProfileHigh,
            Profile::VP8,
            Profile::VP9Profile0,
        ]
        .iter()
        .map(|&profile| InputFormat {
            profile,
            min_width: 16,
            min_height: 16,
            max_width: 4096,
            max_height: 4096,
        })
        .collect();

        Capabilities {
            input_formats,
            output_formats: vec![PixelFormat::NV12, PixelFormat::YV12],
        }
    }

    fn initialize(&mut self, profile: Profile, events: Box<dyn EventSink>) -> Response {
        if self.events.is_some() {
            return Response::IllegalState;
        }
        if !self.capabilities().supports_profile(profile) {
            return Response::InvalidArgument;
        }
        debug!("fake VDA initialized for {:?}", profile);
        self.events = Some(events);
        Response::Success
    }

    fn decode(&mut self, bitstream_id: i32, _buffer: BitstreamBuffer) {
        if self.events.is_none() {
            warn!("decode() called on an uninitialized fake VDA");
            return;
        }

        if !self.requested_buffers {
            self.requested_buffers = true;
            self.post(Event::ProvidePictureBuffers {
                min_num_buffers: self.min_num_buffers,
                width: self.width,
                height: self.height,
                visible_rect_left: 0,
                visible_rect_top: 0,
                visible_rect_right: self.width,
                visible_rect_bottom: self.height,
            });
        }

        self.post(Event::NotifyEndOfBitstreamBuffer { bitstream_id });
        self.pending_pictures.push_back(bitstream_id);
        self.output_pending_pictures();
    }

    fn assign_picture_buffers(&mut self, count: u32) {
        debug!("fake VDA is given {} picture buffers", count);
        self.known_buffers.clear();
        self.free_buffers.clear();
    }

    fn import_buffer_for_picture(&mut self, picture: PictureBuffer) {
        if self.known_buffers.insert(picture.id) {
            self.free_buffers.push_back(picture.id);
        }
        self.output_pending_pictures();
    }

    fn reuse_picture_buffer(&mut self, picture_buffer_id: i32) {
        if !self.known_buffers.contains(&picture_buffer_id) {
            warn!("fake VDA asked to reuse unknown buffer {}", picture_buffer_id);
            return;
        }
        if !self.free_buffers.contains(&picture_buffer_id) {
            self.free_buffers.push_back(picture_buffer_id);
        }
        self.output_pending_pictures();
    }

    fn flush(&mut self) {
        self.flushing = true;
        self.output_pending_pictures();
    }

    fn reset(&mut self) {
        self.pending_pictures.clear();
        if self.flushing {
            self.flushing = false;
            self.post(Event::FlushResponse(Response::Cancelled));
        }
        self.post(Event::ResetResponse(Response::Success));
    }

    fn destroy(&mut self) {
        self.events = None;
        self.requested_buffers = false;
        self.known_buffers.clear();
        self.free_buffers.clear();
        self.pending_pictures.clear();
        self.flushing = false;
    }
}
