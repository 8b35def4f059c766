// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Integration tests using the fake decode implementation.

use std::sync::mpsc;

use vda::decode::*;
use vda::*;

struct ChannelSink(mpsc::Sender<Event>);

impl EventSink for ChannelSink {
    fn post(&self, event: Event) {
        let _ = self.0.send(event);
    }
}

fn create_session(profile: Profile) -> (FakeDecodeAccelerator, mpsc::Receiver<Event>) {
    let mut vda = FakeDecodeAccelerator::default();
    let (tx, rx) = mpsc::channel();
    assert_eq!(
        vda.initialize(profile, Box::new(ChannelSink(tx))),
        Response::Success
    );
    (vda, rx)
}

fn picture_buffer(id: i32) -> PictureBuffer {
    PictureBuffer {
        id,
        format: PixelFormat::NV12,
        handle: BufferHandle(id as u64),
        planes: PixelFormat::NV12.plane_layout(320, 240),
    }
}

fn bitstream() -> BitstreamBuffer {
    BitstreamBuffer {
        data: vec![0u8; 16],
        offset: 0,
        bytes_used: 16,
    }
}

#[test]
fn test_capabilities() {
    let vda = FakeDecodeAccelerator::default();
    let caps = vda.capabilities();

    assert_ne!(caps.input_formats.len(), 0);
    assert!(caps.supports_profile(Profile::VP8));
    assert!(caps.supports_output(PixelFormat::NV12));
}

#[test]
fn test_initialize_twice_is_illegal() {
    let (mut vda, _rx) = create_session(Profile::VP8);
    let (tx, _rx2) = mpsc::channel();
    assert_eq!(
        vda.initialize(Profile::VP8, Box::new(ChannelSink(tx))),
        Response::IllegalState
    );
}

#[test]
fn test_unsupported_profile() {
    let mut vda = FakeDecodeAccelerator::default();
    let (tx, _rx) = mpsc::channel();
    assert_eq!(
        vda.initialize(Profile::HevcProfileMain, Box::new(ChannelSink(tx))),
        Response::InvalidArgument
    );
}

#[test]
fn test_decode_and_get_picture_ready_fake() {
    let (mut vda, rx) = create_session(Profile::H264ProfileMain);

    vda.decode(12345, bitstream());

    match rx.try_recv() {
        Ok(Event::ProvidePictureBuffers {
            min_num_buffers,
            width,
            height,
            ..
        }) => {
            assert_eq!(min_num_buffers, 4);
            assert_eq!((width, height), (320, 240));
        }
        e => panic!("expected ProvidePictureBuffers, got {:?}", e),
    }
    assert_eq!(
        rx.try_recv().unwrap(),
        Event::NotifyEndOfBitstreamBuffer {
            bitstream_id: 12345
        }
    );
    // No picture buffer yet, so no picture either.
    assert!(rx.try_recv().is_err());

    vda.assign_picture_buffers(1);
    vda.import_buffer_for_picture(picture_buffer(0));

    match rx.try_recv() {
        Ok(Event::PictureReady {
            buffer_id,
            bitstream_id,
            ..
        }) => {
            assert_eq!(buffer_id, 0);
            assert_eq!(bitstream_id, 12345);
        }
        e => panic!("expected PictureReady, got {:?}", e),
    }
}

#[test]
fn test_flush_waits_for_picture_buffers() {
    let (mut vda, rx) = create_session(Profile::VP8);

    vda.decode(1, bitstream());
    vda.decode(2, bitstream());
    vda.flush();
    let events: Vec<_> = rx.try_iter().collect();
    assert!(!events.contains(&Event::FlushResponse(Response::Success)));

    vda.assign_picture_buffers(1);
    vda.import_buffer_for_picture(picture_buffer(0));
    vda.reuse_picture_buffer(0);
    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        events.last(),
        Some(&Event::FlushResponse(Response::Success))
    );
    let pictures = events
        .iter()
        .filter(|e| matches!(e, Event::PictureReady { .. }))
        .count();
    assert_eq!(pictures, 2);
}

#[test]
fn test_reset_cancels_flush() {
    let (mut vda, rx) = create_session(Profile::VP8);

    vda.decode(1, bitstream());
    vda.flush();
    vda.reset();
    let events: Vec<_> = rx.try_iter().collect();
    let n = events.len();
    assert_eq!(events[n - 2], Event::FlushResponse(Response::Cancelled));
    assert_eq!(events[n - 1], Event::ResetResponse(Response::Success));
}
