// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Units of work exchanged with the client of the component.

use std::sync::mpsc::Sender;

use vda::decode::BitstreamBuffer;

use crate::allocator::GraphicBlock;
use crate::component::driver::DriverMessage;
use crate::error::Error;
use crate::format::Rect;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkFlags {
    /// No input follows this work.
    pub end_of_stream: bool,
    /// The input only carries codec configuration and produces no picture.
    pub codec_config: bool,
}

/// A chunk of compressed stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    pub data: Vec<u8>,
}

impl InputBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        InputBuffer { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn into_bitstream_buffer(self) -> BitstreamBuffer {
        let bytes_used = self.data.len() as u32;
        BitstreamBuffer {
            data: self.data,
            offset: 0,
            bytes_used,
        }
    }
}

/// A decoded picture.
///
/// The client owns the underlying buffer as long as it holds this object. Dropping it gives the
/// buffer back to the component.
#[derive(Debug)]
pub struct OutputBuffer {
    block: Option<GraphicBlock>,
    slot_id: i32,
    generation: u32,
    crop: Rect,
    timestamp: u64,
    release: Sender<DriverMessage>,
}

impl OutputBuffer {
    pub(crate) fn new(
        block: GraphicBlock,
        slot_id: i32,
        generation: u32,
        crop: Rect,
        timestamp: u64,
        release: Sender<DriverMessage>,
    ) -> Self {
        OutputBuffer {
            block: Some(block),
            slot_id,
            generation,
            crop,
            timestamp,
            release,
        }
    }

    pub fn block(&self) -> Option<&GraphicBlock> {
        self.block.as_ref()
    }

    pub fn slot_id(&self) -> i32 {
        self.slot_id
    }

    /// Visible part of the picture.
    pub fn crop(&self) -> Rect {
        self.crop
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // Nothing to give the block back to if the component is gone.
            let _ = self.release.send(DriverMessage::OutputBufferReturned {
                generation: self.generation,
                slot_id: self.slot_id,
                block,
            });
        }
    }
}

/// One compressed frame submitted by the client, and what it decoded to.
#[derive(Debug, Default)]
pub struct Work {
    /// Identifies the work for the client.
    pub frame_index: u64,
    pub timestamp: u64,
    pub flags: WorkFlags,
    /// Emptied once the accelerator has been given the input.
    pub input: Vec<InputBuffer>,
    pub output: Vec<OutputBuffer>,
    pub output_flags: WorkFlags,
}

impl Work {
    pub fn new(frame_index: u64, timestamp: u64, flags: WorkFlags, input: InputBuffer) -> Self {
        Work {
            frame_index,
            timestamp,
            flags,
            input: vec![input],
            ..Default::default()
        }
    }
}

/// How `drain` ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// The last work is flagged with end of stream.
    ComponentWithEos,
    ComponentNoEos,
    /// Drain the following components too.
    Chain,
}

/// Receives the results of a component.
///
/// All methods are called from the decode driver thread.
pub trait Listener: Send + Sync {
    /// Works that are done, in the order they were queued.
    fn on_work_done(&self, works: Vec<Work>);
    /// Works dropped by a flush, a stop or an error.
    fn on_work_abandoned(&self, works: Vec<Work>);
    /// The component hit an error and needs to be reset.
    fn on_error(&self, error: Error);
}
