// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interface to the external allocator providing the output graphic buffers.

use remain::sorted;
use thiserror::Error as ThisError;
use vda::BufferHandle;
use vda::FramePlane;
use vda::PixelFormat;

use crate::format::Size;

/// How a graphic block is going to be accessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub cpu_read: bool,
    pub cpu_write: bool,
    pub protected: bool,
}

impl MemoryUsage {
    /// Usage of a buffer the accelerator decodes into and the client then reads from.
    pub fn decoder_output(secure: bool) -> Self {
        MemoryUsage {
            cpu_read: !secure,
            cpu_write: false,
            protected: secure,
        }
    }
}

/// A graphic buffer obtained from a `BlockPool`.
///
/// Dropping the block hands it back to the allocator.
#[derive(Debug, PartialEq, Eq)]
pub struct GraphicBlock {
    handle: BufferHandle,
    size: Size,
    format: PixelFormat,
    planes: Vec<FramePlane>,
}

impl GraphicBlock {
    pub fn new(
        handle: BufferHandle,
        size: Size,
        format: PixelFormat,
        planes: Vec<FramePlane>,
    ) -> Self {
        GraphicBlock {
            handle,
            size,
            format,
            planes,
        }
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn planes(&self) -> &[FramePlane] {
        &self.planes
    }
}

#[sorted]
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum BlockPoolError {
    #[error("block pool is corrupted")]
    Corrupted,
    #[error("no memory left for a new block")]
    NoMemory,
    #[error("timed out waiting for a free block")]
    TimedOut,
}

/// The external graphic buffer allocator.
///
/// `fetch_graphic_block` may block for a while or time out when all blocks are in use. It is only
/// ever called from the dedicated fetch thread of a `VideoFramePool`.
pub trait BlockPool: Send + Sync {
    fn fetch_graphic_block(
        &self,
        size: Size,
        format: PixelFormat,
        usage: MemoryUsage,
    ) -> std::result::Result<GraphicBlock, BlockPoolError>;
}
