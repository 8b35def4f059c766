// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A video decoder component that drives a hardware decode accelerator.
//!
//! The client queues compressed works on a [`component::VdaComponent`], which hands them over to
//! a [`vda::decode::DecodeAccelerator`] and returns the decoded pictures, in queueing order,
//! through a [`component::Listener`]. Output buffers come from a client-provided
//! [`allocator::BlockPool`].

pub mod allocator;
pub mod component;
mod error;
pub mod format;
pub mod params;

pub use error::Error;
pub use error::Result;
