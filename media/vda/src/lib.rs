// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Contract between a decoder component and a video decode accelerator (VDA).
//!
//! The accelerator itself lives outside of this crate. It is driven through the
//! [`decode::DecodeAccelerator`] trait and reports back through an [`decode::EventSink`].

pub mod decode;

mod error;
mod format;

pub use error::*;
pub use format::*;
