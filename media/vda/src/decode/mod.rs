// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This module provides type safe interfaces for each operation exposed by Chrome's
//! VideoDecodeAccelerator.

mod accelerator;
mod event;
mod fake;

pub use accelerator::*;
pub use event::*;
pub use fake::*;
