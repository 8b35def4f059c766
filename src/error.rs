// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Errors that can happen while driving the decode accelerator.

use std::io;

use remain::sorted;
use thiserror::Error as ThisError;

use crate::component::FetchError;
use crate::component::Owner;
use crate::component::State;

#[sorted]
#[derive(Debug, ThisError)]
pub enum Error {
    /// The accelerator reported a failure while decoding.
    #[error("accelerator reported an error: {0}")]
    AcceleratorFailure(vda::decode::Response),
    /// The accelerator refused the session.
    #[error("accelerator failed to initialize: {0}")]
    AcceleratorInitFailure(vda::decode::Response),
    /// The command is not allowed in the current lifecycle state.
    #[error("cannot {op} while the component is {state:?}")]
    BadState { op: &'static str, state: State },
    /// The decode driver thread has gone away.
    #[error("the decode driver is not running")]
    DriverGone,
    /// A frame slot was asked to change owner in a way that is not allowed.
    #[error("slot {id} cannot go from {from:?} to {to:?}")]
    IllegalTransition { id: i32, from: Owner, to: Owner },
    /// The configuration is not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// No frame slot has this id.
    #[error("invalid slot id {0}")]
    InvalidSlot(i32),
    /// No pending work has this bitstream id.
    #[error("no pending work for bitstream id {0}")]
    NotFound(i32),
    /// Output buffers could not be obtained from the block pool.
    #[error("cannot allocate output buffers: {0}")]
    ResourceExhausted(FetchError),
    /// An execution context could not be started.
    #[error("failed to spawn the {0} thread: {1}")]
    SpawnThread(&'static str, io::Error),
    /// The operation is not supported by this component.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The accelerator cannot decode the configured profile.
    #[error("profile {0:?} is not supported by the accelerator")]
    UnsupportedProfile(vda::Profile),
}

pub type Result<T> = std::result::Result<T, Error>;
