// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A video decoder component backed by a decode accelerator.
//!
//! `VdaComponent` is driven from a single thread by its owner. The decoding itself happens on the
//! thread of the decode driver, which the component talks to by posting messages. Commands that
//! need an answer (`start`, `stop`, `reset`, `release` and `status`) block until the driver has
//! acted on them.

mod driver;
mod frame_pool;
mod ledger;
mod slots;
mod work;

use std::sync::mpsc::channel;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::thread::JoinHandle;

pub use driver::DriverState;
pub use driver::DriverStatus;
pub use frame_pool::FetchError;
use log::error;
use log::info;
pub use slots::Owner;
use vda::decode::DecodeAccelerator;
pub use work::DrainMode;
pub use work::InputBuffer;
pub use work::Listener;
pub use work::OutputBuffer;
pub use work::Work;
pub use work::WorkFlags;

use self::driver::DecodeDriver;
use self::driver::DriverMessage;
use crate::error::Error;
use crate::error::Result;
use crate::params::ComponentIntf;
use crate::params::DecoderConfig;

const DRIVER_THREAD_NAME: &str = "c2vda_driver";

/// Lifecycle state of the component, as seen by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unloaded,
    Loaded,
    Running,
    Error,
}

pub struct VdaComponent {
    intf: ComponentIntf,
    state: Arc<Mutex<State>>,
    sender: Sender<DriverMessage>,
    driver: Option<JoinHandle<()>>,
}

impl VdaComponent {
    /// Creates a component decoding with `accelerator` and starts its decode driver thread.
    pub fn new(accelerator: Box<dyn DecodeAccelerator>, intf: ComponentIntf) -> Result<Self> {
        let state = Arc::new(Mutex::new(State::Loaded));
        let (sender, receiver) = channel();
        let driver = DecodeDriver::new(accelerator, sender.clone(), Arc::clone(&state));
        let driver = thread::Builder::new()
            .name(DRIVER_THREAD_NAME.to_string())
            .spawn(move || driver.run(receiver))
            .map_err(|e| Error::SpawnThread(DRIVER_THREAD_NAME, e))?;

        info!("created component {}", intf.name());
        Ok(VdaComponent {
            intf,
            state,
            sender,
            driver: Some(driver),
        })
    }

    pub fn state(&self) -> State {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: State) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn check_state(&self, op: &'static str, allowed: &[State]) -> Result<State> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            Err(Error::BadState { op, state })
        }
    }

    fn post(&self, message: DriverMessage) -> Result<()> {
        self.sender.send(message).map_err(|_| Error::DriverGone)
    }

    pub fn intf(&self) -> &ComponentIntf {
        &self.intf
    }

    /// Sets who receives the finished works and the errors. Not allowed while running.
    pub fn set_listener(&mut self, listener: Option<Arc<dyn Listener>>) -> Result<()> {
        self.check_state("set a listener", &[State::Loaded, State::Error])?;
        self.post(DriverMessage::SetListener(listener))
    }

    /// Replaces the configuration used by the next `start`.
    pub fn configure(&mut self, config: DecoderConfig) -> Result<()> {
        self.check_state("configure", &[State::Loaded])?;
        self.intf.set_config(config)
    }

    /// Starts a decoding session.
    ///
    /// Fails and stays loaded if the accelerator cannot decode with the current configuration.
    pub fn start(&mut self) -> Result<()> {
        self.check_state("start", &[State::Loaded])?;
        let (reply, receiver) = channel();
        self.post(DriverMessage::Start {
            params: self.intf.snapshot(),
            reply,
        })?;
        receiver.recv().map_err(|_| Error::DriverGone)?
    }

    fn stop_driver(&self) -> Result<()> {
        let (reply, receiver) = channel();
        self.post(DriverMessage::Stop { reply })?;
        receiver.recv().map_err(|_| Error::DriverGone)?;
        self.set_state(State::Loaded);
        Ok(())
    }

    /// Ends the decoding session. Works not done yet are reported as abandoned.
    pub fn stop(&mut self) -> Result<()> {
        self.check_state("stop", &[State::Running])?;
        self.stop_driver()
    }

    /// Like `stop`, but also gets the component out of the error state.
    pub fn reset(&mut self) -> Result<()> {
        match self.check_state("reset", &[State::Loaded, State::Running, State::Error])? {
            State::Loaded => Ok(()),
            _ => self.stop_driver(),
        }
    }

    /// Stops the decode driver for good.
    pub fn release(&mut self) -> Result<()> {
        if self.state() == State::Unloaded {
            return Ok(());
        }
        self.reset()?;
        self.post(DriverMessage::Exit)?;
        if let Some(driver) = self.driver.take() {
            if driver.join().is_err() {
                error!("decode driver thread panicked");
            }
        }
        self.set_state(State::Unloaded);
        info!("released component {}", self.intf.name());
        Ok(())
    }

    /// Submits works for decoding. The results are reported to the listener in the same order.
    pub fn queue(&self, works: Vec<Work>) -> Result<()> {
        self.check_state("queue", &[State::Running])?;
        self.post(DriverMessage::QueueWork(works))
    }

    pub fn announce(&self) -> Result<()> {
        Err(Error::Unsupported("announce"))
    }

    /// Drops the works submitted so far. They are reported to the listener as abandoned.
    pub fn flush(&self) -> Result<()> {
        self.check_state("flush", &[State::Running])?;
        self.post(DriverMessage::Flush)
    }

    /// Makes the accelerator output everything it was given so far.
    pub fn drain(&self, mode: DrainMode) -> Result<()> {
        let end_of_stream = match mode {
            DrainMode::ComponentWithEos => true,
            DrainMode::ComponentNoEos => false,
            DrainMode::Chain => return Err(Error::Unsupported("chain drain")),
        };
        self.check_state("drain", &[State::Running])?;
        self.post(DriverMessage::Drain(end_of_stream))
    }

    /// Returns a snapshot of the decode driver.
    pub fn status(&self) -> Result<DriverStatus> {
        let (reply, receiver) = channel();
        self.post(DriverMessage::QueryStatus { reply })?;
        receiver.recv().map_err(|_| Error::DriverGone)
    }
}

impl Drop for VdaComponent {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!("failed to release component {}: {}", self.intf.name(), e);
        }
    }
}
