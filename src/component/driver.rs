// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The decode driver: runs on its own thread and owns everything the accelerator works with.
//!
//! Commands from the component, events from the accelerator, buffers released by the client and
//! buffers fetched from the allocator all arrive as `DriverMessage`s on a single channel, and are
//! processed one at a time in arrival order.

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::mem;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use log::debug;
use log::error;
use log::info;
use log::warn;
use vda::decode::DecodeAccelerator;
use vda::decode::Event;
use vda::decode::EventSink;
use vda::decode::Response;

use crate::allocator::GraphicBlock;
use crate::component::frame_pool::FetchError;
use crate::component::frame_pool::FetchResult;
use crate::component::frame_pool::VideoFramePool;
use crate::component::ledger::PendingWork;
use crate::component::ledger::PendingWorkLedger;
use crate::component::slots::FrameSlotRegistry;
use crate::component::slots::Owner;
use crate::component::work::Listener;
use crate::component::work::OutputBuffer;
use crate::component::work::Work;
use crate::component::State;
use crate::error::Error;
use crate::error::Result;
use crate::format::Rect;
use crate::format::Size;
use crate::format::VideoFormat;
use crate::params::StartParams;

// Bitstream ids are kept positive.
const BITSTREAM_ID_MASK: i32 = 0x3FFF_FFFF;
// More picture buffers than this are never allocated for one format.
const MAX_OUTPUT_BUFFERS: u32 = 64;

/// State of the decode driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Started,
    /// Waiting for the accelerator to output everything it was given.
    Draining,
    /// Waiting for the accelerator to drop everything it was given.
    Flushing,
    /// Waiting for the accelerator to drop everything before ending the session.
    Stopping,
    /// A fatal error happened. Only a stop gets out of it.
    Error,
}

/// Snapshot of the decode driver, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverStatus {
    pub state: DriverState,
    pub component_slots: usize,
    pub accelerator_slots: usize,
    pub client_slots: usize,
    /// Works given to the accelerator and not reported yet.
    pub pending_works: usize,
    /// Works waiting to be given to the accelerator.
    pub queued_works: usize,
    pub current_format: VideoFormat,
    pub pending_format: Option<VideoFormat>,
    pub format_changes_applied: usize,
    pub fetch_pending: bool,
}

pub enum DriverMessage {
    SetListener(Option<Arc<dyn Listener>>),
    Start {
        params: StartParams,
        reply: Sender<Result<()>>,
    },
    QueueWork(Vec<Work>),
    /// Drains the accelerator, flagging the last work with end of stream if `true`.
    Drain(bool),
    Flush,
    Stop {
        reply: Sender<()>,
    },
    AcceleratorEvent {
        session: u32,
        event: Event,
    },
    OutputBufferReturned {
        generation: u32,
        slot_id: i32,
        block: GraphicBlock,
    },
    FrameFetched {
        generation: u32,
        result: FetchResult,
    },
    QueryStatus {
        reply: Sender<DriverStatus>,
    },
    Exit,
}

/// Forwards the events of one accelerator session to the driver.
struct DriverEventSink {
    session: u32,
    sender: Mutex<Sender<DriverMessage>>,
}

impl EventSink for DriverEventSink {
    fn post(&self, event: Event) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if sender
            .send(DriverMessage::AcceleratorEvent {
                session: self.session,
                event,
            })
            .is_err()
        {
            debug!("decode driver gone, dropping accelerator event");
        }
    }
}

/// A work not given to the accelerator yet.
struct QueuedWork {
    work: Work,
    /// Set if a drain starts right after this work, with whether it signals end of stream.
    drain: Option<bool>,
}

pub struct DecodeDriver {
    accelerator: Box<dyn DecodeAccelerator>,
    sender: Sender<DriverMessage>,
    outward_state: Arc<Mutex<State>>,
    listener: Option<Arc<dyn Listener>>,
    state: DriverState,
    params: Option<StartParams>,
    // Accelerator session the events are expected from.
    session: u32,
    next_bitstream_id: i32,
    queue: VecDeque<QueuedWork>,
    ledger: PendingWorkLedger,
    slots: FrameSlotRegistry,
    // Slots known to the accelerator since the last `assign_picture_buffers`.
    imported: BTreeSet<i32>,
    current_format: VideoFormat,
    pending_format: Option<VideoFormat>,
    format_changes_applied: usize,
    frame_pool: Option<VideoFramePool>,
    // Bumped whenever the frame pool is replaced or dropped. Fetch results carry the value they
    // were requested with.
    fetch_generation: u32,
    fetch_failures: u32,
    stop_waiters: Vec<Sender<()>>,
}

impl DecodeDriver {
    pub fn new(
        accelerator: Box<dyn DecodeAccelerator>,
        sender: Sender<DriverMessage>,
        outward_state: Arc<Mutex<State>>,
    ) -> Self {
        DecodeDriver {
            accelerator,
            sender,
            outward_state,
            listener: None,
            state: DriverState::Uninitialized,
            params: None,
            session: 0,
            next_bitstream_id: 0,
            queue: VecDeque::new(),
            ledger: PendingWorkLedger::new(),
            slots: FrameSlotRegistry::new(),
            imported: BTreeSet::new(),
            current_format: Default::default(),
            pending_format: None,
            format_changes_applied: 0,
            frame_pool: None,
            fetch_generation: 0,
            fetch_failures: 0,
            stop_waiters: Vec::new(),
        }
    }

    /// Processes messages until `DriverMessage::Exit` is received.
    pub fn run(mut self, receiver: Receiver<DriverMessage>) {
        while let Ok(message) = receiver.recv() {
            match message {
                DriverMessage::SetListener(listener) => self.listener = listener,
                DriverMessage::Start { params, reply } => {
                    let result = self.start(params);
                    if reply.send(result).is_err() {
                        warn!("start requester went away");
                    }
                }
                DriverMessage::QueueWork(works) => self.queue_works(works),
                DriverMessage::Drain(end_of_stream) => self.drain(end_of_stream),
                DriverMessage::Flush => self.flush(),
                DriverMessage::Stop { reply } => self.stop(reply),
                DriverMessage::AcceleratorEvent { session, event } => {
                    self.handle_accelerator_event(session, event)
                }
                DriverMessage::OutputBufferReturned {
                    generation,
                    slot_id,
                    block,
                } => self.output_buffer_returned(generation, slot_id, block),
                DriverMessage::FrameFetched { generation, result } => {
                    self.frame_fetched(generation, result)
                }
                DriverMessage::QueryStatus { reply } => {
                    let _ = reply.send(self.status());
                }
                DriverMessage::Exit => break,
            }
        }
        self.shutdown();
    }

    fn set_outward_state(&self, state: State) {
        *self
            .outward_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn outward_state(&self) -> State {
        *self
            .outward_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> DriverStatus {
        DriverStatus {
            state: self.state,
            component_slots: self.slots.count_by_owner(Owner::Component),
            accelerator_slots: self.slots.count_by_owner(Owner::Accelerator),
            client_slots: self.slots.count_by_owner(Owner::Client),
            pending_works: self.ledger.len(),
            queued_works: self.queue.len(),
            current_format: self.current_format,
            pending_format: self.pending_format,
            format_changes_applied: self.format_changes_applied,
            fetch_pending: self
                .frame_pool
                .as_ref()
                .map_or(false, VideoFramePool::has_pending_requests),
        }
    }

    fn start(&mut self, params: StartParams) -> Result<()> {
        if self.state != DriverState::Uninitialized {
            return Err(Error::BadState {
                op: "start",
                state: self.outward_state(),
            });
        }

        let config = &params.config;
        let capabilities = self.accelerator.capabilities();
        if !capabilities.supports_profile(config.profile) {
            return Err(Error::UnsupportedProfile(config.profile));
        }
        if !capabilities.supports_output(config.output_format) {
            return Err(Error::Unsupported("output pixel format"));
        }

        self.session = self.session.wrapping_add(1);
        let sink = DriverEventSink {
            session: self.session,
            sender: Mutex::new(self.sender.clone()),
        };
        match self.accelerator.initialize(config.profile, Box::new(sink)) {
            Response::Success => (),
            r => return Err(Error::AcceleratorInitFailure(r)),
        }

        info!("decoder started for {:?}", config.profile);
        self.params = Some(params);
        self.state = DriverState::Started;
        self.fetch_failures = 0;
        self.set_outward_state(State::Running);
        Ok(())
    }

    fn queue_works(&mut self, works: Vec<Work>) {
        match self.state {
            DriverState::Started | DriverState::Draining => {
                self.queue
                    .extend(works.into_iter().map(|work| QueuedWork { work, drain: None }));
                self.pump_queue();
            }
            state => {
                warn!("cannot queue works while {:?}", state);
                self.report_abandoned(works);
            }
        }
    }

    /// Gives the queued works to the accelerator until the queue is empty or a drain starts.
    fn pump_queue(&mut self) {
        while self.state == DriverState::Started {
            match self.queue.pop_front() {
                Some(queued) => self.forward(queued),
                None => break,
            }
        }
        self.report_finished_works();
    }

    fn forward(&mut self, queued: QueuedWork) {
        let QueuedWork { mut work, drain } = queued;
        let bitstream_id = self.next_bitstream_id;
        self.next_bitstream_id = (self.next_bitstream_id + 1) & BITSTREAM_ID_MASK;

        let inputs: Vec<_> = mem::take(&mut work.input)
            .into_iter()
            .filter(|input| !input.is_empty())
            .collect();
        let mut pending = PendingWork::new(work, bitstream_id, inputs.len());
        if let Some(end_of_stream) = drain {
            pending.awaiting_drain = true;
            pending.end_of_stream |= end_of_stream;
        }
        let start_drain = pending.awaiting_drain;
        self.ledger.push(pending);

        for input in inputs {
            self.accelerator
                .decode(bitstream_id, input.into_bitstream_buffer());
        }

        if start_drain {
            debug!("draining after bitstream {}", bitstream_id);
            self.accelerator.flush();
            self.state = DriverState::Draining;
        }
    }

    fn drain(&mut self, end_of_stream: bool) {
        match self.state {
            DriverState::Started | DriverState::Draining => (),
            state => {
                warn!("cannot drain while {:?}", state);
                return;
            }
        }

        if let Some(last) = self.queue.back_mut() {
            last.drain = Some(last.drain.unwrap_or(false) | end_of_stream);
        } else if self.state == DriverState::Started
            && self.ledger.mark_last_awaiting_drain(end_of_stream)
        {
            self.accelerator.flush();
            self.state = DriverState::Draining;
        } else {
            debug!("nothing to drain");
        }
    }

    fn flush(&mut self) {
        match self.state {
            DriverState::Started | DriverState::Draining => {
                let queued = self.take_queued_works();
                self.report_abandoned(queued);
                self.accelerator.reset();
                self.state = DriverState::Flushing;
            }
            DriverState::Flushing => debug!("already flushing"),
            state => warn!("cannot flush while {:?}", state),
        }
    }

    fn stop(&mut self, reply: Sender<()>) {
        self.stop_waiters.push(reply);
        match self.state {
            DriverState::Started | DriverState::Draining | DriverState::Flushing => {
                let queued = self.take_queued_works();
                self.report_abandoned(queued);
                self.accelerator.reset();
                self.state = DriverState::Stopping;
            }
            DriverState::Stopping => debug!("already stopping"),
            DriverState::Uninitialized | DriverState::Error => self.stop_done(),
        }
    }

    /// Ends the session once the accelerator dropped everything.
    fn stop_done(&mut self) {
        if self.state != DriverState::Uninitialized {
            self.accelerator.destroy();
            self.session = self.session.wrapping_add(1);
        }

        let mut abandoned = self.take_queued_works();
        abandoned.extend(self.ledger.abandon_all());
        self.report_abandoned(abandoned);

        let dismissed = self.slots.dismiss_all();
        let detached = self.slots.detach_client_owned();
        debug!(
            "stopped with {} slots dismissed and {} still held by the client",
            dismissed, detached
        );
        self.imported.clear();
        self.pending_format = None;
        self.drop_frame_pool();
        self.params = None;

        if self.state != DriverState::Uninitialized {
            info!("decoder stopped");
        }
        self.state = DriverState::Uninitialized;
        self.set_outward_state(State::Loaded);
        for waiter in self.stop_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn take_queued_works(&mut self) -> Vec<Work> {
        self.queue.drain(..).map(|queued| queued.work).collect()
    }

    fn handle_accelerator_event(&mut self, session: u32, event: Event) {
        if session != self.session {
            debug!("dropping event of former session {}: {:?}", session, event);
            return;
        }
        match self.state {
            DriverState::Uninitialized | DriverState::Error => {
                debug!("ignoring {:?} while {:?}", event, self.state);
                return;
            }
            _ => (),
        }

        match event {
            Event::ProvidePictureBuffers {
                min_num_buffers,
                width,
                height,
                visible_rect_left,
                visible_rect_top,
                visible_rect_right,
                visible_rect_bottom,
            } => self.provide_picture_buffers(
                min_num_buffers,
                width,
                height,
                Rect {
                    left: visible_rect_left,
                    top: visible_rect_top,
                    right: visible_rect_right,
                    bottom: visible_rect_bottom,
                },
            ),
            Event::DismissPictureBuffer { buffer_id } => self.dismiss_picture_buffer(buffer_id),
            Event::PictureReady {
                buffer_id,
                bitstream_id,
                left,
                top,
                right,
                bottom,
            } => self.picture_ready(
                buffer_id,
                bitstream_id,
                Rect {
                    left,
                    top,
                    right,
                    bottom,
                },
            ),
            Event::NotifyEndOfBitstreamBuffer { bitstream_id } => {
                self.end_of_bitstream_buffer(bitstream_id)
            }
            Event::NotifyError(r) => self.report_error(Error::AcceleratorFailure(r)),
            Event::ResetResponse(r) => self.reset_done(r),
            Event::FlushResponse(r) => self.flush_done(r),
        }
    }

    fn provide_picture_buffers(
        &mut self,
        min_num_buffers: u32,
        width: i32,
        height: i32,
        visible: Rect,
    ) {
        let config = match &self.params {
            Some(params) => &params.config,
            None => return,
        };
        if width <= 0 || height <= 0 {
            warn!("ignoring invalid coded size {}x{}", width, height);
            return;
        }
        if min_num_buffers > MAX_OUTPUT_BUFFERS {
            warn!(
                "ignoring request for {} buffers, at most {} are allowed",
                min_num_buffers, MAX_OUTPUT_BUFFERS
            );
            return;
        }
        let coded_size = Size::new(width as u32, height as u32);
        let visible_rect = if visible.fits_in(coded_size) {
            visible
        } else {
            warn!("visible rect {:?} does not fit in {}", visible, coded_size);
            Rect {
                left: 0,
                top: 0,
                right: width,
                bottom: height,
            }
        };
        let format = VideoFormat {
            pixel_format: config.output_format,
            min_num_buffers,
            coded_size,
            visible_rect,
        };
        info!(
            "accelerator requests {} buffers of {}",
            min_num_buffers, coded_size
        );

        // All the picture buffers the accelerator had are implicitly dismissed.
        let dismissed = self.slots.dismiss_all();
        if dismissed > 0 {
            debug!("{} picture buffers dismissed", dismissed);
        }
        self.imported.clear();
        self.pending_format = Some(format);
        self.try_apply_pending_format();
    }

    fn dismiss_picture_buffer(&mut self, buffer_id: i32) {
        if let Err(e) = self.slots.dismiss(buffer_id) {
            warn!("cannot dismiss picture buffer: {}", e);
            return;
        }
        self.imported.remove(&buffer_id);
        self.try_apply_pending_format();
    }

    /// Switches to the pending format if no slot is in use anymore.
    fn try_apply_pending_format(&mut self) {
        if self.pending_format.is_none() {
            return;
        }
        if !self.slots.all_owned_by_component() {
            debug!(
                "format change deferred: {} slots held by the accelerator, {} by the client",
                self.slots.count_by_owner(Owner::Accelerator),
                self.slots.count_by_owner(Owner::Client)
            );
            return;
        }
        let (format, params) = match (self.pending_format.take(), &self.params) {
            (Some(format), Some(params)) => (format, params.clone()),
            _ => return,
        };

        let previous = mem::replace(&mut self.current_format, format);
        self.format_changes_applied += 1;
        let count = format
            .min_num_buffers
            .saturating_add(params.config.extra_output_buffers) as usize;
        let reuse = !self.slots.is_empty()
            && previous.coded_size == format.coded_size
            && previous.pixel_format == format.pixel_format
            && self.slots.len() >= count;
        info!(
            "output format is now {} {:?} with {} buffers{}",
            format.coded_size,
            format.pixel_format,
            count,
            if reuse { ", reusing current ones" } else { "" }
        );

        self.imported.clear();
        if reuse {
            self.accelerator
                .assign_picture_buffers(self.slots.len() as u32);
            for id in self.slots.ids() {
                if let Err(e) = self.give_slot_to_accelerator(id) {
                    self.report_error(e);
                    return;
                }
            }
            return;
        }

        self.accelerator.assign_picture_buffers(count as u32);
        self.drop_frame_pool();
        self.slots.clear();
        self.fetch_failures = 0;
        let config = &params.config;
        match VideoFramePool::new(
            Arc::clone(&params.block_pool),
            format.coded_size,
            format.pixel_format,
            config.memory_usage(),
            config.fetch_max_retries,
            config.fetch_retry_delay(),
        ) {
            Ok(pool) => self.frame_pool = Some(pool),
            Err(e) => {
                self.report_error(e);
                return;
            }
        }
        for _ in 0..count {
            self.request_frame();
        }
    }

    /// Drops the frame pool. Results of the requests it still had are ignored when they arrive.
    fn drop_frame_pool(&mut self) {
        self.frame_pool = None;
        self.fetch_generation = self.fetch_generation.wrapping_add(1);
    }

    fn request_frame(&self) {
        if let Some(pool) = &self.frame_pool {
            let sender = self.sender.clone();
            let generation = self.fetch_generation;
            pool.request_frame(move |result| {
                let _ = sender.send(DriverMessage::FrameFetched { generation, result });
            });
        }
    }

    fn frame_fetched(&mut self, generation: u32, result: FetchResult) {
        if generation != self.fetch_generation || self.frame_pool.is_none() {
            debug!("dropping frame fetched for a former frame pool");
            return;
        }
        match result {
            Ok(block) => {
                self.fetch_failures = 0;
                let id = self.slots.register(block);
                debug!("new output buffer {}", id);
                if self.pending_format.is_some() {
                    self.try_apply_pending_format();
                    return;
                }
                match self.state {
                    DriverState::Started | DriverState::Draining | DriverState::Flushing => {
                        if let Err(e) = self.give_slot_to_accelerator(id) {
                            self.report_error(e);
                        }
                    }
                    _ => (),
                }
            }
            Err(FetchError::PoolDestroyed) => debug!("frame request cancelled"),
            Err(FetchError::Exhausted) => {
                self.fetch_failures += 1;
                let max_failures = self
                    .params
                    .as_ref()
                    .map_or(0, |params| params.config.max_fetch_failures);
                if self.fetch_failures > max_failures {
                    self.report_error(Error::ResourceExhausted(FetchError::Exhausted));
                } else {
                    warn!(
                        "no output buffer available ({} failures), retrying",
                        self.fetch_failures
                    );
                    self.request_frame();
                }
            }
            Err(e) => self.report_error(Error::ResourceExhausted(e)),
        }
    }

    fn give_slot_to_accelerator(&mut self, id: i32) -> Result<()> {
        let picture = if self.imported.contains(&id) {
            None
        } else {
            let slot = self.slots.find(id)?;
            Some(
                slot.picture_buffer(self.current_format.pixel_format)
                    .ok_or(Error::InvalidSlot(id))?,
            )
        };
        self.slots.set_owner(id, Owner::Accelerator)?;
        match picture {
            Some(picture) => {
                self.imported.insert(id);
                self.accelerator.import_buffer_for_picture(picture);
            }
            None => self.accelerator.reuse_picture_buffer(id),
        }
        Ok(())
    }

    fn picture_ready(&mut self, buffer_id: i32, bitstream_id: i32, crop: Rect) {
        let wanted = match self.ledger.find_by_bitstream_id(bitstream_id) {
            Ok(pending) => pending.wants_output(),
            Err(e) => {
                warn!("picture in buffer {}: {}", buffer_id, e);
                false
            }
        };
        if !wanted {
            if matches!(
                self.slots.find(buffer_id).map(|s| s.owner()),
                Ok(Owner::Accelerator)
            ) {
                debug!("recycling unexpected picture buffer {}", buffer_id);
                self.accelerator.reuse_picture_buffer(buffer_id);
            }
            return;
        }

        let block = match self.slots.release_to_client(buffer_id) {
            Ok(block) => block,
            Err(e) => {
                warn!("picture ready in unusable buffer: {}", e);
                return;
            }
        };

        let crop = if crop == self.current_format.visible_rect {
            crop
        } else if crop.fits_in(self.current_format.coded_size) {
            info!("visible rect changed to {:?}", crop);
            self.current_format.visible_rect = crop;
            crop
        } else {
            warn!("ignoring invalid crop {:?}", crop);
            self.current_format.visible_rect
        };

        let generation = self.slots.generation();
        let release = self.sender.clone();
        if let Ok(pending) = self.ledger.find_by_bitstream_id(bitstream_id) {
            let output = OutputBuffer::new(
                block,
                buffer_id,
                generation,
                crop,
                pending.work.timestamp,
                release,
            );
            pending.work.output.push(output);
        }
        self.report_finished_works();
    }

    fn end_of_bitstream_buffer(&mut self, bitstream_id: i32) {
        match self.ledger.find_by_bitstream_id(bitstream_id) {
            Ok(pending) if pending.inputs_pending > 0 => pending.inputs_pending -= 1,
            Ok(_) => warn!("bitstream {} returned more than once", bitstream_id),
            Err(e) => {
                warn!("bitstream buffer returned: {}", e);
                return;
            }
        }
        self.report_finished_works();
    }

    fn output_buffer_returned(&mut self, generation: u32, slot_id: i32, block: GraphicBlock) {
        if generation != self.slots.generation() {
            debug!("dropping buffer {} of former buffer set", slot_id);
            return;
        }
        if let Err(e) = self.slots.reclaim_from_client(slot_id, block) {
            debug!("dropping released buffer: {}", e);
            return;
        }

        if self.pending_format.is_some() {
            self.try_apply_pending_format();
            return;
        }
        match self.state {
            DriverState::Started | DriverState::Draining | DriverState::Flushing => {
                if let Err(e) = self.give_slot_to_accelerator(slot_id) {
                    self.report_error(e);
                }
            }
            _ => (),
        }
    }

    fn flush_done(&mut self, response: Response) {
        match response {
            Response::Success if self.state == DriverState::Draining => {
                debug!("drain done");
                self.ledger.complete_drain();
                self.state = DriverState::Started;
                self.pump_queue();
            }
            Response::Success => warn!("unexpected drain done while {:?}", self.state),
            Response::Cancelled => debug!("drain cancelled"),
            r => self.report_error(Error::AcceleratorFailure(r)),
        }
    }

    fn reset_done(&mut self, response: Response) {
        if response != Response::Success {
            self.report_error(Error::AcceleratorFailure(response));
            return;
        }
        match self.state {
            DriverState::Flushing => {
                debug!("flush done");
                let abandoned = self.ledger.abandon_all();
                self.report_abandoned(abandoned);
                self.state = DriverState::Started;
                self.pump_queue();
            }
            DriverState::Stopping => self.stop_done(),
            state => warn!("unexpected reset done while {:?}", state),
        }
    }

    fn report_finished_works(&mut self) {
        let done = self.ledger.pop_completed();
        if done.is_empty() {
            return;
        }
        if let Some(oldest) = self.ledger.oldest_incomplete() {
            debug!(
                "{} works done, next one waits on bitstream {}",
                done.len(),
                oldest.bitstream_id
            );
        }
        match &self.listener {
            Some(listener) => listener.on_work_done(done),
            None => warn!("no listener for {} finished works", done.len()),
        }
    }

    fn report_abandoned(&self, works: Vec<Work>) {
        if works.is_empty() {
            return;
        }
        debug!("abandoning {} works", works.len());
        match &self.listener {
            Some(listener) => listener.on_work_abandoned(works),
            None => warn!("no listener for {} abandoned works", works.len()),
        }
    }

    /// Puts the driver in the error state, or finishes the stop if one is in progress.
    fn report_error(&mut self, error: Error) {
        match self.state {
            DriverState::Stopping => {
                warn!("error while stopping: {}", error);
                self.stop_done();
                return;
            }
            DriverState::Error => {
                warn!("further error: {}", error);
                return;
            }
            _ => (),
        }

        error!("decoder error: {}", error);
        self.state = DriverState::Error;
        let mut abandoned = self.take_queued_works();
        abandoned.extend(self.ledger.abandon_all());
        self.report_abandoned(abandoned);
        self.set_outward_state(State::Error);
        match &self.listener {
            Some(listener) => listener.on_error(error),
            None => warn!("no listener to report the error to"),
        }
    }

    fn shutdown(&mut self) {
        if !self.ledger.is_empty() {
            warn!("exiting with {} pending works", self.ledger.len());
        }
        if self.state != DriverState::Uninitialized {
            self.accelerator.destroy();
        }
        let mut abandoned = self.take_queued_works();
        abandoned.extend(self.ledger.abandon_all());
        self.report_abandoned(abandoned);
        self.drop_frame_pool();
        debug!("decode driver exiting");
    }
}
