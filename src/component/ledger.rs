// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Works that have been handed over to the accelerator and are waiting for their results.

use std::collections::VecDeque;

use crate::component::work::Work;
use crate::error::Error;
use crate::error::Result;

/// A work forwarded to the accelerator under `bitstream_id`.
#[derive(Debug)]
pub struct PendingWork {
    pub work: Work,
    pub bitstream_id: i32,
    /// Bitstream buffers not yet returned by the accelerator.
    pub inputs_pending: usize,
    /// Number of decoded pictures this work produces.
    pub outputs_expected: usize,
    /// Set while the work is the last one before an ongoing drain.
    pub awaiting_drain: bool,
    /// Whether the end of stream is signalled on this work once the drain is done.
    pub end_of_stream: bool,
}

impl PendingWork {
    pub fn new(work: Work, bitstream_id: i32, inputs_pending: usize) -> Self {
        let outputs_expected = if inputs_pending > 0 && !work.flags.codec_config {
            1
        } else {
            0
        };
        let end_of_stream = work.flags.end_of_stream;
        PendingWork {
            work,
            bitstream_id,
            inputs_pending,
            outputs_expected,
            awaiting_drain: end_of_stream,
            end_of_stream,
        }
    }

    pub fn wants_output(&self) -> bool {
        self.work.output.len() < self.outputs_expected
    }

    pub fn is_complete(&self) -> bool {
        self.inputs_pending == 0 && !self.wants_output() && !self.awaiting_drain
    }
}

/// Pending works in the order they were queued.
#[derive(Debug, Default)]
pub struct PendingWorkLedger {
    works: VecDeque<PendingWork>,
}

impl PendingWorkLedger {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, work: PendingWork) {
        self.works.push_back(work);
    }

    pub fn find_by_bitstream_id(&mut self, bitstream_id: i32) -> Result<&mut PendingWork> {
        self.works
            .iter_mut()
            .find(|w| w.bitstream_id == bitstream_id)
            .ok_or(Error::NotFound(bitstream_id))
    }

    pub fn oldest_incomplete(&self) -> Option<&PendingWork> {
        self.works.iter().find(|w| !w.is_complete())
    }

    /// Removes the longest run of complete works at the front of the ledger.
    ///
    /// A complete work queued after an incomplete one stays until the latter completes, so works
    /// are always reported in queueing order.
    pub fn pop_completed(&mut self) -> Vec<Work> {
        let mut done = Vec::new();
        while self.works.front().map_or(false, PendingWork::is_complete) {
            if let Some(pending) = self.works.pop_front() {
                done.push(pending.work);
            }
        }
        done
    }

    pub fn abandon_all(&mut self) -> Vec<Work> {
        self.works.drain(..).map(|w| w.work).collect()
    }

    /// Makes the most recent work wait for the drain that is about to start. Returns false if
    /// the ledger is empty.
    pub fn mark_last_awaiting_drain(&mut self, end_of_stream: bool) -> bool {
        match self.works.back_mut() {
            Some(last) => {
                last.awaiting_drain = true;
                last.end_of_stream |= end_of_stream;
                true
            }
            None => false,
        }
    }

    /// Releases the works waiting for a drain.
    pub fn complete_drain(&mut self) {
        for pending in self.works.iter_mut().filter(|w| w.awaiting_drain) {
            pending.awaiting_drain = false;
            if pending.end_of_stream {
                pending.work.output_flags.end_of_stream = true;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.works.len()
    }

    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::work::InputBuffer;
    use crate::component::work::WorkFlags;

    fn pending(frame_index: u64, bitstream_id: i32, flags: WorkFlags) -> PendingWork {
        let work = Work {
            frame_index,
            flags,
            input: vec![InputBuffer::new(vec![0u8; 16])],
            ..Default::default()
        };
        PendingWork::new(work, bitstream_id, 1)
    }

    // Pretends the accelerator produced a picture for the work.
    fn fake_output(pending: &mut PendingWork) {
        pending.outputs_expected = 0;
    }

    #[test]
    fn unknown_bitstream_id() {
        let mut ledger = PendingWorkLedger::new();
        ledger.push(pending(0, 1, Default::default()));
        assert!(matches!(
            ledger.find_by_bitstream_id(7),
            Err(Error::NotFound(7))
        ));
    }

    #[test]
    fn completion_needs_input_and_output() {
        let mut ledger = PendingWorkLedger::new();
        ledger.push(pending(0, 1, Default::default()));

        let work = ledger.find_by_bitstream_id(1).unwrap();
        assert_eq!(work.outputs_expected, 1);
        work.inputs_pending = 0;
        assert!(ledger.pop_completed().is_empty());

        fake_output(ledger.find_by_bitstream_id(1).unwrap());
        let done = ledger.pop_completed();
        assert_eq!(done.len(), 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn codec_config_expects_no_output() {
        let mut ledger = PendingWorkLedger::new();
        let flags = WorkFlags {
            codec_config: true,
            ..Default::default()
        };
        ledger.push(pending(0, 1, flags));
        assert_eq!(ledger.find_by_bitstream_id(1).unwrap().outputs_expected, 0);
        ledger.find_by_bitstream_id(1).unwrap().inputs_pending = 0;
        assert_eq!(ledger.pop_completed().len(), 1);
    }

    #[test]
    fn reports_in_queueing_order() {
        let mut ledger = PendingWorkLedger::new();
        ledger.push(pending(10, 1, Default::default()));
        ledger.push(pending(11, 2, Default::default()));
        for id in [1, 2] {
            ledger.find_by_bitstream_id(id).unwrap().inputs_pending = 0;
        }

        fake_output(ledger.find_by_bitstream_id(2).unwrap());
        assert!(ledger.pop_completed().is_empty());
        assert_eq!(ledger.oldest_incomplete().unwrap().bitstream_id, 1);

        fake_output(ledger.find_by_bitstream_id(1).unwrap());
        assert!(ledger.oldest_incomplete().is_none());
        let done: Vec<u64> = ledger
            .pop_completed()
            .iter()
            .map(|w| w.frame_index)
            .collect();
        assert_eq!(done, vec![10, 11]);
    }

    #[test]
    fn drain_holds_back_the_last_work() {
        let mut ledger = PendingWorkLedger::new();
        assert!(!ledger.mark_last_awaiting_drain(true));

        ledger.push(pending(0, 1, Default::default()));
        let work = ledger.find_by_bitstream_id(1).unwrap();
        work.inputs_pending = 0;
        fake_output(work);
        assert!(ledger.mark_last_awaiting_drain(true));
        assert!(ledger.pop_completed().is_empty());

        ledger.complete_drain();
        let done = ledger.pop_completed();
        assert_eq!(done.len(), 1);
        assert!(done[0].output_flags.end_of_stream);
    }

    #[test]
    fn end_of_stream_work_waits_for_drain() {
        let mut ledger = PendingWorkLedger::new();
        let flags = WorkFlags {
            end_of_stream: true,
            ..Default::default()
        };
        let work = Work {
            flags,
            ..Default::default()
        };
        ledger.push(PendingWork::new(work, 3, 0));
        assert!(ledger.pop_completed().is_empty());
        ledger.complete_drain();
        let done = ledger.pop_completed();
        assert!(done[0].output_flags.end_of_stream);
    }

    #[test]
    fn abandon_everything() {
        let mut ledger = PendingWorkLedger::new();
        ledger.push(pending(0, 1, Default::default()));
        ledger.push(pending(1, 2, Default::default()));
        assert_eq!(ledger.abandon_all().len(), 2);
        assert!(ledger.is_empty());
        assert!(ledger.oldest_incomplete().is_none());
    }
}
