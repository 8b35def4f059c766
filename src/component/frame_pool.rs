// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Asynchronous allocation of output buffers.
//!
//! Fetching a block from the allocator may block for a long time when all the blocks are in use,
//! so `VideoFramePool` does it from its own thread and reports each result through a callback.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc::channel;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;
use log::error;
use log::warn;
use remain::sorted;
use thiserror::Error as ThisError;
use vda::PixelFormat;

use crate::allocator::BlockPool;
use crate::allocator::BlockPoolError;
use crate::allocator::GraphicBlock;
use crate::allocator::MemoryUsage;
use crate::error::Error;
use crate::error::Result;
use crate::format::Size;

const FETCH_THREAD_NAME: &str = "c2vda_frame_fetch";

#[sorted]
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum FetchError {
    /// The allocator failed in a way that retrying cannot fix.
    #[error("allocator error: {0}")]
    Allocator(BlockPoolError),
    /// No block became available in time.
    #[error("no output buffer available")]
    Exhausted,
    /// The pool was destroyed before the request could be served.
    #[error("frame pool destroyed")]
    PoolDestroyed,
}

pub type FetchResult = std::result::Result<GraphicBlock, FetchError>;

type FrameCallback = Box<dyn FnOnce(FetchResult) + Send>;

/// What the fetch thread allocates.
struct FetchParams {
    block_pool: Arc<dyn BlockPool>,
    size: Size,
    format: PixelFormat,
    usage: MemoryUsage,
    max_retries: u32,
    retry_delay: Duration,
}

impl FetchParams {
    fn fetch(&self, cancelled: &AtomicBool) -> FetchResult {
        let mut retries = 0;
        loop {
            if cancelled.load(Ordering::Acquire) {
                return Err(FetchError::PoolDestroyed);
            }
            match self
                .block_pool
                .fetch_graphic_block(self.size, self.format, self.usage)
            {
                Ok(block) => {
                    if cancelled.load(Ordering::Acquire) {
                        return Err(FetchError::PoolDestroyed);
                    }
                    return Ok(block);
                }
                Err(BlockPoolError::TimedOut) if retries < self.max_retries => {
                    retries += 1;
                    thread::sleep(self.retry_delay);
                }
                Err(BlockPoolError::TimedOut) | Err(BlockPoolError::NoMemory) => {
                    return Err(FetchError::Exhausted)
                }
                Err(e) => return Err(FetchError::Allocator(e)),
            }
        }
    }
}

/// Hands out output buffers of one size and format.
///
/// Requests are served in order by a dedicated thread. Every callback passed to `request_frame`
/// is called exactly once, from another thread, including when the pool is dropped before the
/// request could be served.
pub struct VideoFramePool {
    sender: Option<Sender<FrameCallback>>,
    pending: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl VideoFramePool {
    pub fn new(
        block_pool: Arc<dyn BlockPool>,
        size: Size,
        format: PixelFormat,
        usage: MemoryUsage,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let params = FetchParams {
            block_pool,
            size,
            format,
            usage,
            max_retries,
            retry_delay,
        };
        let (sender, receiver) = channel::<FrameCallback>();
        let pending = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker_pending = Arc::clone(&pending);
        let worker_cancelled = Arc::clone(&cancelled);
        let worker = thread::Builder::new()
            .name(FETCH_THREAD_NAME.to_string())
            .spawn(move || {
                while let Ok(callback) = receiver.recv() {
                    let result = params.fetch(&worker_cancelled);
                    worker_pending.fetch_sub(1, Ordering::AcqRel);
                    callback(result);
                }
                debug!("frame fetch thread exiting");
            })
            .map_err(|e| Error::SpawnThread(FETCH_THREAD_NAME, e))?;

        debug!("created frame pool for {} {:?} buffers", size, format);
        Ok(VideoFramePool {
            sender: Some(sender),
            pending,
            cancelled,
            worker: Some(worker),
        })
    }

    /// Requests one frame. `on_ready` is called with the frame or the reason why there is none.
    pub fn request_frame<F>(&self, on_ready: F)
    where
        F: FnOnce(FetchResult) + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let callback: FrameCallback = Box::new(on_ready);
        let callback = match &self.sender {
            Some(sender) => match sender.send(callback) {
                Ok(()) => return,
                Err(e) => e.0,
            },
            None => callback,
        };

        // The fetch thread is gone. Still answer, but never from within this call.
        warn!("frame fetch thread is not running");
        self.pending.fetch_sub(1, Ordering::AcqRel);
        if let Err(e) = thread::Builder::new()
            .name(FETCH_THREAD_NAME.to_string())
            .spawn(move || callback(Err(FetchError::PoolDestroyed)))
        {
            error!("failed to report a failed frame request: {}", e);
        }
    }

    pub fn has_pending_requests(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }
}

impl Drop for VideoFramePool {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // Closing the channel lets the thread fail the remaining requests and exit.
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("frame fetch thread panicked");
            }
        }
        if self.has_pending_requests() {
            error!("frame pool destroyed with requests left");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::Receiver;
    use std::sync::Mutex;

    use vda::BufferHandle;

    use super::*;

    /// Serves blocks until `available` runs out, then fails with `error`.
    struct CountingPool {
        available: Mutex<u32>,
        error: BlockPoolError,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingPool {
        fn new(available: u32, error: BlockPoolError) -> Self {
            CountingPool {
                available: Mutex::new(available),
                error,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    impl BlockPool for CountingPool {
        fn fetch_graphic_block(
            &self,
            size: Size,
            format: PixelFormat,
            _usage: MemoryUsage,
        ) -> std::result::Result<GraphicBlock, BlockPoolError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let mut available = self.available.lock().unwrap();
            if *available == 0 {
                return Err(self.error.clone());
            }
            *available -= 1;
            Ok(GraphicBlock::new(
                BufferHandle(call as u64),
                size,
                format,
                format.plane_layout(size.width, size.height),
            ))
        }
    }

    fn new_pool(block_pool: Arc<dyn BlockPool>, max_retries: u32) -> VideoFramePool {
        VideoFramePool::new(
            block_pool,
            Size::new(64, 64),
            PixelFormat::NV12,
            MemoryUsage::decoder_output(false),
            max_retries,
            Duration::from_millis(1),
        )
        .unwrap()
    }

    fn request(pool: &VideoFramePool, n: usize) -> Receiver<(usize, FetchResult)> {
        let (sender, receiver) = channel();
        let caller = thread::current().id();
        for i in 0..n {
            let sender = sender.clone();
            pool.request_frame(move |result| {
                assert_ne!(thread::current().id(), caller);
                sender.send((i, result)).unwrap();
            });
        }
        receiver
    }

    #[test]
    fn every_request_is_answered_once() {
        let block_pool = Arc::new(CountingPool::new(5, BlockPoolError::NoMemory));
        let pool = new_pool(block_pool, 1);
        let receiver = request(&pool, 5);

        let results: Vec<_> = receiver.iter().take(5).collect();
        assert_eq!(
            results.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert!(!pool.has_pending_requests());
        drop(pool);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn timeouts_are_retried_then_exhausted() {
        let block_pool = Arc::new(CountingPool::new(0, BlockPoolError::TimedOut));
        let pool = new_pool(block_pool.clone(), 2);
        let receiver = request(&pool, 1);

        let (_, result) = receiver.recv().unwrap();
        assert_eq!(result.unwrap_err(), FetchError::Exhausted);
        assert_eq!(block_pool.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn allocator_failure_is_not_retried() {
        let block_pool = Arc::new(CountingPool::new(0, BlockPoolError::Corrupted));
        let pool = new_pool(block_pool.clone(), 5);
        let receiver = request(&pool, 1);

        let (_, result) = receiver.recv().unwrap();
        assert_eq!(
            result.unwrap_err(),
            FetchError::Allocator(BlockPoolError::Corrupted)
        );
        assert_eq!(block_pool.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn teardown_fails_outstanding_requests() {
        let mut block_pool = CountingPool::new(100, BlockPoolError::NoMemory);
        block_pool.delay = Duration::from_millis(20);
        let pool = new_pool(Arc::new(block_pool), 1);
        let receiver = request(&pool, 4);
        assert!(pool.has_pending_requests());
        drop(pool);

        let results: Vec<_> = receiver.iter().collect();
        assert_eq!(results.len(), 4);
        assert!(results
            .iter()
            .any(|(_, r)| r.as_ref().err() == Some(&FetchError::PoolDestroyed)));
    }
}
