//! Best-effort, unordered metric delivery
//!
//! Events go through a bounded queue to a background thread. Submission
//! never blocks: a full queue drops the event and bumps [`dropped`].
//! Delivery order relative to the submitting call is not guaranteed, and
//! events still queued when the process exits are lost.
//!
//! [`dropped`]: DetachedRecorder::dropped

use crate::metrics::context::MeterContext;
use crate::metrics::registry::MetricRegistry;
use metrics::Label;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A byte count produced by one successful transfer
#[derive(Debug, Clone)]
pub struct ByteDelta {
    pub ctx: MeterContext,
    pub component: Arc<str>,
    pub metric: Cow<'static, str>,
    pub value: u64,
    pub attributes: Vec<Label>,
}

enum Message {
    Delta(ByteDelta),
    Shutdown,
}

struct Shared {
    closed: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the background metric worker. Cheap to clone.
#[derive(Clone)]
pub struct DetachedRecorder {
    tx: mpsc::Sender<Message>,
    shared: Arc<Shared>,
}

impl DetachedRecorder {
    /// Start a worker feeding `registry` through a queue of `capacity` events
    pub fn spawn(registry: Arc<MetricRegistry>, capacity: usize) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::channel::<Message>(capacity.max(1));

        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            worker: Mutex::new(None),
        });

        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("metered-io-recorder".to_string())
            .spawn(move || {
                while let Some(message) = rx.blocking_recv() {
                    match message {
                        Message::Delta(delta) => {
                            registry.add_count_or_ignore(
                                &delta.ctx,
                                &delta.component,
                                &delta.metric,
                                delta.value,
                                &delta.attributes,
                            );
                            worker_shared.delivered.fetch_add(1, Ordering::Relaxed);
                        }
                        // refuse new events but deliver the ones already queued
                        Message::Shutdown => rx.close(),
                    }
                }
                tracing::debug!("detached recorder stopped");
            })?;

        *shared.worker.lock() = Some(handle);

        Ok(Self { tx, shared })
    }

    /// Queue `delta` without waiting. Returns false if it was dropped.
    pub fn submit(&self, delta: ByteDelta) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        match self.tx.try_send(Message::Delta(delta)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("detached metric event dropped");
                false
            }
        }
    }

    /// Events handed to the registry so far
    pub fn delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Events discarded because the queue was full or closed
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting events, drain what is queued and join the worker.
    ///
    /// Every submitted event ends up counted in exactly one of
    /// [`delivered`](Self::delivered) or [`dropped`](Self::dropped).
    ///
    /// Blocks the calling thread until the worker exits.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut message = Message::Shutdown;
        loop {
            match self.tx.try_send(message) {
                Ok(()) => break,
                Err(TrySendError::Full(m)) => {
                    message = m;
                    thread::yield_now();
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }

        if let Some(handle) = self.shared.worker.lock().take() {
            if handle.join().is_err() {
                tracing::error!("detached recorder worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for DetachedRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedRecorder")
            .field("delivered", &self.delivered())
            .field("dropped", &self.dropped())
            .finish()
    }
}
