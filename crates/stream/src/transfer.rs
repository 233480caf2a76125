use std::collections::BTreeMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::resource::ResourceId;

/// Why a transfer did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("device could not allocate {bytes} bytes for {id}")]
    DeviceAllocation { id: ResourceId, bytes: u64 },
    #[error("reading asset data for {id} failed: {reason}")]
    AssetRead { id: ResourceId, reason: String },
    #[error("transfer worker is no longer running")]
    WorkerGone,
}

/// The device side of streaming: copies bytes in and frees them.
///
/// Implementations are called from the transfer worker when background
/// transfers are enabled, so they must be thread-safe.
pub trait TransferBackend: Send + Sync {
    fn upload(&self, id: ResourceId, bytes: u64) -> Result<(), TransferError>;
    fn release(&self, id: ResourceId, bytes: u64);
}

/// In-memory device that records residency. Failures can be injected per
/// resource to exercise the retry path.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    state: Mutex<DeviceState>,
}

#[derive(Debug, Default)]
struct DeviceState {
    resident: BTreeMap<ResourceId, u64>,
    pending_failures: BTreeMap<ResourceId, u32>,
    uploads: u64,
    releases: u64,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` uploads of `id` fail with an allocation error.
    pub fn fail_next_uploads(&self, id: ResourceId, count: u32) {
        self.lock().pending_failures.insert(id, count);
    }

    pub fn resident_bytes(&self) -> u64 {
        self.lock().resident.values().sum()
    }

    pub fn is_resident(&self, id: ResourceId) -> bool {
        self.lock().resident.contains_key(&id)
    }

    /// Successful uploads so far.
    pub fn upload_count(&self) -> u64 {
        self.lock().uploads
    }

    pub fn release_count(&self) -> u64 {
        self.lock().releases
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransferBackend for SimulatedDevice {
    fn upload(&self, id: ResourceId, bytes: u64) -> Result<(), TransferError> {
        let mut state = self.lock();
        if let Some(remaining) = state.pending_failures.get_mut(&id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransferError::DeviceAllocation { id, bytes });
            }
        }
        state.resident.insert(id, bytes);
        state.uploads += 1;
        Ok(())
    }

    fn release(&self, id: ResourceId, _bytes: u64) {
        let mut state = self.lock();
        if state.resident.remove(&id).is_some() {
            state.releases += 1;
        }
    }
}

/// Outcome of one upload, tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: ResourceId,
    pub generation: u64,
    pub result: Result<(), TransferError>,
}

enum Job {
    Upload {
        id: ResourceId,
        generation: u64,
        bytes: u64,
    },
    Release {
        id: ResourceId,
        bytes: u64,
    },
}

#[derive(Default)]
struct CompletionState {
    completed: Vec<Completion>,
    in_flight: usize,
}

/// The only state shared with the worker thread.
#[derive(Default)]
struct CompletionBox {
    state: Mutex<CompletionState>,
    idle: Condvar,
}

impl CompletionBox {
    fn lock(&self) -> MutexGuard<'_, CompletionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, completion: Completion) {
        let mut state = self.lock();
        state.completed.push(completion);
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

enum Mode {
    Inline,
    Worker {
        sender: Option<Sender<Job>>,
        handle: Option<JoinHandle<()>>,
    },
}

/// Hands transfer decisions to the backend.
///
/// Inline mode runs each transfer on the calling thread. Worker mode runs
/// them in FIFO order on a background thread. Either way the outcome of an
/// upload is only observed through [`TransferQueue::drain_completions`].
pub struct TransferQueue {
    backend: Arc<dyn TransferBackend>,
    completions: Arc<CompletionBox>,
    mode: Mode,
}

impl TransferQueue {
    pub fn inline(backend: Arc<dyn TransferBackend>) -> Self {
        Self {
            backend,
            completions: Arc::new(CompletionBox::default()),
            mode: Mode::Inline,
        }
    }

    /// Spawn a worker thread. Falls back to inline transfers if the thread
    /// cannot be started.
    pub fn background(backend: Arc<dyn TransferBackend>, name: &str) -> Self {
        let completions = Arc::new(CompletionBox::default());
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker_backend = Arc::clone(&backend);
        let worker_completions = Arc::clone(&completions);

        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in receiver {
                    match job {
                        Job::Upload {
                            id,
                            generation,
                            bytes,
                        } => {
                            let result = worker_backend.upload(id, bytes);
                            worker_completions.finish(Completion {
                                id,
                                generation,
                                result,
                            });
                        }
                        Job::Release { id, bytes } => worker_backend.release(id, bytes),
                    }
                }
            });

        match spawned {
            Ok(handle) => Self {
                backend,
                completions,
                mode: Mode::Worker {
                    sender: Some(sender),
                    handle: Some(handle),
                },
            },
            Err(err) => {
                tracing::warn!(%err, "transfer worker failed to start, using inline transfers");
                Self::inline(backend)
            }
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self.mode, Mode::Worker { .. })
    }

    pub fn upload(&self, id: ResourceId, generation: u64, bytes: u64) {
        self.completions.lock().in_flight += 1;
        match &self.mode {
            Mode::Inline => {
                let result = self.backend.upload(id, bytes);
                self.completions.finish(Completion {
                    id,
                    generation,
                    result,
                });
            }
            Mode::Worker { sender, .. } => {
                let job = Job::Upload {
                    id,
                    generation,
                    bytes,
                };
                if !send(sender.as_ref(), job) {
                    self.completions.finish(Completion {
                        id,
                        generation,
                        result: Err(TransferError::WorkerGone),
                    });
                }
            }
        }
    }

    /// Free a resource's device memory. Queued behind any pending upload of
    /// the same resource.
    pub fn release(&self, id: ResourceId, bytes: u64) {
        match &self.mode {
            Mode::Inline => self.backend.release(id, bytes),
            Mode::Worker { sender, .. } => {
                if !send(sender.as_ref(), Job::Release { id, bytes }) {
                    tracing::warn!(%id, "transfer worker gone, releasing inline");
                    self.backend.release(id, bytes);
                }
            }
        }
    }

    /// Take every completion observed so far.
    pub fn drain_completions(&self) -> Vec<Completion> {
        std::mem::take(&mut self.completions.lock().completed)
    }

    /// Uploads issued but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.completions.lock().in_flight
    }

    /// Block until every issued upload has completed.
    pub fn wait_idle(&self) {
        let mut state = self.completions.lock();
        while state.in_flight > 0 {
            state = self
                .completions
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

fn send(sender: Option<&Sender<Job>>, job: Job) -> bool {
    sender.is_some_and(|s| s.send(job).is_ok())
}

impl Drop for TransferQueue {
    fn drop(&mut self) {
        if let Mode::Worker { sender, handle } = &mut self.mode {
            sender.take();
            if let Some(handle) = handle.take() {
                if handle.join().is_err() {
                    tracing::warn!("transfer worker panicked");
                }
            }
        }
    }
}
