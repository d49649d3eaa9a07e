//! Mesh worker pool: a fixed set of execution units running a shared kernel
//! off the orchestrating thread.
//!
//! Each unit is an OS thread plus a scratch region of `8 × chunk_size³` words
//! that travels to the thread with a job and comes back with its result. The
//! job queue, unit states and scratch bookkeeping live on the caller's side
//! and are only touched by the thread that owns the pool; units see copied
//! voxel data and hand back freshly owned [`Geometry`].
//!
//! Results are delivered through [`MeshWorkerPool::poll`] in the order units
//! finish, not in submission order. Two jobs for the same chunk may complete
//! out of order when they land on different units; consumers resolve that
//! with their own versioning.
//!
//! There is no backpressure: the queue is unbounded. A unit whose kernel fails
//! to initialize, or whose thread dies, is never restarted, and jobs handed to
//! it never complete.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use sculpt_voxel::NEIGHBORHOOD_LEN;

use crate::geometry::Geometry;
use crate::kernel::{KernelOutput, MeshKernel, MeshKernelError};

/// Identifies one submitted meshing job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

/// A finished job. `geometry` is `None` when the kernel produced no triangles.
#[derive(Debug)]
pub struct MeshCompletion {
    /// The job this result belongs to.
    pub job: JobId,
    /// The produced geometry, if any.
    pub geometry: Option<Geometry>,
}

/// Work sent to a unit thread: the job id plus the unit's own scratch region.
struct UnitJob {
    job: JobId,
    scratch: Box<[u32]>,
}

/// Messages from unit threads back to the pool owner.
enum UnitMessage {
    Ready {
        unit: usize,
    },
    Failed {
        unit: usize,
        error: MeshKernelError,
    },
    Done {
        unit: usize,
        job: JobId,
        scratch: Box<[u32]>,
        geometry: Option<Geometry>,
    },
}

/// Owner-side view of one execution unit.
enum UnitState {
    /// Kernel still initializing; holds the scratch region.
    Starting(Box<[u32]>),
    /// Ready for work; holds the scratch region.
    Idle(Box<[u32]>),
    /// Scratch region is on the unit thread.
    Busy,
    /// Initialization failed or the thread is gone.
    Lost,
}

struct Unit {
    jobs: Option<Sender<UnitJob>>,
    state: UnitState,
}

/// A job waiting for an idle unit, with its neighborhood snapshot.
struct QueuedJob {
    job: JobId,
    snapshot: Box<[u32]>,
}

/// Fixed-size pool of meshing execution units with a FIFO job queue.
pub struct MeshWorkerPool {
    chunk_size: usize,
    stride: usize,
    units: Vec<Unit>,
    queue: VecDeque<QueuedJob>,
    messages: Receiver<UnitMessage>,
    next_job: u64,
    disposed: bool,
}

impl MeshWorkerPool {
    /// Creates a pool with one unit per available CPU (at least one).
    pub fn new<K: MeshKernel + ?Sized>(kernel: Arc<K>, chunk_size: usize) -> Self {
        Self::with_concurrency(kernel, chunk_size, num_cpus::get())
    }

    /// Creates a pool with `concurrency` units (at least one).
    ///
    /// `kernel` is shared by every unit; each unit calls
    /// [`MeshKernel::init`] on its own thread before accepting work.
    pub fn with_concurrency<K: MeshKernel + ?Sized>(
        kernel: Arc<K>,
        chunk_size: usize,
        concurrency: usize,
    ) -> Self {
        let concurrency = concurrency.max(1);
        let stride = chunk_size.pow(3);
        let (message_tx, message_rx) = crossbeam_channel::unbounded();

        let units = (0..concurrency)
            .map(|index| {
                let (job_tx, job_rx) = crossbeam_channel::unbounded();
                let kernel = Arc::clone(&kernel);
                let messages = message_tx.clone();
                // Detached: the thread exits once its job channel closes.
                std::thread::spawn(move || {
                    unit_loop(index, kernel.as_ref(), chunk_size, job_rx, messages)
                });
                Unit {
                    jobs: Some(job_tx),
                    state: UnitState::Starting(
                        vec![0u32; stride * NEIGHBORHOOD_LEN].into_boxed_slice(),
                    ),
                }
            })
            .collect();

        tracing::debug!(concurrency, chunk_size, "mesh worker pool started");

        Self {
            chunk_size,
            stride,
            units,
            queue: VecDeque::new(),
            messages: message_rx,
            next_job: 0,
            disposed: false,
        }
    }

    /// Submits a neighborhood of eight `chunk_size³` buffers in kernel order.
    ///
    /// # Panics
    ///
    /// Panics if any buffer is not exactly `chunk_size³` words long.
    pub fn run(&mut self, chunks: [&[u32]; NEIGHBORHOOD_LEN]) -> JobId {
        self.run_with(|slot, dst| dst.copy_from_slice(chunks[slot]))
    }

    /// Submits a job whose neighborhood is written by `fill`.
    ///
    /// `fill(slot, dst)` is called once per slot `0..8` with that slot's
    /// `chunk_size³` window. If a unit is idle the windows are its scratch
    /// region and the job starts immediately; otherwise they belong to a
    /// snapshot that waits in the queue.
    pub fn run_with<F>(&mut self, fill: F) -> JobId
    where
        F: FnMut(usize, &mut [u32]),
    {
        let job = JobId(self.next_job);
        self.next_job += 1;

        if self.disposed {
            tracing::debug!(job = job.0, "mesh job submitted after dispose, dropped");
            return job;
        }

        if let Some(unit) = self.idle_unit()
            && let UnitState::Idle(mut scratch) =
                std::mem::replace(&mut self.units[unit].state, UnitState::Busy)
        {
            fill_slots(&mut scratch, self.stride, fill);
            self.dispatch(unit, job, scratch);
        } else {
            let mut snapshot = vec![0u32; self.stride * NEIGHBORHOOD_LEN].into_boxed_slice();
            fill_slots(&mut snapshot, self.stride, fill);
            self.queue.push_back(QueuedJob { job, snapshot });
        }
        job
    }

    /// Collects every result delivered since the last call.
    ///
    /// Also marks initialized units ready and hands each freed unit the next
    /// queued job. Never blocks.
    pub fn poll(&mut self) -> Vec<MeshCompletion> {
        let mut completed = Vec::new();
        while let Ok(message) = self.messages.try_recv() {
            self.handle_message(message, &mut completed);
        }
        completed
    }

    /// Like [`poll`](Self::poll), but waits up to `timeout` for the first
    /// unit message when none is pending.
    pub fn wait(&mut self, timeout: Duration) -> Vec<MeshCompletion> {
        let mut completed = Vec::new();
        match self.messages.recv_timeout(timeout) {
            Ok(message) => self.handle_message(message, &mut completed),
            Err(RecvTimeoutError::Timeout) => return completed,
            Err(RecvTimeoutError::Disconnected) => {
                // Every unit has exited; still block for the full timeout.
                std::thread::sleep(timeout);
                return completed;
            }
        }
        completed.extend(self.poll());
        completed
    }

    /// Side length of the chunks this pool meshes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of execution units.
    pub fn concurrency(&self) -> usize {
        self.units.len()
    }

    /// Number of units that finished initializing and are still alive.
    pub fn ready_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.state, UnitState::Idle(_) | UnitState::Busy))
            .count()
    }

    /// Number of units currently running a job.
    pub fn busy_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.state, UnitState::Busy))
            .count()
    }

    /// Number of jobs waiting for a unit.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no job is running or queued.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.busy_count() == 0
    }

    /// Stops every unit and drops queued jobs. Idempotent.
    ///
    /// Jobs still queued or running never complete. Does not wait for a
    /// running kernel call: its unit finishes in the background and exits.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.queue.clear();
        for unit in &mut self.units {
            unit.jobs.take();
            unit.state = UnitState::Lost;
        }
        tracing::debug!("mesh worker pool disposed");
    }

    fn idle_unit(&self) -> Option<usize> {
        self.units
            .iter()
            .position(|u| matches!(u.state, UnitState::Idle(_)))
    }

    fn handle_message(&mut self, message: UnitMessage, completed: &mut Vec<MeshCompletion>) {
        match message {
            UnitMessage::Ready { unit } => {
                let state = std::mem::replace(&mut self.units[unit].state, UnitState::Lost);
                if let UnitState::Starting(scratch) = state {
                    self.units[unit].state = UnitState::Idle(scratch);
                    self.pull_next(unit);
                }
            }
            UnitMessage::Failed { unit, error } => {
                tracing::error!(unit, "mesh unit unavailable: {error}");
                self.units[unit].state = UnitState::Lost;
            }
            UnitMessage::Done {
                unit,
                job,
                scratch,
                geometry,
            } => {
                if self.disposed {
                    return;
                }
                completed.push(MeshCompletion { job, geometry });
                self.units[unit].state = UnitState::Idle(scratch);
                self.pull_next(unit);
            }
        }
    }

    /// Starts the oldest queued job on `unit` if it is idle.
    fn pull_next(&mut self, unit: usize) {
        if !matches!(self.units[unit].state, UnitState::Idle(_)) {
            return;
        }
        let Some(queued) = self.queue.pop_front() else {
            return;
        };
        if let UnitState::Idle(mut scratch) =
            std::mem::replace(&mut self.units[unit].state, UnitState::Busy)
        {
            scratch.copy_from_slice(&queued.snapshot);
            self.dispatch(unit, queued.job, scratch);
        }
    }

    fn dispatch(&mut self, unit: usize, job: JobId, scratch: Box<[u32]>) {
        let sent = self.units[unit]
            .jobs
            .as_ref()
            .is_some_and(|tx| tx.send(UnitJob { job, scratch }).is_ok());
        if !sent {
            tracing::error!(unit, job = job.0, "mesh unit is gone, job dropped");
            self.units[unit].state = UnitState::Lost;
        }
    }
}

impl Drop for MeshWorkerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Writes each of the eight neighborhood slots at its fixed stride.
fn fill_slots<F>(region: &mut [u32], stride: usize, mut fill: F)
where
    F: FnMut(usize, &mut [u32]),
{
    for (slot, window) in region.chunks_exact_mut(stride).enumerate() {
        fill(slot, window);
    }
}

/// Body of one unit thread.
fn unit_loop<K: MeshKernel + ?Sized>(
    unit: usize,
    kernel: &K,
    chunk_size: usize,
    jobs: Receiver<UnitJob>,
    messages: Sender<UnitMessage>,
) {
    if let Err(error) = kernel.init(chunk_size) {
        let _ = messages.send(UnitMessage::Failed { unit, error });
        return;
    }
    if messages.send(UnitMessage::Ready { unit }).is_err() {
        return;
    }

    let mut output = KernelOutput::new();
    while let Ok(UnitJob { job, scratch }) = jobs.recv() {
        output.clear();
        kernel.run(&scratch, chunk_size, &mut output);
        let geometry = output.to_geometry();
        let done = UnitMessage::Done {
            unit,
            job,
            scratch,
            geometry,
        };
        if messages.send(done).is_err() {
            break;
        }
    }
}
