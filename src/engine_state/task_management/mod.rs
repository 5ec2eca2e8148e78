//! # Task Management System
//!
//! A fixed pool of worker threads that builds chunk meshes and vegetation
//! cells in parallel.
//!
//! ## Architecture Overview
//! - `TaskManager`: owns the workers and distributes tasks round-robin
//! - `Task`: a unit of work that can be executed on any worker
//! - `TaskResult`: what a worker sends back
//! - `TaskChannel`: the sending side of one worker's task queue
//!
//! All workers report into one shared result channel, so the main thread can
//! block on a single receiver until a batch is complete.
//!
//! ## Batch Lifecycle
//! 1. A streaming cache hands every missing cell of one tick to `run_batch()`
//! 2. Tasks are spread across worker channels round-robin
//! 3. Workers process tasks and send results back tagged with their index
//! 4. `run_batch()` returns once every result has arrived, so the cache is
//!    consistent before the tick ends
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(4);
//! let results = task_manager.run_batch(tasks);
//! ```
//!
//! With zero workers every task is processed inline on the calling thread.
//!
//! A task that panics yields no result. The worker survives and still reports
//! back, so a batch never waits on a result that cannot come.

pub mod task;

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use task::{Task, TaskResult};

/// Runs `task`, turning a panic into `None`.
fn process_caught(task: &dyn Task) -> Option<TaskResult> {
    match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
        Ok(result) => Some(result),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("Chunk task panicked: {}", message);
            None
        }
    }
}

/// The main thread's link to one worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `worker`: Handle to the worker thread, joined on drop
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Option<Sender<(usize, Box<dyn Task>)>>,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and collects their results.
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    result_receiver: Receiver<(usize, Option<TaskResult>)>,
    current_channel: usize,
    tasks_processed: u64,
}

impl TaskManager {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. `0` processes
    ///   tasks inline.
    ///
    /// Workers that fail to spawn are logged and skipped; the pool runs with
    /// whatever started, down to inline processing.
    pub fn new(num_workers: usize) -> Self {
        let (result_tx, result_rx) = channel::<(usize, Option<TaskResult>)>();
        let mut channels = Vec::with_capacity(num_workers);

        log::info!(
            "Available parallelism: {:?}, starting {} chunk workers",
            thread::available_parallelism(),
            num_workers
        );

        for worker_idx in 0..num_workers {
            let (task_tx, task_rx) = channel::<(usize, Box<dyn Task>)>();
            let result_tx = result_tx.clone();

            let task_closure = move || {
                while let Ok((slot, task)) = task_rx.recv() {
                    let result = process_caught(task.as_ref());
                    if result_tx.send((slot, result)).is_err() {
                        break;
                    }
                }
            };

            match thread::Builder::new()
                .name(format!("chunk-worker-{worker_idx}"))
                .spawn(task_closure)
            {
                Ok(worker) => channels.push(TaskChannel {
                    task_sender: Some(task_tx),
                    worker: Some(worker),
                }),
                Err(error) => log::error!("Failed to spawn chunk worker {}: {}", worker_idx, error),
            }
        }

        TaskManager {
            channels,
            result_receiver: result_rx,
            current_channel: 0,
            tasks_processed: 0,
        }
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Total tasks completed since creation.
    pub fn tasks_processed(&self) -> u64 {
        self.tasks_processed
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was handed to the worker
    /// - `Err(task)` if the worker has disconnected
    fn try_send_task(
        &self,
        slot: usize,
        task: Box<dyn Task>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task>> {
        match &self.channels[channel_idx].task_sender {
            Some(sender) => sender.send((slot, task)).map_err(|error| error.0 .1),
            None => Err(task),
        }
    }

    /// Runs every task and returns the results in submission order.
    ///
    /// Blocks until all results have arrived. A task whose worker has died is
    /// processed inline instead. Tasks that panic are missing from the output.
    pub fn run_batch(&mut self, tasks: Vec<Box<dyn Task>>) -> Vec<TaskResult> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let mut slots: Vec<Option<TaskResult>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        let mut in_flight = 0usize;

        for (slot, task) in tasks.into_iter().enumerate() {
            let mut pending = Some(task);

            for _ in 0..self.channels.len() {
                let channel_idx = self.current_channel;
                self.current_channel = (self.current_channel + 1) % self.channels.len();

                let Some(task) = pending.take() else { break };
                match self.try_send_task(slot, task, channel_idx) {
                    Ok(()) => {
                        in_flight += 1;
                        break;
                    }
                    Err(task) => {
                        if self.channels[channel_idx].task_sender.take().is_some() {
                            log::warn!("Chunk worker {} disconnected", channel_idx);
                        }
                        pending = Some(task);
                    }
                }
            }

            if let Some(task) = pending {
                slots[slot] = process_caught(task.as_ref());
            }
        }

        while in_flight > 0 {
            match self.result_receiver.recv() {
                Ok((slot, result)) => {
                    slots[slot] = result;
                    in_flight -= 1;
                }
                Err(_) => {
                    log::error!(
                        "All chunk workers disconnected with {} tasks in flight",
                        in_flight
                    );
                    break;
                }
            }
        }

        let results: Vec<TaskResult> = slots.into_iter().flatten().collect();
        self.tasks_processed += results.len() as u64;
        results
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.task_sender.take();
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    log::error!("A chunk worker panicked");
                }
            }
        }
    }
}
