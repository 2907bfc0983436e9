//! Bounded pool running many periodically ticked tasks
//!
//! A clock thread owns every task. Once per quantum, or as soon as a
//! [`TaskHandle::wake`] arrives, it ticks all of them in parallel on a rayon
//! pool and drops the ones that report [`Tick::Done`]. Wakes that arrive
//! while a sweep is running are picked up by the next sweep, so none is lost.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Sleep until the next sweep
    Sleep,
    /// Finished; the task is dropped
    Done,
}

/// A unit of work scheduled on the pool
pub trait Task: Send {
    fn tick(&mut self) -> Tick;
}

pub type TaskId = u64;

enum Command {
    Spawn(Box<dyn Task>),
    Wake,
    Close,
}

/// Handle used to interrupt a task's sleep
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    commands: Sender<Command>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Run a sweep now instead of at the next quantum. No-op once the
    /// scheduler is closed.
    pub fn wake(&self) {
        let _ = self.commands.send(Command::Wake);
    }

    /// Handle attached to no scheduler
    #[cfg(test)]
    pub(crate) fn detached(id: TaskId) -> Self {
        let (commands, _) = unbounded();
        Self { id, commands }
    }
}

/// Rayon pool plus the clock thread feeding it
pub struct Scheduler {
    commands: Sender<Command>,
    clock: Option<JoinHandle<()>>,
    next_id: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl Scheduler {
    /// Start a pool of `workers` threads named `{name}-{index}`
    pub fn new(name: &str, workers: usize, quantum: Duration) -> Result<Self> {
        let prefix = name.to_owned();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(move |index| format!("{prefix}-{index}"))
            .build()?;

        let (commands, inbox) = unbounded();
        let live = Arc::new(AtomicUsize::new(0));
        let clock_live = Arc::clone(&live);
        let threads = pool.current_num_threads();
        let clock = thread::Builder::new()
            .name(format!("{name}-clock"))
            .spawn(move || run_clock(&pool, &inbox, quantum, &clock_live))?;

        log::info!(
            "Scheduler '{}' started with {} workers ({:?} quantum)",
            name,
            threads,
            quantum
        );
        Ok(Self {
            commands,
            clock: Some(clock),
            next_id: AtomicU64::new(0),
            live,
        })
    }

    /// Schedule `task`; its first tick comes with the next sweep
    pub fn spawn(&self, task: Box<dyn Task>) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::SeqCst);
        if self.commands.send(Command::Spawn(task)).is_err() {
            self.live.fetch_sub(1, Ordering::SeqCst);
            log::warn!("task {} spawned on a closed scheduler; dropped", id);
        }
        TaskHandle {
            id,
            commands: self.commands.clone(),
        }
    }

    /// Number of tasks not yet finished
    pub fn task_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Run one last sweep right away, keep sweeping every quantum until
    /// every task has finished, then stop the clock and join it.
    ///
    /// Tasks are not cancelled: this blocks until they all return
    /// [`Tick::Done`].
    pub fn close(&mut self) {
        let Some(clock) = self.clock.take() else {
            return;
        };
        let _ = self.commands.send(Command::Close);
        if clock.join().is_err() {
            log::error!("scheduler clock panicked");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_clock(
    pool: &ThreadPool,
    inbox: &Receiver<Command>,
    quantum: Duration,
    live: &AtomicUsize,
) {
    let ticker = tick(quantum);
    let mut tasks: Vec<Box<dyn Task>> = Vec::new();
    let mut closing = false;

    loop {
        let mut sweep = true;
        select! {
            recv(inbox) -> command => match command {
                Ok(Command::Spawn(task)) => {
                    tasks.push(task);
                    sweep = false;
                }
                Ok(Command::Wake) => {}
                Ok(Command::Close) | Err(_) => closing = true,
            },
            recv(ticker) -> _ => {}
        }

        // coalesce whatever else is queued into this sweep
        for command in inbox.try_iter() {
            match command {
                Command::Spawn(task) => tasks.push(task),
                Command::Wake => sweep = true,
                Command::Close => {
                    closing = true;
                    sweep = true;
                }
            }
        }
        if closing {
            sweep = true;
        }

        if sweep && !tasks.is_empty() {
            let done: Vec<bool> = pool.install(|| {
                tasks
                    .par_iter_mut()
                    .map(|task| task.tick() == Tick::Done)
                    .collect()
            });
            let finished = done.iter().filter(|&&d| d).count();
            if finished > 0 {
                let mut done = done.into_iter();
                tasks.retain(|_| !done.next().unwrap_or(false));
                live.fetch_sub(finished, Ordering::SeqCst);
            }
        }

        if closing && tasks.is_empty() {
            break;
        }
    }
    log::debug!("scheduler clock stopped");
}
