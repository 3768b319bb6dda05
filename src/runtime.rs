use crate::common::time::{Clock, SystemClock};
use crate::config::ProbeDefinition;
use crate::events::{EventContext, EventSink, ProbeEvent};
use crate::features::probe::engine::Transport;
use crate::features::probe::executor::{ExecutorSettings, ProbeExecutor};
use crate::features::results::ResultStore;
use crossbeam_channel::{Receiver, Sender, TryRecvError, select};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Supplies the periodic ticks that drive each probe's timer loop.
pub trait TickSource: Send + Sync {
    fn ticks(&self, interval: Duration) -> Receiver<Instant>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalTicks;

impl TickSource for IntervalTicks {
    fn ticks(&self, interval: Duration) -> Receiver<Instant> {
        crossbeam_channel::tick(interval)
    }
}

/// Process-wide stop signal. Cancelling closes the channel, which every
/// timer loop observes as a disconnect.
#[derive(Clone)]
pub struct Cancellation {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: rx,
        }
    }

    pub fn cancel(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WorkerHandle {
    pub operation: String,
    pub join: Option<JoinHandle<()>>,
}

struct TimerWorker {
    definition: Arc<ProbeDefinition>,
    executor: Arc<ProbeExecutor>,
    events: Arc<dyn EventSink>,
    ticks: Receiver<Instant>,
    cancel: Cancellation,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count when an execution ends, even by panic.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Owns one timer thread per probe. Each tick spawns a detached execution
/// thread, so executions of the same probe may overlap unless the probe sets
/// `max_in_flight`.
pub struct Scheduler {
    store: Arc<ResultStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    ticks: Arc<dyn TickSource>,
    settings: ExecutorSettings,
    cancel: Cancellation,
    workers: Vec<WorkerHandle>,
}

impl Scheduler {
    pub fn new(
        store: Arc<ResultStore>,
        events: Arc<dyn EventSink>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            store,
            events,
            clock: Arc::new(SystemClock),
            ticks: Arc::new(IntervalTicks),
            settings,
            cancel: Cancellation::new(),
            workers: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ticks(mut self, ticks: Arc<dyn TickSource>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Stops every timer loop from scheduling further ticks without waiting
    /// for them to exit.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Starts a timer loop per definition, in the order given. `transport_for`
    /// picks each probe's transport once, here.
    pub fn start<F>(&mut self, definitions: Vec<ProbeDefinition>, mut transport_for: F)
    where
        F: FnMut(&ProbeDefinition) -> Arc<dyn Transport>,
    {
        for definition in definitions {
            let executor = Arc::new(ProbeExecutor::new(
                Arc::clone(&self.store),
                transport_for(&definition),
                Arc::clone(&self.clock),
                Arc::clone(&self.events),
                self.settings,
            ));
            let operation = definition.identity.operation.clone();
            let worker = TimerWorker {
                ticks: self.ticks.ticks(definition.interval),
                definition: Arc::new(definition),
                executor,
                events: Arc::clone(&self.events),
                cancel: self.cancel.clone(),
                in_flight: Arc::new(AtomicUsize::new(0)),
            };

            let join = thread::Builder::new()
                .name(format!("timer-{operation}"))
                .spawn(move || worker.run());
            match join {
                Ok(join) => {
                    tracing::debug!(operation = %operation, "probe timer started");
                    self.workers.push(WorkerHandle {
                        operation,
                        join: Some(join),
                    });
                }
                Err(err) => {
                    tracing::error!(operation = %operation, error = %err, "failed to start probe timer");
                }
            }
        }
    }

    /// Stops every timer loop and waits for them to exit. Executions already
    /// in flight are left to finish on their own.
    pub fn shutdown(mut self) {
        self.cancel.cancel();
        for mut worker in self.workers.drain(..) {
            if let Some(join) = worker.join.take()
                && join.join().is_err()
            {
                tracing::error!(operation = %worker.operation, "probe timer panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl TimerWorker {
    fn run(self) {
        loop {
            select! {
                recv(self.cancel.receiver()) -> _ => break,
                recv(self.ticks) -> tick => {
                    if tick.is_err() || self.cancel.is_cancelled() {
                        break;
                    }
                    self.dispatch();
                }
            }
        }
        tracing::debug!(operation = %self.definition.identity.operation, "probe timer stopped");
    }

    fn dispatch(&self) {
        // only this loop increments, so the check cannot race another start
        let current = self.in_flight.load(Ordering::Acquire);
        if let Some(limit) = self.definition.max_in_flight
            && current >= limit
        {
            let context = EventContext::for_execution(&self.definition, Uuid::new_v4());
            self.events
                .emit(&context, &ProbeEvent::OverlapSkipped { in_flight: current });
            return;
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let definition = Arc::clone(&self.definition);
        let executor = Arc::clone(&self.executor);
        let spawned = thread::Builder::new()
            .name(format!("probe-{}", definition.identity.operation))
            .spawn(move || {
                let _guard = guard;
                executor.execute(&definition);
            });
        if let Err(err) = spawned {
            tracing::error!(
                operation = %self.definition.identity.operation,
                error = %err,
                "failed to spawn probe execution"
            );
        }
    }
}
