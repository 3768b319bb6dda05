use crate::common::time::Clock;
use crate::config::{CheckKind, ProbeDefinition, ProbeIdentity, RequestTemplate};
use crate::events::{EventContext, EventSink, ProbeEvent};
use crate::features::probe::engine::Transport;
use crate::probe::{ProbeError, ResolvedRequest, StatusCategory, TransportResponse};
use crate::runtime::TickSource;
use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};
use url::Url;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) fn definition(operation: &str, dependencies: &[&str]) -> ProbeDefinition {
    ProbeDefinition {
        identity: ProbeIdentity::new("test", operation),
        address: Url::parse(&format!("http://{operation}.example.com/")).expect("url"),
        interval: Duration::from_secs(1),
        dependencies: dependencies.iter().map(|dep| dep.to_string()).collect(),
        request: RequestTemplate::default(),
        order: 0,
        check: CheckKind::Http,
        max_in_flight: None,
    }
}

type SleepHook = Box<dyn Fn(usize) + Send + Sync>;

/// Clock whose `sleep` returns immediately and only advances virtual time.
pub(crate) struct VirtualClock {
    start: SystemTime,
    sleeps: Mutex<Vec<Duration>>,
    hook: Option<SleepHook>,
}

impl VirtualClock {
    pub(crate) fn new() -> Self {
        Self {
            start: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            sleeps: Mutex::new(Vec::new()),
            hook: None,
        }
    }

    /// `hook` runs after each sleep with the number of sleeps so far.
    pub(crate) fn with_hook(hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::new()
        }
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps").clone()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }

    pub(crate) fn start(&self) -> SystemTime {
        self.start
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> SystemTime {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().expect("sleeps");
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some(hook) = &self.hook {
            hook(count);
        }
    }
}

pub(crate) struct RecordingSink {
    events: Mutex<Vec<(EventContext, ProbeEvent)>>,
    notify_tx: Sender<ProbeEvent>,
    notify_rx: Receiver<ProbeEvent>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
        Self {
            events: Mutex::new(Vec::new()),
            notify_tx,
            notify_rx,
        }
    }

    pub(crate) fn events(&self) -> Vec<ProbeEvent> {
        self.events
            .lock()
            .expect("events")
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub(crate) fn contexts(&self) -> Vec<EventContext> {
        self.events
            .lock()
            .expect("events")
            .iter()
            .map(|(context, _)| context.clone())
            .collect()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(ProbeEvent::name).collect()
    }

    /// Blocks until an event matching `predicate` is emitted or `WAIT` passes.
    pub(crate) fn wait_for(&self, predicate: impl Fn(&ProbeEvent) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.notify_rx.recv_timeout(remaining) {
                Ok(event) if predicate(&event) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, context: &EventContext, event: &ProbeEvent) {
        self.events
            .lock()
            .expect("events")
            .push((context.clone(), event.clone()));
        let _ = self.notify_tx.send(event.clone());
    }
}

/// Transport that replays scripted responses and records every request.
pub(crate) struct StubTransport {
    script: Mutex<VecDeque<Result<TransportResponse, ProbeError>>>,
    fallback: Result<TransportResponse, ProbeError>,
    requests: Mutex<Vec<ResolvedRequest>>,
}

impl StubTransport {
    pub(crate) fn returning(fallback: Result<TransportResponse, ProbeError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ok(body: &str) -> Self {
        Self::returning(Ok(response(200, body)))
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self::returning(Ok(response(status, body)))
    }

    pub(crate) fn then(self, next: Result<TransportResponse, ProbeError>) -> Self {
        self.script.lock().expect("script").push_back(next);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ResolvedRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }
}

impl Transport for StubTransport {
    fn execute(&self, request: &ResolvedRequest) -> Result<TransportResponse, ProbeError> {
        self.requests
            .lock()
            .expect("requests")
            .push(request.clone());
        self.script
            .lock()
            .expect("script")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub(crate) fn response(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        category: StatusCategory::from_http_status(status),
        status: Some(status),
        body: body.to_string(),
    }
}

/// Transport that reports entry and then blocks until released.
pub(crate) struct GatedTransport {
    entered_tx: Sender<String>,
    release_rx: Receiver<()>,
    body: String,
}

impl GatedTransport {
    pub(crate) fn new(body: &str) -> (Self, Receiver<String>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let transport = Self {
            entered_tx,
            release_rx,
            body: body.to_string(),
        };
        (transport, entered_rx, release_tx)
    }
}

impl Transport for GatedTransport {
    fn execute(&self, request: &ResolvedRequest) -> Result<TransportResponse, ProbeError> {
        let _ = self.entered_tx.send(request.identity.operation.clone());
        let _ = self.release_rx.recv_timeout(WAIT);
        Ok(response(200, &self.body))
    }
}

/// Tick source driven by the test instead of wall-clock time.
pub(crate) struct ManualTicks {
    senders: Mutex<Vec<(Duration, Sender<Instant>)>>,
}

impl ManualTicks {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn timers(&self) -> usize {
        self.senders.lock().expect("senders").len()
    }

    pub(crate) fn intervals(&self) -> Vec<Duration> {
        self.senders
            .lock()
            .expect("senders")
            .iter()
            .map(|(interval, _)| *interval)
            .collect()
    }

    /// Fires the timer created `index`-th; false once its loop has stopped.
    pub(crate) fn fire(&self, index: usize) -> bool {
        let senders = self.senders.lock().expect("senders");
        senders
            .get(index)
            .is_some_and(|(_, sender)| sender.send(Instant::now()).is_ok())
    }
}

impl TickSource for ManualTicks {
    fn ticks(&self, interval: Duration) -> Receiver<Instant> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders.lock().expect("senders").push((interval, tx));
        rx
    }
}
