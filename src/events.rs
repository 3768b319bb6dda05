use crate::config::ProbeDefinition;
use std::time::Duration;
use uuid::Uuid;

/// Identifies the execution an event belongs to.
#[derive(Clone, Debug)]
pub struct EventContext {
    pub tribe: String,
    pub operation: String,
    pub address: String,
    pub interval: Duration,
    pub correlation_id: Uuid,
}

impl EventContext {
    pub fn for_execution(definition: &ProbeDefinition, correlation_id: Uuid) -> Self {
        Self {
            tribe: definition.identity.tribe.clone(),
            operation: definition.identity.operation.clone(),
            address: definition.address.to_string(),
            interval: definition.interval,
            correlation_id,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeEvent {
    Started,
    Finished {
        status: Option<u16>,
        query: String,
    },
    Failed {
        reason: String,
        status: Option<u16>,
    },
    DependencyWaiting {
        dependency: String,
        attempt: u32,
        max_attempts: u32,
    },
    DependencyUnresolved {
        dependency: String,
        attempts: u32,
    },
    OverlapSkipped {
        in_flight: usize,
    },
}

impl ProbeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProbeEvent::Started => "ProbeStarted",
            ProbeEvent::Finished { .. } => "ProbeFinished",
            ProbeEvent::Failed { .. } => "ProbeFailed",
            ProbeEvent::DependencyWaiting { .. } => "DependencyWaiting",
            ProbeEvent::DependencyUnresolved { .. } => "DependencyUnresolved",
            ProbeEvent::OverlapSkipped { .. } => "ProbeOverlapSkipped",
        }
    }
}

/// Receives probe lifecycle events. Implementations must not block or panic;
/// nothing they do can affect the execution that emitted the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, context: &EventContext, event: &ProbeEvent);
}

/// Writes events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, context: &EventContext, event: &ProbeEvent) {
        let interval = context.interval.as_secs();
        match event {
            ProbeEvent::Started => tracing::info!(
                trace_id = %context.correlation_id,
                ip = %context.address,
                interval,
                tribe = %context.tribe,
                operation = %context.operation,
                "{}",
                event.name()
            ),
            ProbeEvent::Finished { status, query } => tracing::info!(
                trace_id = %context.correlation_id,
                ip = %context.address,
                interval,
                tribe = %context.tribe,
                operation = %context.operation,
                status = ?status,
                query = %query,
                "{}",
                event.name()
            ),
            ProbeEvent::Failed { reason, status } => tracing::error!(
                trace_id = %context.correlation_id,
                ip = %context.address,
                interval,
                tribe = %context.tribe,
                operation = %context.operation,
                status = ?status,
                error = %reason,
                "{}",
                event.name()
            ),
            ProbeEvent::DependencyWaiting {
                dependency,
                attempt,
                max_attempts,
            } => tracing::warn!(
                trace_id = %context.correlation_id,
                ip = %context.address,
                interval,
                tribe = %context.tribe,
                operation = %context.operation,
                "Waiting for dependency {dependency} (retry {attempt}/{max_attempts})"
            ),
            ProbeEvent::DependencyUnresolved {
                dependency,
                attempts,
            } => tracing::error!(
                trace_id = %context.correlation_id,
                ip = %context.address,
                interval,
                tribe = %context.tribe,
                operation = %context.operation,
                "Dependency {dependency} not resolved after {attempts} retries"
            ),
            ProbeEvent::OverlapSkipped { in_flight } => tracing::warn!(
                ip = %context.address,
                interval,
                tribe = %context.tribe,
                operation = %context.operation,
                in_flight,
                "{}",
                event.name()
            ),
        }
    }
}
