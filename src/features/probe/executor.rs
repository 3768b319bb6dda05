use super::engine::Transport;
use crate::common::time::Clock;
use crate::config::{DEFAULT_TIMEOUT_SECS, ProbeDefinition, ProbeSettings};
use crate::events::{EventContext, EventSink, ProbeEvent};
use crate::features::dependency::{DependencyError, DependencyWaiter, WaitPolicy};
use crate::features::results::ResultStore;
use crate::features::template::substitute_request;
use crate::probe::{
    ExecutionOutcome, ProbeError, ProbeErrorKind, ProbeResult, ResolvedRequest, StatusCategory,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecutorSettings {
    pub timeout: Duration,
    pub wait_policy: WaitPolicy,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            wait_policy: WaitPolicy::default(),
        }
    }
}

impl From<&ProbeSettings> for ExecutorSettings {
    fn from(settings: &ProbeSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            wait_policy: WaitPolicy {
                max_attempts: settings.dependency_retries,
                retry_delay: settings.retry_delay(),
            },
        }
    }
}

/// Runs single execution cycles of one probe: waits for its dependencies,
/// templates the request, calls the transport and publishes a success.
pub struct ProbeExecutor {
    store: Arc<ResultStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    settings: ExecutorSettings,
}

impl ProbeExecutor {
    pub fn new(
        store: Arc<ResultStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            events,
            settings,
        }
    }

    pub fn execute(&self, definition: &ProbeDefinition) -> ExecutionOutcome {
        self.execute_with_id(definition, Uuid::new_v4())
    }

    pub fn execute_with_id(
        &self,
        definition: &ProbeDefinition,
        correlation_id: Uuid,
    ) -> ExecutionOutcome {
        let span = tracing::info_span!(
            "probe",
            tribe = %definition.identity.tribe,
            operation = %definition.identity.operation,
            trace_id = %correlation_id,
        );
        let _entered = span.enter();

        let context = EventContext::for_execution(definition, correlation_id);
        self.events.emit(&context, &ProbeEvent::Started);

        let request = match self.resolve_request(definition, &context) {
            Ok(request) => request,
            Err(DependencyError::Unresolved {
                dependency,
                attempts,
            }) => {
                self.events.emit(
                    &context,
                    &ProbeEvent::DependencyUnresolved {
                        dependency: dependency.clone(),
                        attempts,
                    },
                );
                return ExecutionOutcome::Aborted { dependency };
            }
        };

        let response = match self.transport.execute(&request) {
            Ok(response) => response,
            Err(err) => {
                self.events.emit(
                    &context,
                    &ProbeEvent::Failed {
                        reason: err.to_string(),
                        status: None,
                    },
                );
                return ExecutionOutcome::Failed(err);
            }
        };

        if response.category == StatusCategory::Failure {
            let message = match response.status {
                Some(status) => format!("HTTP status {status}"),
                None => "check reported failure".to_string(),
            };
            let err = ProbeError::new(ProbeErrorKind::HttpStatusError, message);
            self.events.emit(
                &context,
                &ProbeEvent::Failed {
                    reason: err.message.clone(),
                    status: response.status,
                },
            );
            return ExecutionOutcome::Failed(err);
        }

        let result = ProbeResult::success(response.body, response.status, self.clock.now());
        self.store.put(definition.identity.key(), result.clone());
        self.events.emit(
            &context,
            &ProbeEvent::Finished {
                status: response.status,
                query: request.encoded_query(),
            },
        );
        ExecutionOutcome::Published(result)
    }

    /// Dependencies are applied in declaration order, each pass working on the
    /// output of the previous one.
    fn resolve_request(
        &self,
        definition: &ProbeDefinition,
        context: &EventContext,
    ) -> Result<ResolvedRequest, DependencyError> {
        let mut request = ResolvedRequest::from_definition(definition, self.settings.timeout);
        let policy = self.settings.wait_policy;
        let waiter = DependencyWaiter::new(&self.store, self.clock.as_ref(), policy);

        for dependency in &definition.dependencies {
            let result = waiter.wait_for(dependency, |attempt| {
                self.events.emit(
                    context,
                    &ProbeEvent::DependencyWaiting {
                        dependency: dependency.clone(),
                        attempt,
                        max_attempts: policy.max_attempts,
                    },
                );
            })?;
            substitute_request(&mut request, dependency, &result.payload);
        }

        Ok(request)
    }
}
