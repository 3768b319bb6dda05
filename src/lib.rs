mod common;
mod features;

pub mod app;
pub mod config;
pub mod data_model;
pub mod events;
pub mod logging;
pub mod probe;
pub mod runtime;
pub mod settings;

#[cfg(test)]
mod testing;

pub use common::time::{Clock, SystemClock};
pub use features::dependency::{DependencyError, DependencyWaiter, WaitPolicy};
pub use features::probe::engine::{
    HttpTransport, TcpTransport, Transport, TransportSettings, transport_for,
};
pub use features::probe::executor::{ExecutorSettings, ProbeExecutor};
pub use features::results::ResultStore;
pub use features::template;
