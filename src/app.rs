use crate::config::{AppConfig, ConfigError, ProbeDefinition, load_app_config, load_probe_definitions};
use crate::data_model::settings::AppSettings;
use crate::events::{EventSink, TracingSink};
use crate::features::probe::engine::{TransportSettings, transport_for};
use crate::features::probe::executor::ExecutorSettings;
use crate::features::results::ResultStore;
use crate::logging::{self, LoggingError};
use crate::runtime::Scheduler;
use crate::settings::apply_overrides;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error("failed to install shutdown handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Loads the application config and applies command-line overrides.
pub fn load_config(settings: &AppSettings) -> Result<AppConfig, AppError> {
    let mut config = load_app_config(&settings.config_path)?;
    apply_overrides(settings, &mut config);
    Ok(config)
}

pub fn build_scheduler(
    config: &AppConfig,
    probes: Vec<ProbeDefinition>,
    events: Arc<dyn EventSink>,
) -> Scheduler {
    let transport_settings = TransportSettings {
        max_body_bytes: config.probe.max_body_bytes,
    };
    let mut scheduler = Scheduler::new(
        Arc::new(ResultStore::new()),
        events,
        ExecutorSettings::from(&config.probe),
    );
    scheduler.start(probes, |definition| {
        transport_for(definition.check, &transport_settings)
    });
    scheduler
}

/// One line per probe in start order, as printed by `--validate`.
pub fn validation_summary(probes: &[ProbeDefinition]) -> String {
    let mut out = format!("{} probe(s) configured\n", probes.len());
    for probe in probes {
        let _ = write!(
            out,
            "  [{}] {} {} every {}s -> {}",
            probe.order,
            probe.identity,
            probe.check.label(),
            probe.interval.as_secs_f64(),
            probe.address,
        );
        if !probe.dependencies.is_empty() {
            let _ = write!(out, " (after {})", probe.dependencies.join(", "));
        }
        out.push('\n');
    }
    out
}

pub fn run(settings: AppSettings) -> Result<(), AppError> {
    let config = load_config(&settings)?;
    logging::init(&config.log)?;

    tracing::info!(
        name = %config.app.name,
        version = %config.app.version,
        env = %config.app.env,
        tribe = %config.app.tribe,
        "starting probe agent"
    );

    let probes = load_probe_definitions(&settings.probes_path)?;
    if settings.validate_only {
        print!("{}", validation_summary(&probes));
        return Ok(());
    }

    let events: Arc<dyn EventSink> = Arc::new(TracingSink);
    let scheduler = build_scheduler(&config, probes, events);
    tracing::info!(probes = scheduler.worker_count(), "probes scheduled");

    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    let _ = rx.recv();

    tracing::info!("shutdown signal received, stopping probe timers");
    scheduler.shutdown();
    tracing::info!("shutdown complete");
    Ok(())
}
