//! QueueBuddy
//!
//! Main application entry point: loads settings, opens the entity store and
//! feeds weekly reopen slots into it until interrupted

use std::sync::Arc;
use anyhow::Context;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use QueueBuddy::{
    config::{settings::DEV_USER_IDS_ENV, Settings},
    services::{ManualTriggers, ReopenEvent, WeeklyReopenScheduler},
    store::{EntityStore, LoadReport, StoreOptions},
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Settings::new().context("Failed to load settings")?;
    settings.validate()?;

    if std::env::args().any(|arg| arg == "--print-config") {
        println!("{}", settings.to_toml()?);
        return Ok(());
    }

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", QueueBuddy::info());

    if let Some(raw) = &settings.access.rejected_dev_user_ids {
        error!(
            value = %raw,
            "Invalid {} format. Expected comma-separated integers; no dev users are in effect",
            DEV_USER_IDS_ENV
        );
    }

    let options = StoreOptions::from_settings(&settings)?;
    let offset = options.offset;

    if !settings.scheduler.enabled {
        warn!("Weekly reopening disabled, registration only opens on demand");
        let (store, report) = EntityStore::open(options, Arc::new(ManualTriggers::new()))
            .context("Failed to open entity store")?;
        log_load_report(&report);
        let _store = Arc::new(store);

        tokio::signal::ctrl_c().await?;
        info!("QueueBuddy has been shut down.");
        return Ok(());
    }

    let (scheduler, mut events) = WeeklyReopenScheduler::new(offset, Handle::current());
    let scheduler = Arc::new(scheduler);
    let (store, report) = EntityStore::open(options, scheduler.clone()).context("Failed to open entity store")?;
    log_load_report(&report);
    let store = Arc::new(store);

    info!(jobs = scheduler.job_keys().len(), "QueueBuddy is ready!");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => handle_reopen(&store, event),
                None => {
                    warn!("Reopen event channel closed");
                    break;
                }
            },
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    scheduler.shutdown().await;
    info!("QueueBuddy has been shut down.");
    Ok(())
}

fn handle_reopen(store: &EntityStore, event: ReopenEvent) {
    match store.on_scheduled_reopen(event.group_id, &event.course_id) {
        Ok(true) => info!(
            group_id = event.group_id,
            course_id = %event.course_id,
            fired_at = %event.fired_at,
            "Scheduled reopening applied"
        ),
        Ok(false) => {}
        Err(e) => error!(
            group_id = event.group_id,
            course_id = %event.course_id,
            error = %e,
            severity = %e.severity(),
            "Scheduled reopening failed"
        ),
    }
}

fn log_load_report(report: &LoadReport) {
    if report.discarded_runtime {
        warn!("Runtime document was unreadable; queues restarted empty and registration closed");
    }
    if report.migrated_config || report.migrated_runtime {
        info!(
            config = report.migrated_config,
            runtime = report.migrated_runtime,
            "Legacy documents migrated"
        );
    }
    if !report.repairs.is_clean() {
        warn!(
            skipped_keys = ?report.repairs.skipped_keys,
            renumbered_queues = report.repairs.renumbered_queues,
            dropped_orphans = report.repairs.dropped_orphans,
            deduplicated = report.repairs.deduplicated,
            merged_queues = report.repairs.merged_queues,
            dropped_duplicate_names = report.repairs.dropped_duplicate_names,
            "Persisted documents were repaired on load"
        );
    }
}
