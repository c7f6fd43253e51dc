#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tokio::sync::broadcast::error::RecvError;

    use case_schedule::{
        AppConfig, BroadcastNotifier, CaseRepository, HolidayStore, InMemoryRepository,
        ReplanEngine, ScheduleEvent, SharedCalendar, http_api, telemetry,
    };

    let config = AppConfig::from_env()?;
    telemetry::init_tracing(&config.logging.level);

    let addr: SocketAddr = config.http.bind_address.parse()?;
    let calendar = SharedCalendar::new(config.calendar.build_calendar()?);

    let (repository, holidays): (Arc<dyn CaseRepository>, Arc<dyn HolidayStore>) =
        match &config.storage.database_path {
            #[cfg(feature = "sqlite")]
            Some(path) => split(Arc::new(case_schedule::SqliteCaseStore::new(path)?)),
            #[cfg(not(feature = "sqlite"))]
            Some(path) => {
                tracing::warn!(path = %path.display(), "sqlite support not compiled in; using memory storage");
                split(Arc::new(InMemoryRepository::new()))
            }
            None => split(Arc::new(InMemoryRepository::new())),
        };

    // Configured holidays are seeded into storage, then storage becomes the source of truth
    for date in calendar.snapshot().holidays() {
        holidays.add_holiday(date)?;
    }
    let count = calendar.refresh_from(holidays.as_ref())?;
    tracing::info!(holidays = count, "calendar loaded");

    let notifier = Arc::new(BroadcastNotifier::default());
    let mut events = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ScheduleEvent::StepRescheduled {
                    case_id,
                    step_id,
                    old_date,
                    new_date,
                }) => tracing::info!(%case_id, %step_id, %old_date, %new_date, "step rescheduled"),
                Ok(ScheduleEvent::CaseReplanned { case_id }) => {
                    tracing::info!(%case_id, "case replanned")
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification listener lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let engine = ReplanEngine::new(repository, notifier, calendar)
        .with_lock_propagation(config.replan.lock_propagation);
    let state = http_api::AppState::new(Arc::new(engine), holidays);

    tracing::info!(%addr, "case-schedule HTTP API listening");
    http_api::serve(addr, state).await?;
    Ok(())
}

#[cfg(feature = "http_api")]
fn split<S>(
    store: std::sync::Arc<S>,
) -> (
    std::sync::Arc<dyn case_schedule::CaseRepository>,
    std::sync::Arc<dyn case_schedule::HolidayStore>,
)
where
    S: case_schedule::CaseRepository + case_schedule::HolidayStore + 'static,
{
    (store.clone(), store)
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
