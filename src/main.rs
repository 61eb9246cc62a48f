use eduquest_engine::{app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().validated()?;
    let (state, worker) = AppState::new(config).await?;
    state.db.health_check().await?;
    log::info!(
        "EduQuest reward engine ready on database '{}'",
        state.db.db_name()
    );

    let worker_handle = worker.spawn();
    let sweeper = state.expiry_sweeper();
    let sweeper_handle = tokio::spawn(async move { sweeper.run().await });

    tokio::signal::ctrl_c().await?;
    log::info!("Shutdown requested, draining the task queue");

    sweeper_handle.abort();
    let _ = sweeper_handle.await;

    // The worker stops once the last queue sender is gone.
    drop(state);
    worker_handle.await?;
    log::info!("Task queue drained");
    Ok(())
}
