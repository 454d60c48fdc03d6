//! Saga node: runs the coordinator or one participant against PostgreSQL and
//! Redis, with structured logging and Prometheus metrics.

pub mod config;
pub mod error;
pub mod roles;
pub mod scheduler;
pub mod telemetry;

use channel::RedisBroker;
use participants::{ParticipantService, PostgresParticipantRepository};
use saga::PostgresSagaStore;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;

pub use config::{Config, LogFormat, PolicyMode, Role};
pub use error::{NodeError, Result};
pub use roles::{LoopSettings, spawn_coordinator, spawn_participant};
pub use scheduler::PeriodicTask;

/// Connects to the backends, runs migrations and drives the configured role
/// until `shutdown` fires.
pub async fn run(config: Config, shutdown: broadcast::Sender<()>) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let broker = RedisBroker::connect(&config.redis_url).await?;
    let settings = LoopSettings::from(&config);

    let handles = match config.role {
        Role::Coordinator => {
            let store = PostgresSagaStore::new(pool);
            store.run_migrations().await?;
            vec![spawn_coordinator(store, broker, &settings, &shutdown)]
        }
        Role::Participant(participant) => {
            let repository = PostgresParticipantRepository::new(pool, participant);
            repository.run_migrations().await?;
            let service = ParticipantService::new(repository, config.policy.build());
            spawn_participant(service, broker, &settings, &shutdown)
        }
    };

    tracing::info!(role = %config.role, consumer = %settings.consumer_name, "node running");

    for handle in handles {
        handle.await?;
    }
    Ok(())
}
