use crate::config::Config;
use mongodb::{bson::doc, Client as MongoClient, Database};

pub const FALLBACK_DATABASE: &str = "drive_theory";

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
}

impl AppState {
    /// Picks the configured database, else the one named in the connection
    /// string, else [`FALLBACK_DATABASE`].
    pub fn new(config: Config, mongo_client: MongoClient) -> Self {
        let mongo = match config.mongo_database.as_deref() {
            Some(name) => mongo_client.database(name),
            None => mongo_client
                .default_database()
                .unwrap_or_else(|| mongo_client.database(FALLBACK_DATABASE)),
        };

        tracing::info!("Using MongoDB database '{}'", mongo.name());

        Self { config, mongo }
    }

    /// Round trip to the server. The driver connects lazily, so this is the
    /// first point an unreachable store shows up.
    pub async fn ping(&self) -> mongodb::error::Result<()> {
        self.mongo.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

pub mod coercion;
pub mod command;
pub mod indexes;
pub mod query_service;
