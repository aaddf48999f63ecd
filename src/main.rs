//! Followcare service entry point
//!
//! Wires the conversation store, reply generator, scheduler, and webhook
//! server together and runs until the process is stopped.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use followcare_agents::{OpenAiClient, ReplyGenerator, Scheduler, WassengerGateway};
use followcare_api::{ApiServer, EventRouter};
use followcare_core::{AppConfig, ConversationStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!("Starting followcare service");

    let store = Arc::new(ConversationStore::open(&config.database_path)?);

    let completion = Arc::new(OpenAiClient::new(
        config.openai_api_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.request_timeout,
    ));
    let gateway = Arc::new(WassengerGateway::new(
        config.wassenger_api_url.clone(),
        config.wassenger_api_key.clone(),
        config.request_timeout,
    ));
    let generator = Arc::new(ReplyGenerator::new(store.clone(), completion, gateway));

    let scheduler = Scheduler::new(store.clone(), generator.clone(), config.scheduler_interval);
    tokio::spawn(async move { scheduler.run().await });

    let router = Arc::new(EventRouter::new(store, generator, config.clone()));
    let server = ApiServer::new(config.bind_port, router);
    server.start().await
}
