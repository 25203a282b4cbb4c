use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::sync::Arc;

use muloqot_assistant::server::{self, AppState};
use muloqot_assistant::settings::Settings;
use muloqot_assistant::timing::TypingDelay;

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load()?;
    let assistant = &settings.assistant;

    let knowledge = assistant.load_knowledge()?;
    log::info!(
        "Loaded '{}' knowledge base with {} topics",
        knowledge.name(),
        knowledge.len()
    );

    let (min_latency, max_latency) = assistant.latency();
    let state = AppState::new(knowledge, assistant.utc_offset()?)
        .with_delay(Arc::new(TypingDelay::new(min_latency, max_latency, assistant.seed)))
        .with_seed(assistant.seed)
        .with_knowledge_file(assistant.knowledge_file.clone())
        .with_idle_timeout(settings.server.session_idle_timeout());
    let data = web::Data::new(state);

    let sweeper = data.clone();
    let sweep_interval = settings.server.sweep_interval();
    actix_web::rt::spawn(async move {
        let mut ticks = actix_web::rt::time::interval(sweep_interval);
        loop {
            ticks.tick().await;
            sweeper.evict_idle();
        }
    });

    let host = settings.server.host.clone();
    let port = settings.server.port;
    log::info!("Starting server at http://{}:{}", host, port);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(server::configure))
        .bind((host, port))?
        .run()
        .await?;
    Ok(())
}
