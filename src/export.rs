//! Writes the configured knowledge base to JSON so its content can be edited
//! or translated and then loaded back through `assistant.knowledge_file`.

use anyhow::{Context, Result};
use std::fs;

use muloqot_assistant::settings::Settings;

fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load()?;
    let knowledge = settings.assistant.load_knowledge()?;

    let path = &settings.export.path;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let json = knowledge.to_json_pretty()?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;

    log::info!(
        "Knowledge base '{}' with {} topics saved to {:?}",
        knowledge.name(),
        knowledge.len(),
        path
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error during export: {:?}", e);
        std::process::exit(1);
    }
}
