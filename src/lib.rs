pub mod agent;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;
pub mod history;
pub mod session;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    args.generation_config().validate()?;

    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Port: {}", args.http_port);
    info!("Default Backend: {}", args.default_backend);
    info!("Default Tone: {}", args.default_tone);
    info!("Default Generation: {:?}", args.generation_config());
    info!("Gemini Key Set: {}", !args.gemini_api_key.is_empty());
    info!("Azure OpenAI Key Set: {}", !args.azure_openai_api_key.is_empty());
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::from_args(&args));
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
