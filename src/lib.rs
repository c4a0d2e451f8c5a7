pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod models;
pub mod render;
pub mod repl;
pub mod server;
pub mod session;
pub mod stream;

use cli::{ Args, Command };
use client::ChatApiClient;
use error::ChatError;
use history::initialize_history_store;
use log::{ error, info, warn };
use server::Server;
use session::ChatSession;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command() {
        Command::Serve => serve(&args).await?,
        Command::Health => {
            let status = api_client(&args)?.health().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Models => {
            for model in api_client(&args)?.list_models().await? {
                println!("{}", model);
            }
        }
        Command::History => {
            let session = open_session(&args).await?;
            print!("{}", history::format_history_for_display(session.history()));
        }
        Command::Export => {
            let doc = open_session(&args).await?.export_document()?;
            let path = export::write_document(&doc, &args.export_dir, chrono::Utc::now()).await?;
            println!("{}", path.display());
        }
        Command::Clear { all } => {
            let mut session = open_session(&args).await?;
            if all {
                session.reset().await;
            } else {
                session.clear().await;
            }
        }
        Command::Ask { question } => {
            let mut session = open_session(&args).await?;
            prepare_model(&mut session, args.model.is_some()).await;
            let renderer = render::renderer_for(args.plain);
            repl::ask(&mut session, &question.join(" "), renderer.as_ref()).await?;
        }
        Command::Chat => {
            let mut session = open_session(&args).await?;
            check_health(&session).await;
            prepare_model(&mut session, args.model.is_some()).await;
            let renderer = render::renderer_for(args.plain);
            repl::run(&mut session, renderer.as_ref(), &args.export_dir).await?;
        }
    }

    Ok(())
}

async fn serve(args: &Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Relay Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Upstream Base URL: {}", args.ai_base_url.as_deref().unwrap_or("(not set)"));
    info!("Fallback Model: {}", args.fallback_model);
    info!("---------------------------");
    Server::from_args(args)?.run().await
}

fn api_client(args: &Args) -> Result<ChatApiClient, ChatError> {
    info!("--- Client Configuration ---");
    info!("Server URL: {}", args.server_url);
    info!("History Store Type: {}", args.history_type);
    info!("History Directory: {}", args.history_dir.display());
    info!("----------------------------");
    ChatApiClient::new(&args.server_url)
}

async fn open_session(args: &Args) -> Result<ChatSession, Box<dyn Error + Send + Sync>> {
    let client = api_client(args)?;
    let store = initialize_history_store(args)?;
    Ok(ChatSession::restore(client, store, args.model.clone()).await)
}

async fn check_health(session: &ChatSession) {
    match session.client().health().await {
        Ok(status) => info!("Server health: {}", status),
        Err(e) => error!("Health check failed: {}", e),
    }
}

/// Aligns the session model with what the server offers. An explicit
/// `--model` is kept as given.
async fn prepare_model(session: &mut ChatSession, explicit: bool) {
    if explicit {
        return;
    }
    match session.client().list_models().await {
        Ok(models) => {
            session.resolve_model(&models).await;
        }
        Err(e) => warn!("Failed to load models: {}", e),
    }
}
