use clap::Parser;
use dotenv::dotenv;
use std::error::Error;
use tokamak_chat::cli::{ Args, Command };

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let args = Args::parse();

    let default_level = if args.debug {
        "debug"
    } else if args.command() == Command::Serve {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    tokamak_chat::run(args).await
}
