pub mod api;
pub mod upstream;

use log::info;
use std::error::Error;
use tokio::net::TcpListener;

use crate::cli::Args;
use crate::config::RelayConfig;
use self::api::AppState;
use self::upstream::UpstreamClient;

pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: String, config: RelayConfig) -> Self {
        Self {
            addr,
            state: AppState { upstream: UpstreamClient::new(config) },
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let config = RelayConfig::from_args(args, std::env::vars())?;
        Ok(Self::new(args.server_addr.clone(), config))
    }

    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("Relay server listening on: http://{}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = api::router(self.state);
        axum::serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}
