use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::{Config, DelayConfig};
use crate::http::connection::Connection;

pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    serve(listener, Arc::new(cfg.delay.clone())).await
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, delay: Arc<DelayConfig>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let delay = delay.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, delay);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
