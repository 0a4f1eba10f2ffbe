//! Accept loop: one session task per incoming connection.

use anyhow::Result;
use rangefetch_core::router::SessionRouter;
use tokio::net::TcpListener;

use crate::session;

pub async fn serve(listener: TcpListener, router: SessionRouter) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening for WebSocket clients");
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let router = router.clone();
                tokio::spawn(session::run_session(stream, peer, router));
            }
            Err(e) => tracing::debug!("accept: {}", e),
        }
    }
}
