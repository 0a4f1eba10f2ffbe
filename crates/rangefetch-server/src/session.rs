//! One client connection.
//!
//! Inbound frames are routed in arrival order. Replies and download events
//! share one outbound queue drained by a writer task, so everything a
//! session's downloads produce goes to that session only. Closing the
//! connection cancels every download the session started.

use futures_util::{SinkExt, StreamExt};
use rangefetch_core::control::SessionDownloads;
use rangefetch_core::coordinator::EventSink;
use rangefetch_core::protocol::OutboundMessage;
use rangefetch_core::router::{Route, SessionRouter};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub async fn run_session(stream: TcpStream, peer: SocketAddr, router: SessionRouter) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(%peer, "handshake failed: {}", e);
            return;
        }
    };
    tracing::info!(%peer, "session opened");

    let (mut write, mut read) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<OutboundMessage>(router.settings().event_buffer);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let text = match msg.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("cannot encode outbound message: {}", e);
                    continue;
                }
            };
            if write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let mut downloads = SessionDownloads::new();
    while let Some(frame) = read.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(%peer, "read: {}", e);
                break;
            }
        };

        match router.route(&text) {
            Route::Reply(msg) => {
                if out_tx.send(msg).await.is_err() {
                    break;
                }
            }
            Route::Download(request) => {
                tracing::info!(%peer, url = %request.url, "download requested");
                let cancel = downloads.register();
                let sink = EventSink::new(out_tx.clone());
                let coordinator = router.settings().coordinator();
                tokio::spawn(async move {
                    // Errors were already reported to the client and logged.
                    let _ = coordinator.run(request, &sink, cancel).await;
                });
            }
        }
    }

    downloads.cancel_all();
    writer.abort();
    tracing::info!(%peer, "session closed");
}
