//! Command line for the rangefetch server.

use anyhow::{Context, Result};
use clap::Parser;
use rangefetch_core::config::{self, ServerConfig};
use rangefetch_core::keywords::KeywordTable;
use rangefetch_core::router::SessionRouter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::server;

/// Serves segmented, rate-limited downloads over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "rangefetch")]
#[command(about = "rangefetch: segmented parallel downloader over WebSocket", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/rangefetch/config.toml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Listen address, overrides `listen_addr`.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Ranges per download, overrides `max_threads`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub threads: Option<u32>,

    /// Global speed limit per download in bytes/s (0 = unlimited), overrides `speed_limit`.
    #[arg(long, value_name = "BPS")]
    pub speed_limit: Option<u64>,
}

impl Cli {
    /// Command line flags take precedence over the config file.
    pub fn apply_overrides(&self, cfg: &mut ServerConfig) {
        if let Some(listen) = &self.listen {
            cfg.listen_addr = listen.clone();
        }
        if let Some(threads) = self.threads {
            cfg.max_threads = threads as usize;
        }
        if let Some(limit) = self.speed_limit {
            cfg.speed_limit = limit;
        }
    }

    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_default(cli.config.as_deref());
        cli.apply_overrides(&mut cfg);
        tracing::debug!("loaded config: {:?}", cfg);

        let keywords_path = match &cfg.keywords_path {
            Some(p) => p.clone(),
            None => config::default_keywords_path()?,
        };
        let keywords = KeywordTable::load_or_empty(&keywords_path);
        let router = SessionRouter::new(Arc::new(keywords), Arc::new(cfg.download_settings()));

        let listener = TcpListener::bind(&cfg.listen_addr)
            .await
            .with_context(|| format!("cannot listen on {}", cfg.listen_addr))?;
        server::serve(listener, router).await
    }
}

#[cfg(test)]
mod tests;
