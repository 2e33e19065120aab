//! Runtime settings for the webhook server, from flags with `VOCANVAS_*` env fallbacks.

use anyhow::Context;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vocanvas_engine::{Engine, VoiceConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "vocanvas-server", about = "Webhook for the vocanvas voice + canvas surface")]
pub struct ServerArgs {
    #[arg(long, env = "VOCANVAS_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "VOCANVAS_PORT", default_value_t = 39333)]
    pub port: u16,

    /// Directory of extra response YAML files, merged after the built-in ones.
    #[arg(long, env = "VOCANVAS_RESPONSES")]
    pub responses: Option<PathBuf>,

    /// Overrides the configured upper bound for counting.
    #[arg(long, env = "VOCANVAS_MAX_NUMBER")]
    pub max_number: Option<u32>,

    /// Host name used in the canvas page URL instead of the request's `Host` header.
    #[arg(long, env = "VOCANVAS_PUBLIC_HOST")]
    pub public_host: Option<String>,

    /// Extra CORS origins allowed besides localhost.
    #[arg(long = "allow-origin", env = "VOCANVAS_ALLOW_ORIGINS", value_delimiter = ',')]
    pub allow_origins: Vec<String>,

    /// Log filter, e.g. "info" or "vocanvas_engine=debug,info".
    #[arg(long, env = "VOCANVAS_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "VOCANVAS_LOG_JSON")]
    pub log_json: bool,
}

impl ServerArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn load_engine(&self) -> anyhow::Result<Engine> {
        let mut config = VoiceConfig::load(self.responses.as_deref())?;
        if let Some(max) = self.max_number {
            config = config.with_max_number(max);
        }
        Engine::new(config).context("register environment builders")
    }
}

pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
