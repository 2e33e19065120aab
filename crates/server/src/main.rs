use clap::Parser;
use vocanvas_server::config::{init_tracing, ServerArgs};
use vocanvas_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_tracing(&args.log_level, args.log_json);

    let engine = args.load_engine()?;
    let state = AppState {
        engine,
        public_host: args.public_host.clone(),
    };

    vocanvas_server::serve(args.addr(), state, &args.allow_origins).await
}
