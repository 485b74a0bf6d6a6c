use clap::Parser;
use worker::{query_service_entrypoint_with_config_path, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(about = "Serves segments and query plans over gRPC")]
struct Args {
    /// Path to the YAML config. Environment variables prefixed with
    /// `CHROMA_` override it.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    query_service_entrypoint_with_config_path(&args.config).await;
}
