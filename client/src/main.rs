use std::sync::Arc;

use httptun_client::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Arc::new(Cli::load()?);
    simple_logger::init_with_level(cli.level_filter().to_level().unwrap_or(log::Level::Info))?;
    httptun_client::client_main(cli).await
}
