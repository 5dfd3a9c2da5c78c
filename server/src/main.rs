use std::sync::Arc;

use httptun_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log_level.to_level().unwrap_or(log::Level::Info))?;
    httptun_server::server_main(config).await
}
