use clap::Parser;

use smsrelay::cli::{Cli, Commands};
use smsrelay::config::{StaticConfig, get_config, init_config, set_config};
use smsrelay::runtime::modes;
use smsrelay::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // 配置只加载一次，后续通过 get_config() 读取
    match cli.config {
        Some(ref path) => set_config(StaticConfig::load_from(path)),
        None => init_config(),
    }

    let config = get_config();
    let _log_guard = init_logging(&config.logging)?;

    match cli.command {
        None | Some(Commands::Serve) => modes::run_server().await,
        #[cfg(feature = "cli")]
        Some(command) => modes::run_cli(command).await,
        #[cfg(not(feature = "cli"))]
        Some(_) => anyhow::bail!("this build does not include the cli feature"),
    }
}
