//! CLI mode
//!
//! 一次性命令：号码校验、直接发送短信、配置管理。

use std::path::Path;

use anyhow::{Result, bail};
use colored::Colorize;

use crate::cli::{Commands, ConfigCommands};
use crate::config::{StaticConfig, get_config};
use crate::errors::RelayError;
use crate::runtime::lifetime;
use crate::services::SmsRequest;

const DEFAULT_SAMPLE_PATH: &str = "config.example.toml";

/// Run CLI mode
pub async fn run_cli(command: Commands) -> Result<()> {
    match command {
        Commands::Serve => super::run_server().await,
        Commands::Validate { phone, lookup } => validate(&phone, lookup).await,
        Commands::SendSms { to, body, from } => send_sms(to, body, from).await,
        Commands::Config { action } => config_command(action),
    }
}

fn report(err: RelayError) -> anyhow::Error {
    eprintln!("{}", err.format_colored());
    anyhow::Error::new(err)
}

async fn validate(phone: &str, lookup: bool) -> Result<()> {
    let startup = lifetime::startup::prepare_startup(&get_config())?;
    let result = startup
        .dispatch
        .validate_phone(phone, lookup)
        .await
        .map_err(report)?;

    if result.valid {
        println!(
            "{} {} -> {}",
            "valid".green().bold(),
            result.input,
            result.e164.as_deref().unwrap_or("-")
        );
        if let Some(info) = result.lookup {
            if let Some(line_type) = info.line_type {
                println!("  line type: {}", line_type);
            }
            if let Some(carrier) = info.carrier {
                println!("  carrier:   {}", carrier);
            }
        }
        Ok(())
    } else {
        println!(
            "{} {}: {}",
            "invalid".red().bold(),
            result.input,
            result.error.as_deref().unwrap_or("rejected by provider")
        );
        bail!("phone number is invalid")
    }
}

async fn send_sms(to: String, body: String, from: Option<String>) -> Result<()> {
    let startup = lifetime::startup::prepare_startup(&get_config())?;
    let result = startup
        .dispatch
        .send_sms(SmsRequest { to, body, from })
        .await
        .map_err(report)?;

    println!(
        "{} {} to {} ({})",
        "queued".green().bold(),
        result.receipt.sid,
        result.receipt.to,
        result.receipt.status
    );
    Ok(())
}

fn config_command(action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Generate { output_path, force } => {
            let path = output_path.unwrap_or_else(|| DEFAULT_SAMPLE_PATH.to_string());
            if Path::new(&path).exists() && !force {
                bail!("{} already exists, use --force to overwrite", path);
            }
            StaticConfig::default()
                .save_to_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path, e))?;
            println!("{} sample configuration written to {}", "ok".green().bold(), path);
            Ok(())
        }
        ConfigCommands::Check => {
            lifetime::startup::check_config(&get_config())?;
            println!("{} configuration is valid", "ok".green().bold());
            Ok(())
        }
    }
}
