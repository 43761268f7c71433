//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// smsrelay - SMS / MMS / voice dispatch with consent tracking and send quotas
#[derive(Parser)]
#[command(name = "smsrelay")]
#[command(version)]
#[command(about = "Notification dispatch service for SMS, MMS and voice", long_about = None)]
pub struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Validate and normalize a phone number
    Validate {
        /// Phone number, E.164 or national format with phone.default_country_code
        phone: String,

        /// Also query the messaging provider
        #[arg(long)]
        lookup: bool,
    },

    /// Send an SMS through the configured provider
    ///
    /// Consent and quota are enforced just like the HTTP API.
    SendSms {
        /// Recipient phone number
        #[arg(long)]
        to: String,

        /// Message body
        #[arg(long)]
        body: String,

        /// Sender number (default: provider.from_number)
        #[arg(long)]
        from: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the active configuration
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["smsrelay"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_send_sms() {
        let cli = Cli::try_parse_from([
            "smsrelay",
            "--config",
            "relay.toml",
            "send-sms",
            "--to",
            "+14155550123",
            "--body",
            "hi",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("relay.toml"));
        match cli.command {
            Some(Commands::SendSms { to, body, from }) => {
                assert_eq!(to, "+14155550123");
                assert_eq!(body, "hi");
                assert!(from.is_none());
            }
            _ => panic!("expected send-sms"),
        }
    }

    #[test]
    fn test_parse_config_generate() {
        let cli = Cli::try_parse_from(["smsrelay", "config", "generate", "out.toml", "--force"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigCommands::Generate { force: true, .. }
            })
        ));
    }

    #[test]
    fn test_send_sms_requires_body() {
        assert!(Cli::try_parse_from(["smsrelay", "send-sms", "--to", "+14155550123"]).is_err());
    }
}
