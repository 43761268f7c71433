use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::config::{StaticConfig, validate_config};
use crate::services::{
    ConsentRegistry, DeliveryTracker, DispatchOptions, DispatchService, SendQuota, create_provider,
};

pub struct StartupContext {
    pub dispatch: Arc<DispatchService>,
    pub consent: Arc<ConsentRegistry>,
}

/// 校验配置，错误时拒绝启动
pub fn check_config(config: &StaticConfig) -> Result<()> {
    match validate_config(config) {
        Ok(warnings) => {
            for warning in warnings {
                warn!("{}", warning);
            }
            Ok(())
        }
        Err(errors) => bail!("Invalid configuration: {}", errors),
    }
}

fn build_consent_registry(config: &StaticConfig) -> Result<ConsentRegistry> {
    let policy = config.consent.policy;
    match config
        .consent
        .snapshot_path
        .as_deref()
        .filter(|p| !p.is_empty())
    {
        Some(path) => {
            let registry = ConsentRegistry::with_snapshot(policy, path)
                .with_context(|| format!("Failed to load consent snapshot {}", path))?;
            info!(
                "Consent registry loaded {} records from {}",
                registry.len(),
                path
            );
            Ok(registry)
        }
        None => {
            debug!("Consent snapshot disabled, records are kept in memory only");
            Ok(ConsentRegistry::new(policy))
        }
    }
}

/// 根据配置构建 provider、授权表、配额和投递跟踪
pub fn prepare_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    check_config(config)?;

    let provider = create_provider(&config.provider).context("Failed to create messaging provider")?;
    let consent = Arc::new(build_consent_registry(config)?);
    let quota = Arc::new(SendQuota::new(
        config.quota.per_minute,
        config.quota.per_recipient_per_minute,
    ));
    let delivery = Arc::new(DeliveryTracker::new(
        config.delivery.max_records,
        Duration::from_secs(config.delivery.ttl_secs.max(1)),
    ));

    let options = DispatchOptions::from_config(config);
    if options.status_callback_url.is_none() {
        info!("callbacks.public_base_url not set, outbound requests carry no status callback");
    }

    info!(
        "Consent policy: {}, quota: {}/min (per recipient: {})",
        config.consent.policy, config.quota.per_minute, config.quota.per_recipient_per_minute
    );

    let dispatch = Arc::new(DispatchService::new(
        provider,
        consent.clone(),
        quota,
        delivery,
        options,
    ));

    debug!("Pre-startup completed in {:?}", start_time.elapsed());
    Ok(StartupContext { dispatch, consent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn test_prepare_startup_with_defaults() {
        let context = prepare_startup(&StaticConfig::default()).unwrap();
        assert_eq!(context.dispatch.provider_name(), "sandbox");
        assert!(context.consent.is_empty());
    }

    #[test]
    fn test_prepare_startup_rejects_incomplete_twilio() {
        let mut config = StaticConfig::default();
        config.provider.kind = ProviderKind::Twilio;
        assert!(prepare_startup(&config).is_err());
    }

    #[test]
    fn test_prepare_startup_loads_snapshot_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StaticConfig::default();
        config.consent.snapshot_path =
            Some(dir.path().join("consent.json").to_string_lossy().into_owned());

        let context = prepare_startup(&config).unwrap();
        context
            .dispatch
            .update_consent("+14155550123", crate::services::ConsentStatus::OptedIn)
            .unwrap();
        assert!(dir.path().join("consent.json").exists());
    }
}
