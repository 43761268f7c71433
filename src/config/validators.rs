//! 启动时配置校验
//!
//! 返回 `Err` 表示配置无法启动服务，`Ok` 中携带需要记录的警告。

use super::{ProviderKind, StaticConfig};
use crate::utils::{normalize_phone, validate_media_url};

pub fn validate_config(config: &StaticConfig) -> Result<Vec<String>, String> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let provider = &config.provider;
    if provider.kind == ProviderKind::Twilio {
        if provider.account_sid.trim().is_empty() {
            errors.push("provider.account_sid is required for the twilio provider".to_string());
        }
        if provider.auth_token.trim().is_empty() {
            errors.push("provider.auth_token is required for the twilio provider".to_string());
        }
        if provider.from_number.is_none() && provider.messaging_service_sid.is_none() {
            errors.push(
                "either provider.from_number or provider.messaging_service_sid must be set"
                    .to_string(),
            );
        }
        if provider.timeout_secs == 0 {
            errors.push("provider.timeout_secs must be greater than 0".to_string());
        }
    }

    if let Some(ref from) = provider.from_number
        && let Err(e) = normalize_phone(from, None)
    {
        errors.push(format!("provider.from_number is invalid: {}", e));
    }

    if let Some(ref cc) = config.phone.default_country_code {
        let digits = cc.trim().trim_start_matches('+');
        if digits.is_empty()
            || digits.len() > 3
            || !digits.chars().all(|c| c.is_ascii_digit())
            || digits.starts_with('0')
        {
            errors.push(format!(
                "phone.default_country_code '{}' must be 1-3 digits without a leading 0",
                cc
            ));
        }
    }

    if let Some(ref base) = config.callbacks.public_base_url
        && let Err(e) = validate_media_url(base)
    {
        errors.push(format!("callbacks.public_base_url is invalid: {}", e));
    }

    if config.api.token.is_empty() {
        warnings.push("api.token is empty, the /api scope is disabled".to_string());
    }
    if config.callbacks.token.is_empty() {
        warnings.push(
            "callbacks.token is empty, provider callbacks are accepted without verification"
                .to_string(),
        );
    }
    if config.api.requests_per_second == 0 {
        errors.push("api.requests_per_second must be greater than 0".to_string());
    }
    if config.api.burst == 0 {
        errors.push("api.burst must be greater than 0".to_string());
    }

    let quota = &config.quota;
    if quota.per_minute == 0 {
        warnings.push("quota.per_minute is 0, the global send quota is disabled".to_string());
    } else if quota.per_recipient_per_minute > quota.per_minute {
        warnings.push(format!(
            "quota.per_recipient_per_minute ({}) exceeds quota.per_minute ({})",
            quota.per_recipient_per_minute, quota.per_minute
        ));
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(errors.join("; "))
    }
}
