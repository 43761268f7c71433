//! Dispatch service
//!
//! 发送流程：规范化号码 → 校验内容 → 授权检查 → 配额 → 调用 provider → 记录投递状态。
//! HTTP handler 和 CLI 共用这一层。

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::consent::{
    ConsentDecision, ConsentRecord, ConsentRegistry, ConsentSource, ConsentStatus,
    KeywordAction, parse_keyword,
};
use super::delivery::{ApplyOutcome, DeliveryRecord, DeliveryStatus, DeliveryTracker, StatusUpdate};
use super::message::{
    Channel, OutboundCall, OutboundMms, OutboundSms, SegmentInfo, estimate_segments,
    validate_call_content, validate_mms_content, validate_sms_body,
};
use super::provider::{LookupResult, MessagingProvider, ProviderReceipt};
use super::quota::{QuotaPermit, QuotaSnapshot, SendQuota};
use crate::config::StaticConfig;
use crate::errors::{RelayError, Result};
use crate::utils::{PhoneNumber, normalize_phone};

/// 运营商错误码：收件人已退订
const UNSUBSCRIBED_ERROR_CODE: &str = "21610";

const OPT_OUT_REPLY: &str =
    "You have been unsubscribed and will receive no further messages. Reply START to resubscribe.";
const OPT_IN_REPLY: &str = "You have been resubscribed. Reply STOP to unsubscribe.";
const HELP_REPLY: &str = "Reply STOP to unsubscribe or START to resubscribe.";

// ============ Request/Response DTOs ============

#[derive(Debug, Clone)]
pub struct SmsRequest {
    pub to: String,
    pub body: String,
    pub from: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MmsRequest {
    pub to: String,
    pub body: Option<String>,
    pub media_urls: Vec<String>,
    pub from: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub to: String,
    /// 播报文本，与 twiml_url 二选一
    pub message: Option<String>,
    pub twiml_url: Option<String>,
    /// 为空时使用 provider.default_voice
    pub voice: Option<String>,
    pub from: Option<String>,
}

/// 发送结果
#[derive(Debug, Clone, Serialize)]
pub struct SendResult {
    pub receipt: ProviderReceipt,
    /// 本地估算的分段信息（仅短信）
    pub segments: Option<SegmentInfo>,
    pub quota: QuotaPermit,
}

/// 号码校验结果
#[derive(Debug, Clone, Serialize)]
pub struct PhoneValidation {
    pub input: String,
    pub valid: bool,
    pub e164: Option<String>,
    pub error: Option<String>,
    /// 仅在请求查询且本地校验通过时存在
    pub lookup: Option<LookupResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsentView {
    pub phone: PhoneNumber,
    pub decision: ConsentDecision,
    pub record: Option<ConsentRecord>,
}

/// 入站短信处理结果
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub from: PhoneNumber,
    pub action: Option<KeywordAction>,
    pub consent: Option<ConsentRecord>,
    /// 需要回复给用户的文本
    pub reply: Option<String>,
}

/// 与配置相关的发送参数
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub default_country_code: Option<String>,
    pub default_voice: String,
    /// 附加到每个出站请求的状态回调地址
    pub status_callback_url: Option<String>,
}

impl DispatchOptions {
    pub fn from_config(config: &StaticConfig) -> Self {
        let status_callback_url = config
            .callbacks
            .public_base_url
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .map(|base| {
                let url = format!("{}/callbacks/status", base.trim_end_matches('/'));
                if config.callbacks.token.is_empty() {
                    url
                } else {
                    format!(
                        "{}?token={}",
                        url,
                        urlencoding::encode(&config.callbacks.token)
                    )
                }
            });

        Self {
            default_country_code: config.phone.default_country_code.clone(),
            default_voice: config.provider.default_voice.clone(),
            status_callback_url,
        }
    }
}

pub struct DispatchService {
    provider: Arc<dyn MessagingProvider>,
    consent: Arc<ConsentRegistry>,
    quota: Arc<SendQuota>,
    delivery: Arc<DeliveryTracker>,
    options: DispatchOptions,
}

impl DispatchService {
    pub fn new(
        provider: Arc<dyn MessagingProvider>,
        consent: Arc<ConsentRegistry>,
        quota: Arc<SendQuota>,
        delivery: Arc<DeliveryTracker>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            provider,
            consent,
            quota,
            delivery,
            options,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn consent_registry(&self) -> &Arc<ConsentRegistry> {
        &self.consent
    }

    /// 距离当前配额窗口结束的秒数
    pub fn retry_after_secs(&self) -> u64 {
        self.quota.seconds_until_reset()
    }

    fn normalize(&self, raw: &str) -> Result<PhoneNumber> {
        Ok(normalize_phone(
            raw,
            self.options.default_country_code.as_deref(),
        )?)
    }

    fn normalize_from(&self, raw: Option<&str>) -> Result<Option<PhoneNumber>> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => normalize_phone(raw, self.options.default_country_code.as_deref())
                .map(Some)
                .map_err(|e| RelayError::invalid_phone(format!("from: {}", e))),
            None => Ok(None),
        }
    }

    /// 授权检查 + 配额，两者都通过才允许发送
    fn authorize(&self, to: &PhoneNumber, channel: Channel) -> Result<QuotaPermit> {
        let decision = self.consent.check(to);
        if !decision.allowed {
            info!(
                "Refusing {} to {}: {}",
                channel,
                to.masked(),
                decision.reason
            );
            return Err(RelayError::consent_required(format!(
                "Recipient {} has no consent: {}",
                to.masked(),
                decision.reason
            )));
        }

        self.quota
            .try_acquire(to)
            .map_err(|e| RelayError::quota_exceeded(e.to_string()))
    }

    /// provider 返回退订错误时同步本地授权状态
    fn on_provider_error(&self, to: &PhoneNumber, channel: Channel, err: RelayError) -> RelayError {
        if let RelayError::ConsentRequired(_) = err
            && let Err(e) = self
                .consent
                .update(to, ConsentStatus::OptedOut, ConsentSource::Provider)
        {
            warn!("Provider opt-out for {} not persisted: {}", to.masked(), e);
        }
        warn!(
            "{} to {} failed via {}: {}",
            channel,
            to.masked(),
            self.provider.name(),
            err
        );
        err
    }

    fn finish(
        &self,
        receipt: ProviderReceipt,
        segments: Option<SegmentInfo>,
        quota: QuotaPermit,
    ) -> SendResult {
        self.delivery.record_submission(&receipt);
        info!(
            "{} {} submitted via {} ({})",
            receipt.channel,
            receipt.sid,
            self.provider.name(),
            receipt.status
        );
        SendResult {
            receipt,
            segments,
            quota,
        }
    }

    pub async fn send_sms(&self, request: SmsRequest) -> Result<SendResult> {
        let to = self.normalize(&request.to)?;
        let from = self.normalize_from(request.from.as_deref())?;
        let body = validate_sms_body(&request.body)?;
        let segments = estimate_segments(&body);

        let permit = self.authorize(&to, Channel::Sms)?;

        let message = OutboundSms {
            to,
            from,
            body,
            status_callback: self.options.status_callback_url.clone(),
        };
        match self.provider.send_sms(&message).await {
            Ok(receipt) => Ok(self.finish(receipt, Some(segments), permit)),
            Err(e) => Err(self.on_provider_error(&message.to, Channel::Sms, e)),
        }
    }

    pub async fn send_mms(&self, request: MmsRequest) -> Result<SendResult> {
        let to = self.normalize(&request.to)?;
        let from = self.normalize_from(request.from.as_deref())?;
        let (body, media_urls) = validate_mms_content(request.body.as_deref(), &request.media_urls)?;

        let permit = self.authorize(&to, Channel::Mms)?;

        let message = OutboundMms {
            to,
            from,
            body,
            media_urls,
            status_callback: self.options.status_callback_url.clone(),
        };
        match self.provider.send_mms(&message).await {
            Ok(receipt) => Ok(self.finish(receipt, None, permit)),
            Err(e) => Err(self.on_provider_error(&message.to, Channel::Mms, e)),
        }
    }

    pub async fn place_call(&self, request: VoiceRequest) -> Result<SendResult> {
        let to = self.normalize(&request.to)?;
        let from = self.normalize_from(request.from.as_deref())?;
        let voice = request
            .voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.options.default_voice);
        let content = validate_call_content(
            request.message.as_deref(),
            request.twiml_url.as_deref(),
            voice,
        )?;

        let permit = self.authorize(&to, Channel::Voice)?;

        let call = OutboundCall {
            to,
            from,
            content,
            status_callback: self.options.status_callback_url.clone(),
        };
        match self.provider.place_call(&call).await {
            Ok(receipt) => Ok(self.finish(receipt, None, permit)),
            Err(e) => Err(self.on_provider_error(&call.to, Channel::Voice, e)),
        }
    }

    /// 校验号码；格式错误不视为失败，返回 valid = false
    pub async fn validate_phone(&self, raw: &str, lookup: bool) -> Result<PhoneValidation> {
        let phone = match self.normalize(raw) {
            Ok(phone) => phone,
            Err(e) => {
                return Ok(PhoneValidation {
                    input: raw.to_string(),
                    valid: false,
                    e164: None,
                    error: Some(e.message().to_string()),
                    lookup: None,
                });
            }
        };

        let lookup = if lookup {
            Some(self.provider.lookup(&phone).await?)
        } else {
            None
        };
        let valid = lookup.as_ref().is_none_or(|l| l.valid);

        Ok(PhoneValidation {
            input: raw.to_string(),
            valid,
            e164: Some(phone.to_string()),
            error: None,
            lookup,
        })
    }

    pub fn check_consent(&self, raw: &str) -> Result<ConsentView> {
        let phone = self.normalize(raw)?;
        Ok(ConsentView {
            decision: self.consent.check(&phone),
            record: self.consent.get(&phone),
            phone,
        })
    }

    pub fn update_consent(&self, raw: &str, status: ConsentStatus) -> Result<ConsentRecord> {
        let phone = self.normalize(raw)?;
        self.consent.update(&phone, status, ConsentSource::Api)
    }

    pub fn list_consent(&self) -> Vec<ConsentRecord> {
        self.consent.list()
    }

    /// 处理入站短信中的 STOP / START / HELP 关键字
    pub fn handle_inbound(&self, from: &str, body: &str) -> Result<InboundOutcome> {
        let from = self.normalize(from)?;
        let action = parse_keyword(body);

        let (consent, reply) = match action {
            Some(KeywordAction::OptOut) => (
                Some(self.consent.update(
                    &from,
                    ConsentStatus::OptedOut,
                    ConsentSource::Keyword,
                )?),
                Some(OPT_OUT_REPLY),
            ),
            Some(KeywordAction::OptIn) => (
                Some(self.consent.update(
                    &from,
                    ConsentStatus::OptedIn,
                    ConsentSource::Keyword,
                )?),
                Some(OPT_IN_REPLY),
            ),
            Some(KeywordAction::Help) => (None, Some(HELP_REPLY)),
            None => (None, None),
        };

        Ok(InboundOutcome {
            from,
            action,
            consent,
            reply: reply.map(str::to_string),
        })
    }

    /// 应用运营商状态回调
    pub fn handle_status_callback(
        &self,
        sid: &str,
        status: &str,
        error_code: Option<&str>,
        to: Option<&str>,
    ) -> Result<(DeliveryRecord, ApplyOutcome)> {
        let sid = sid.trim();
        if sid.is_empty() {
            return Err(RelayError::validation("Callback is missing the resource SID"));
        }
        let status = DeliveryStatus::from_str(status.trim()).map_err(|_| {
            RelayError::validation(format!("Unknown delivery status '{}'", status))
        })?;
        let error_code = error_code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let to = to.and_then(|raw| self.normalize(raw).ok());

        if status.is_failure()
            && error_code.as_deref() == Some(UNSUBSCRIBED_ERROR_CODE)
            && let Some(ref phone) = to
            && let Err(e) = self
                .consent
                .update(phone, ConsentStatus::OptedOut, ConsentSource::Provider)
        {
            warn!("Provider opt-out for {} not persisted: {}", phone.masked(), e);
        }

        Ok(self.delivery.apply(StatusUpdate {
            sid: sid.to_string(),
            status,
            error_code,
            to: to.map(String::from),
        }))
    }

    pub fn message_status(&self, sid: &str) -> Result<DeliveryRecord> {
        self.delivery
            .get(sid)
            .ok_or_else(|| RelayError::not_found(format!("No delivery record for '{}'", sid)))
    }

    pub fn quota_snapshot(&self) -> QuotaSnapshot {
        self.quota.snapshot()
    }
}
