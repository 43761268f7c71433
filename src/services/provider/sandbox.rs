//! 本地沙箱 provider
//!
//! 不发起任何网络请求：每个请求都被记录下来并立即返回 queued 状态，
//! 用于开发环境和测试。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{LookupResult, MessagingProvider, ProviderReceipt};
use crate::errors::{RelayError, Result};
use crate::services::delivery::DeliveryStatus;
use crate::services::message::{
    CallContent, Channel, OutboundCall, OutboundMms, OutboundSms, estimate_segments,
};
use crate::utils::PhoneNumber;

/// 沙箱收到的一次请求
#[derive(Debug, Clone, Serialize)]
pub struct SandboxRequest {
    pub sid: String,
    pub channel: Channel,
    pub to: String,
    pub from: Option<String>,
    /// 短信 / 彩信正文，或语音播报文本
    pub body: Option<String>,
    pub media_urls: Vec<String>,
    pub twiml_url: Option<String>,
    pub status_callback: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SandboxProvider {
    requests: Mutex<Vec<SandboxRequest>>,
    next_failure: Mutex<Option<RelayError>>,
}

impl SandboxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收到的全部请求
    pub fn sent(&self) -> Vec<SandboxRequest> {
        self.requests.lock().clone()
    }

    pub fn clear(&self) {
        self.requests.lock().clear();
    }

    /// 让下一次发送返回指定错误
    pub fn fail_next(&self, error: RelayError) {
        *self.next_failure.lock() = Some(error);
    }

    fn take_failure(&self) -> Result<()> {
        match self.next_failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record(&self, request: SandboxRequest, segments: Option<u32>) -> ProviderReceipt {
        info!(
            "[sandbox] {} {} to {}",
            request.channel,
            request.sid,
            request.to
        );
        let receipt = ProviderReceipt {
            sid: request.sid.clone(),
            status: DeliveryStatus::Queued,
            to: request.to.clone(),
            channel: request.channel,
            segments,
        };
        self.requests.lock().push(request);
        receipt
    }
}

fn new_sid(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

#[async_trait]
impl MessagingProvider for SandboxProvider {
    async fn send_sms(&self, message: &OutboundSms) -> Result<ProviderReceipt> {
        self.take_failure()?;
        let segments = estimate_segments(&message.body).segments as u32;
        let request = SandboxRequest {
            sid: new_sid("SM"),
            channel: Channel::Sms,
            to: message.to.to_string(),
            from: message.from.as_ref().map(|p| p.to_string()),
            body: Some(message.body.clone()),
            media_urls: Vec::new(),
            twiml_url: None,
            status_callback: message.status_callback.clone(),
            received_at: Utc::now(),
        };
        Ok(self.record(request, Some(segments)))
    }

    async fn send_mms(&self, message: &OutboundMms) -> Result<ProviderReceipt> {
        self.take_failure()?;
        let request = SandboxRequest {
            sid: new_sid("MM"),
            channel: Channel::Mms,
            to: message.to.to_string(),
            from: message.from.as_ref().map(|p| p.to_string()),
            body: message.body.clone(),
            media_urls: message.media_urls.iter().map(|u| u.to_string()).collect(),
            twiml_url: None,
            status_callback: message.status_callback.clone(),
            received_at: Utc::now(),
        };
        Ok(self.record(request, Some(1)))
    }

    async fn place_call(&self, call: &OutboundCall) -> Result<ProviderReceipt> {
        self.take_failure()?;
        let (body, twiml_url) = match call.content {
            CallContent::Say { ref message, .. } => (Some(message.clone()), None),
            CallContent::TwimlUrl(ref url) => (None, Some(url.to_string())),
        };
        let request = SandboxRequest {
            sid: new_sid("CA"),
            channel: Channel::Voice,
            to: call.to.to_string(),
            from: call.from.as_ref().map(|p| p.to_string()),
            body,
            media_urls: Vec::new(),
            twiml_url,
            status_callback: call.status_callback.clone(),
            received_at: Utc::now(),
        };
        Ok(self.record(request, None))
    }

    async fn lookup(&self, phone: &PhoneNumber) -> Result<LookupResult> {
        // 号码已经通过本地 E.164 校验，沙箱只回显
        Ok(LookupResult {
            phone_number: phone.to_string(),
            valid: true,
            ..Default::default()
        })
    }

    fn name(&self) -> &'static str {
        "sandbox"
    }
}
