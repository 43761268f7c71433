//! Twilio REST API 实现
//!
//! 使用 ureq 同步客户端，在 spawn_blocking 中执行，避免阻塞 actix worker。

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, trace, warn};
use ureq::Agent;

use super::{LookupResult, MessagingProvider, ProviderReceipt};
use crate::config::ProviderConfig;
use crate::errors::{RelayError, Result};
use crate::services::delivery::DeliveryStatus;
use crate::services::message::{CallContent, Channel, OutboundCall, OutboundMms, OutboundSms};
use crate::utils::PhoneNumber;

const API_VERSION: &str = "2010-04-01";

/// 通话状态回调需要的事件
const CALL_STATUS_EVENTS: &[&str] = &["initiated", "ringing", "answered", "completed"];

/// Twilio 错误码：收件人已退订
const ERR_UNSUBSCRIBED_RECIPIENT: u32 = 21610;
/// Twilio 错误码：To 号码无效
const ERR_INVALID_TO_NUMBER: u32 = 21211;
/// Twilio 错误码：鉴权失败
const ERR_AUTHENTICATE: u32 = 20003;
/// Twilio 错误码：请求过多
const ERR_TOO_MANY_REQUESTS: u32 = 20429;

type Form = Vec<(&'static str, String)>;

/// Twilio 资源创建响应（Message / Call 共用字段）
#[derive(Debug, Deserialize)]
struct ResourceResponse {
    sid: String,
    status: Option<String>,
    num_segments: Option<String>,
}

/// Twilio 错误响应
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: Option<u32>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    phone_number: Option<String>,
    valid: Option<bool>,
    country_code: Option<String>,
    national_format: Option<String>,
    #[serde(default)]
    validation_errors: Option<Vec<String>>,
    line_type_intelligence: Option<LineTypeIntelligence>,
}

#[derive(Debug, Deserialize)]
struct LineTypeIntelligence {
    #[serde(rename = "type")]
    line_type: Option<String>,
    carrier_name: Option<String>,
}

pub struct TwilioProvider {
    agent: Agent,
    account_sid: String,
    authorization: String,
    api_base_url: String,
    lookup_base_url: String,
    from_number: Option<String>,
    messaging_service_sid: Option<String>,
}

impl TwilioProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.account_sid.trim().is_empty() || config.auth_token.trim().is_empty() {
            return Err(RelayError::provider_config(
                "Twilio provider requires provider.account_sid and provider.auth_token",
            ));
        }

        let credentials = format!("{}:{}", config.account_sid, config.auth_token);
        let authorization = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            account_sid: config.account_sid.clone(),
            authorization,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            lookup_base_url: config.lookup_base_url.trim_end_matches('/').to_string(),
            from_number: config.from_number.clone(),
            messaging_service_sid: config.messaging_service_sid.clone(),
        })
    }

    fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/{}/Accounts/{}/{}.json",
            self.api_base_url, API_VERSION, self.account_sid, resource
        )
    }

    /// 消息发送方：显式 from > Messaging Service > 默认号码
    fn push_message_sender(&self, form: &mut Form, from: Option<&PhoneNumber>) -> Result<()> {
        if let Some(from) = from {
            form.push(("From", from.to_string()));
        } else if let Some(ref service) = self.messaging_service_sid {
            form.push(("MessagingServiceSid", service.clone()));
        } else if let Some(ref from) = self.from_number {
            form.push(("From", from.clone()));
        } else {
            return Err(RelayError::provider_config(
                "No sender configured: set provider.from_number or provider.messaging_service_sid",
            ));
        }
        Ok(())
    }

    async fn create_resource(
        &self,
        resource: &str,
        form: Form,
        channel: Channel,
        to: &PhoneNumber,
    ) -> Result<ProviderReceipt> {
        let url = self.resource_url(resource);
        let agent = self.agent.clone();
        let authorization = self.authorization.clone();

        trace!("Twilio POST {} ({} fields)", url, form.len());

        let response: ResourceResponse = tokio::task::spawn_blocking(move || {
            post_form_sync(&agent, &url, &authorization, &form)
        })
        .await
        .map_err(|e| RelayError::provider(format!("Twilio request task failed: {}", e)))??;

        let status = response
            .status
            .as_deref()
            .and_then(|s| DeliveryStatus::from_str(s).ok())
            .unwrap_or(DeliveryStatus::Queued);

        debug!(
            "Twilio accepted {} {} to {} with status {}",
            channel,
            response.sid,
            to.masked(),
            status
        );

        Ok(ProviderReceipt {
            sid: response.sid,
            status,
            to: to.to_string(),
            channel,
            segments: response.num_segments.and_then(|s| s.parse().ok()),
        })
    }
}

/// 把 Twilio 错误响应映射为 RelayError
fn map_error(http_status: u16, body: Option<ErrorResponse>) -> RelayError {
    let (code, message) = match body {
        Some(err) => (
            err.code,
            err.message.unwrap_or_else(|| "unknown error".to_string()),
        ),
        None => (None, "unreadable error response".to_string()),
    };

    match code {
        Some(ERR_UNSUBSCRIBED_RECIPIENT) => RelayError::consent_required(format!(
            "Provider rejected recipient as unsubscribed: {}",
            message
        )),
        Some(ERR_INVALID_TO_NUMBER) => RelayError::invalid_phone(message),
        Some(ERR_AUTHENTICATE) => {
            RelayError::provider_config(format!("Provider authentication failed: {}", message))
        }
        Some(ERR_TOO_MANY_REQUESTS) => {
            RelayError::quota_exceeded(format!("Provider rate limit: {}", message))
        }
        Some(code) => RelayError::provider(format!(
            "Twilio error {} (HTTP {}): {}",
            code, http_status, message
        )),
        None => RelayError::provider(format!("Twilio HTTP {}: {}", http_status, message)),
    }
}

fn post_form_sync(
    agent: &Agent,
    url: &str,
    authorization: &str,
    form: &Form,
) -> Result<ResourceResponse> {
    let response = agent
        .post(url)
        .header("Authorization", authorization)
        .header("Accept", "application/json")
        .send_form(form.iter().map(|(k, v)| (*k, v.as_str())))
        .map_err(|e| RelayError::provider(format!("Twilio request to {} failed: {}", url, e)))?;

    let status = response.status();
    if status.is_success() {
        response
            .into_body()
            .read_json::<ResourceResponse>()
            .map_err(|e| RelayError::provider(format!("Invalid Twilio response: {}", e)))
    } else {
        let body = response.into_body().read_json::<ErrorResponse>().ok();
        warn!("Twilio request to {} returned HTTP {}", url, status.as_u16());
        Err(map_error(status.as_u16(), body))
    }
}

fn get_json_sync(agent: &Agent, url: &str, authorization: &str) -> Result<LookupResponse> {
    let response = agent
        .get(url)
        .header("Authorization", authorization)
        .header("Accept", "application/json")
        .call()
        .map_err(|e| RelayError::provider(format!("Twilio lookup {} failed: {}", url, e)))?;

    let status = response.status();
    if status.is_success() {
        response
            .into_body()
            .read_json::<LookupResponse>()
            .map_err(|e| RelayError::provider(format!("Invalid Twilio lookup response: {}", e)))
    } else {
        let body = response.into_body().read_json::<ErrorResponse>().ok();
        Err(map_error(status.as_u16(), body))
    }
}

/// XML 转义
fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// 生成播报文本的 TwiML
pub fn render_say_twiml(message: &str, voice: &str) -> String {
    format!(
        "<Response><Say voice=\"{}\">{}</Say></Response>",
        escape_xml(voice),
        escape_xml(message)
    )
}

/// 生成回复入站短信的 TwiML，没有回复内容时返回空响应
pub fn render_message_twiml(reply: Option<&str>) -> String {
    match reply {
        Some(text) => format!(
            "<Response><Message>{}</Message></Response>",
            escape_xml(text)
        ),
        None => "<Response/>".to_string(),
    }
}

#[async_trait]
impl MessagingProvider for TwilioProvider {
    async fn send_sms(&self, message: &OutboundSms) -> Result<ProviderReceipt> {
        let mut form: Form = vec![("To", message.to.to_string())];
        self.push_message_sender(&mut form, message.from.as_ref())?;
        form.push(("Body", message.body.clone()));
        if let Some(ref callback) = message.status_callback {
            form.push(("StatusCallback", callback.clone()));
        }
        self.create_resource("Messages", form, Channel::Sms, &message.to)
            .await
    }

    async fn send_mms(&self, message: &OutboundMms) -> Result<ProviderReceipt> {
        let mut form: Form = vec![("To", message.to.to_string())];
        self.push_message_sender(&mut form, message.from.as_ref())?;
        if let Some(ref body) = message.body {
            form.push(("Body", body.clone()));
        }
        for url in &message.media_urls {
            form.push(("MediaUrl", url.to_string()));
        }
        if let Some(ref callback) = message.status_callback {
            form.push(("StatusCallback", callback.clone()));
        }
        self.create_resource("Messages", form, Channel::Mms, &message.to)
            .await
    }

    async fn place_call(&self, call: &OutboundCall) -> Result<ProviderReceipt> {
        // 通话不支持 Messaging Service，必须有明确的主叫号码
        let from = call
            .from
            .as_ref()
            .map(|p| p.to_string())
            .or_else(|| self.from_number.clone())
            .ok_or_else(|| {
                RelayError::provider_config("Voice calls require provider.from_number")
            })?;

        let mut form: Form = vec![("To", call.to.to_string()), ("From", from)];
        match call.content {
            CallContent::Say {
                ref message,
                ref voice,
            } => form.push(("Twiml", render_say_twiml(message, voice))),
            CallContent::TwimlUrl(ref url) => form.push(("Url", url.to_string())),
        }
        if let Some(ref callback) = call.status_callback {
            form.push(("StatusCallback", callback.clone()));
            for event in CALL_STATUS_EVENTS {
                form.push(("StatusCallbackEvent", (*event).to_string()));
            }
        }
        self.create_resource("Calls", form, Channel::Voice, &call.to)
            .await
    }

    async fn lookup(&self, phone: &PhoneNumber) -> Result<LookupResult> {
        let url = format!(
            "{}/v2/PhoneNumbers/{}?Fields=line_type_intelligence",
            self.lookup_base_url,
            urlencoding::encode(phone.as_str())
        );
        let agent = self.agent.clone();
        let authorization = self.authorization.clone();

        let response = tokio::task::spawn_blocking(move || {
            get_json_sync(&agent, &url, &authorization)
        })
        .await
        .map_err(|e| RelayError::provider(format!("Twilio lookup task failed: {}", e)))??;

        let (line_type, carrier) = match response.line_type_intelligence {
            Some(info) => (info.line_type, info.carrier_name),
            None => (None, None),
        };

        Ok(LookupResult {
            phone_number: response
                .phone_number
                .unwrap_or_else(|| phone.to_string()),
            valid: response.valid.unwrap_or(false),
            country_code: response.country_code,
            national_format: response.national_format,
            line_type,
            carrier,
            validation_errors: response.validation_errors.unwrap_or_default(),
        })
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
