//! API 类型定义

use serde::{Deserialize, Serialize};

use crate::services::{
    Channel, ConsentStatus, DeliveryStatus, MmsRequest, SendResult, SmsRequest, VoiceRequest,
};

/// 统一 JSON 响应
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SendSmsBody {
    pub to: String,
    pub body: String,
    pub from: Option<String>,
}

impl From<SendSmsBody> for SmsRequest {
    fn from(body: SendSmsBody) -> Self {
        SmsRequest {
            to: body.to,
            body: body.body,
            from: body.from,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SendMmsBody {
    pub to: String,
    pub body: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub from: Option<String>,
}

impl From<SendMmsBody> for MmsRequest {
    fn from(body: SendMmsBody) -> Self {
        MmsRequest {
            to: body.to,
            body: body.body,
            media_urls: body.media_urls,
            from: body.from,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PlaceCallBody {
    pub to: String,
    pub message: Option<String>,
    pub twiml_url: Option<String>,
    pub voice: Option<String>,
    pub from: Option<String>,
}

impl From<PlaceCallBody> for VoiceRequest {
    fn from(body: PlaceCallBody) -> Self {
        VoiceRequest {
            to: body.to,
            message: body.message,
            twiml_url: body.twiml_url,
            voice: body.voice,
            from: body.from,
        }
    }
}

/// 发送成功后的响应
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SendResponse {
    pub sid: String,
    pub status: DeliveryStatus,
    pub channel: Channel,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<u32>,
    /// 当前窗口剩余的全局额度，未启用配额时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_remaining: Option<u32>,
}

impl From<SendResult> for SendResponse {
    fn from(result: SendResult) -> Self {
        // 以运营商返回的分段数为准，没有时使用本地估算
        let segments = result
            .receipt
            .segments
            .or_else(|| result.segments.map(|s| s.segments as u32));
        SendResponse {
            sid: result.receipt.sid,
            status: result.receipt.status,
            channel: result.receipt.channel,
            to: result.receipt.to,
            segments,
            quota_remaining: result.quota.remaining,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateConsentBody {
    pub status: ConsentStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ValidatePhoneBody {
    pub phone: String,
    /// 是否向运营商查询号码信息
    #[serde(default)]
    pub lookup: bool,
}

/// 运营商状态回调（application/x-www-form-urlencoded）
///
/// 短信回调携带 MessageSid / MessageStatus，通话回调携带 CallSid / CallStatus。
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCallbackForm {
    pub message_sid: Option<String>,
    pub message_status: Option<String>,
    pub sms_status: Option<String>,
    pub call_sid: Option<String>,
    pub call_status: Option<String>,
    pub error_code: Option<String>,
    pub to: Option<String>,
}

impl StatusCallbackForm {
    pub fn sid(&self) -> Option<&str> {
        self.message_sid.as_deref().or(self.call_sid.as_deref())
    }

    pub fn status(&self) -> Option<&str> {
        self.message_status
            .as_deref()
            .or(self.sms_status.as_deref())
            .or(self.call_status.as_deref())
    }
}

/// 入站短信
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct InboundMessageForm {
    pub from: String,
    #[serde(default)]
    pub body: String,
    pub message_sid: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct CallbackTokenQuery {
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_form_prefers_message_fields() {
        let form: StatusCallbackForm = serde_json::from_value(serde_json::json!({
            "MessageSid": "SM1",
            "MessageStatus": "delivered",
            "SmsStatus": "sent",
            "To": "+14155550123",
        }))
        .unwrap();
        assert_eq!(form.sid(), Some("SM1"));
        assert_eq!(form.status(), Some("delivered"));
        assert_eq!(form.to.as_deref(), Some("+14155550123"));
    }

    #[test]
    fn test_status_form_call_fields() {
        let form: StatusCallbackForm = serde_json::from_value(serde_json::json!({
            "CallSid": "CA1",
            "CallStatus": "no-answer",
            "AccountSid": "AC1",
        }))
        .unwrap();
        assert_eq!(form.sid(), Some("CA1"));
        assert_eq!(form.status(), Some("no-answer"));
    }

    #[test]
    fn test_validate_body_lookup_defaults_false() {
        let body: ValidatePhoneBody = serde_json::from_str(r#"{"phone":"+14155550123"}"#).unwrap();
        assert!(!body.lookup);
    }
}
