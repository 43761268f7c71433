//! 出站消息模型与内容校验

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use url::Url;

use crate::errors::{RelayError, Result};
use crate::utils::{PhoneNumber, validate_media_url};

/// 单条短信正文最大字符数（运营商会自动拆分为多段）
pub const MAX_BODY_CHARS: usize = 1600;
/// 单条彩信最多附件数
pub const MAX_MEDIA_URLS: usize = 10;
/// 语音播报文本最大字符数
pub const MAX_SPEECH_CHARS: usize = 4096;

/// 消息通道
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Channel {
    Sms,
    Mms,
    Voice,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct OutboundSms {
    pub to: PhoneNumber,
    pub from: Option<PhoneNumber>,
    pub body: String,
    pub status_callback: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutboundMms {
    pub to: PhoneNumber,
    pub from: Option<PhoneNumber>,
    pub body: Option<String>,
    pub media_urls: Vec<Url>,
    pub status_callback: Option<String>,
}

/// 通话内容：直接播报文本，或由远程 TwiML 文档驱动
#[derive(Debug, Clone, PartialEq)]
pub enum CallContent {
    Say { message: String, voice: String },
    TwimlUrl(Url),
}

#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub to: PhoneNumber,
    pub from: Option<PhoneNumber>,
    pub content: CallContent,
    pub status_callback: Option<String>,
}

/// 校验短信正文，返回去除首尾空白后的内容
pub fn validate_sms_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(RelayError::validation("Message body cannot be empty"));
    }
    let chars = body.chars().count();
    if chars > MAX_BODY_CHARS {
        return Err(RelayError::validation(format!(
            "Message body is {} characters long, at most {} allowed",
            chars, MAX_BODY_CHARS
        )));
    }
    Ok(body.to_string())
}

/// 校验彩信附件和可选正文
pub fn validate_mms_content(
    body: Option<&str>,
    media_urls: &[String],
) -> Result<(Option<String>, Vec<Url>)> {
    if media_urls.is_empty() {
        return Err(RelayError::validation(
            "MMS requires at least one media URL",
        ));
    }
    if media_urls.len() > MAX_MEDIA_URLS {
        return Err(RelayError::validation(format!(
            "MMS supports at most {} media URLs, got {}",
            MAX_MEDIA_URLS,
            media_urls.len()
        )));
    }

    let urls = media_urls
        .iter()
        .map(|raw| {
            validate_media_url(raw)
                .map_err(|e| RelayError::validation(format!("Media URL '{}': {}", raw, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let body = match body.map(str::trim).filter(|b| !b.is_empty()) {
        Some(b) => Some(validate_sms_body(b)?),
        None => None,
    };

    Ok((body, urls))
}

/// 校验通话内容：message 和 twiml_url 必须二选一
pub fn validate_call_content(
    message: Option<&str>,
    twiml_url: Option<&str>,
    voice: &str,
) -> Result<CallContent> {
    let message = message.map(str::trim).filter(|m| !m.is_empty());
    let twiml_url = twiml_url.map(str::trim).filter(|u| !u.is_empty());

    match (message, twiml_url) {
        (Some(_), Some(_)) => Err(RelayError::validation(
            "Provide either message or twiml_url, not both",
        )),
        (None, None) => Err(RelayError::validation(
            "Voice call requires a message or a twiml_url",
        )),
        (Some(message), None) => {
            let chars = message.chars().count();
            if chars > MAX_SPEECH_CHARS {
                return Err(RelayError::validation(format!(
                    "Voice message is {} characters long, at most {} allowed",
                    chars, MAX_SPEECH_CHARS
                )));
            }
            Ok(CallContent::Say {
                message: message.to_string(),
                voice: voice.to_string(),
            })
        }
        (None, Some(url)) => validate_media_url(url)
            .map(CallContent::TwimlUrl)
            .map_err(|e| RelayError::validation(format!("twiml_url: {}", e))),
    }
}

// ============ 分段估算 ============

/// 短信编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Gsm7,
    Ucs2,
}

/// 分段估算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub encoding: Encoding,
    /// 编码单元数（GSM-7 septet 或 UTF-16 code unit）
    pub units: usize,
    pub segments: usize,
}

const GSM7_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";
const GSM7_EXTENDED: &str = "^{}\\[~]|€\u{000C}";

fn gsm7_units(c: char) -> Option<usize> {
    if GSM7_BASIC.contains(c) {
        Some(1)
    } else if GSM7_EXTENDED.contains(c) {
        Some(2)
    } else {
        None
    }
}

/// 估算短信正文会被拆分成几段
///
/// GSM-7：单段 160，多段每段 153；UCS-2：单段 70，多段每段 67
pub fn estimate_segments(body: &str) -> SegmentInfo {
    let gsm_units: Option<usize> = body.chars().map(gsm7_units).sum();

    let (encoding, units, single, multi) = match gsm_units {
        Some(units) => (Encoding::Gsm7, units, 160, 153),
        None => (Encoding::Ucs2, body.encode_utf16().count(), 70, 67),
    };

    let segments = if units == 0 {
        0
    } else if units <= single {
        1
    } else {
        units.div_ceil(multi)
    };

    SegmentInfo {
        encoding,
        units,
        segments,
    }
}
