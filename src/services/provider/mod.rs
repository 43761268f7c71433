//! 消息通道提供商抽象层
//!
//! 统一的发送接口，根据配置选择实现：
//! - sandbox → SandboxProvider（不发起网络请求，记录所有请求）
//! - twilio → TwilioProvider（REST API）

mod sandbox;
mod twilio;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::delivery::DeliveryStatus;
use super::message::{Channel, OutboundCall, OutboundMms, OutboundSms};
use crate::config::{ProviderConfig, ProviderKind};
use crate::errors::Result;
use crate::utils::PhoneNumber;

pub use sandbox::{SandboxProvider, SandboxRequest};
pub use twilio::{TwilioProvider, render_message_twiml, render_say_twiml};

/// 运营商受理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReceipt {
    /// 运营商分配的消息 / 通话 ID
    pub sid: String,
    pub status: DeliveryStatus,
    pub to: String,
    pub channel: Channel,
    /// 运营商计算的分段数（仅短信 / 彩信）
    pub segments: Option<u32>,
}

/// 号码查询结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub phone_number: String,
    pub valid: bool,
    pub country_code: Option<String>,
    pub national_format: Option<String>,
    /// mobile / landline / voip 等
    pub line_type: Option<String>,
    pub carrier: Option<String>,
    pub validation_errors: Vec<String>,
}

/// 消息通道 trait
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_sms(&self, message: &OutboundSms) -> Result<ProviderReceipt>;

    async fn send_mms(&self, message: &OutboundMms) -> Result<ProviderReceipt>;

    async fn place_call(&self, call: &OutboundCall) -> Result<ProviderReceipt>;

    /// 向运营商查询号码信息
    async fn lookup(&self, phone: &PhoneNumber) -> Result<LookupResult>;

    /// 获取 provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 根据配置创建 provider
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn MessagingProvider>> {
    let provider: Arc<dyn MessagingProvider> = match config.kind {
        ProviderKind::Sandbox => Arc::new(SandboxProvider::new()),
        ProviderKind::Twilio => Arc::new(TwilioProvider::new(config)?),
    };
    info!("Messaging provider initialized: {}", provider.name());
    Ok(provider)
}
