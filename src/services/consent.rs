//! 授权（consent）登记表
//!
//! 以 E.164 号码为键的内存表，可选地同步到 JSON 快照文件。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use tracing::{debug, error, info, warn};

use crate::config::ConsentPolicy;
use crate::errors::{RelayError, Result};
use crate::utils::PhoneNumber;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConsentStatus {
    OptedIn,
    OptedOut,
}

/// 授权变更来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsentSource {
    /// 通过 API 更新
    Api,
    /// 用户回复 STOP / START 等关键字
    Keyword,
    /// 运营商拒绝发送（号码已退订）
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub phone: PhoneNumber,
    pub status: ConsentStatus,
    pub source: ConsentSource,
    pub updated_at: DateTime<Utc>,
}

/// 授权检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentDecision {
    pub allowed: bool,
    pub status: Option<ConsentStatus>,
    pub reason: &'static str,
}

/// 入站关键字对应的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordAction {
    OptOut,
    OptIn,
    Help,
}

const OPT_OUT_KEYWORDS: &[&str] = &["STOP", "STOPALL", "UNSUBSCRIBE", "CANCEL", "END", "QUIT"];
const OPT_IN_KEYWORDS: &[&str] = &["START", "YES", "UNSTOP"];
const HELP_KEYWORDS: &[&str] = &["HELP", "INFO"];

/// 识别入站短信中的标准运营商关键字（整条消息忽略大小写匹配）
pub fn parse_keyword(body: &str) -> Option<KeywordAction> {
    let word = body.trim().to_ascii_uppercase();
    if OPT_OUT_KEYWORDS.contains(&word.as_str()) {
        Some(KeywordAction::OptOut)
    } else if OPT_IN_KEYWORDS.contains(&word.as_str()) {
        Some(KeywordAction::OptIn)
    } else if HELP_KEYWORDS.contains(&word.as_str()) {
        Some(KeywordAction::Help)
    } else {
        None
    }
}

pub struct ConsentRegistry {
    records: DashMap<PhoneNumber, ConsentRecord>,
    policy: ConsentPolicy,
    snapshot_path: Option<PathBuf>,
    /// 串行化快照写入，避免并发 rename 覆盖较新的内容
    snapshot_lock: Mutex<()>,
}

impl ConsentRegistry {
    /// 创建纯内存登记表
    pub fn new(policy: ConsentPolicy) -> Self {
        Self {
            records: DashMap::new(),
            policy,
            snapshot_path: None,
            snapshot_lock: Mutex::new(()),
        }
    }

    /// 创建带快照文件的登记表，文件存在时加载已有记录
    pub fn with_snapshot<P: AsRef<Path>>(policy: ConsentPolicy, path: P) -> Result<Self> {
        let mut registry = Self::new(policy);
        let path = path.as_ref().to_path_buf();
        registry.load_snapshot(&path)?;
        registry.snapshot_path = Some(path);
        Ok(registry)
    }

    pub fn policy(&self) -> ConsentPolicy {
        self.policy
    }

    /// 检查号码是否允许发送
    pub fn check(&self, phone: &PhoneNumber) -> ConsentDecision {
        match self.records.get(phone).map(|r| r.status) {
            Some(ConsentStatus::OptedIn) => ConsentDecision {
                allowed: true,
                status: Some(ConsentStatus::OptedIn),
                reason: "recipient opted in",
            },
            Some(ConsentStatus::OptedOut) => ConsentDecision {
                allowed: false,
                status: Some(ConsentStatus::OptedOut),
                reason: "recipient opted out",
            },
            None => match self.policy {
                ConsentPolicy::RequireOptIn => ConsentDecision {
                    allowed: false,
                    status: None,
                    reason: "no consent on record and opt-in is required",
                },
                ConsentPolicy::AllowUnlessOptedOut => ConsentDecision {
                    allowed: true,
                    status: None,
                    reason: "no opt-out on record",
                },
            },
        }
    }

    pub fn get(&self, phone: &PhoneNumber) -> Option<ConsentRecord> {
        self.records.get(phone).map(|r| r.clone())
    }

    /// 更新授权状态；重复设置相同状态只刷新时间戳
    ///
    /// 内存中的记录总会先更新；快照写入失败时返回错误。
    pub fn update(
        &self,
        phone: &PhoneNumber,
        status: ConsentStatus,
        source: ConsentSource,
    ) -> Result<ConsentRecord> {
        let record = ConsentRecord {
            phone: phone.clone(),
            status,
            source,
            updated_at: Utc::now(),
        };

        let previous = self.records.insert(phone.clone(), record.clone());
        match previous {
            Some(prev) if prev.status != status => info!(
                "Consent for {} changed {} -> {} via {}",
                phone.masked(),
                prev.status.as_ref(),
                status.as_ref(),
                source.as_ref()
            ),
            Some(_) => debug!("Consent for {} refreshed ({})", phone.masked(), status.as_ref()),
            None => info!(
                "Consent for {} recorded as {} via {}",
                phone.masked(),
                status.as_ref(),
                source.as_ref()
            ),
        }

        if let Err(e) = self.persist() {
            error!("Failed to write consent snapshot: {}", e);
            return Err(RelayError::file_operation(format!(
                "Consent for {} updated in memory but the snapshot was not written: {}",
                phone.masked(),
                e.message()
            )));
        }

        Ok(record)
    }

    /// 所有记录，按号码排序
    pub fn list(&self) -> Vec<ConsentRecord> {
        let mut records: Vec<ConsentRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.phone.cmp(&b.phone));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 将当前内容写入快照文件（未配置时为空操作）
    pub fn persist(&self) -> Result<()> {
        let Some(ref path) = self.snapshot_path else {
            return Ok(());
        };

        let _guard = self.snapshot_lock.lock();
        let json = serde_json::to_string_pretty(&self.list())?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        // 先写临时文件再 rename，保证快照完整
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn load_snapshot(&mut self, path: &Path) -> Result<()> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Consent snapshot {} not found, starting empty",
                    path.display()
                );
                return Ok(());
            }
            Err(e) => {
                return Err(RelayError::file_operation(format!(
                    "Failed to read consent snapshot {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            warn!("Consent snapshot {} is empty", path.display());
            return Ok(());
        }

        let records: Vec<ConsentRecord> = serde_json::from_str(&content).map_err(|e| {
            RelayError::serialization(format!(
                "Failed to parse consent snapshot {}: {}",
                path.display(),
                e
            ))
        })?;

        for record in records {
            self.records.insert(record.phone.clone(), record);
        }
        info!(
            "Loaded {} consent records from {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }
}
