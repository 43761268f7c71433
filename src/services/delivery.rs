//! 投递状态跟踪
//!
//! 记录每条消息 / 通话的最新状态。运营商回调可能乱序到达，状态只会前进：
//! 排名更低的状态被忽略，终态不再变化。

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use tracing::{debug, trace};

use super::message::Channel;
use super::provider::ProviderReceipt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum DeliveryStatus {
    // 消息状态
    Accepted,
    Scheduled,
    Queued,
    Sending,
    Sent,
    Delivered,
    Undelivered,
    Failed,
    Read,
    Receiving,
    Received,
    Canceled,
    // 通话状态
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    NoAnswer,
}

impl DeliveryStatus {
    /// 状态在生命周期中的先后顺序
    pub fn rank(self) -> u8 {
        match self {
            Self::Accepted | Self::Scheduled => 0,
            Self::Queued => 1,
            Self::Sending | Self::Initiated | Self::Receiving => 2,
            Self::Sent | Self::Ringing => 3,
            Self::InProgress => 4,
            Self::Delivered | Self::Received => 5,
            Self::Read | Self::Completed | Self::Undelivered => 6,
            Self::Failed | Self::Canceled | Self::Busy | Self::NoAnswer => 7,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Read
                | Self::Received
                | Self::Undelivered
                | Self::Failed
                | Self::Canceled
                | Self::Completed
                | Self::Busy
                | Self::NoAnswer
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Undelivered | Self::Failed | Self::Busy | Self::NoAnswer | Self::Canceled
        )
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: DeliveryStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub sid: String,
    pub channel: Option<Channel>,
    pub to: Option<String>,
    pub status: DeliveryStatus,
    pub error_code: Option<String>,
    pub history: Vec<StatusEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 一次状态回调
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub sid: String,
    pub status: DeliveryStatus,
    pub error_code: Option<String>,
    pub to: Option<String>,
}

/// 回调处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// 此前未见过的 SID
    Created,
    Updated,
    /// 乱序或终态之后的回调
    Ignored,
}

pub struct DeliveryTracker {
    records: Cache<String, DeliveryRecord>,
}

impl DeliveryTracker {
    pub fn new(max_records: u64, ttl: Duration) -> Self {
        let records = Cache::builder()
            .max_capacity(max_records)
            .time_to_live(ttl)
            .build();
        Self { records }
    }

    /// 记录提交给运营商的消息
    ///
    /// 回调可能先于提交结果到达；已有记录时只补全 channel / to，
    /// 状态按排名取较新者。
    pub fn record_submission(&self, receipt: &ProviderReceipt) -> DeliveryRecord {
        let now = Utc::now();
        trace!("Tracking {} {} ({})", receipt.channel, receipt.sid, receipt.status);

        self.records
            .entry(receipt.sid.clone())
            .and_upsert_with(|existing| match existing {
                None => DeliveryRecord {
                    sid: receipt.sid.clone(),
                    channel: Some(receipt.channel),
                    to: Some(receipt.to.clone()),
                    status: receipt.status,
                    error_code: None,
                    history: vec![StatusEvent {
                        status: receipt.status,
                        at: now,
                    }],
                    created_at: now,
                    updated_at: now,
                },
                Some(entry) => {
                    let mut record = entry.into_value();
                    record.channel = Some(receipt.channel);
                    if record.to.is_none() {
                        record.to = Some(receipt.to.clone());
                    }
                    if !record.status.is_terminal() && receipt.status.rank() > record.status.rank()
                    {
                        record.status = receipt.status;
                        record.history.push(StatusEvent {
                            status: receipt.status,
                            at: now,
                        });
                        record.updated_at = now;
                    } else {
                        debug!(
                            "{} already at {}, keeping it over submitted {}",
                            receipt.sid, record.status, receipt.status
                        );
                    }
                    record
                }
            })
            .into_value()
    }

    /// 应用状态回调
    pub fn apply(&self, update: StatusUpdate) -> (DeliveryRecord, ApplyOutcome) {
        let mut outcome = ApplyOutcome::Ignored;
        let now = Utc::now();

        let entry = self
            .records
            .entry(update.sid.clone())
            .and_upsert_with(|existing| match existing {
                None => {
                    outcome = ApplyOutcome::Created;
                    DeliveryRecord {
                        sid: update.sid.clone(),
                        channel: None,
                        to: update.to.clone(),
                        status: update.status,
                        error_code: update.error_code.clone(),
                        history: vec![StatusEvent {
                            status: update.status,
                            at: now,
                        }],
                        created_at: now,
                        updated_at: now,
                    }
                }
                Some(entry) => {
                    let mut record = entry.into_value();
                    if record.status.is_terminal()
                        || update.status.rank() < record.status.rank()
                        || update.status == record.status
                    {
                        return record;
                    }
                    outcome = ApplyOutcome::Updated;
                    record.status = update.status;
                    if update.error_code.is_some() {
                        record.error_code = update.error_code.clone();
                    }
                    if record.to.is_none() {
                        record.to = update.to.clone();
                    }
                    record.history.push(StatusEvent {
                        status: update.status,
                        at: now,
                    });
                    record.updated_at = now;
                    record
                }
            });

        let record = entry.into_value();
        match outcome {
            ApplyOutcome::Ignored => debug!(
                "Ignored {} callback for {}, current status is {}",
                update.status, update.sid, record.status
            ),
            _ => debug!("{} is now {}", record.sid, record.status),
        }
        (record, outcome)
    }

    pub fn get(&self, sid: &str) -> Option<DeliveryRecord> {
        self.records.get(sid)
    }

    pub fn len(&self) -> u64 {
        self.records.run_pending_tasks();
        self.records.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
