//! 每分钟发送配额
//!
//! 固定窗口计数器，窗口按 UTC 整分钟对齐。全局计数和单号码计数在同一把锁下
//! 检查并递增，被拒绝的请求不消耗任何额度。

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::utils::PhoneNumber;

const WINDOW_SECS: i64 = 60;

/// 触发限制的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    Global,
    Recipient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaExceeded {
    pub scope: QuotaScope,
    pub limit: u32,
    pub retry_after_secs: u64,
}

impl std::fmt::Display for QuotaExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scope = match self.scope {
            QuotaScope::Global => "global",
            QuotaScope::Recipient => "per-recipient",
        };
        write!(
            f,
            "{} send quota of {} per minute exceeded, retry in {}s",
            scope, self.limit, self.retry_after_secs
        )
    }
}

impl std::error::Error for QuotaExceeded {}

/// 成功获取额度后的窗口信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaPermit {
    pub window_start: DateTime<Utc>,
    pub used: u32,
    /// None 表示全局配额未启用
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub window_start: DateTime<Utc>,
    pub used: u32,
    pub limit: u32,
    pub per_recipient_limit: u32,
    pub remaining: Option<u32>,
    pub resets_in_secs: u64,
}

#[derive(Debug, Default)]
struct WindowState {
    window: i64,
    used: u32,
    per_recipient: HashMap<PhoneNumber, u32>,
}

impl WindowState {
    fn roll(&mut self, window: i64) {
        if self.window != window {
            if self.used > 0 {
                trace!(
                    "Quota window {} closed with {} sends",
                    self.window, self.used
                );
            }
            self.window = window;
            self.used = 0;
            self.per_recipient.clear();
        }
    }
}

pub struct SendQuota {
    per_minute: u32,
    per_recipient: u32,
    state: Mutex<WindowState>,
}

fn window_of(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(WINDOW_SECS)
}

fn window_start(window: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(window * WINDOW_SECS, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn seconds_until_reset(now: DateTime<Utc>) -> u64 {
    (WINDOW_SECS - now.timestamp().rem_euclid(WINDOW_SECS)) as u64
}

impl SendQuota {
    /// `per_minute` 为 0 时关闭全局配额，`per_recipient` 为 0 时关闭单号码配额
    pub fn new(per_minute: u32, per_recipient: u32) -> Self {
        Self {
            per_minute,
            per_recipient,
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn try_acquire(&self, recipient: &PhoneNumber) -> Result<QuotaPermit, QuotaExceeded> {
        self.try_acquire_at(recipient, Utc::now())
    }

    pub fn try_acquire_at(
        &self,
        recipient: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<QuotaPermit, QuotaExceeded> {
        let window = window_of(now);
        let mut state = self.state.lock();
        state.roll(window);

        if self.per_minute > 0 && state.used >= self.per_minute {
            debug!("Global send quota exhausted ({}/min)", self.per_minute);
            return Err(QuotaExceeded {
                scope: QuotaScope::Global,
                limit: self.per_minute,
                retry_after_secs: seconds_until_reset(now),
            });
        }

        if self.per_recipient > 0 {
            let sent = state.per_recipient.get(recipient).copied().unwrap_or(0);
            if sent >= self.per_recipient {
                debug!(
                    "Per-recipient send quota exhausted for {} ({}/min)",
                    recipient.masked(),
                    self.per_recipient
                );
                return Err(QuotaExceeded {
                    scope: QuotaScope::Recipient,
                    limit: self.per_recipient,
                    retry_after_secs: seconds_until_reset(now),
                });
            }
            state.per_recipient.insert(recipient.clone(), sent + 1);
        }

        state.used += 1;

        Ok(QuotaPermit {
            window_start: window_start(window),
            used: state.used,
            remaining: (self.per_minute > 0).then(|| self.per_minute - state.used),
        })
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> QuotaSnapshot {
        let window = window_of(now);
        let mut state = self.state.lock();
        state.roll(window);

        QuotaSnapshot {
            window_start: window_start(window),
            used: state.used,
            limit: self.per_minute,
            per_recipient_limit: self.per_recipient,
            remaining: (self.per_minute > 0).then(|| self.per_minute.saturating_sub(state.used)),
            resets_in_secs: seconds_until_reset(now),
        }
    }

    pub fn seconds_until_reset(&self) -> u64 {
        seconds_until_reset(Utc::now())
    }
}
