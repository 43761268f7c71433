//! Service layer for business logic
//!
//! HTTP handler 与 CLI 共用的业务逻辑。

pub mod consent;
pub mod delivery;
mod dispatch;
pub mod message;
pub mod provider;
pub mod quota;

pub use consent::{ConsentDecision, ConsentRecord, ConsentRegistry, ConsentSource, ConsentStatus};
pub use delivery::{ApplyOutcome, DeliveryRecord, DeliveryStatus, DeliveryTracker};
pub use dispatch::*;
pub use message::Channel;
pub use provider::{MessagingProvider, ProviderReceipt, SandboxProvider, create_provider};
pub use quota::{QuotaSnapshot, SendQuota};
