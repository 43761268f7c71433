use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::services::ConsentRegistry;

/// 快照写入超时时间（秒）
const FLUSH_TIMEOUT_SECS: u64 = 10;

/// 等待 Ctrl+C，然后写出授权快照
pub async fn listen_for_shutdown(consent: Arc<ConsentRegistry>) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, flushing state...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    flush_state(consent).await;
}

/// 写出授权快照（未配置快照时为空操作）
pub async fn flush_state(consent: Arc<ConsentRegistry>) {
    let task = tokio::task::spawn_blocking(move || consent.persist());

    match timeout(Duration::from_secs(FLUSH_TIMEOUT_SECS), task).await {
        Ok(Ok(Ok(()))) => info!("Consent snapshot flushed"),
        Ok(Ok(Err(e))) => error!("Failed to flush consent snapshot: {}", e),
        Ok(Err(e)) => error!("Consent flush task failed: {}", e),
        Err(_) => error!(
            "Consent snapshot flush timed out after {} seconds",
            FLUSH_TIMEOUT_SECS
        ),
    }
}
