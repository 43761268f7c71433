pub mod media_url;
pub mod phone;

pub use media_url::{MediaUrlError, validate_media_url};
pub use phone::{PhoneNumber, PhoneValidationError, normalize_phone};

use chrono::{DateTime, Utc};

/// 格式化时间间隔为人类可读格式，如 "2d 3h 4m 5s"
pub fn format_duration_human(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let total = (end - start).num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_duration_human() {
        let start = Utc::now();
        assert_eq!(format_duration_human(start, start), "0s");
        assert_eq!(
            format_duration_human(start, start + Duration::seconds(3_725)),
            "1h 2m 5s"
        );
        assert_eq!(
            format_duration_human(start, start + Duration::days(2)),
            "2d"
        );
        // 时钟回拨时不出现负数
        assert_eq!(
            format_duration_human(start, start - Duration::seconds(10)),
            "0s"
        );
    }
}
