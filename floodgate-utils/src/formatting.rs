/// Join post IDs for operator-facing messages (e.g. "abc1, def2, ghi3").
pub fn format_id_list(ids: &[String]) -> String {
    ids.join(", ")
}

/// Format seconds into a compact human-readable duration (e.g. 59s, 1m, 1h, 1d, 1h 30m).
pub fn format_compact_duration(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        return if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        };
    }

    if hours > 0 {
        let mut parts = vec![format!("{}h", hours)];
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 {
            parts.push(format!("{}s", seconds));
        }
        return parts.join(" ");
    }

    if minutes > 0 {
        return if seconds > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}m", minutes)
        };
    }

    format!("{}s", seconds)
}

#[cfg(test)]
mod tests {
    use super::{format_compact_duration, format_id_list};

    #[test]
    fn id_lists_are_comma_separated() {
        let ids = vec!["abc1".to_owned(), "def2".to_owned(), "ghi3".to_owned()];
        assert_eq!(format_id_list(&ids), "abc1, def2, ghi3");
        assert_eq!(format_id_list(&[]), "");
        assert_eq!(format_id_list(&["solo".to_owned()]), "solo");
    }

    #[test]
    fn compact_duration_formatting() {
        assert_eq!(format_compact_duration(59), "59s");
        assert_eq!(format_compact_duration(60), "1m");
        assert_eq!(format_compact_duration(90), "1m 30s");
        assert_eq!(format_compact_duration(3_600), "1h");
        assert_eq!(format_compact_duration(5_400), "1h 30m");
        assert_eq!(format_compact_duration(86_400), "1d");
        assert_eq!(format_compact_duration(90_000), "1d 1h");
    }
}
