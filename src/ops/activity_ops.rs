use crate::model::activity::ActivityLogEntry;

/// Newest-first listing, optionally limited to one actor
pub fn recent<'a>(
    entries: &'a [ActivityLogEntry],
    user: Option<&str>,
    limit: usize,
) -> Vec<&'a ActivityLogEntry> {
    let mut result: Vec<&ActivityLogEntry> = entries
        .iter()
        .filter(|e| user.is_none_or(|u| e.user == u))
        .collect();
    // stable: entries with equal timestamps keep reverse append order
    result.reverse();
    result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    result.truncate(limit);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::activity::ActivityAction;
    use chrono::{Duration, TimeZone, Utc};

    fn entries() -> Vec<ActivityLogEntry> {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        ["ana", "bm", "ana", "ana"]
            .iter()
            .enumerate()
            .map(|(i, u)| ActivityLogEntry {
                timestamp: t0 + Duration::minutes(i as i64),
                user: u.to_string(),
                action: ActivityAction::Updated,
                target: format!("order OS-00{}", i),
                details: String::new(),
            })
            .collect()
    }

    #[test]
    fn newest_first_with_limit() {
        let all = entries();
        let r = recent(&all, None, 2);
        let targets: Vec<_> = r.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["order OS-003", "order OS-002"]);
    }

    #[test]
    fn filter_by_user() {
        let all = entries();
        let r = recent(&all, Some("bm"), 10);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].target, "order OS-001");
    }
}
