use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::protocol::types::{Mail, MailData, Value};

// Upstream field names are not known for sure, so each canonical field tries several keys.
const ID_KEYS: [&str; 3] = ["id", "mailId", "messageId"];
const TIMESTAMP_KEYS: [&str; 4] = ["timestamp", "time", "date", "sentTime"];
const SENDER_KEYS: [&str; 3] = ["sender", "from", "senderName"];
const SUBJECT_KEYS: [&str; 2] = ["subject", "title"];
const CONTENT_KEYS: [&str; 4] = ["content", "message", "body", "text"];
const ATTACHMENT_KEYS: [&str; 3] = ["attachments", "items", "rewards"];

const DEFAULT_SENDER: &str = "Unknown";
const DEFAULT_SUBJECT: &str = "No Subject";

static NEXT_MAIL_SEQ: AtomicU64 = AtomicU64::new(1);

/// Maps a loosely typed field bag onto a `Mail`.
///
/// Returns `None` when neither a subject nor any content could be resolved.
pub fn normalize(data: &MailData) -> Option<Mail> {
    normalize_at(data, Utc::now())
}

/// Same as [`normalize`], with `now` used for the timestamp fallback and generated ids.
pub fn normalize_at(data: &MailData, now: DateTime<Utc>) -> Option<Mail> {
    let subject = extract_text(data, &SUBJECT_KEYS);
    let content = extract_text(data, &CONTENT_KEYS).unwrap_or_default();

    if content.is_empty() && subject.is_none() {
        log::debug!("[Normalizer] Dropping mail without subject or content ({} fields)", data.len());
        return None;
    }

    Some(Mail {
        id: extract_text(data, &ID_KEYS).unwrap_or_else(|| generate_id(now)),
        timestamp: extract_timestamp(data).unwrap_or(now),
        sender: extract_text(data, &SENDER_KEYS).unwrap_or_else(|| DEFAULT_SENDER.to_string()),
        subject: subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        content,
        attachments: extract_attachments(data),
    })
}

fn extract_text(data: &MailData, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| data.get(*key))
        .filter(|value| value.is_present())
        .find_map(Value::as_text)
}

fn extract_timestamp(data: &MailData) -> Option<DateTime<Utc>> {
    TIMESTAMP_KEYS
        .iter()
        .filter_map(|key| data.get(*key))
        .filter(|value| value.is_present())
        .find_map(parse_timestamp)
}

fn extract_attachments(data: &MailData) -> Option<Vec<Value>> {
    ATTACHMENT_KEYS.iter().find_map(|key| match data.get(*key) {
        Some(Value::List(items)) => Some(items.clone()),
        _ => None,
    })
}

/// Strings are tried as RFC 3339, then `YYYY-MM-DD HH:MM:SS`, then `YYYY-MM-DD`;
/// numbers (and numeric strings) are Unix milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Int(ms) => DateTime::from_timestamp_millis(*ms),
        Value::Long(text) | Value::Str(text) => parse_timestamp_text(text.trim()),
        _ => None,
    }
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    text.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}

/// `mail_<unix ms>_<seq><random>`; the sequence keeps ids unique within the process.
fn generate_id(now: DateTime<Utc>) -> String {
    let seq = NEXT_MAIL_SEQ.fetch_add(1, Ordering::Relaxed);
    let random = Uuid::new_v4().simple().to_string();
    format!("mail_{}_{}{}", now.timestamp_millis(), seq, &random[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn bag(entries: &[(&str, Value)]) -> MailData {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_empty_input_is_dropped() {
        assert!(normalize(&MailData::new()).is_none());
    }

    #[test]
    fn test_subject_only_gets_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mail = normalize_at(&bag(&[("subject", Value::Str("Hello".into()))]), now).unwrap();

        assert_eq!(mail.subject, "Hello");
        assert_eq!(mail.content, "");
        assert_eq!(mail.sender, "Unknown");
        assert!(mail.id.starts_with(&format!("mail_{}_", now.timestamp_millis())));
        assert_eq!(mail.timestamp, now);
        assert!(mail.attachments.is_none());
    }

    #[test]
    fn test_subject_only_uses_current_time() {
        let before = Utc::now();
        let mail = normalize(&bag(&[("subject", Value::Str("Hello".into()))])).unwrap();
        let after = Utc::now();
        assert!(mail.timestamp >= before && mail.timestamp <= after);
    }

    #[test]
    fn test_content_without_subject_defaults_subject() {
        let mail = normalize(&bag(&[("body", Value::Str("Sold 3 items".into()))])).unwrap();
        assert_eq!(mail.subject, "No Subject");
        assert_eq!(mail.content, "Sold 3 items");
    }

    #[test]
    fn test_candidates_tried_in_order_and_skip_empty() {
        let data = bag(&[
            ("mailId", Value::Long("900000000000000001".into())),
            ("id", Value::Str(String::new())),
            ("from", Value::Str("Marketplace".into())),
            ("senderName", Value::Str("ignored".into())),
            ("title", Value::Str("Sale".into())),
            ("message", Value::Null),
            ("text", Value::Str("Your order".into())),
        ]);
        let mail = normalize(&data).unwrap();
        assert_eq!(mail.id, "900000000000000001");
        assert_eq!(mail.sender, "Marketplace");
        assert_eq!(mail.subject, "Sale");
        assert_eq!(mail.content, "Your order");
    }

    #[test]
    fn test_timestamp_falls_through_unparseable_candidates() {
        let data = bag(&[
            ("subject", Value::Str("x".into())),
            ("timestamp", Value::Str("yesterday".into())),
            ("time", Value::Bool(true)),
            ("date", Value::Str("2024-06-01".into())),
            ("sentTime", Value::Int(1_700_000_000_000)),
        ]);
        let mail = normalize(&data).unwrap();
        assert_eq!(mail.timestamp, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp(&Value::Str("2024-06-01T10:30:00Z".into())), Some(expected));
        assert_eq!(parse_timestamp(&Value::Str("2024-06-01 10:30:00".into())), Some(expected));
        assert_eq!(parse_timestamp(&Value::Int(expected.timestamp_millis())), Some(expected));
        assert_eq!(parse_timestamp(&Value::Long(expected.timestamp_millis().to_string())), Some(expected));
        assert_eq!(parse_timestamp(&Value::Bool(true)), None);
    }

    #[test]
    fn test_attachments_must_be_a_list() {
        let data = bag(&[
            ("subject", Value::Str("x".into())),
            ("attachments", Value::Str("not a list".into())),
            ("items", Value::List(vec![Value::Int(1), Value::Int(2)])),
            ("rewards", Value::List(vec![Value::Int(3)])),
        ]);
        let mail = normalize(&data).unwrap();
        assert_eq!(mail.attachments, Some(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let now = Utc::now();
        let ids: HashSet<String> = (0..500).map(|_| generate_id(now)).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_generated_id_shape() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let id = generate_id(now);
        let rest = id.strip_prefix(&format!("mail_{}_", now.timestamp_millis())).unwrap();
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        assert!(digits > 0);
        assert_eq!(rest.len() - digits, 6);
        assert!(rest[digits..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
