use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::str::Utf8Error;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum InvalidTtl {
    #[error("ttl is not utf-8: {0}")]
    Utf8(#[from] Utf8Error),
    #[error("ttl is not an instant: {0}")]
    Instant(#[from] chrono::ParseError),
}

/// Encode an instant as the stored ttl value (RFC 3339, UTC, `Z` suffix)
pub fn encode(instant: DateTime<Utc>) -> Vec<u8> {
    instant
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
        .into_bytes()
}

pub fn decode(value: &[u8]) -> Result<DateTime<Utc>, InvalidTtl> {
    let text = std::str::from_utf8(value)?;
    Ok(DateTime::parse_from_rfc3339(text.trim())?.with_timezone(&Utc))
}

/// Grace period as a chrono delta, saturating on overflow
pub fn grace(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// An entry is expired once `now` is strictly past `stamped + grace`.
/// An unrepresentable deadline never expires.
pub fn is_expired(stamped: DateTime<Utc>, grace: TimeDelta, now: DateTime<Utc>) -> bool {
    match stamped.checked_add_signed(grace) {
        Some(expire_time) => now > expire_time,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_utc_rfc3339() {
        let instant = DateTime::parse_from_rfc3339("2020-03-01T10:15:30.250Z")
            .unwrap()
            .with_timezone(&Utc);

        let encoded = encode(instant);
        assert_eq!(encoded, b"2020-03-01T10:15:30.250Z");
        assert_eq!(decode(&encoded).unwrap(), instant);
    }

    #[test]
    fn test_decode_accepts_offsets() {
        let decoded = decode(b"2020-03-01T20:15:30+10:00").unwrap();
        assert_eq!(decoded.to_rfc3339(), "2020-03-01T10:15:30+00:00");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"yesterday"), Err(InvalidTtl::Instant(_))));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(InvalidTtl::Utf8(_))));
    }

    #[test]
    fn test_is_expired_is_strict() {
        let now = Utc::now();
        let one_sec = grace(Duration::from_secs(1));

        assert!(is_expired(now - TimeDelta::seconds(5), one_sec, now));
        assert!(!is_expired(now + TimeDelta::seconds(5), one_sec, now));
        assert!(!is_expired(now - TimeDelta::seconds(1), one_sec, now));
    }

    #[test]
    fn test_huge_grace_never_expires() {
        let now = Utc::now();
        let forever = grace(Duration::MAX);

        assert!(!is_expired(now - TimeDelta::days(365), forever, now));
    }
}
