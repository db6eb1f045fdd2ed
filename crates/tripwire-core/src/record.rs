//! Validated input records
//!
//! One input line describes one request against the content-addressed object
//! store: exactly 7 tab-separated fields, each with a fixed grammar. A line
//! that violates any field grammar never constructs an [`InputRecord`] and
//! therefore never enters the compiled network.

use crate::error::{RecordError, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

static ORIGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]{0,7}~[[:graph:]]{1,128}$").expect("origin grammar"));
static ALGORITHM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]{0,7}$").expect("algorithm grammar"));
static DIGEST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[[:graph:]]{1,128}$").expect("digest grammar"));
static SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("size grammar"));
static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)(?:\.([0-9]{1,9}))?$").expect("duration grammar"));

/// Maximum total length of a content reference, separator included.
const CONTENT_REF_MAX: usize = 144;

/// Request verb against the object store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    Get,
    Put,
    Take,
    Give,
    Eat,
    Wrap,
    Roll,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Put => "put",
            Verb::Take => "take",
            Verb::Give => "give",
            Verb::Eat => "eat",
            Verb::Wrap => "wrap",
            Verb::Roll => "roll",
        }
    }
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "get" => Ok(Verb::Get),
            "put" => Ok(Verb::Put),
            "take" => Ok(Verb::Take),
            "give" => Ok(Verb::Give),
            "eat" => Ok(Verb::Eat),
            "wrap" => Ok(Verb::Wrap),
            "roll" => Ok(Verb::Roll),
            _ => Err(()),
        }
    }
}

/// Interaction-history tag: the closed set of allowed ok/no sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum History {
    Ok,
    No,
    OkOk,
    OkOkOk,
    OkNo,
    OkOkNo,
}

impl History {
    pub fn as_str(self) -> &'static str {
        match self {
            History::Ok => "ok",
            History::No => "no",
            History::OkOk => "ok,ok",
            History::OkOkOk => "ok,ok,ok",
            History::OkNo => "ok,no",
            History::OkOkNo => "ok,ok,no",
        }
    }
}

impl FromStr for History {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "ok" => Ok(History::Ok),
            "no" => Ok(History::No),
            "ok,ok" => Ok(History::OkOk),
            "ok,ok,ok" => Ok(History::OkOkOk),
            "ok,no" => Ok(History::OkNo),
            "ok,ok,no" => Ok(History::OkOkNo),
            _ => Err(()),
        }
    }
}

/// A content reference: `algorithm:digest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub algorithm: String,
    pub digest: String,
}

impl ContentRef {
    pub fn parse(text: &str) -> Result<Self> {
        if text.len() > CONTENT_REF_MAX {
            return Err(RecordError::field("content reference", text));
        }
        let (algorithm, digest) = text
            .split_once(':')
            .ok_or_else(|| RecordError::field("content reference", text))?;
        if !ALGORITHM_RE.is_match(algorithm) || !DIGEST_RE.is_match(digest) {
            return Err(RecordError::field("content reference", text));
        }
        Ok(ContentRef {
            algorithm: algorithm.to_string(),
            digest: digest.to_string(),
        })
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

/// One validated input record: an immutable 7-field tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub timestamp: DateTime<Utc>,
    pub origin: String,
    pub verb: Verb,
    pub content_ref: ContentRef,
    pub history: History,
    pub size: u64,
    pub duration: Duration,
}

impl InputRecord {
    /// Parse and validate one raw input line.
    pub fn parse(line: &str) -> Result<InputRecord> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return Err(RecordError::FieldCount(fields.len()));
        }

        // the timestamp grammar mandates a fractional-seconds component,
        // which plain RFC3339 makes optional
        if !fields[0].contains('.') {
            return Err(RecordError::field("timestamp", fields[0]));
        }
        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .map_err(|_| RecordError::field("timestamp", fields[0]))?
            .with_timezone(&Utc);

        if !ORIGIN_RE.is_match(fields[1]) {
            return Err(RecordError::field("origin", fields[1]));
        }
        let origin = fields[1].to_string();

        let verb = fields[2]
            .parse::<Verb>()
            .map_err(|_| RecordError::field("verb", fields[2]))?;

        let content_ref = ContentRef::parse(fields[3])?;

        let history = fields[4]
            .parse::<History>()
            .map_err(|_| RecordError::field("history", fields[4]))?;

        let size = parse_size(fields[5])?;
        let duration = parse_duration(fields[6])?;

        Ok(InputRecord {
            timestamp,
            origin,
            verb,
            content_ref,
            history,
            size,
            duration,
        })
    }
}

fn parse_size(text: &str) -> Result<u64> {
    if !SIZE_RE.is_match(text) {
        return Err(RecordError::field("size", text));
    }
    text.parse::<u64>()
        .map_err(|_| RecordError::field("size", text))
}

/// Parse a non-negative duration in seconds with at most 9 fractional digits.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let caps = DURATION_RE
        .captures(text)
        .ok_or_else(|| RecordError::field("duration", text))?;
    let secs = caps[1]
        .parse::<u64>()
        .map_err(|_| RecordError::field("duration", text))?;
    let nanos = match caps.get(2) {
        Some(frac) => {
            // right-pad to 9 digits: ".25" means 250ms
            let mut digits = frac.as_str().to_string();
            while digits.len() < 9 {
                digits.push('0');
            }
            digits.parse::<u32>().unwrap_or(0)
        }
        None => 0,
    };
    Ok(Duration::new(secs, nanos))
}

/// Canonical rendering of a duration: seconds with exactly 9 fractional
/// digits, the form used by every detail and summary log line.
pub fn format_duration(d: Duration) -> String {
    format!("{}.{:09}", d.as_secs(), d.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "2026-08-27T10:15:00.123456789+00:00\tcache01~node-7\tget\tblake3:abcdef0123456789\tok\t1024\t0.250";

    fn with_field(index: usize, value: &str) -> String {
        let mut fields: Vec<&str> = VALID.split('\t').collect();
        fields[index] = value;
        fields.join("\t")
    }

    #[test]
    fn test_parse_valid_line() {
        let record = InputRecord::parse(VALID).unwrap();
        assert_eq!(record.origin, "cache01~node-7");
        assert_eq!(record.verb, Verb::Get);
        assert_eq!(record.content_ref.algorithm, "blake3");
        assert_eq!(record.history, History::Ok);
        assert_eq!(record.size, 1024);
        assert_eq!(record.duration, Duration::new(0, 250_000_000));
        assert_eq!(record.timestamp.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn test_field_count() {
        assert!(matches!(
            InputRecord::parse("a\tb\tc"),
            Err(RecordError::FieldCount(3))
        ));
    }

    #[test]
    fn test_bad_timestamp() {
        assert!(InputRecord::parse(&with_field(0, "yesterday")).is_err());
    }

    #[test]
    fn test_timestamp_requires_fractional_seconds() {
        // RFC3339 allows a whole-second instant, the record grammar does not
        assert!(InputRecord::parse(&with_field(0, "2026-08-27T10:15:00+00:00")).is_err());
        assert!(InputRecord::parse(&with_field(0, "2026-08-27T10:15:00Z")).is_err());
        // any fraction length up to nanoseconds is fine
        assert!(InputRecord::parse(&with_field(0, "2026-08-27T10:15:00.5+00:00")).is_ok());
    }

    #[test]
    fn test_bad_origin() {
        // must start with a lowercase letter and contain a tilde
        assert!(InputRecord::parse(&with_field(1, "7cache~x")).is_err());
        assert!(InputRecord::parse(&with_field(1, "cache01")).is_err());
        assert!(InputRecord::parse(&with_field(1, "toolongname~x")).is_err());
    }

    #[test]
    fn test_bad_verb() {
        assert!(InputRecord::parse(&with_field(2, "fetch")).is_err());
    }

    #[test]
    fn test_verbs_accepted() {
        for verb in ["get", "put", "take", "give", "eat", "wrap", "roll"] {
            assert!(InputRecord::parse(&with_field(2, verb)).is_ok(), "{verb}");
        }
    }

    #[test]
    fn test_bad_content_ref() {
        assert!(InputRecord::parse(&with_field(3, "nodigest")).is_err());
        assert!(InputRecord::parse(&with_field(3, "UPPER:abc")).is_err());
        assert!(InputRecord::parse(&with_field(3, "overlong99:abc")).is_err());
        let digest = "a".repeat(140);
        assert!(InputRecord::parse(&with_field(3, &format!("blake3:{digest}"))).is_err());
    }

    #[test]
    fn test_bad_history() {
        assert!(InputRecord::parse(&with_field(4, "no,no")).is_err());
        assert!(InputRecord::parse(&with_field(4, "ok,ok,ok,ok")).is_err());
    }

    #[test]
    fn test_bad_size() {
        assert!(InputRecord::parse(&with_field(5, "-1")).is_err());
        assert!(InputRecord::parse(&with_field(5, "+1")).is_err());
        assert!(InputRecord::parse(&with_field(5, "18446744073709551616")).is_err());
    }

    #[test]
    fn test_bad_duration() {
        assert!(InputRecord::parse(&with_field(6, "-0.5")).is_err());
        assert!(InputRecord::parse(&with_field(6, "1.0000000001")).is_err());
        assert!(InputRecord::parse(&with_field(6, ".5")).is_err());
    }

    #[test]
    fn test_duration_fraction_padding() {
        let record = InputRecord::parse(&with_field(6, "1.25")).unwrap();
        assert_eq!(record.duration, Duration::new(1, 250_000_000));
    }

    #[test]
    fn test_size_and_duration_round_trip() {
        let record = InputRecord::parse(VALID).unwrap();
        let reparsed_size = record.size.to_string().parse::<u64>().unwrap();
        assert_eq!(reparsed_size, record.size);
        let reparsed = parse_duration(&format_duration(record.duration)).unwrap();
        assert_eq!(reparsed, record.duration);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::new(0, 250_000_000)), "0.250000000");
        assert_eq!(format_duration(Duration::new(12, 5)), "12.000000005");
    }
}
