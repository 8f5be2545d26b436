//! Core data types for reputation lookups.

use serde::{Deserialize, Serialize};

/// Crowd-sourced reputation of a number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ReputationStatus {
    Positive,
    Negative,
    Neutral,
    #[default]
    Unknown,
}

impl ReputationStatus {
    /// Parse a status word case-insensitively, ignoring surrounding whitespace.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ReputationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the lookup service's own call blocker lets the number through.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RobokillerStatus {
    Allowed,
    Blocked,
    #[default]
    Unknown,
}

impl RobokillerStatus {
    /// Parse a status word case-insensitively, ignoring surrounding whitespace.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "allowed" => Some(Self::Allowed),
            "blocked" => Some(Self::Blocked),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "Allowed",
            Self::Blocked => "Blocked",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for RobokillerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized output of the extraction chain for one lookup.
///
/// Every field is always present. "Unknown" is modelled as the `Unknown`
/// variant for statuses, `0` for counters and `None` for free-text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRecord {
    pub reputation_status: ReputationStatus,
    pub robokiller_status: RobokillerStatus,
    pub user_reports: u32,
    pub total_calls: u32,
    pub last_call_date: Option<String>,
    /// Spam likelihood in `[0, 100]`.
    pub spam_score: Option<u8>,
    pub caller_name: Option<String>,
    pub location: Option<String>,
    pub carrier: Option<String>,
    pub comments_count: u32,
}

impl AttributeRecord {
    /// True when either status field carries a real value.
    pub fn has_status(&self) -> bool {
        self.reputation_status.is_known() || self.robokiller_status.is_known()
    }
}

/// Partial result of a single extraction strategy. `None` means the strategy
/// found nothing for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub reputation_status: Option<ReputationStatus>,
    pub robokiller_status: Option<RobokillerStatus>,
    pub user_reports: Option<u32>,
    pub total_calls: Option<u32>,
    pub last_call_date: Option<String>,
    pub spam_score: Option<u8>,
    pub caller_name: Option<String>,
    pub location: Option<String>,
    pub carrier: Option<String>,
    pub comments_count: Option<u32>,
}

impl PartialRecord {
    /// True when a strategy produced a non-unknown status of either kind.
    pub fn has_status(&self) -> bool {
        self.reputation_status.is_some_and(ReputationStatus::is_known)
            || self.robokiller_status.is_some_and(RobokillerStatus::is_known)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill every field of `self` that is still unset from `other`.
    /// Unknown statuses never overwrite anything.
    pub fn fill_from(&mut self, other: PartialRecord) {
        if self.reputation_status.is_none() {
            self.reputation_status = other.reputation_status.filter(|s| s.is_known());
        }
        if self.robokiller_status.is_none() {
            self.robokiller_status = other.robokiller_status.filter(|s| s.is_known());
        }
        fill(&mut self.user_reports, other.user_reports);
        fill(&mut self.total_calls, other.total_calls);
        fill(&mut self.last_call_date, other.last_call_date);
        fill(&mut self.spam_score, other.spam_score);
        fill(&mut self.caller_name, other.caller_name);
        fill(&mut self.location, other.location);
        fill(&mut self.carrier, other.carrier);
        fill(&mut self.comments_count, other.comments_count);
    }

    /// Collapse into a fully-populated record, defaulting every unset field.
    pub fn into_record(self) -> AttributeRecord {
        AttributeRecord {
            reputation_status: self.reputation_status.unwrap_or_default(),
            robokiller_status: self.robokiller_status.unwrap_or_default(),
            user_reports: self.user_reports.unwrap_or(0),
            total_calls: self.total_calls.unwrap_or(0),
            last_call_date: self.last_call_date,
            spam_score: self.spam_score.map(|s| s.min(100)),
            caller_name: self.caller_name,
            location: self.location,
            carrier: self.carrier,
            comments_count: self.comments_count.unwrap_or(0),
        }
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Reputation score in `[0, 100]`, derived from an [`AttributeRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(0);
    pub const MAX: Score = Score(100);

    /// Build a score, clamping into `[0, 100]`.
    pub fn clamped(raw: i32) -> Self {
        Score(raw.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_all_unknown() {
        let record = AttributeRecord::default();
        assert_eq!(record.reputation_status, ReputationStatus::Unknown);
        assert_eq!(record.robokiller_status, RobokillerStatus::Unknown);
        assert_eq!(record.user_reports, 0);
        assert_eq!(record.total_calls, 0);
        assert!(record.last_call_date.is_none());
        assert!(!record.has_status());
    }

    #[test]
    fn test_record_serializes_every_field() {
        let json = serde_json::to_value(AttributeRecord::default()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "reputationStatus",
            "robokillerStatus",
            "userReports",
            "totalCalls",
            "lastCallDate",
            "spamScore",
            "callerName",
            "location",
            "carrier",
            "commentsCount",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj["reputationStatus"], "Unknown");
        assert!(obj["lastCallDate"].is_null());
    }

    #[test]
    fn test_parse_loose_statuses() {
        assert_eq!(
            ReputationStatus::parse_loose("  positive "),
            Some(ReputationStatus::Positive)
        );
        assert_eq!(
            RobokillerStatus::parse_loose("BLOCKED"),
            Some(RobokillerStatus::Blocked)
        );
        assert_eq!(ReputationStatus::parse_loose("great"), None);
    }

    #[test]
    fn test_fill_from_keeps_first_value() {
        let mut acc = PartialRecord {
            total_calls: Some(4),
            ..Default::default()
        };
        acc.fill_from(PartialRecord {
            total_calls: Some(9),
            user_reports: Some(2),
            reputation_status: Some(ReputationStatus::Unknown),
            ..Default::default()
        });
        assert_eq!(acc.total_calls, Some(4));
        assert_eq!(acc.user_reports, Some(2));
        assert!(acc.reputation_status.is_none());
    }

    #[test]
    fn test_score_clamps() {
        assert_eq!(Score::clamped(-40), Score::MIN);
        assert_eq!(Score::clamped(140), Score::MAX);
        assert_eq!(Score::clamped(63).value(), 63);
    }
}
