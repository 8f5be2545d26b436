//! Reputation scoring.

use crate::types::{AttributeRecord, ReputationStatus, RobokillerStatus, Score};

const BASE: i32 = 50;
const REPUTATION_WEIGHT: i32 = 30;
const ROBOKILLER_WEIGHT: i32 = 20;
const REPORT_PENALTY: i64 = 5;
const REPORT_PENALTY_CAP: i64 = 25;
/// Calls at or below this count earn nothing.
const CALL_FLOOR: i64 = 5;
const CALL_BONUS: i64 = 2;
const CALL_BONUS_CAP: i64 = 15;

/// Map an attribute record to a score in `[0, 100]`. Higher is more trustworthy.
pub fn score(record: &AttributeRecord) -> Score {
    let mut raw = BASE;

    raw += match record.reputation_status {
        ReputationStatus::Positive => REPUTATION_WEIGHT,
        ReputationStatus::Negative => -REPUTATION_WEIGHT,
        ReputationStatus::Neutral | ReputationStatus::Unknown => 0,
    };

    raw += match record.robokiller_status {
        RobokillerStatus::Allowed => ROBOKILLER_WEIGHT,
        RobokillerStatus::Blocked => -ROBOKILLER_WEIGHT,
        RobokillerStatus::Unknown => 0,
    };

    let reports = i64::from(record.user_reports);
    raw -= (reports * REPORT_PENALTY).min(REPORT_PENALTY_CAP) as i32;

    let extra_calls = (i64::from(record.total_calls) - CALL_FLOOR).max(0);
    raw += (extra_calls * CALL_BONUS).min(CALL_BONUS_CAP) as i32;

    Score::clamped(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        rep: ReputationStatus,
        robo: RobokillerStatus,
        reports: u32,
        calls: u32,
    ) -> AttributeRecord {
        AttributeRecord {
            reputation_status: rep,
            robokiller_status: robo,
            user_reports: reports,
            total_calls: calls,
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_record_scores_base() {
        assert_eq!(score(&AttributeRecord::default()).value(), 50);
    }

    #[test]
    fn test_worst_case_clamps_to_zero() {
        let r = record(ReputationStatus::Negative, RobokillerStatus::Blocked, 0, 0);
        assert_eq!(score(&r), Score::MIN);
        let r = record(ReputationStatus::Negative, RobokillerStatus::Blocked, 100, 0);
        assert_eq!(score(&r), Score::MIN);
    }

    #[test]
    fn test_best_case_clamps_to_hundred() {
        let r = record(ReputationStatus::Positive, RobokillerStatus::Allowed, 0, u32::MAX);
        assert_eq!(score(&r), Score::MAX);
        let r = record(ReputationStatus::Positive, RobokillerStatus::Allowed, 0, 11);
        assert_eq!(score(&r), Score::MAX);
    }

    #[test]
    fn test_report_penalty_saturates() {
        let one = record(ReputationStatus::Neutral, RobokillerStatus::Unknown, 1, 0);
        assert_eq!(score(&one).value(), 45);
        let many = record(ReputationStatus::Neutral, RobokillerStatus::Unknown, u32::MAX, 0);
        assert_eq!(score(&many).value(), 25);
    }

    #[test]
    fn test_call_bonus_starts_after_floor() {
        let r = record(ReputationStatus::Unknown, RobokillerStatus::Unknown, 0, 5);
        assert_eq!(score(&r).value(), 50);
        let r = record(ReputationStatus::Unknown, RobokillerStatus::Unknown, 0, 7);
        assert_eq!(score(&r).value(), 54);
        let r = record(ReputationStatus::Unknown, RobokillerStatus::Unknown, 0, 40);
        assert_eq!(score(&r).value(), 65);
    }

    #[test]
    fn test_score_always_in_range() {
        let reps = [
            ReputationStatus::Positive,
            ReputationStatus::Negative,
            ReputationStatus::Neutral,
            ReputationStatus::Unknown,
        ];
        let robos = [
            RobokillerStatus::Allowed,
            RobokillerStatus::Blocked,
            RobokillerStatus::Unknown,
        ];
        for rep in reps {
            for robo in robos {
                for n in [0, 1, 3, 6, 50, u32::MAX] {
                    let s = score(&record(rep, robo, n, n)).value();
                    assert!(s <= 100);
                }
            }
        }
    }
}
