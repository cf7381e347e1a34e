//! Daily claim window policy.
//!
//! The reward re-arms at 09:00 in the reference time zone. Eligibility is a
//! pure function of the stored last-claim time and the current wall clock,
//! both interpreted as reference-zone civil time.

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use tracing::trace;

/// Local hour at which the daily reward re-arms
pub const CLAIM_WINDOW_HOUR: u32 = 9;

/// Whether a wallet may attempt a claim right now.
///
/// `last_claim` is reference-zone local civil time (as stored); `now` is the
/// current instant in the reference zone. Rules, in order:
/// 1. never claimed -> eligible
/// 2. before today's 09:00 -> not eligible
/// 3. last claim on an earlier calendar day -> eligible
/// 4. at or after 09:00 -> eligible
///
/// Rule 4 intentionally mirrors the deployed policy even though it makes a
/// same-day re-check after the cutoff eligible again; see DESIGN.md before
/// changing it.
pub fn can_claim(last_claim: Option<NaiveDateTime>, now: DateTime<Tz>) -> bool {
    let Some(last_claim) = last_claim else {
        trace!("no prior claim recorded");
        return true;
    };

    let now_local = now.naive_local();
    let window = NaiveTime::from_hms_opt(CLAIM_WINDOW_HOUR, 0, 0).expect("valid cutoff time");

    if now_local.time() < window {
        return false;
    }

    if last_claim.date() < now_local.date() {
        return true;
    }

    // Past the cutoff with a same-day claim on record: still eligible
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::REFERENCE_TZ;
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        REFERENCE_TZ.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn claimed_at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Option<NaiveDateTime> {
        Some(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
    }

    #[test]
    fn never_claimed_is_always_eligible() {
        assert!(can_claim(None, at(2025, 6, 2, 0, 0)));
        assert!(can_claim(None, at(2025, 6, 2, 8, 59)));
        assert!(can_claim(None, at(2025, 6, 2, 23, 59)));
    }

    #[test]
    fn before_window_is_never_eligible() {
        // Even a claim from last week cannot run before 09:00
        assert!(!can_claim(claimed_at(2025, 5, 26, 10, 0), at(2025, 6, 2, 8, 59)));
        assert!(!can_claim(claimed_at(2025, 6, 1, 9, 30), at(2025, 6, 2, 0, 1)));
    }

    #[test]
    fn window_opens_exactly_at_nine() {
        assert!(!can_claim(claimed_at(2025, 6, 1, 9, 30), at(2025, 6, 2, 8, 59)));
        assert!(can_claim(claimed_at(2025, 6, 1, 9, 30), at(2025, 6, 2, 9, 0)));
    }

    #[test]
    fn previous_day_claim_is_eligible_after_nine() {
        assert!(can_claim(claimed_at(2025, 6, 1, 23, 50), at(2025, 6, 2, 9, 0)));
        assert!(can_claim(claimed_at(2024, 12, 31, 9, 5), at(2025, 1, 1, 14, 0)));
    }

    #[test]
    fn same_day_claim_after_nine_stays_eligible() {
        // Deployed-policy quirk, asserted so any change is deliberate:
        // a wallet claimed at 09:30 today is evaluated eligible again at 14:00.
        assert!(can_claim(claimed_at(2025, 6, 2, 9, 30), at(2025, 6, 2, 14, 0)));
    }

    #[test]
    fn is_deterministic_for_equal_inputs() {
        let last = claimed_at(2025, 6, 1, 9, 30);
        let now = at(2025, 6, 2, 10, 0);
        assert_eq!(can_claim(last, now), can_claim(last, now));
    }
}
