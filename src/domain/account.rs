use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Fixed reference time zone for the daily claim window.
///
/// The portal re-arms the daily reward at 09:00 in this zone, so every
/// last-claim timestamp is stored as local civil time here.
pub const REFERENCE_TZ: Tz = chrono_tz::Asia::Shanghai;

/// Storage format for `last_claim_time` (second precision, reference-zone local)
pub const CLAIM_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current wall clock in the reference time zone
pub fn now_reference() -> DateTime<Tz> {
    Utc::now().with_timezone(&REFERENCE_TZ)
}

/// One persisted wallet: identity plus session state.
///
/// `address` is always derived from `private_key`, never supplied on its own.
#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub address: String,
    pub private_key: String,
    /// Identity-provider bearer issued after wallet-signature verification
    pub session_token: Option<String>,
    /// Application backend bearer used for reward calls
    pub app_token: Option<String>,
    /// Most recent successful claim, reference-zone local time
    pub last_claim_time: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl WalletRecord {
    /// Parse a stored claim timestamp. Unparseable values are treated as
    /// never-claimed rather than poisoning the whole record.
    pub fn parse_claim_time(raw: Option<&str>) -> Option<NaiveDateTime> {
        let raw = raw?;
        match NaiveDateTime::parse_from_str(raw, CLAIM_TIME_FORMAT) {
            Ok(dt) => Some(dt),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_claim_time() {
        let parsed = WalletRecord::parse_claim_time(Some("2025-06-01 09:30:00"));
        assert_eq!(
            parsed,
            Some(
                NaiveDateTime::parse_from_str("2025-06-01 09:30:00", CLAIM_TIME_FORMAT).unwrap()
            )
        );
    }

    #[test]
    fn garbage_claim_time_reads_as_never_claimed() {
        assert_eq!(WalletRecord::parse_claim_time(Some("not a date")), None);
        assert_eq!(WalletRecord::parse_claim_time(None), None);
    }
}
