//! Per-member heuristic checks used outside of raid mode.
//!
//! Each check can be toggled on its own and failing any enabled check fails
//! the member. None of them are proof of abuse; they only decide who gets
//! banned when the chat is not under a raid.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, Utc};
use tracing::warn;

use super::MemberRef;
use super::gateway::ProfileLookup;
use crate::config::RaidSettings;

/// Name of a heuristic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckName {
    Username,
    ProfilePhoto,
    AccountAge,
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Username => "no username",
            Self::ProfilePhoto => "no profile photo",
            Self::AccountAge => "account too new",
        })
    }
}

/// Outcome of evaluating one member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub failed_checks: BTreeSet<CheckName>,
}

impl Evaluation {
    pub fn passed(&self) -> bool {
        self.failed_checks.is_empty()
    }
}

/// Runs the enabled checks against a member.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicEvaluator {
    today: NaiveDate,
}

impl HeuristicEvaluator {
    /// Evaluator pinned to the current UTC date.
    pub fn now() -> Self {
        Self::at(Utc::now().date_naive())
    }

    /// Evaluator pinned to a given date.
    pub fn at(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Run every enabled check.
    ///
    /// A failed profile lookup counts as "no photo" and never stops the other
    /// checks. The lookup is skipped entirely when the photo check is off.
    pub async fn evaluate(
        &self,
        member: &MemberRef,
        settings: &RaidSettings,
        lookup: &dyn ProfileLookup,
    ) -> Evaluation {
        let mut failed_checks = BTreeSet::new();

        if settings.check_username && member.username.is_none() {
            failed_checks.insert(CheckName::Username);
        }

        if settings.check_profile_photo {
            let has_photo = match lookup.profile_photo_count(member.id).await {
                Ok(count) => count >= 1,
                Err(e) => {
                    warn!("Profile lookup failed for user {}, treating as no photo: {}", member.id, e);
                    false
                }
            };
            if !has_photo {
                failed_checks.insert(CheckName::ProfilePhoto);
            }
        }

        if settings.min_account_age_days > 0
            && estimated_age_days(member.id, self.today) < i64::from(settings.min_account_age_days)
        {
            failed_checks.insert(CheckName::AccountAge);
        }

        Evaluation { failed_checks }
    }
}

/// Rough (user ID, registration date) anchors.
///
/// Telegram hands out user IDs in roughly increasing order, with a jump into
/// the 5e9 range during 2021. Interpolating between these points gives a
/// coarse registration estimate; it is easily off by months.
const ID_ANCHORS: &[(u64, (i32, u32, u32))] = &[
    (10_000_000, (2013, 10, 1)),
    (150_000_000, (2015, 3, 1)),
    (400_000_000, (2017, 7, 1)),
    (1_000_000_000, (2019, 11, 1)),
    (1_500_000_000, (2020, 12, 1)),
    (2_000_000_000, (2021, 9, 1)),
    (5_000_000_000, (2022, 1, 1)),
    (5_500_000_000, (2022, 9, 1)),
    (6_000_000_000, (2023, 3, 1)),
    (6_500_000_000, (2023, 10, 1)),
    (7_000_000_000, (2024, 3, 1)),
    (7_500_000_000, (2024, 9, 1)),
    (8_000_000_000, (2025, 3, 1)),
];

fn anchor_date((y, m, d): (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Estimate when an account was registered from its ID.
///
/// Returns `None` for IDs past the last anchor: the account is newer than
/// anything we can place.
pub fn estimate_registration(user_id: u64) -> Option<NaiveDate> {
    let (first_id, first_date) = ID_ANCHORS.first()?;
    if user_id <= *first_id {
        return anchor_date(*first_date);
    }

    ID_ANCHORS.windows(2).find_map(|pair| {
        let (lo_id, lo_date) = pair[0];
        let (hi_id, hi_date) = pair[1];
        if user_id > hi_id {
            return None;
        }
        let lo = anchor_date(lo_date)?;
        let hi = anchor_date(hi_date)?;
        let span_days = (hi - lo).num_days() as f64;
        let fraction = (user_id - lo_id) as f64 / (hi_id - lo_id) as f64;
        Some(lo + chrono::Duration::days((span_days * fraction) as i64))
    })
}

/// Estimated account age in days. Unknown (newest) accounts are 0 days old.
pub fn estimated_age_days(user_id: u64, today: NaiveDate) -> i64 {
    estimate_registration(user_id)
        .map(|registered| (today - registered).num_days().max(0))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::raid::testing::{FakePlatform, member};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn all_checks() -> RaidSettings {
        RaidSettings {
            check_username: true,
            check_profile_photo: true,
            min_account_age_days: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_estimate_is_monotonic_between_anchors() {
        let a = estimate_registration(1_000_000_000).unwrap();
        let b = estimate_registration(1_250_000_000).unwrap();
        let c = estimate_registration(1_500_000_000).unwrap();
        assert!(a < b && b < c);
        assert_eq!(a, NaiveDate::from_ymd_opt(2019, 11, 1).unwrap());
    }

    #[test]
    fn test_unknown_ids_are_brand_new() {
        assert_eq!(estimate_registration(9_000_000_000), None);
        assert_eq!(estimated_age_days(9_000_000_000, today()), 0);
        assert!(estimated_age_days(1_000, today()) > 3000);
    }

    #[tokio::test]
    async fn test_all_checks_disabled_passes_everyone() {
        let platform = FakePlatform::default();
        let eval = HeuristicEvaluator::at(today())
            .evaluate(&member(9_000_000_000, None), &RaidSettings::default(), &platform)
            .await;
        assert!(eval.passed());
        assert!(platform.lookups.lock().is_empty());
    }

    #[tokio::test]
    async fn test_good_member_passes() {
        let mut platform = FakePlatform::default();
        platform.photos.insert(1_000, 2);

        let eval = HeuristicEvaluator::at(today())
            .evaluate(&member(1_000, Some("alice")), &all_checks(), &platform)
            .await;
        assert!(eval.passed());
    }

    #[tokio::test]
    async fn test_each_failure_is_reported() {
        let platform = FakePlatform::default();
        let eval = HeuristicEvaluator::at(today())
            .evaluate(&member(9_000_000_000, None), &all_checks(), &platform)
            .await;

        assert!(!eval.passed());
        assert_eq!(
            eval.failed_checks,
            BTreeSet::from([CheckName::Username, CheckName::ProfilePhoto, CheckName::AccountAge])
        );
    }

    #[tokio::test]
    async fn test_lookup_error_fails_closed_without_skipping_other_checks() {
        let platform = FakePlatform {
            failing_lookups: HashSet::from([1_000]),
            ..Default::default()
        };
        let eval = HeuristicEvaluator::at(today())
            .evaluate(&member(1_000, None), &all_checks(), &platform)
            .await;

        assert_eq!(
            eval.failed_checks,
            BTreeSet::from([CheckName::Username, CheckName::ProfilePhoto])
        );
    }
}
