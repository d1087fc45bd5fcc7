//! The per-message admission decision: serve the generation backend, or
//! withhold it and present a payment offer.

use super::handler::{EntitlementStore, StoreError};

/// Decision for one incoming user message, evaluated against the already
/// recorded message count (never a look-ahead). First match wins:
/// unlimited access, then the free quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Serve { unlimited: bool, used: u32 },
    Offer { used: u32, limit: u32 },
}

/// Presentation metadata attached to a served reply once the free quota
/// runs low. Not a state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaWarning {
    Remaining(u32),
    LastFree,
}

pub fn evaluate(
    store: &EntitlementStore,
    user_id: i64,
    limit: u32,
) -> Result<GateDecision, StoreError> {
    if store.has_unlimited_access(user_id)? {
        // still counted for history; never gated
        let used = store.count_user_messages(user_id)?;
        return Ok(GateDecision::Serve {
            unlimited: true,
            used,
        });
    }
    let used = store.count_user_messages(user_id)?;
    if used >= limit {
        Ok(GateDecision::Offer { used, limit })
    } else {
        Ok(GateDecision::Serve {
            unlimited: false,
            used,
        })
    }
}

/// Graduated warning for free users, computed from the post-append count.
pub fn quota_warning(post_count: u32, limit: u32) -> Option<QuotaWarning> {
    let remaining = limit.saturating_sub(post_count);
    if remaining == 0 {
        Some(QuotaWarning::LastFree)
    } else if remaining <= 3 {
        Some(QuotaWarning::Remaining(remaining))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::dto::Direction;

    const LIMIT: u32 = 10;

    fn temp_store() -> EntitlementStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        EntitlementStore::new(&db).unwrap()
    }

    #[test]
    fn user_at_limit_is_always_denied() {
        let store = temp_store();
        for _ in 0..LIMIT {
            store.append_message(1, "hey", Direction::FromUser).unwrap();
        }
        let decision = evaluate(&store, 1, LIMIT).unwrap();
        assert_eq!(
            decision,
            GateDecision::Offer {
                used: LIMIT,
                limit: LIMIT
            }
        );
    }

    #[test]
    fn user_one_below_limit_is_served_and_count_reaches_limit_exactly_once() {
        let store = temp_store();
        for _ in 0..LIMIT - 1 {
            store.append_message(1, "hey", Direction::FromUser).unwrap();
        }
        let decision = evaluate(&store, 1, LIMIT).unwrap();
        assert_eq!(
            decision,
            GateDecision::Serve {
                unlimited: false,
                used: LIMIT - 1
            }
        );
        store.append_message(1, "hey", Direction::FromUser).unwrap();
        assert_eq!(store.count_user_messages(1).unwrap(), LIMIT);
    }

    #[test]
    fn unlimited_access_bypasses_the_quota() {
        let store = temp_store();
        store.grant_unlimited_access(1).unwrap();
        for _ in 0..LIMIT + 5 {
            store.append_message(1, "hey", Direction::FromUser).unwrap();
        }
        match evaluate(&store, 1, LIMIT).unwrap() {
            GateDecision::Serve { unlimited: true, .. } => {}
            other => panic!("expected unlimited serve, got {:?}", other),
        }
    }

    #[test]
    fn unlimited_and_character_unlocks_are_independent() {
        let store = temp_store();
        store.grant_unlimited_access(1).unwrap();
        assert!(!store.is_character_unlocked(1, "priya", true).unwrap());
        store.unlock_character(2, "priya").unwrap();
        assert!(!store.has_unlimited_access(2).unwrap());
    }

    #[test]
    fn warnings_are_graduated() {
        assert_eq!(quota_warning(6, LIMIT), None);
        assert_eq!(quota_warning(7, LIMIT), Some(QuotaWarning::Remaining(3)));
        assert_eq!(quota_warning(8, LIMIT), Some(QuotaWarning::Remaining(2)));
        assert_eq!(quota_warning(9, LIMIT), Some(QuotaWarning::Remaining(1)));
        assert_eq!(quota_warning(10, LIMIT), Some(QuotaWarning::LastFree));
    }

    // End-to-end quota walk: nine served, the tenth is the last free
    // message, the eleventh is denied with an offer.
    #[test]
    fn free_quota_runs_out_exactly_at_the_limit() {
        let store = temp_store();
        for i in 1..=LIMIT {
            let decision = evaluate(&store, 1, LIMIT).unwrap();
            assert_eq!(
                decision,
                GateDecision::Serve {
                    unlimited: false,
                    used: i - 1
                }
            );
            store.append_message(1, "hey", Direction::FromUser).unwrap();
            store.append_message(1, "hi!", Direction::FromBot).unwrap();
            let warning = quota_warning(i, LIMIT);
            if i == LIMIT {
                assert_eq!(warning, Some(QuotaWarning::LastFree));
            } else if i < LIMIT - 3 {
                assert_eq!(warning, None);
            }
        }
        let decision = evaluate(&store, 1, LIMIT).unwrap();
        assert_eq!(
            decision,
            GateDecision::Offer {
                used: LIMIT,
                limit: LIMIT
            }
        );
    }

    #[test]
    fn switching_characters_never_resets_the_counter() {
        let store = temp_store();
        for _ in 0..4 {
            store.append_message(1, "hey", Direction::FromUser).unwrap();
        }
        store.unlock_character(1, "priya").unwrap();
        store.set_active_character(1, "priya", true).unwrap();
        assert_eq!(store.count_user_messages(1).unwrap(), 4);
        store.set_active_character(1, "aisha", false).unwrap();
        assert_eq!(store.count_user_messages(1).unwrap(), 4);
    }
}
