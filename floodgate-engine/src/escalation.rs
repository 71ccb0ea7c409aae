//! Tier selection after a post has been counted.
//!
//! Called once per recorded submission with the count that `record_post`
//! just returned and the snapshot captured at the start of processing.

use floodgate_store::WindowStore;

use crate::policy::PolicySnapshot;

/// The discrete action level selected for a triggering post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Report,
    Remove,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Report => "report",
            Tier::Remove => "remove",
        }
    }
}

/// The tier to apply plus the posts to act on, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBatch {
    pub tier: Tier,
    pub post_ids: Vec<String>,
}

/// Pick the tier for an author who now has `count` posts in the window.
///
/// Remove is checked before Report, so when both thresholds are satisfied
/// the stronger tier always wins, including the degenerate configuration
/// where `remove_threshold <= report_threshold`.
pub fn select_tier(count: u64, policy: &PolicySnapshot) -> Option<Tier> {
    if !policy.enabled {
        return None;
    }

    if count >= policy.remove_threshold {
        Some(Tier::Remove)
    } else if count >= policy.report_threshold {
        Some(Tier::Report)
    } else {
        None
    }
}

/// Assemble the target set from the tracked window.
///
/// With `report_all` the first post of the window is acted on too;
/// otherwise only the posts after the first are targeted.
pub fn batch_targets(first: Option<String>, rest: Vec<String>, report_all: bool) -> Vec<String> {
    if report_all {
        first.into_iter().chain(rest).collect()
    } else {
        rest
    }
}

/// Map a freshly recorded count to the batch of posts to act on, if any.
///
/// The window is only read back once a threshold has actually been
/// crossed; posts below both thresholds never touch the store again.
pub async fn evaluate(
    store: &WindowStore,
    policy: &PolicySnapshot,
    author: &str,
    count: u64,
) -> anyhow::Result<Option<ActionBatch>> {
    let Some(tier) = select_tier(count, policy) else {
        return Ok(None);
    };

    let (first, rest) = store.first_and_rest(author).await?;
    let post_ids = batch_targets(first, rest, policy.report_all);

    Ok(Some(ActionBatch { tier, post_ids }))
}

#[cfg(test)]
mod tests {
    use floodgate_store::WindowStore;

    use super::{ActionBatch, Tier, batch_targets, evaluate, select_tier};
    use crate::policy::PolicySnapshot;

    fn policy(report_threshold: u64, remove_threshold: u64, report_all: bool) -> PolicySnapshot {
        PolicySnapshot {
            enabled: true,
            period_seconds: 24 * 3_600,
            report_all,
            send_modmail: false,
            report_threshold,
            remove_threshold,
            report_message: "report".to_owned(),
            remove_message: "remove".to_owned(),
            modmail_subject: "subject".to_owned(),
            modmail_body: "body".to_owned(),
        }
    }

    async fn record_and_evaluate(
        store: &WindowStore,
        policy: &PolicySnapshot,
        post_id: &str,
    ) -> Option<ActionBatch> {
        let count = store
            .record_post("author", post_id, policy.period_seconds)
            .await
            .unwrap();
        evaluate(store, policy, "author", count).await.unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| (*id).to_owned()).collect()
    }

    #[tokio::test]
    async fn escalates_report_then_remove_excluding_the_first_post() {
        let store = WindowStore::in_memory("test");
        let policy = policy(2, 3, false);

        assert_eq!(record_and_evaluate(&store, &policy, "p1").await, None);

        assert_eq!(
            record_and_evaluate(&store, &policy, "p2").await,
            Some(ActionBatch {
                tier: Tier::Report,
                post_ids: ids(&["p2"]),
            })
        );

        assert_eq!(
            record_and_evaluate(&store, &policy, "p3").await,
            Some(ActionBatch {
                tier: Tier::Remove,
                post_ids: ids(&["p2", "p3"]),
            })
        );

        assert_eq!(
            record_and_evaluate(&store, &policy, "p4").await,
            Some(ActionBatch {
                tier: Tier::Remove,
                post_ids: ids(&["p2", "p3", "p4"]),
            })
        );
    }

    #[tokio::test]
    async fn report_all_includes_the_first_post() {
        let store = WindowStore::in_memory("test");
        let policy = policy(2, 3, true);

        assert_eq!(record_and_evaluate(&store, &policy, "p1").await, None);

        assert_eq!(
            record_and_evaluate(&store, &policy, "p2").await,
            Some(ActionBatch {
                tier: Tier::Report,
                post_ids: ids(&["p1", "p2"]),
            })
        );

        assert_eq!(
            record_and_evaluate(&store, &policy, "p3").await,
            Some(ActionBatch {
                tier: Tier::Remove,
                post_ids: ids(&["p1", "p2", "p3"]),
            })
        );
    }

    #[test]
    fn remove_wins_when_thresholds_are_inverted() {
        // remove_threshold <= report_threshold: once both are satisfied
        // the check order makes Remove win, never Report.
        let policy = policy(3, 2, false);

        assert_eq!(select_tier(1, &policy), None);
        assert_eq!(select_tier(2, &policy), Some(Tier::Remove));
        assert_eq!(select_tier(3, &policy), Some(Tier::Remove));
        assert_eq!(select_tier(100, &policy), Some(Tier::Remove));
    }

    #[test]
    fn disabled_policy_selects_no_tier_for_any_count() {
        let mut policy = policy(2, 3, false);
        policy.enabled = false;

        for count in 0..20 {
            assert_eq!(select_tier(count, &policy), None);
        }
    }

    #[tokio::test]
    async fn disabled_policy_still_counts_but_never_batches() {
        let store = WindowStore::in_memory("test");
        let mut policy = policy(1, 2, false);
        policy.enabled = false;

        for post_id in ["p1", "p2", "p3"] {
            assert_eq!(record_and_evaluate(&store, &policy, post_id).await, None);
        }

        // The window kept counting while disabled.
        let (first, rest) = store.first_and_rest("author").await.unwrap();
        assert_eq!(first.as_deref(), Some("p1"));
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn target_assembly_honours_report_all() {
        let first = Some("p1".to_owned());
        assert_eq!(
            batch_targets(first.clone(), ids(&["p2", "p3"]), true),
            ids(&["p1", "p2", "p3"])
        );
        assert_eq!(
            batch_targets(first, ids(&["p2", "p3"]), false),
            ids(&["p2", "p3"])
        );
        assert_eq!(batch_targets(None, Vec::new(), true), Vec::<String>::new());
    }
}
