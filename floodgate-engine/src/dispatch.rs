//! Executes an action batch against the moderation transport.
//!
//! One post failing (permission error, already removed, not found) must
//! not keep the rest of the batch from being acted on, so per-post errors
//! are logged and skipped rather than propagated. Retrying belongs to the
//! transport, not here.

use anyhow::Context as _;
use tracing::{error, info};

use floodgate_core::ModerationActions;
use floodgate_utils::formatting::format_id_list;

use crate::escalation::{ActionBatch, Tier};
use crate::policy::PolicySnapshot;
use crate::template::{self, TemplateParams};

/// Apply every action the batch calls for under the given snapshot.
///
/// For `Report`, each post is reported with the rendered report message.
/// For `Remove`, each post is removed with the rendered removal note and,
/// when the policy asks for it, a single modmail covers the whole batch:
/// one notification per triggering event, not per post.
pub async fn execute_batch(
    actions: &dyn ModerationActions,
    policy: &PolicySnapshot,
    author: &str,
    batch: &ActionBatch,
) -> anyhow::Result<()> {
    let params = TemplateParams {
        post_ids: format_id_list(&batch.post_ids),
        num_posts: batch.post_ids.len() as u64,
        period_hours: policy.period_seconds / 3_600,
        report_threshold: policy.report_threshold,
        remove_threshold: policy.remove_threshold,
    };

    info!(
        author,
        tier = batch.tier.as_str(),
        num_posts = batch.post_ids.len(),
        "dispatching actions for tracked posts"
    );

    match batch.tier {
        Tier::Report => {
            // Templates were validated at policy-load time; a failure here
            // means the snapshot was built outside the validator.
            let reason = template::render(&policy.report_message, &params)
                .context("rendering report message")?;

            for post_id in &batch.post_ids {
                if let Err(source) = actions.report_post(post_id, &reason).await {
                    error!(
                        ?source,
                        %post_id,
                        tier = "report",
                        "failed to report post; continuing with batch"
                    );
                }
            }
        }
        Tier::Remove => {
            let note = template::render(&policy.remove_message, &params)
                .context("rendering removal note")?;

            for post_id in &batch.post_ids {
                if let Err(source) = actions.remove_post(post_id, &note).await {
                    error!(
                        ?source,
                        %post_id,
                        tier = "remove",
                        "failed to remove post; continuing with batch"
                    );
                }
            }

            if policy.send_modmail {
                let subject = template::render(&policy.modmail_subject, &params)
                    .context("rendering modmail subject")?;
                let body = template::render(&policy.modmail_body, &params)
                    .context("rendering modmail body")?;

                if let Err(source) = actions.send_modmail(&subject, &body).await {
                    error!(?source, author, "failed to send modmail notification");
                }
            }
        }
    }

    Ok(())
}
