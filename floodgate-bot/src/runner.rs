//! The single-worker ingestion loop and its supervisor.
//!
//! One cooperative task alternates between a bounded batch of new
//! submissions and a bounded batch of unread moderator messages, then
//! sleeps for the poll interval. Submissions are evaluated strictly in
//! arrival order; a slow external call stalls the loop rather than
//! reordering it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use tracing::{debug, error, info, warn};

use floodgate_core::{InboxMessage, Submission};
use floodgate_engine::dispatch;
use floodgate_engine::escalation::evaluate;
use floodgate_engine::policy::PolicyHandle;
use floodgate_engine::template::TEMPLATE_PARAMETERS;
use floodgate_reddit::{RedditClient, fullname};
use floodgate_store::WindowStore;
use floodgate_utils::formatting::format_compact_duration;
use floodgate_utils::time::{is_older_than, now_unix_secs};

use crate::backoff::{Backoff, RestartGuard};

/// Most submissions fetched per poll.
const STREAM_BATCH_LIMIT: u32 = 100;

/// A run that survives this long counts as healthy and resets the backoff.
const STABLE_RUN: Duration = Duration::from_secs(60);

const RESTART_BURST_LIMIT: usize = 5;
const RESTART_BURST_WINDOW: Duration = Duration::from_secs(300);

const UNKNOWN_COMMAND_REPLY: &str = "I don't understand that command. Try setting the \
     subject to 'reload' to update the configuration.";

pub struct Runner {
    client: Arc<RedditClient>,
    store: WindowStore,
    policy: PolicyHandle,
    policy_page: String,
    poll_interval: Duration,
}

impl Runner {
    pub fn new(
        client: Arc<RedditClient>,
        store: WindowStore,
        policy: PolicyHandle,
        policy_page: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            policy,
            policy_page,
            poll_interval,
        }
    }

    /// Supervise the ingestion loop until the process is terminated.
    ///
    /// Any error draining either stream restarts both from live items
    /// (the watermark resets and the age filter drops history) after a
    /// jittered backoff. Failing faster than the burst limit is fatal.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(300));
        let mut guard = RestartGuard::new(RESTART_BURST_LIMIT, RESTART_BURST_WINDOW);

        loop {
            let started = Instant::now();

            if let Err(source) = self.drain_streams().await {
                error!(?source, "stream processing failed; restarting from live items");

                if !guard.note_restart() {
                    bail!(
                        "more than {RESTART_BURST_LIMIT} restarts in {}; giving up",
                        format_compact_duration(RESTART_BURST_WINDOW.as_secs())
                    );
                }

                if started.elapsed() >= STABLE_RUN {
                    backoff.reset();
                }

                let delay = backoff.next_delay();
                warn!(delay_ms = delay.as_millis() as u64, "backing off before reconnecting");
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Poll both streams forever; returns only with an error.
    async fn drain_streams(&self) -> anyhow::Result<()> {
        let mut watermark: Option<String> = None;

        loop {
            let submissions = self
                .client
                .newest_submissions(watermark.as_deref(), STREAM_BATCH_LIMIT)
                .await?;

            if let Some(newest) = submissions.last() {
                watermark = Some(fullname(&newest.id));
            }

            for submission in &submissions {
                self.process_submission(submission).await?;
            }

            for message in self.client.unread_messages().await? {
                self.handle_inbox_message(&message).await?;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn process_submission(&self, submission: &Submission) -> anyhow::Result<()> {
        // One snapshot for the whole decision; a concurrent reload must
        // not split the age filter, tier selection and dispatch across
        // two policies.
        let policy = self.policy.current();

        if is_older_than(submission.created_utc, policy.period_seconds, now_unix_secs()) {
            debug!(post_id = %submission.id, "ignoring stream item older than the period");
            return Ok(());
        }

        // Counting is not gated on `enabled`, so re-enabling the policy
        // resumes from accurate in-window counts.
        let count = self
            .store
            .record_post(&submission.author, &submission.id, policy.period_seconds)
            .await?;

        info!(
            author = %submission.author,
            post_id = %submission.id,
            count,
            "new post recorded for the current period"
        );

        let Some(batch) = evaluate(&self.store, &policy, &submission.author, count).await? else {
            return Ok(());
        };

        info!(
            author = %submission.author,
            tier = batch.tier.as_str(),
            count,
            report_threshold = policy.report_threshold,
            remove_threshold = policy.remove_threshold,
            "posting threshold exceeded"
        );

        dispatch::execute_batch(self.client.as_ref(), &policy, &submission.author, &batch).await
    }

    async fn handle_inbox_message(&self, message: &InboxMessage) -> anyhow::Result<()> {
        debug!(sender = %message.sender, "handling inbox message");
        self.client.mark_read(&message.id).await?;

        let moderators = self.client.moderators().await?;
        let from_moderator = moderators
            .iter()
            .any(|moderator| moderator.name.eq_ignore_ascii_case(&message.sender));
        if !from_moderator {
            info!(sender = %message.sender, "message from non-moderator ignored");
            return Ok(());
        }

        if message.subject.trim().eq_ignore_ascii_case("reload") {
            self.reload_policy(message).await
        } else {
            info!(
                sender = %message.sender,
                subject = %message.subject,
                "moderator message was not a recognised command"
            );
            self.client.reply(&message.id, UNKNOWN_COMMAND_REPLY).await
        }
    }

    async fn reload_policy(&self, message: &InboxMessage) -> anyhow::Result<()> {
        let raw = self.client.wiki_page(&self.policy_page).await?;

        match self.policy.try_reload(&raw) {
            Ok(snapshot) => {
                info!(
                    sender = %message.sender,
                    enabled = snapshot.enabled,
                    report_threshold = snapshot.report_threshold,
                    remove_threshold = snapshot.remove_threshold,
                    period = %format_compact_duration(snapshot.period_seconds),
                    "policy reloaded"
                );

                let ack = format!(
                    "Configuration reloaded: report at {} and remove at {} posts per {}.",
                    snapshot.report_threshold,
                    snapshot.remove_threshold,
                    format_compact_duration(snapshot.period_seconds),
                );
                self.client.reply(&message.id, &ack).await
            }
            Err(problems) => {
                warn!(
                    sender = %message.sender,
                    problem_count = problems.len(),
                    "policy reload rejected; previous policy stays in effect"
                );

                let mut reply = String::from(
                    "The configuration was NOT reloaded; the previous policy stays in effect:\n",
                );
                for problem in &problems {
                    reply.push_str(&format!("\n- {problem}"));
                }
                reply.push_str(&format!(
                    "\n\nAvailable template parameters: {}.",
                    TEMPLATE_PARAMETERS.join(", ")
                ));
                self.client.reply(&message.id, &reply).await
            }
        }
    }
}
