mod backoff;
mod runner;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rustls::crypto::ring::default_provider;

use floodgate_engine::policy::{self, PolicyHandle};
use floodgate_reddit::RedditClient;
use floodgate_store::WindowStore;
use floodgate_utils::formatting::format_compact_duration;
use runner::Runner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        let target = metadata.target();

        let within_info_level = *metadata.level() <= tracing::Level::INFO;
        if !within_info_level {
            return false;
        }

        !(target.starts_with("hyper_util") || target.starts_with("reqwest::connect"))
    }));

    tracing_subscriber::registry().with(fmt_layer).init();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    // Load the .env file
    dotenvy::dotenv().ok();

    let client = Arc::new(RedditClient::from_env()?);
    info!(
        username = client.username(),
        subreddit = client.subreddit(),
        "Reddit client configured."
    );

    let redis_enabled = env_bool("REDIS_ENABLED", true);
    let redis_key_prefix =
        env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "floodgate:prod".to_string());

    let store = if redis_enabled {
        match env::var("REDIS_URL") {
            Ok(redis_url) => match WindowStore::redis(&redis_url, redis_key_prefix.clone()) {
                Ok(store) => {
                    info!(key_prefix = %redis_key_prefix, "Redis window counter enabled.");
                    store
                }
                Err(err) => {
                    warn!(?err, key_prefix = %redis_key_prefix, "Failed to initialize Redis counter; continuing with the in-memory counter (counts reset on restart).");
                    WindowStore::in_memory(redis_key_prefix.clone())
                }
            },
            Err(_) => {
                warn!(key_prefix = %redis_key_prefix, "REDIS_ENABLED=true but REDIS_URL is missing; continuing with the in-memory counter (counts reset on restart).");
                WindowStore::in_memory(redis_key_prefix.clone())
            }
        }
    } else {
        info!("Redis counter disabled (set REDIS_ENABLED=true to enable); counts reset on restart.");
        WindowStore::in_memory(redis_key_prefix.clone())
    };

    if store.is_redis() {
        if let Err(err) = store.ping().await {
            warn!(
                ?err,
                "Redis ping failed; counting will be retried by the supervisory loop."
            );
        } else {
            info!("Redis health check passed.");
        }
    }

    // The account must moderate the subreddit at all; acting on posts
    // additionally needs the `posts` grant.
    let moderators = client.moderators().await?;
    match moderators
        .iter()
        .find(|moderator| moderator.name.eq_ignore_ascii_case(client.username()))
    {
        None => {
            anyhow::bail!(
                "{} is not a moderator of r/{}",
                client.username(),
                client.subreddit()
            );
        }
        Some(entry) if !entry.can_manage_posts() => {
            warn!(
                username = client.username(),
                "moderator account lacks the `posts` permission; report/remove calls will fail"
            );
        }
        Some(_) => info!("Moderator permissions verified."),
    }

    // Initial policy load is fatal on failure; there is no prior snapshot
    // to fall back on.
    let policy_page = env::var("POLICY_WIKI_PAGE").unwrap_or_else(|_| "floodgate".to_string());
    let raw = client.wiki_page(&policy_page).await?;
    let snapshot = match policy::parse_policy(&raw) {
        Ok(snapshot) => snapshot,
        Err(problems) => {
            for problem in &problems {
                error!(%problem, "policy document problem");
            }
            anyhow::bail!(
                "initial policy load from wiki page `{policy_page}` failed with {} problem(s)",
                problems.len()
            );
        }
    };

    info!(
        enabled = snapshot.enabled,
        report_threshold = snapshot.report_threshold,
        remove_threshold = snapshot.remove_threshold,
        period = %format_compact_duration(snapshot.period_seconds),
        "Policy loaded."
    );
    let policy = PolicyHandle::new(snapshot);

    let poll_interval = Duration::from_secs(env_u64("POLL_INTERVAL_SECONDS", 10));

    info!("Floodgate is watching the submission stream...");
    Runner::new(client, store, policy, policy_page, poll_interval)
        .run()
        .await
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}
