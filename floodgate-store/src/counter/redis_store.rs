use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

/// Append the post and, only when it opened a fresh window, set the expiry.
/// Running both inside one script keeps the expiry from being set against a
/// stale length when two posts from the same author race.
const RECORD_POST_SCRIPT: &str = r#"
local count = redis.call('RPUSH', KEYS[1], ARGV[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return count
"#;

#[derive(Clone, Debug)]
pub struct RedisWindowStore {
    pool: Pool,
}

impl RedisWindowStore {
    pub fn from_url(redis_url: &str) -> anyhow::Result<Self> {
        let config = Config::from_url(redis_url);
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow::anyhow!("failed to create redis pool: {e}"))?;

        Ok(Self { pool })
    }

    pub async fn record_post(
        &self,
        key: &str,
        post_id: &str,
        period_seconds: u64,
    ) -> anyhow::Result<u64> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("failed to get redis connection: {e}"))?;

        let count: u64 = redis::Script::new(RECORD_POST_SCRIPT)
            .key(key)
            .arg(post_id)
            .arg(period_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("redis RPUSH/EXPIRE failed for key `{key}`: {e}"))?;

        Ok(count)
    }

    pub async fn first_and_rest(
        &self,
        key: &str,
    ) -> anyhow::Result<(Option<String>, Vec<String>)> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("failed to get redis connection: {e}"))?;

        let first = conn
            .lindex::<_, Option<String>>(key, 0)
            .await
            .map_err(|e| anyhow::anyhow!("redis LINDEX failed for key `{key}`: {e}"))?;

        let rest = conn
            .lrange::<_, Vec<String>>(key, 1, -1)
            .await
            .map_err(|e| anyhow::anyhow!("redis LRANGE failed for key `{key}`: {e}"))?;

        Ok((first, rest))
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("failed to get redis connection: {e}"))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("redis PING failed: {e}"))?;

        Ok(())
    }
}
