use redis::AsyncCommands;
use uuid::Uuid;

/// Wraps a multiplexed async connection — cheap to clone, safe to share
/// across handlers.
#[derive(Clone)]
pub struct RedisClient {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }

    /// `(is_limited, current_count, remaining)`. The increment and the TTL
    /// are applied as a single pipelined round-trip so a crash between the
    /// two can never leave a counter without an expiry. On any Redis
    /// failure this fails *open* — the caller proceeds as if unlimited —
    /// and the error is logged by the caller.
    pub async fn is_rate_limited(
        &self,
        operation: &str,
        user_id: Uuid,
        max_count: u64,
        window_seconds: u64,
    ) -> Result<(bool, u64, u64), redis::RedisError> {
        let key = format!("ratelimit:{operation}:{user_id}");
        let mut conn = self.connection.clone();

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, window_seconds as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        let remaining = max_count.saturating_sub(count);
        Ok((count > max_count, count, remaining))
    }

    /// Decrements a named counter (e.g. flight/stock availability cached
    /// from Postgres) without letting it go negative — ported from the
    /// teacher's Lua-scripted `decr_flight_availability`.
    pub async fn decr_floor_zero(&self, key: &str, by: i64) -> Result<i64, redis::RedisError> {
        const SCRIPT: &str = r#"
            local current = tonumber(redis.call('GET', KEYS[1]) or '0')
            local delta = tonumber(ARGV[1])
            local updated = current - delta
            if updated < 0 then
                updated = current
            else
                redis.call('SET', KEYS[1], updated)
            end
            return updated
        "#;
        let mut conn = self.connection.clone();
        redis::Script::new(SCRIPT).key(key).arg(by).invoke_async(&mut conn).await
    }

    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>, redis::RedisError> {
        let mut conn = self.connection.clone();
        conn.get(key).await
    }
}
