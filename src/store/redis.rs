//! Redis store backend.
//!
//! All connections go through a shared [`ConnectionManager`] (multiplexed,
//! auto-reconnecting). The two pairing scripts are constructed once at
//! startup; the driver loads them server-side on first use and falls back to
//! a full `EVAL` after a script flush.

use super::{Backend, JoinOutcome, StoreError, keys};
use crate::Uid;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::time::Duration;

/// Atomically match against a caller-supplied candidate list or enqueue.
///
/// KEYS[1] = waiting queue, KEYS[2] = active-chat set.
/// ARGV[1] = caller id, ARGV[2] = ttl seconds, ARGV[3] = queue cap,
/// ARGV[4..] = compatibility-filtered candidate ids, best first.
const JOIN_OR_MATCH: &str = r#"
for i = 4, #ARGV do
    local cand = ARGV[i]
    if redis.call('LREM', KEYS[1], -1, cand) == 1 then
        redis.call('SET', 'pair:' .. ARGV[1], cand, 'EX', ARGV[2])
        redis.call('SET', 'pair:' .. cand, ARGV[1], 'EX', ARGV[2])
        redis.call('SET', 'state:' .. ARGV[1], 'IN_CHAT', 'EX', ARGV[2])
        redis.call('SET', 'state:' .. cand, 'IN_CHAT', 'EX', ARGV[2])
        redis.call('SADD', KEYS[2], ARGV[1], cand)
        return {'matched', cand}
    end
end
if redis.call('LLEN', KEYS[1]) >= tonumber(ARGV[3]) then
    return {'full'}
end
redis.call('LREM', KEYS[1], 0, ARGV[1])
redis.call('LPUSH', KEYS[1], ARGV[1])
redis.call('SET', 'state:' .. ARGV[1], 'IN_QUEUE', 'EX', ARGV[2])
return {'queued'}
"#;

/// Tear down a pair only while it is still mutual.
///
/// KEYS[1] = active-chat set. ARGV[1], ARGV[2] = the pair.
const BREAK_PAIR: &str = r#"
local pa = redis.call('GET', 'pair:' .. ARGV[1])
local pb = redis.call('GET', 'pair:' .. ARGV[2])
if pa == ARGV[2] and pb == ARGV[1] then
    redis.call('DEL', 'pair:' .. ARGV[1], 'pair:' .. ARGV[2])
    redis.call('DEL', 'state:' .. ARGV[1], 'state:' .. ARGV[2])
    redis.call('SREM', KEYS[1], ARGV[1], ARGV[2])
    return 1
end
return 0
"#;

/// Production store backend over Redis.
pub struct RedisBackend {
    conn: ConnectionManager,
    join_or_match: Script,
    break_pair: Script,
}

impl RedisBackend {
    /// Connect to the store and register the pairing scripts.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::Unavailable)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            join_or_match: Script::new(JOIN_OR_MATCH),
            break_pair: Script::new(BREAK_PAIR),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: bool = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn();
        let len: i64 = conn.lpush(key, value).await?;
        Ok(len)
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.rpop(key, None).await?;
        Ok(value)
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let values: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(values)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let len: usize = conn.llen(key).await?;
        Ok(len)
    }

    async fn lrem(&self, key: &str, value: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn();
        let removed: i64 = conn.lrem(key, 0, value).await?;
        Ok(removed)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: i64 = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: i64 = conn.srem(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let is_member: bool = conn.sismember(key, member).await?;
        Ok(is_member)
    }

    async fn scard(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let count: usize = conn.scard(key).await?;
        Ok(count)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(&str, String)],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn();
        let map: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn();
        let value: i64 = conn.hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn join_or_match(
        &self,
        me: Uid,
        candidates: &[Uid],
        ttl: Duration,
        max_queue: usize,
    ) -> Result<JoinOutcome, StoreError> {
        let mut conn = self.conn();
        let mut invocation = self.join_or_match.prepare_invoke();
        invocation
            .key(keys::QUEUE)
            .key(keys::ACTIVE_CHATS)
            .arg(me)
            .arg(ttl.as_secs())
            .arg(max_queue);
        for candidate in candidates {
            invocation.arg(*candidate);
        }
        let reply: Vec<String> = invocation.invoke_async(&mut conn).await?;

        match reply.first().map(String::as_str) {
            Some("matched") => {
                let partner = reply
                    .get(1)
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(|| StoreError::Corrupt("join_or_match partner".into()))?;
                Ok(JoinOutcome::Matched(partner))
            }
            Some("queued") => Ok(JoinOutcome::Queued),
            Some("full") => Ok(JoinOutcome::QueueFull),
            _ => Err(StoreError::Corrupt("join_or_match reply".into())),
        }
    }

    async fn break_pair(&self, a: Uid, b: Uid) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let broken: i64 = self
            .break_pair
            .key(keys::ACTIVE_CHATS)
            .arg(a)
            .arg(b)
            .invoke_async(&mut conn)
            .await?;
        Ok(broken == 1)
    }

    async fn force_pair(&self, a: Uid, b: Uid, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let secs = ttl.as_secs();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(keys::pair(a), b.to_string(), secs)
            .ignore()
            .set_ex(keys::pair(b), a.to_string(), secs)
            .ignore()
            .set_ex(keys::state(a), "IN_CHAT", secs)
            .ignore()
            .set_ex(keys::state(b), "IN_CHAT", secs)
            .ignore()
            .sadd(keys::ACTIVE_CHATS, vec![a.to_string(), b.to_string()])
            .ignore();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
