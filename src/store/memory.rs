//! In-memory store backend.
//!
//! A single-process map behind one mutex, used by the test harness and by
//! local development without a Redis instance. Holding the whole map under
//! one lock makes every operation - including the multi-key pairing
//! operations - trivially atomic, which is exactly the guarantee the Lua
//! scripts provide in production.
//!
//! TTLs are honored lazily: an expired entry is dropped the next time any
//! operation touches its key.

use super::{Backend, JoinOutcome, StoreError, keys};
use crate::Uid;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn expiring(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

type Map = HashMap<String, Entry>;

fn purge(map: &mut Map, key: &str) {
    if map.get(key).is_some_and(Entry::is_expired) {
        map.remove(key);
    }
}

fn str_value<'a>(map: &'a Map, key: &str) -> Result<Option<&'a String>, StoreError> {
    match map.get(key).map(|e| &e.value) {
        None => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s)),
        Some(_) => Err(StoreError::Corrupt(key.to_string())),
    }
}

fn list_mut<'a>(map: &'a mut Map, key: &str) -> Result<&'a mut VecDeque<String>, StoreError> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Entry::live(Value::List(VecDeque::new())));
    match &mut entry.value {
        Value::List(list) => Ok(list),
        _ => Err(StoreError::Corrupt(key.to_string())),
    }
}

fn set_mut<'a>(map: &'a mut Map, key: &str) -> Result<&'a mut HashSet<String>, StoreError> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Entry::live(Value::Set(HashSet::new())));
    match &mut entry.value {
        Value::Set(set) => Ok(set),
        _ => Err(StoreError::Corrupt(key.to_string())),
    }
}

fn hash_mut<'a>(map: &'a mut Map, key: &str) -> Result<&'a mut HashMap<String, String>, StoreError> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Entry::live(Value::Hash(HashMap::new())));
    match &mut entry.value {
        Value::Hash(hash) => Ok(hash),
        _ => Err(StoreError::Corrupt(key.to_string())),
    }
}

/// In-memory store backend.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Map>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        Ok(str_value(&map, key)?.cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.lock();
        let entry = match ttl {
            Some(ttl) => Entry::expiring(Value::Str(value.to_string()), ttl),
            None => Entry::live(Value::Str(value.to_string())),
        };
        map.insert(key.to_string(), entry);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(
            key.to_string(),
            Entry::expiring(Value::Str(value.to_string()), ttl),
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        Ok(map.contains_key(key))
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        let current: i64 = match str_value(&map, key)? {
            Some(raw) => raw
                .parse()
                .map_err(|_| StoreError::Corrupt(key.to_string()))?,
            None => 0,
        };
        let next = current + 1;
        // INCR preserves an existing TTL.
        let expires_at = map.get(key).and_then(|e| e.expires_at);
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(next.to_string()),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        if let Some(entry) = map.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        let list = list_mut(&mut map, key)?;
        list.push_front(value.to_string());
        Ok(list.len() as i64)
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        let list = list_mut(&mut map, key)?;
        Ok(list.pop_back())
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        match map.get(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        match map.get(key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len()),
            Some(_) => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn lrem(&self, key: &str, value: &str) -> Result<i64, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        let list = list_mut(&mut map, key)?;
        let before = list.len();
        list.retain(|v| v != value);
        Ok((before - list.len()) as i64)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        set_mut(&mut map, key)?.insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        set_mut(&mut map, key)?.remove(member);
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        match map.get(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        match map.get(key).map(|e| &e.value) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn scard(&self, key: &str) -> Result<usize, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        match map.get(key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len()),
            Some(_) => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        match map.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(&str, String)],
    ) -> Result<(), StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        let hash = hash_mut(&mut map, key)?;
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        match map.get(key).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(StoreError::Corrupt(key.to_string())),
        }
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, key);
        let hash = hash_mut(&mut map, key)?;
        let current: i64 = match hash.get(field) {
            Some(raw) => raw
                .parse()
                .map_err(|_| StoreError::Corrupt(key.to_string()))?,
            None => 0,
        };
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn join_or_match(
        &self,
        me: Uid,
        candidates: &[Uid],
        ttl: Duration,
        max_queue: usize,
    ) -> Result<JoinOutcome, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, keys::QUEUE);

        for candidate in candidates {
            let wanted = candidate.to_string();
            let queue = list_mut(&mut map, keys::QUEUE)?;
            let held = queue.iter().any(|v| *v == wanted);
            if !held {
                continue;
            }
            queue.retain(|v| *v != wanted);

            map.insert(
                keys::pair(me),
                Entry::expiring(Value::Str(wanted.clone()), ttl),
            );
            map.insert(
                keys::pair(*candidate),
                Entry::expiring(Value::Str(me.to_string()), ttl),
            );
            map.insert(
                keys::state(me),
                Entry::expiring(Value::Str("IN_CHAT".into()), ttl),
            );
            map.insert(
                keys::state(*candidate),
                Entry::expiring(Value::Str("IN_CHAT".into()), ttl),
            );
            let active = set_mut(&mut map, keys::ACTIVE_CHATS)?;
            active.insert(me.to_string());
            active.insert(wanted);
            return Ok(JoinOutcome::Matched(*candidate));
        }

        let mine = me.to_string();
        let queue = list_mut(&mut map, keys::QUEUE)?;
        if queue.len() >= max_queue {
            return Ok(JoinOutcome::QueueFull);
        }
        queue.retain(|v| *v != mine);
        queue.push_front(mine);
        map.insert(
            keys::state(me),
            Entry::expiring(Value::Str("IN_QUEUE".into()), ttl),
        );
        Ok(JoinOutcome::Queued)
    }

    async fn break_pair(&self, a: Uid, b: Uid) -> Result<bool, StoreError> {
        let mut map = self.inner.lock();
        purge(&mut map, &keys::pair(a));
        purge(&mut map, &keys::pair(b));

        let (a_str, b_str) = (a.to_string(), b.to_string());
        let mutual = str_value(&map, &keys::pair(a))?.is_some_and(|v| *v == b_str)
            && str_value(&map, &keys::pair(b))?.is_some_and(|v| *v == a_str);
        if !mutual {
            return Ok(false);
        }

        map.remove(&keys::pair(a));
        map.remove(&keys::pair(b));
        map.remove(&keys::state(a));
        map.remove(&keys::state(b));
        if let Ok(active) = set_mut(&mut map, keys::ACTIVE_CHATS) {
            active.remove(&a.to_string());
            active.remove(&b.to_string());
        }
        Ok(true)
    }

    async fn force_pair(&self, a: Uid, b: Uid, ttl: Duration) -> Result<(), StoreError> {
        let mut map = self.inner.lock();
        map.insert(
            keys::pair(a),
            Entry::expiring(Value::Str(b.to_string()), ttl),
        );
        map.insert(
            keys::pair(b),
            Entry::expiring(Value::Str(a.to_string()), ttl),
        );
        map.insert(
            keys::state(a),
            Entry::expiring(Value::Str("IN_CHAT".into()), ttl),
        );
        map.insert(
            keys::state(b),
            Entry::expiring(Value::Str("IN_CHAT".into()), ttl),
        );
        let active = set_mut(&mut map, keys::ACTIVE_CHATS)?;
        active.insert(a.to_string());
        active.insert(b.to_string());
        Ok(())
    }
}
