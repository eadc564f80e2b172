//! Process-lifetime conversation history keyed by caller-chosen identifiers.
//!
//! Histories are stored in the canonical [`Message`] shape. Turns on the same
//! identifier are serialized through [`ConversationStore::lock_turn`]; turns on
//! different identifiers never contend.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tokio::sync::{Mutex as TurnMutex, OwnedMutexGuard};
use tracing::debug;

use crate::config::StorePolicy;
use crate::types::{Message, Role};

type TurnLocks = Arc<Mutex<HashMap<String, Arc<TurnMutex<()>>>>>;

struct StoreState {
    conversations: LruCache<String, Vec<Message>>,
    /// 每次 clear 递增 用于识别跨越 clear 的轮次
    generation: u64,
}

/// 会话存储
pub struct ConversationStore {
    policy: StorePolicy,
    state: Mutex<StoreState>,
    turn_locks: TurnLocks,
}

/// 某个会话 id 的轮次锁
///
/// 由 [`ConversationStore::lock_turn`] 返回。释放时若没有其它轮次在等待，
/// 对应的锁条目会从存储中移除。
pub struct TurnGuard {
    id: String,
    generation: u64,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<TurnMutex<()>>,
    locks: TurnLocks,
}

impl TurnGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_unpoisoned(&self.locks);
        // 仅剩 map 与本 guard 两个引用时说明没有等待者
        let idle = locks
            .get(&self.id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(&self.id);
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::with_policy(StorePolicy::default())
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: StorePolicy) -> Self {
        let conversations = match policy.max_conversations {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            policy,
            state: Mutex::new(StoreState {
                conversations,
                generation: 0,
            }),
            turn_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    /// 返回会话历史的快照 未知 id 返回 `None`
    pub fn get(&self, id: &str) -> Option<Vec<Message>> {
        self.state().conversations.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state().conversations.contains(id)
    }

    /// 在会话末尾追加一条消息 会话不存在时新建
    pub fn append(&self, id: &str, message: Message) {
        let mut state = self.state();
        let mut messages = state.conversations.pop(id).unwrap_or_default();
        messages.push(message);
        self.store(&mut state, id, messages);
    }

    /// 用完整序列替换会话历史
    pub fn replace(&self, id: &str, messages: Vec<Message>) {
        let mut state = self.state();
        self.store(&mut state, id, messages);
    }

    /// 以轮次锁的名义写回完整历史
    ///
    /// 若轮次开始后存储被清空，则丢弃这次写入并返回 `false`。
    pub fn commit(&self, turn: &TurnGuard, messages: Vec<Message>) -> bool {
        let mut state = self.state();
        if state.generation != turn.generation {
            debug!(conversation = %turn.id, "store cleared during turn, discarding history");
            return false;
        }
        self.store(&mut state, &turn.id, messages);
        true
    }

    /// 清空所有会话 进行中的轮次不会再写回
    pub fn clear(&self) {
        let mut state = self.state();
        let dropped = state.conversations.len();
        state.conversations.clear();
        state.generation += 1;
        debug!(dropped, "cleared conversation store");
    }

    pub fn len(&self) -> usize {
        self.state().conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state()
            .conversations
            .iter()
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// 获取某个会话 id 的轮次锁
    ///
    /// 持有返回的 guard 期间，同一 id 上的其它轮次会等待。
    pub async fn lock_turn(&self, id: &str) -> TurnGuard {
        let lock = lock_unpoisoned(&self.turn_locks)
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(TurnMutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;
        let generation = self.state().generation;
        TurnGuard {
            id: id.to_string(),
            generation,
            guard: Some(guard),
            lock,
            locks: Arc::clone(&self.turn_locks),
        }
    }

    fn store(&self, state: &mut StoreState, id: &str, mut messages: Vec<Message>) {
        if let Some(max_turns) = self.policy.max_turns {
            trim_turns(&mut messages, max_turns);
        }
        if let Some((evicted, _)) = state.conversations.push(id.to_string(), messages) {
            if evicted != id {
                debug!(conversation = %evicted, "evicted least recently used conversation");
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        lock_unpoisoned(&self.state)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 丢弃最早的 user/assistant 轮次，leading system 消息始终保留
fn trim_turns(messages: &mut Vec<Message>, max_turns: NonZeroUsize) {
    let start = match messages.first() {
        Some(message) if message.role == Role::System => 1,
        _ => 0,
    };
    let limit = max_turns.get().saturating_mul(2);
    let body = messages.len() - start;
    if body > limit {
        messages.drain(start..start + (body - limit));
    }
}
