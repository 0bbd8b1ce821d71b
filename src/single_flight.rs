use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

use crate::error::PokedexError;

type Outcome<V> = Option<Result<V, PokedexError>>;

/// Collapses concurrent calls for the same key into one execution.
///
/// The first caller runs the work; callers arriving while it is in flight
/// wait for its outcome. If the running caller is dropped, a waiter retries
/// as the new leader.
pub struct SingleFlight<K, V> {
    in_flight: Mutex<HashMap<K, (u64, watch::Receiver<Outcome<V>>)>>,
    next_generation: AtomicU64,
}

enum Role<V> {
    Lead(u64, watch::Sender<Outcome<V>>),
    Join(watch::Receiver<Outcome<V>>),
}

struct LeaderGuard<'a, K: Eq + Hash, V> {
    flight: &'a SingleFlight<K, V>,
    key: K,
    generation: u64,
}

impl<K: Eq + Hash, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        let mut map = self
            .flight
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if map.get(&self.key).map(|(generation, _)| *generation) == Some(self.generation) {
            map.remove(&self.key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight
            .lock()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, PokedexError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, PokedexError>>,
    {
        loop {
            let role = {
                let mut map = self
                    .in_flight
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                match map.get(&key) {
                    Some((_, receiver)) => Role::Join(receiver.clone()),
                    None => {
                        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                        let (sender, receiver) = watch::channel(None);
                        map.insert(key.clone(), (generation, receiver));
                        Role::Lead(generation, sender)
                    }
                }
            };

            match role {
                Role::Join(mut receiver) => {
                    debug!(?key, "joining in-flight operation");
                    let outcome = receiver
                        .wait_for(|outcome| outcome.is_some())
                        .await
                        .map(|outcome| outcome.clone());
                    match outcome {
                        Ok(Some(result)) => return result,
                        _ => continue,
                    }
                }
                Role::Lead(generation, sender) => {
                    let _guard = LeaderGuard {
                        flight: self,
                        key: key.clone(),
                        generation,
                    };
                    let result = work().await;
                    sender.send_replace(Some(result.clone()));
                    return result;
                }
            }
        }
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
