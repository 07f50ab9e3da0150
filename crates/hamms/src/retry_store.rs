//! Counters behind the retries behavior.
//!
//! A counter holds the number of failures left for a key. It lives as long as the process
//! and is shared by every connection of one engine instance.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct RetryStore {
    counters: Arc<Mutex<HashMap<String, i64>>>,
}

impl RetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses up one try of `key` and returns the failures left.
    ///
    /// An unknown key starts at `tries - 1`, a known key is decremented while it is above
    /// zero.
    pub fn consume(&self, key: &str, tries: i64) -> i64 {
        let mut counters = self.lock();
        match counters.get_mut(key) {
            Some(remaining) => {
                if *remaining > 0 {
                    *remaining -= 1;
                }
                *remaining
            }
            None => {
                let remaining = tries - 1;
                counters.insert(key.to_owned(), remaining);
                remaining
            }
        }
    }

    /// Sets the failures left for `key`.
    pub fn reset(&self, key: &str, tries: i64) {
        self.lock().insert(key.to_owned(), tries);
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.lock().get(key).copied()
    }

    /// A sorted copy of every counter.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.lock().iter().map(|(key, remaining)| (key.clone(), *remaining)).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        // counters stay consistent even if a holder panicked, every update is a single write
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn countdown() {
        let store = RetryStore::new();
        assert_eq!(store.consume("default", 3), 2);
        assert_eq!(store.consume("default", 3), 1);
        assert_eq!(store.consume("default", 3), 0);
        assert_eq!(store.consume("default", 3), 0);
    }

    #[test]
    fn tries_only_apply_to_new_keys() {
        let store = RetryStore::new();
        assert_eq!(store.consume("a", 2), 1);
        assert_eq!(store.consume("a", 10), 0);
        assert_eq!(store.consume("b", 1), 0);
    }

    #[test]
    fn keys_are_independent() {
        let store = RetryStore::new();
        store.consume("a", 5);
        store.consume("a", 5);
        assert_eq!(store.consume("b", 5), 4);
        assert_eq!(store.get("a"), Some(3));
    }

    #[test]
    fn reset_overrides() {
        let store = RetryStore::new();
        store.consume("a", 2);
        store.reset("a", 4);
        assert_eq!(store.consume("a", 2), 3);

        store.reset("fresh", 0);
        assert_eq!(store.consume("fresh", 3), 0);
        assert_eq!(store.snapshot().into_iter().collect::<Vec<_>>(), vec![("a".to_owned(), 3), ("fresh".to_owned(), 0)]);
    }

    #[test]
    fn no_lost_updates() {
        let store = RetryStore::new();
        store.reset("shared", 1000);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.consume("shared", 3);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("shared"), Some(200));
    }
}
