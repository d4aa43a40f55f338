use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use pastegate_common::PasteView;

pub struct Paste {
    pub content: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// `None` means unlimited.
    pub remaining_views: Option<u64>,
}

impl Paste {
    pub fn new(
        content: String,
        ttl_seconds: Option<u64>,
        max_views: Option<u64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            content,
            expires_at: ttl_seconds
                .and_then(|ttl| i64::try_from(ttl).ok())
                .and_then(|ttl| now.checked_add_signed(Duration::seconds(ttl))),
            remaining_views: max_views,
        }
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires| now > expires)
    }

    fn snapshot(&self) -> PasteView {
        PasteView {
            content: self.content.clone(),
            remaining_views: self.remaining_views,
            expires_at: self.expires_at,
        }
    }
}

/// In-memory paste storage. Every operation holds the lock for its whole
/// duration, so a view is granted at most as many times as it was allowed.
#[derive(Default)]
pub struct Store {
    pastes: Mutex<HashMap<String, Paste>>,
}

impl Store {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Paste>> {
        self.pastes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the paste under the first candidate key that is not taken.
    /// Returns `None` if every candidate collided.
    pub fn insert(&self, paste: Paste, keys: impl IntoIterator<Item = String>) -> Option<String> {
        let mut pastes = self.lock();
        let key = keys.into_iter().find(|key| !pastes.contains_key(key))?;
        pastes.insert(key.clone(), paste);
        Some(key)
    }

    /// Spends one view of a paste and returns what the viewer gets to see.
    /// Expired and exhausted pastes are removed and reported as missing.
    pub fn take_view(&self, id: &str, now: DateTime<Utc>) -> Option<PasteView> {
        let mut pastes = self.lock();
        let paste = pastes.get_mut(id)?;

        if paste.expired(now) {
            pastes.remove(id);
            return None;
        }

        match paste.remaining_views {
            None => Some(paste.snapshot()),
            Some(0) => {
                pastes.remove(id);
                None
            }
            Some(remaining) => {
                paste.remaining_views = Some(remaining - 1);
                let view = paste.snapshot();
                if remaining == 1 {
                    pastes.remove(id);
                }
                Some(view)
            }
        }
    }

    /// Drops every expired paste, returning how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut pastes = self.lock();
        let before = pastes.len();
        pastes.retain(|_, paste| !paste.expired(now));
        before - pastes.len()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn put(store: &Store, id: &str, paste: Paste) {
        assert_eq!(store.insert(paste, [id.to_owned()]).as_deref(), Some(id));
    }

    #[test]
    fn views_count_down_then_vanish() {
        let store = Store::default();
        put(&store, "a", Paste::new("hi".into(), None, Some(2), at(0)));

        let first = store.take_view("a", at(1)).unwrap();
        assert_eq!(first.remaining_views, Some(1));
        let second = store.take_view("a", at(2)).unwrap();
        assert_eq!(second.remaining_views, Some(0));

        assert_eq!(store.take_view("a", at(3)), None);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn unlimited_pastes_stay() {
        let store = Store::default();
        put(&store, "a", Paste::new("hi".into(), None, None, at(0)));

        for i in 0..5 {
            let view = store.take_view("a", at(i)).unwrap();
            assert_eq!(view.remaining_views, None);
            assert_eq!(view.expires_at, None);
        }
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn expiry_is_exclusive_of_the_deadline() {
        let store = Store::default();
        put(&store, "a", Paste::new("hi".into(), Some(10), None, at(0)));

        let view = store.take_view("a", at(10)).unwrap();
        assert_eq!(view.expires_at, Some(at(10)));
        assert_eq!(store.take_view("a", at(11)), None);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn expired_pastes_do_not_spend_views() {
        let store = Store::default();
        put(&store, "a", Paste::new("hi".into(), Some(1), Some(3), at(0)));
        assert_eq!(store.take_view("a", at(5)), None);
    }

    #[test]
    fn keys_are_not_overwritten() {
        let store = Store::default();
        put(&store, "a", Paste::new("one".into(), None, None, at(0)));

        let taken = Paste::new("two".into(), None, None, at(0));
        assert_eq!(store.insert(taken, ["a".to_owned()]), None);

        let second = Paste::new("three".into(), None, None, at(0));
        let key = store.insert(second, ["a".to_owned(), "b".to_owned()]);
        assert_eq!(key.as_deref(), Some("b"));

        assert_eq!(store.take_view("a", at(0)).unwrap().content, "one");
        assert_eq!(store.take_view("b", at(0)).unwrap().content, "three");
    }

    #[test]
    fn sweep_removes_only_expired() {
        let store = Store::default();
        put(&store, "old", Paste::new("x".into(), Some(1), None, at(0)));
        put(&store, "new", Paste::new("y".into(), Some(100), None, at(0)));
        put(&store, "forever", Paste::new("z".into(), None, None, at(0)));

        assert_eq!(store.sweep(at(50)), 1);
        assert_eq!(store.count(), 2);
        assert!(store.take_view("new", at(50)).is_some());
    }
}
