// ── Concurrent token storage ──
//
// Lock-free keyed storage with O(1) lookups and push-based snapshot
// notification via a `watch` channel. Mutations go through `mutate`
// so concurrent reconciliation passes each see a consistent row.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::Token;

pub(crate) struct TokenCollection {
    /// Primary storage: token username -> row.
    by_username: DashMap<String, Arc<Token>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for cheap subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<Token>>>>,
}

impl TokenCollection {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_username: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace a row. Returns `true` if the username was new.
    pub(crate) fn upsert(&self, token: Token) -> bool {
        let is_new = !self.by_username.contains_key(&token.username);
        self.by_username
            .insert(token.username.clone(), Arc::new(token));

        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Apply a closure to the row under the map's entry lock and store the
    /// result. Returns the updated row, or `None` if the username is absent.
    pub(crate) fn mutate(
        &self,
        username: &str,
        f: impl FnOnce(&mut Token),
    ) -> Option<Arc<Token>> {
        let updated = {
            let mut entry = self.by_username.get_mut(username)?;
            let mut row = (**entry).clone();
            f(&mut row);
            let arc = Arc::new(row);
            *entry = Arc::clone(&arc);
            arc
        };

        self.rebuild_snapshot();
        self.bump_version();
        Some(updated)
    }

    pub(crate) fn get(&self, username: &str) -> Option<Arc<Token>> {
        self.by_username.get(username).map(|r| Arc::clone(r.value()))
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<Token>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Token>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_username.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<Token>> = self
            .by_username
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
