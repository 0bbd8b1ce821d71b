//! Push-updated query snapshots.
//!
//! Each live query keeps its latest snapshot in a `watch` channel. The store
//! recomputes a query once per committed write touching one of its tables and
//! every subscriber sees the same `Arc`. Queries nobody listens to are only
//! marked stale and get recomputed on the next subscribe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::Connection;
use tokio::sync::watch;
use tracing::warn;

/// Tables a write can touch; live queries declare which ones they read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Items,
    Types,
    ItemTypes,
    Species,
    Pocket,
}

pub(crate) type Compute<T> = fn(&Connection) -> rusqlite::Result<T>;

pub(crate) struct LiveQuery<T> {
    name: &'static str,
    reads: &'static [Table],
    compute: Compute<T>,
    sender: watch::Sender<Arc<T>>,
    stale: AtomicBool,
}

impl<T: Default> LiveQuery<T> {
    pub(crate) fn new(name: &'static str, reads: &'static [Table], compute: Compute<T>) -> Self {
        let (sender, _) = watch::channel(Arc::new(T::default()));
        Self {
            name,
            reads,
            compute,
            sender,
            stale: AtomicBool::new(true),
        }
    }

    fn reads_any(&self, touched: &[Table]) -> bool {
        touched.iter().any(|table| self.reads.contains(table))
    }

    /// Caller must hold the connection lock so recomputes are serialized with writes.
    pub(crate) fn on_write(&self, conn: &Connection, touched: &[Table]) {
        if !self.reads_any(touched) {
            return;
        }
        if self.sender.receiver_count() == 0 {
            self.stale.store(true, Ordering::Release);
            return;
        }
        match (self.compute)(conn) {
            Ok(value) => {
                self.sender.send_replace(Arc::new(value));
                self.stale.store(false, Ordering::Release);
            }
            Err(err) => {
                warn!(query = self.name, error = %err, "live query refresh failed");
                self.stale.store(true, Ordering::Release);
            }
        }
    }

    pub(crate) fn subscribe(&self, conn: &Connection) -> rusqlite::Result<Subscription<T>> {
        if self.stale.load(Ordering::Acquire) {
            let value = (self.compute)(conn)?;
            self.sender.send_replace(Arc::new(value));
            self.stale.store(false, Ordering::Release);
        }
        Ok(Subscription::new(self.sender.subscribe()))
    }
}

/// A subscriber's handle on a live query.
///
/// The first `next()` resolves immediately with the current snapshot; later
/// calls wait for the next write that affects the query.
pub struct Subscription<T> {
    receiver: watch::Receiver<Arc<T>>,
    primed: bool,
}

impl<T> Subscription<T> {
    fn new(receiver: watch::Receiver<Arc<T>>) -> Self {
        Self {
            receiver,
            primed: false,
        }
    }

    pub fn current(&self) -> Arc<T> {
        self.receiver.borrow().clone()
    }

    pub fn has_changed(&self) -> bool {
        !self.primed || self.receiver.has_changed().unwrap_or(false)
    }

    /// Returns `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<Arc<T>> {
        if !self.primed {
            self.primed = true;
            return Some(self.receiver.borrow_and_update().clone());
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            primed: self.primed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_rows(conn: &Connection) -> rusqlite::Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT v FROM t ORDER BY v")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        conn
    }

    #[tokio::test]
    async fn first_next_yields_current_snapshot() {
        let conn = setup();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        let query = LiveQuery::new("t", &[Table::Items], count_rows);

        let mut sub = query.subscribe(&conn).unwrap();
        assert_eq!(*sub.next().await.unwrap(), vec![1]);
        assert!(!sub.has_changed());
    }

    #[tokio::test]
    async fn unrelated_writes_do_not_notify() {
        let conn = setup();
        let query = LiveQuery::new("t", &[Table::Items], count_rows);
        let mut sub = query.subscribe(&conn).unwrap();
        sub.next().await.unwrap();

        conn.execute("INSERT INTO t VALUES (2)", []).unwrap();
        query.on_write(&conn, &[Table::Pocket]);
        assert!(!sub.has_changed());

        query.on_write(&conn, &[Table::Items]);
        assert!(sub.has_changed());
        assert_eq!(*sub.next().await.unwrap(), vec![2]);
    }

    #[test]
    fn writes_without_subscribers_mark_stale() {
        let conn = setup();
        let query = LiveQuery::new("t", &[Table::Items], count_rows);
        drop(query.subscribe(&conn).unwrap());

        conn.execute("INSERT INTO t VALUES (3)", []).unwrap();
        query.on_write(&conn, &[Table::Items]);
        let sub = query.subscribe(&conn).unwrap();
        assert_eq!(*sub.current(), vec![3]);
    }
}
