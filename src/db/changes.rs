//! Table change notifications and observed queries.

use futures::stream::{self, BoxStream, StreamExt};
use sqlx::SqlitePool;
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::StoreError;

/// Capacity of the change bus. Slow observers that fall further behind than
/// this just re-run their query once.
const CHANGE_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Owners,
    Farms,
    Devices,
    SensorReadings,
    Silos,
    Cameras,
}

/// A live query: yields the current rows immediately, then again after
/// every write to the table it reads.
pub type Observed<T> = BoxStream<'static, Result<Vec<T>, StoreError>>;

#[derive(Clone)]
pub(crate) struct ChangeBus {
    tx: broadcast::Sender<Table>,
}

impl ChangeBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self { tx }
    }

    pub(crate) fn notify(&self, table: Table) {
        // No receivers just means nobody is observing right now.
        let _ = self.tx.send(table);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.tx.subscribe()
    }
}

/// Run `query` now and again whenever `table` changes.
///
/// The subscription is taken before the first query runs, so a write that
/// lands between the two is never missed.
pub(crate) fn observe<T, F, Fut>(
    pool: SqlitePool,
    bus: &ChangeBus,
    table: Table,
    query: F,
) -> Observed<T>
where
    T: Send + 'static,
    F: Fn(SqlitePool) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, StoreError>> + Send + 'static,
{
    let rx = bus.subscribe();

    stream::unfold(
        (pool, rx, query, true),
        move |(pool, mut rx, query, first)| async move {
            if !first {
                loop {
                    match rx.recv().await {
                        Ok(changed) if changed == table => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(?table, skipped, "Observer lagged; re-running query");
                            break;
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }

            let rows = query(pool.clone()).await;
            Some((rows, (pool, rx, query, false)))
        },
    )
    .boxed()
}
