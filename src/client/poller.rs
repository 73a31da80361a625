use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::engine::{ConvergenceEngine, EditCapability, RemoteDecision, RemoteSource};
use super::remote::DocumentSource;
use super::Notice;

/// Handle of a running poller. Dropping it stops the polling.
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Re-read the page every `interval` and feed it through the engine.
///
/// This is the only way a client without a realtime channel converges.
/// Access changes are picked up on every read. A page that disappeared ends
/// the polling with a not-found notice.
pub fn spawn_poller(
    engine: Arc<Mutex<ConvergenceEngine>>,
    source: Arc<dyn DocumentSource>,
    interval: Duration,
) -> PollHandle {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is immediate and the page was just loaded
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let (document_id, ticket) = {
                let engine = engine.lock().await;
                (engine.document_id().to_string(), engine.poll_ticket())
            };

            match source.fetch(&document_id).await {
                Ok(Some(doc)) => {
                    let mut engine = engine.lock().await;
                    engine.refresh_capability(EditCapability::from(&doc));
                    if engine.receive_remote(doc.content, RemoteSource::Poll(ticket)) == RemoteDecision::Applied {
                        debug!("Poll refreshed {}", document_id);
                    }
                }
                Ok(None) => {
                    info!("Page {} is gone, polling stopped", document_id);
                    engine.lock().await.notify(Notice::NotFound { document_id });
                    break;
                }
                Err(e) => {
                    warn!("Polling {} failed: {}", document_id, e);
                }
            }
        }
    });
    PollHandle { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::autosave::tests::RecordingPersister;
    use crate::client::remote::StoreBridge;
    use crate::client::SyncOptions;
    use crate::models::{AccessMode, Document, Identity};
    use crate::store::{DocumentStore, MemoryDocumentStore, StoreError};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;

    /// Reads right away but answers late, like a slow network
    struct LaggingSource {
        inner: StoreBridge,
        lag: Duration,
    }

    #[async_trait]
    impl DocumentSource for LaggingSource {
        async fn fetch(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
            let doc = self.inner.fetch(document_id).await;
            tokio::time::sleep(self.lag).await;
            doc
        }
    }

    const INTERVAL: Duration = Duration::from_millis(5_000);

    async fn setup() -> (Arc<dyn DocumentStore>, Arc<Mutex<ConvergenceEngine>>, mpsc::UnboundedReceiver<Notice>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let doc = store
            .create(Document::new("doc1", "Notes", &Identity::named("Owner")))
            .await
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = ConvergenceEngine::new(
            &doc,
            Identity::named("Bob"),
            &SyncOptions::default(),
            Arc::new(RecordingPersister::default()),
        )
        .with_notices(tx);
        (store, Arc::new(Mutex::new(engine)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn poll_picks_up_content_and_access() {
        let (store, engine, _notices) = setup().await;
        let source = Arc::new(StoreBridge::new(store.clone(), Identity::named("Bob")));
        let _poller = spawn_poller(engine.clone(), source, INTERVAL);

        store.replace_content("doc1", json!({"text": "elsewhere"}), None).await.unwrap();
        store.set_access("doc1", AccessMode::Read).await.unwrap();
        tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;

        let engine = engine.lock().await;
        assert_eq!(engine.content(), &json!({"text": "elsewhere"}));
        assert!(!engine.can_edit());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_poller_reads_nothing() {
        let (store, engine, _notices) = setup().await;
        let source = Arc::new(StoreBridge::new(store.clone(), Identity::named("Bob")));
        let poller = spawn_poller(engine.clone(), source, INTERVAL);
        poller.stop();

        store.replace_content("doc1", json!({"text": "elsewhere"}), None).await.unwrap();
        tokio::time::sleep(INTERVAL * 3).await;

        assert_eq!(engine.lock().await.content(), &Document::empty_content());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_page_ends_polling() {
        let (_store, engine, mut notices) = setup().await;
        let empty: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let source = Arc::new(StoreBridge::new(empty, Identity::named("Bob")));
        let poller = spawn_poller(engine, source, INTERVAL);

        tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
        assert_eq!(notices.try_recv().unwrap(), Notice::NotFound { document_id: "doc1".into() });
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn late_read_does_not_revert_a_saved_edit() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let doc = store
            .create(Document::new("doc1", "Notes", &Identity::named("Owner")))
            .await
            .unwrap();
        let bridge = StoreBridge::new(store.clone(), Identity::named("Bob"));
        let engine = Arc::new(Mutex::new(ConvergenceEngine::new(
            &doc,
            Identity::named("Bob"),
            &SyncOptions::default(),
            Arc::new(bridge.clone()),
        )));
        let source = Arc::new(LaggingSource { inner: bridge, lag: Duration::from_millis(1_000) });
        let _poller = spawn_poller(engine.clone(), source, INTERVAL);

        // Edit at 3.5s, the read at 5s sees the old store, the save lands at
        // 5.5s and the read answers at 6s
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        engine.lock().await.local_edit(json!({"text": "mine"})).unwrap();
        tokio::time::sleep(Duration::from_millis(2_600)).await;

        let stored = store.get_by_id("doc1").await.unwrap().unwrap().content;
        assert_eq!(stored, json!({"text": "mine"}));
        assert_eq!(engine.lock().await.content(), &json!({"text": "mine"}));

        // The next read agrees with what was saved
        tokio::time::sleep(INTERVAL).await;
        assert_eq!(engine.lock().await.content(), &json!({"text": "mine"}));
    }
}
