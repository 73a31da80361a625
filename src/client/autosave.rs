use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::remote::ContentPersister;
use super::Notice;

#[derive(Default)]
struct Persisted {
    content: Option<Value>,
}

struct Pending {
    content: Value,
    /// Set once the delay elapsed and the write is under way
    fired: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Debounced writer of the full page content.
///
/// Every schedule restarts the delay, so a burst of edits produces one write
/// carrying the content of the last edit. Content equal to what was last
/// persisted is not written again. Nothing is retried: a failed write is
/// reported and the next edit schedules a new one.
pub struct AutosaveScheduler {
    document_id: String,
    delay: Duration,
    persister: Arc<dyn ContentPersister>,
    persisted: Arc<Mutex<Persisted>>,
    pending: Option<Pending>,
    notices: Option<UnboundedSender<Notice>>,
}

impl AutosaveScheduler {
    /// `persisted` is the content the store is known to hold, if any
    pub fn new(
        document_id: impl Into<String>,
        delay: Duration,
        persister: Arc<dyn ContentPersister>,
        persisted: Option<Value>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            delay,
            persister,
            persisted: Arc::new(Mutex::new(Persisted { content: persisted })),
            pending: None,
            notices: None,
        }
    }

    pub fn set_notices(&mut self, notices: UnboundedSender<Notice>) {
        self.notices = Some(notices);
    }

    /// Queue a write of `content` after the delay.
    ///
    /// Returns false when nothing was scheduled because the content is
    /// already persisted or already waiting to be.
    pub fn schedule(&mut self, content: Value) -> bool {
        if self.has_pending() && self.pending.as_ref().map(|p| &p.content) == Some(&content) {
            return false;
        }
        if self.last_persisted().as_ref() == Some(&content) {
            // Edited back to the saved state
            self.cancel();
            return false;
        }
        self.cancel();

        let fired = Arc::new(AtomicBool::new(false));
        let job = WriteJob {
            document_id: self.document_id.clone(),
            persister: self.persister.clone(),
            persisted: self.persisted.clone(),
            notices: self.notices.clone(),
            content: content.clone(),
        };
        let delay = self.delay;
        let task_fired = fired.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task_fired.store(true, Ordering::SeqCst);
            job.run().await;
        });
        debug!("Autosave of {} scheduled in {:?}", self.document_id, delay);
        self.pending = Some(Pending { content, fired, handle });
        true
    }

    /// Drop a write that is still waiting for its delay.
    /// A write already under way is left to finish.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            if !pending.fired.load(Ordering::SeqCst) {
                pending.handle.abort();
            }
        }
    }

    /// Start the pending write now.
    ///
    /// The returned handle completes once the write finished. It is handed
    /// out instead of awaited so callers can release their locks first.
    pub fn flush(&mut self) -> Option<JoinHandle<()>> {
        let pending = self.pending.take()?;
        if pending.handle.is_finished() {
            return None;
        }
        if pending.fired.load(Ordering::SeqCst) {
            return Some(pending.handle);
        }
        pending.handle.abort();
        let job = WriteJob {
            document_id: self.document_id.clone(),
            persister: self.persister.clone(),
            persisted: self.persisted.clone(),
            notices: self.notices.clone(),
            content: pending.content,
        };
        Some(tokio::spawn(job.run()))
    }

    /// A write is waiting or under way
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|p| !p.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn last_persisted(&self) -> Option<Value> {
        self.persisted
            .lock()
            .map(|p| p.content.clone())
            .unwrap_or_default()
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct WriteJob {
    document_id: String,
    persister: Arc<dyn ContentPersister>,
    persisted: Arc<Mutex<Persisted>>,
    notices: Option<UnboundedSender<Notice>>,
    content: Value,
}

impl WriteJob {
    async fn run(self) {
        let notice = match self.persister.persist(&self.document_id, &self.content).await {
            Ok(()) => {
                debug!("Autosaved {}", self.document_id);
                if let Ok(mut persisted) = self.persisted.lock() {
                    persisted.content = Some(self.content);
                }
                Notice::Saved {
                    document_id: self.document_id,
                }
            }
            Err(e) => {
                warn!("Autosave of {} failed: {}", self.document_id, e);
                Notice::SaveFailed {
                    document_id: self.document_id,
                    reason: e.to_string(),
                }
            }
        };
        if let Some(notices) = &self.notices {
            let _ = notices.send(notice);
        }
    }
}
