use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::models::{AccessMode, Document, DocumentUpdateMessage, Identity, ReceivedMessage};

use super::autosave::AutosaveScheduler;
use super::remote::ContentPersister;
use super::{Notice, SyncOptions};

/// Write permission as the client last saw it
#[derive(Debug, Clone, PartialEq)]
pub struct EditCapability {
    pub access: AccessMode,
    pub author_id: String,
}

impl EditCapability {
    pub fn allows(&self, identity: &Identity) -> bool {
        self.access == AccessMode::Write || self.author_id == identity.name
    }
}

impl From<&Document> for EditCapability {
    fn from(doc: &Document) -> Self {
        Self {
            access: doc.access,
            author_id: doc.author_id.clone(),
        }
    }
}

/// Local state at the moment a fetch was issued, see [`ConvergenceEngine::poll_ticket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    edits: u64,
    unsaved: bool,
}

/// Where a remote snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSource {
    /// Broadcast over the realtime channel
    Push,
    /// Re-fetched from the store by a read that started at the ticket
    Poll(PollTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDecision {
    /// The local user is typing, or local edits are not saved yet
    Discarded,
    Unchanged,
    Applied,
}

/// Local copy of one page and the last-writer-wins rules around it.
///
/// A remote snapshot replaces the local content only when the user has been
/// idle for the typing window. Whatever arrives last after that wins, local
/// edits included: there is no merge.
pub struct ConvergenceEngine {
    document_id: String,
    identity: Identity,
    capability: EditCapability,
    content: Value,
    typing_idle: Duration,
    typing_until: Option<Instant>,
    /// Count of local edits that changed the content
    edits: u64,
    autosave: AutosaveScheduler,
    push: Option<UnboundedSender<ReceivedMessage>>,
    notices: Option<UnboundedSender<Notice>>,
}

impl ConvergenceEngine {
    /// Start from the page as loaded; its content counts as persisted
    pub fn new(
        document: &Document,
        identity: Identity,
        options: &SyncOptions,
        persister: Arc<dyn ContentPersister>,
    ) -> Self {
        Self {
            document_id: document.id.clone(),
            identity,
            capability: EditCapability::from(document),
            content: document.content.clone(),
            typing_idle: options.typing_idle(),
            typing_until: None,
            edits: 0,
            autosave: AutosaveScheduler::new(
                document.id.clone(),
                options.autosave_delay(),
                persister,
                Some(document.content.clone()),
            ),
            push: None,
            notices: None,
        }
    }

    pub fn with_notices(mut self, notices: UnboundedSender<Notice>) -> Self {
        self.autosave.set_notices(notices.clone());
        self.notices = Some(notices);
        self
    }

    /// Send local edits over the realtime channel from now on
    pub fn attach_push(&mut self, push: UnboundedSender<ReceivedMessage>) {
        self.push = Some(push);
    }

    /// Realtime channel is gone, keep editing with autosave only
    pub fn detach_push(&mut self) {
        self.push = None;
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn capability(&self) -> &EditCapability {
        &self.capability
    }

    pub fn can_edit(&self) -> bool {
        self.capability.allows(&self.identity)
    }

    pub fn is_typing(&self) -> bool {
        self.typing_until
            .map(|deadline| Instant::now() < deadline)
            .unwrap_or(false)
    }

    /// Apply an edit of the local user.
    ///
    /// The full content is pushed to the room and an autosave is scheduled.
    /// Without write access nothing happens besides an access notice.
    pub fn local_edit(&mut self, content: Value) -> Result<(), SyncError> {
        if !self.can_edit() {
            self.notify(Notice::AccessDenied {
                document_id: self.document_id.clone(),
            });
            return Err(SyncError::AccessDenied {
                document_id: self.document_id.clone(),
                identity: self.identity.name.clone(),
            });
        }

        self.typing_until = Some(Instant::now() + self.typing_idle);
        if content == self.content {
            return Ok(());
        }
        self.content = content;
        self.edits += 1;

        if let Some(push) = &self.push {
            let update = ReceivedMessage::DocumentUpdate(DocumentUpdateMessage {
                document_id: Some(self.document_id.clone()),
                content: Some(self.content.clone()),
                identity: Some(self.identity.clone()),
            });
            if push.send(update).is_err() {
                debug!("Realtime channel of {} closed, edit kept local", self.document_id);
                self.push = None;
            }
        }
        self.autosave.schedule(self.content.clone());
        Ok(())
    }

    /// Take before reading the store. A read is only trusted if no local
    /// edit was unsaved when it started and none happened since.
    pub fn poll_ticket(&self) -> PollTicket {
        PollTicket {
            edits: self.edits,
            unsaved: self.autosave.has_pending(),
        }
    }

    /// Consider a snapshot received from elsewhere
    pub fn receive_remote(&mut self, content: Value, source: RemoteSource) -> RemoteDecision {
        if self.is_typing() {
            debug!("Discarding remote content of {} while typing", self.document_id);
            return RemoteDecision::Discarded;
        }
        if content == self.content {
            return RemoteDecision::Unchanged;
        }
        if let RemoteSource::Poll(ticket) = source {
            if ticket.unsaved || ticket.edits != self.edits || self.autosave.has_pending() {
                // The read may predate a local edit
                debug!("Discarding stale read of {}", self.document_id);
                return RemoteDecision::Discarded;
            }
        }
        self.content = content;
        RemoteDecision::Applied
    }

    /// Adopt access settings re-read from the store
    pub fn refresh_capability(&mut self, capability: EditCapability) {
        if capability != self.capability {
            debug!("Access of {} is now {}", self.document_id, capability.access);
            self.capability = capability;
        }
    }

    /// Start the pending autosave now, see [`AutosaveScheduler::flush`]
    pub fn flush(&mut self) -> Option<JoinHandle<()>> {
        self.autosave.flush()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.autosave.has_pending()
    }

    pub(crate) fn notify(&self, notice: Notice) {
        if let Some(notices) = &self.notices {
            if notices.send(notice).is_err() {
                warn!("Nobody listens to notices of {}", self.document_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::autosave::tests::RecordingPersister;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn options() -> SyncOptions {
        SyncOptions::default()
    }

    fn page(access: AccessMode) -> Document {
        let mut doc = Document::new("doc1", "Notes", &Identity::named("Owner"));
        doc.access = access;
        doc
    }

    fn engine_for(doc: &Document, name: &str, persister: &Arc<RecordingPersister>) -> ConvergenceEngine {
        ConvergenceEngine::new(doc, Identity::named(name), &options(), persister.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn remote_content_is_discarded_while_typing() {
        let persister = Arc::new(RecordingPersister::default());
        let mut engine = engine_for(&page(AccessMode::Write), "Alice", &persister);

        engine.local_edit(json!({"text": "mine"})).unwrap();
        assert_eq!(engine.receive_remote(json!({"text": "theirs"}), RemoteSource::Push), RemoteDecision::Discarded);
        assert_eq!(engine.content(), &json!({"text": "mine"}));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(engine.is_typing());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(!engine.is_typing());
        assert_eq!(engine.receive_remote(json!({"text": "theirs"}), RemoteSource::Push), RemoteDecision::Applied);
        assert_eq!(engine.content(), &json!({"text": "theirs"}));
    }

    #[tokio::test(start_paused = true)]
    async fn last_arrival_wins_over_local_edits() {
        let persister = Arc::new(RecordingPersister::default());
        let mut engine = engine_for(&page(AccessMode::Write), "Alice", &persister);

        engine.local_edit(json!({"text": "local"})).unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        // No merge: the last snapshot replaces everything
        engine.receive_remote(json!({"text": "A"}), RemoteSource::Push);
        engine.receive_remote(json!({"text": "B"}), RemoteSource::Push);
        assert_eq!(engine.content(), &json!({"text": "B"}));
        let ticket = engine.poll_ticket();
        assert_eq!(engine.receive_remote(json!({"text": "B"}), RemoteSource::Poll(ticket)), RemoteDecision::Unchanged);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_are_pushed_in_full_and_autosaved() {
        let persister = Arc::new(RecordingPersister::default());
        let mut engine = engine_for(&page(AccessMode::Write), "Alice", &persister);
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.attach_push(tx);

        engine.local_edit(json!({"text": "a"})).unwrap();
        engine.local_edit(json!({"text": "ab"})).unwrap();

        for expected in ["a", "ab"] {
            match rx.try_recv().unwrap() {
                ReceivedMessage::DocumentUpdate(update) => {
                    assert_eq!(update.document_id.as_deref(), Some("doc1"));
                    assert_eq!(update.content, Some(json!({ "text": expected })));
                    assert_eq!(update.identity, Some(Identity::named("Alice")));
                }
                other => panic!("unexpected message {:?}", other),
            }
        }

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(persister.writes(), vec![json!({"text": "ab"})]);
    }

    #[tokio::test(start_paused = true)]
    async fn read_only_page_rejects_local_edits() {
        let persister = Arc::new(RecordingPersister::default());
        let doc = page(AccessMode::Read);
        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        let mut engine = engine_for(&doc, "Bob", &persister).with_notices(notice_tx);
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.attach_push(tx);

        let err = engine.local_edit(json!({"text": "nope"})).unwrap_err();
        assert!(matches!(err, SyncError::AccessDenied { .. }));
        assert_eq!(engine.content(), &doc.content);
        assert!(rx.try_recv().is_err());
        assert_eq!(notice_rx.try_recv().unwrap(), Notice::AccessDenied { document_id: "doc1".into() });

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert!(persister.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn author_may_edit_a_read_only_page() {
        let persister = Arc::new(RecordingPersister::default());
        let mut engine = engine_for(&page(AccessMode::Read), "Owner", &persister);

        assert!(engine.local_edit(json!({"text": "mine"})).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn revoked_access_takes_effect_on_refresh() {
        let persister = Arc::new(RecordingPersister::default());
        let mut engine = engine_for(&page(AccessMode::Write), "Bob", &persister);
        assert!(engine.can_edit());

        engine.refresh_capability(EditCapability::from(&page(AccessMode::Read)));
        assert!(!engine.can_edit());
        assert!(engine.local_edit(json!({"text": "late"})).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_poll_does_not_revert_unsaved_edits() {
        let persister = Arc::new(RecordingPersister::default());
        let doc = page(AccessMode::Write);
        let mut engine = engine_for(&doc, "Alice", &persister);

        engine.local_edit(json!({"text": "draft"})).unwrap();
        tokio::time::advance(Duration::from_millis(1_200)).await;
        assert!(!engine.is_typing());
        assert!(engine.has_unsaved_changes());

        let ticket = engine.poll_ticket();
        assert_eq!(engine.receive_remote(doc.content.clone(), RemoteSource::Poll(ticket)), RemoteDecision::Discarded);
        assert_eq!(engine.content(), &json!({"text": "draft"}));
    }

    #[tokio::test(start_paused = true)]
    async fn read_started_before_a_save_is_not_trusted() {
        let persister = Arc::new(RecordingPersister::default());
        let doc = page(AccessMode::Write);
        let mut engine = engine_for(&doc, "Alice", &persister);

        engine.local_edit(json!({"text": "mine"})).unwrap();
        let in_flight = engine.poll_ticket();
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert!(!engine.has_unsaved_changes());
        assert_eq!(persister.writes(), vec![json!({"text": "mine"})]);

        // The read finishes after the save but saw the store before it
        assert_eq!(engine.receive_remote(doc.content.clone(), RemoteSource::Poll(in_flight)), RemoteDecision::Discarded);
        assert_eq!(engine.content(), &json!({"text": "mine"}));
    }

    #[tokio::test(start_paused = true)]
    async fn read_overtaken_by_a_new_edit_is_not_trusted() {
        let persister = Arc::new(RecordingPersister::default());
        let mut engine = engine_for(&page(AccessMode::Write), "Alice", &persister);

        let ticket = engine.poll_ticket();
        engine.local_edit(json!({"text": "newer"})).unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        assert_eq!(engine.receive_remote(json!({"text": "older"}), RemoteSource::Poll(ticket)), RemoteDecision::Discarded);

        // A read issued after everything settled is trusted again
        let fresh = engine.poll_ticket();
        assert_eq!(engine.receive_remote(json!({"text": "elsewhere"}), RemoteSource::Poll(fresh)), RemoteDecision::Applied);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_push_channel_keeps_edits_local() {
        let persister = Arc::new(RecordingPersister::default());
        let mut engine = engine_for(&page(AccessMode::Write), "Alice", &persister);
        let (tx, rx) = mpsc::unbounded_channel();
        engine.attach_push(tx);
        drop(rx);

        engine.local_edit(json!({"text": "offline"})).unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(persister.writes(), vec![json!({"text": "offline"})]);
    }
}
