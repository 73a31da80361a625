use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::models::{
    DocumentVersion, Identity, JoinDocumentMessage, MentionMessage, ReceivedMessage, SendMessage,
    UserLeftMessage,
};

use super::engine::{ConvergenceEngine, RemoteDecision, RemoteSource};
use super::identity::IdentityProvider;
use super::poller::{spawn_poller, PollHandle};
use super::remote::{ContentPersister, DocumentSource, HttpPageClient};
use super::{Notice, SessionEvent, SyncOptions};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// One open page: realtime channel, autosave and polling fallback.
pub struct SyncSession {
    document_id: String,
    identity: Identity,
    engine: Arc<Mutex<ConvergenceEngine>>,
    api: Arc<HttpPageClient>,
    outgoing: mpsc::UnboundedSender<ReceivedMessage>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    notices: Option<mpsc::UnboundedReceiver<Notice>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    poller: PollHandle,
}

impl SyncSession {
    /// Load the page, connect and join its room.
    pub async fn open(
        options: &SyncOptions,
        document_id: &str,
        identities: &dyn IdentityProvider,
    ) -> Result<Self, SyncError> {
        let identity = identities.current_identity();
        if !identity.has_name() {
            return Err(SyncError::MissingIdentity);
        }

        let api = Arc::new(HttpPageClient::new(
            options.api_base_url.clone(),
            identity.clone(),
            options.api_token.clone(),
        ));
        let doc = api
            .get_page(document_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(document_id.to_string()))?;

        let mut request = options
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        if let Some(token) = &options.api_token {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            request.headers_mut().insert(header::AUTHORIZATION, bearer);
        }
        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        info!("Connected to {} for page {}", options.ws_url, document_id);
        let (mut sink, mut stream) = ws.split();

        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ReceivedMessage>();

        let persister: Arc<dyn ContentPersister> = api.clone();
        let mut engine = ConvergenceEngine::new(&doc, identity.clone(), options, persister)
            .with_notices(notice_tx);
        engine.attach_push(out_tx.clone());
        let engine = Arc::new(Mutex::new(engine));

        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_engine = engine.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<SendMessage>(&text) {
                        Ok(message) => handle_incoming(message, &reader_engine, &event_tx).await,
                        Err(e) => warn!("Ignoring malformed server message: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Realtime channel error: {}", e);
                        break;
                    }
                }
            }
            // Autosave and polling carry on without the channel
            reader_engine.lock().await.detach_push();
            let _ = event_tx.send(SessionEvent::Disconnected);
        });

        let join = ReceivedMessage::JoinDocument(JoinDocumentMessage {
            document_id: Some(document_id.to_string()),
            identity: Some(identity.clone()),
        });
        out_tx
            .send(join)
            .map_err(|_| SyncError::Transport("realtime channel closed".into()))?;

        let source: Arc<dyn DocumentSource> = api.clone();
        let poller = spawn_poller(engine.clone(), source, options.poll_interval());

        Ok(Self {
            document_id: document_id.to_string(),
            identity,
            engine,
            api,
            outgoing: out_tx,
            events: Some(event_rx),
            notices: Some(notice_rx),
            reader,
            writer,
            poller,
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Local edit of the full content
    pub async fn edit(&self, content: Value) -> Result<(), SyncError> {
        self.engine.lock().await.local_edit(content)
    }

    pub async fn content(&self) -> Value {
        self.engine.lock().await.content().clone()
    }

    pub async fn can_edit(&self) -> bool {
        self.engine.lock().await.can_edit()
    }

    /// Restoring a version is an ordinary edit with the version's content
    pub async fn restore_version(&self, version: &DocumentVersion) -> Result<(), SyncError> {
        self.edit(version.content.clone()).await
    }

    /// Snapshot the current content into the version log
    pub async fn save_version(&self) -> Result<DocumentVersion, SyncError> {
        let content = self.content().await;
        Ok(self.api.save_version(&self.document_id, &content).await?)
    }

    pub async fn versions(&self) -> Result<Vec<DocumentVersion>, SyncError> {
        Ok(self.api.list_versions(&self.document_id).await?)
    }

    pub fn mention(&self, mentioned_user: &str) -> Result<(), SyncError> {
        let mention = ReceivedMessage::Mention(MentionMessage {
            by: self.identity.name.clone(),
            mentioned_user: mentioned_user.to_string(),
            document_id: self.document_id.clone(),
        });
        self.outgoing
            .send(mention)
            .map_err(|_| SyncError::Transport("realtime channel closed".into()))
    }

    pub fn ping(&self) -> Result<(), SyncError> {
        self.outgoing
            .send(ReceivedMessage::Ping(Default::default()))
            .map_err(|_| SyncError::Transport("realtime channel closed".into()))
    }

    /// Presence and content events, can be taken once
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.take()
    }

    /// Save results and access problems, can be taken once
    pub fn take_notices(&mut self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notices.take()
    }

    /// Leave the room, save what is pending and tear everything down.
    pub async fn close(self) {
        let leave = ReceivedMessage::UserLeft(UserLeftMessage {
            document_id: Some(self.document_id.clone()),
            identity: Some(self.identity.clone()),
        });
        if self.outgoing.send(leave).is_err() {
            debug!("Realtime channel already closed, skipping user-left");
        }
        self.poller.stop();

        let flush = {
            let mut engine = self.engine.lock().await;
            engine.detach_push();
            engine.flush()
        };
        if let Some(flush) = flush {
            let _ = flush.await;
        }

        // The writer drains the queue once the last sender is gone
        drop(self.outgoing);
        if tokio::time::timeout(CLOSE_TIMEOUT, self.writer).await.is_err() {
            warn!("Realtime channel of {} did not close in time", self.document_id);
        }
        self.reader.abort();
        info!("Closed page {}", self.document_id);
    }
}

async fn handle_incoming(
    message: SendMessage,
    engine: &Mutex<ConvergenceEngine>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) {
    let event = match message {
        SendMessage::DocumentUpdate(update) => {
            let mut engine = engine.lock().await;
            if update.document_id != engine.document_id() {
                debug!("Ignoring update for {}", update.document_id);
                return;
            }
            match engine.receive_remote(update.content, RemoteSource::Push) {
                RemoteDecision::Applied => SessionEvent::RemoteApplied,
                _ => return,
            }
        }
        SendMessage::UserJoined(presence) => SessionEvent::UserJoined(presence.identity),
        SendMessage::UserLeft(presence) => SessionEvent::UserLeft(presence.identity),
        SendMessage::Mention(mention) => SessionEvent::Mention(mention),
        SendMessage::Pong(pong) => {
            debug!("pong {}", pong.date);
            return;
        }
    };
    let _ = events.send(event);
}
