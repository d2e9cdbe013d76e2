//! `MediaProvider` over the kizuna signaling relay.
//!
//! A join is a WebSocket upgrade on `/ws` carrying the app id, channel, uid
//! and (optionally) token as query parameters. A refused upgrade carries a
//! rejection code in its body. Once connected, participant events arrive as
//! JSON [`SignalMessage`]s and local publish state is announced the same way.

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use kizuna_shared::api::{JoinRejection, SignalMessage, SignalingQuery};
use reqwest::Url;
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, protocol::Message},
};

use crate::domain::{
    ChannelName, MediaKind, MediaProvider, ParticipantId, ProviderConnection, ProviderError,
    ProviderEvent, ProviderSession,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Provider backed by the signaling relay at `signaling_url`
#[derive(Debug, Clone)]
pub struct WebSocketProvider {
    signaling_url: String,
}

impl WebSocketProvider {
    /// `signaling_url` is the full relay URL, e.g. `ws://127.0.0.1:8080/ws`
    pub fn new(signaling_url: impl Into<String>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
        }
    }

    fn join_url(&self, query: &SignalingQuery) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.signaling_url).map_err(|e| ProviderError::Other {
            code: 0,
            message: format!("invalid signaling url {}: {}", self.signaling_url, e),
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("app_id", &query.app_id)
                .append_pair("channel", &query.channel)
                .append_pair("uid", &query.uid.to_string());
            if let Some(token) = &query.token {
                pairs.append_pair("token", token);
            }
        }
        Ok(url)
    }
}

/// Map a failed upgrade to a provider error.
///
/// The rejection code in the body wins; the status code is the fallback.
fn upgrade_error(error: WsError) -> ProviderError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            let body = response
                .body()
                .as_deref()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            if let Some(rejection) = JoinRejection::from_code(&body) {
                return rejection.into();
            }
            match status {
                401 => ProviderError::InvalidToken,
                404 => ProviderError::InvalidAppId,
                409 => ProviderError::UidConflict,
                503 => ProviderError::CapacityExceeded,
                code => ProviderError::Other {
                    code,
                    message: body,
                },
            }
        }
        WsError::ConnectionClosed | WsError::AlreadyClosed => ProviderError::Closed,
        other => ProviderError::Network(other.to_string()),
    }
}

fn send_error(error: WsError) -> ProviderError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ProviderError::Closed,
        other => ProviderError::Network(other.to_string()),
    }
}

#[async_trait::async_trait]
impl MediaProvider for WebSocketProvider {
    async fn join(
        &self,
        app_id: &str,
        channel: &ChannelName,
        token: Option<&str>,
        uid: ParticipantId,
    ) -> Result<ProviderSession, ProviderError> {
        let query = SignalingQuery {
            app_id: app_id.to_string(),
            channel: channel.to_string(),
            uid: uid.value(),
            token: token.map(str::to_string),
        };
        let url = self.join_url(&query)?;

        tracing::debug!(
            "Connecting to signaling relay for channel {} as uid {} ({})",
            channel,
            uid,
            if token.is_some() { "with token" } else { "anonymous" }
        );
        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(upgrade_error)?;
        tracing::info!("Connected to signaling relay: channel={}, uid={}", channel, uid);

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_events(read, tx));

        Ok(ProviderSession {
            connection: Box::new(WebSocketConnection {
                write,
                reader,
                published: Vec::new(),
            }),
            events: rx,
        })
    }
}

// Forwards relay events until the socket closes; dropping `tx` ends the stream.
async fn read_events(
    mut read: SplitStream<WsStream>,
    tx: mpsc::UnboundedSender<ProviderEvent>,
) {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let event = match serde_json::from_str::<SignalMessage>(&text) {
                    Ok(SignalMessage::Published { uid, kind }) => ProviderEvent::Published {
                        id: ParticipantId::new(uid),
                        kind: kind.into(),
                    },
                    Ok(SignalMessage::Unpublished { uid, kind }) => ProviderEvent::Unpublished {
                        id: ParticipantId::new(uid),
                        kind: kind.into(),
                    },
                    Ok(SignalMessage::Left { uid }) => ProviderEvent::Left {
                        id: ParticipantId::new(uid),
                    },
                    Ok(other) => {
                        tracing::debug!("Ignoring client-bound message: {:?}", other);
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse signaling message: {}", e);
                        continue;
                    }
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("Signaling relay closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!("Signaling read error: {}", e);
                break;
            }
            _ => {}
        }
    }
}

struct WebSocketConnection {
    write: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
    published: Vec<MediaKind>,
}

impl WebSocketConnection {
    async fn send(&mut self, message: &SignalMessage) -> Result<(), ProviderError> {
        let json = serde_json::to_string(message).map_err(|e| ProviderError::Other {
            code: 0,
            message: format!("failed to serialize signaling message: {}", e),
        })?;
        self.write
            .send(Message::Text(json.into()))
            .await
            .map_err(send_error)
    }
}

#[async_trait::async_trait]
impl ProviderConnection for WebSocketConnection {
    async fn publish(&mut self, kinds: &[MediaKind]) -> Result<(), ProviderError> {
        for &kind in kinds {
            if self.published.contains(&kind) {
                continue;
            }
            self.send(&SignalMessage::Publish { kind: kind.into() })
                .await?;
            self.published.push(kind);
        }
        Ok(())
    }

    async fn unpublish(&mut self) -> Result<(), ProviderError> {
        // Stop tracking first: a failed send still leaves nothing to unpublish.
        let kinds = std::mem::take(&mut self.published);
        for kind in kinds {
            self.send(&SignalMessage::Unpublish { kind: kind.into() })
                .await?;
        }
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), ProviderError> {
        let result = self.write.close().await.map_err(send_error);
        self.reader.abort();
        result
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
