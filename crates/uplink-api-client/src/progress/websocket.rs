use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uplink_core::{ClientConfig, UploadError};

use super::transport::{ProgressConnection, ProgressTransport};
use crate::Auth;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for the progress endpoint.
#[derive(Clone, Debug)]
pub struct WebSocketTransport {
    url: String,
    auth: Auth,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, auth: Auth) -> Self {
        Self {
            url: url.into(),
            auth,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.ws_url.clone(), Auth::from_config(config))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProgressTransport for WebSocketTransport {
    async fn connect(&self) -> Result<Box<dyn ProgressConnection>, UploadError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| {
                UploadError::Channel(format!("Invalid progress URL {}: {}", self.url, e))
            })?;

        if let Some((name, value)) = self.auth.header() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| UploadError::Config(format!("Invalid auth header value: {}", e)))?;
            request.headers_mut().insert(name, value);
        }

        let (socket, response) = connect_async(request)
            .await
            .map_err(|e| UploadError::Channel(format!("Connect to {} failed: {}", self.url, e)))?;

        tracing::debug!(
            url = %self.url,
            status = %response.status(),
            "WebSocket handshake complete"
        );
        Ok(Box::new(WebSocketConnection { socket }))
    }
}

struct WebSocketConnection {
    socket: Socket,
}

#[async_trait]
impl ProgressConnection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<(), UploadError> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| UploadError::Channel(format!("Send failed: {}", e)))
    }

    async fn recv(&mut self) -> Option<Result<String, UploadError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        tracing::debug!("Dropping non UTF-8 binary frame");
                    }
                },
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Server closed progress channel");
                    return None;
                }
                // ping/pong are answered by tungstenite
                Ok(_) => {}
                Err(e) => return Some(Err(UploadError::Channel(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!(error = %e, "Error closing progress channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::testing::{complete, progress};
    use crate::progress::{ConnectionState, ProgressChannel};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_util::sync::CancellationToken;
    use uplink_core::{EventKind, ReconnectPolicy, WireMessage};

    type ServerSocket = WebSocketStream<TcpStream>;

    async fn accept(
        listener: &TcpListener,
        keys: Arc<Mutex<Vec<Option<String>>>>,
    ) -> ServerSocket {
        let (stream, _) = listener.accept().await.unwrap();
        accept_hdr_async(stream, move |request: &Request, response: Response| {
            let key = request
                .headers()
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            keys.lock().unwrap().push(key);
            Ok::<Response, ErrorResponse>(response)
        })
        .await
        .unwrap()
    }

    async fn read_text(socket: &mut ServerSocket) -> String {
        loop {
            match socket.next().await.unwrap().unwrap() {
                Message::Text(text) => return text,
                Message::Ping(_) | Message::Pong(_) => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn websocket_subscription_decodes_frames_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let keys = Arc::new(Mutex::new(Vec::new()));

        let server_keys = Arc::clone(&keys);
        let server = tokio::spawn(async move {
            let mut subscribes = Vec::new();

            let mut first = accept(&listener, Arc::clone(&server_keys)).await;
            subscribes.push(read_text(&mut first).await);
            first
                .send(Message::Text(progress("b-1", "f-1", 10.0)))
                .await
                .unwrap();
            first
                .send(Message::Binary(progress("b-1", "f-1", 20.0).into_bytes()))
                .await
                .unwrap();
            first.close(None).await.unwrap();
            while let Some(Ok(_)) = first.next().await {}

            let mut second = accept(&listener, server_keys).await;
            subscribes.push(read_text(&mut second).await);
            second.send(Message::Text(complete("b-1"))).await.unwrap();

            let mut closed_by_client = false;
            while let Some(message) = second.next().await {
                if let Ok(Message::Close(_)) = message {
                    closed_by_client = true;
                    break;
                }
            }
            (subscribes, closed_by_client)
        });

        let transport = WebSocketTransport::new(
            format!("ws://{addr}/ws"),
            Auth::XApiKey("k-1".to_string()),
        );
        let policy = ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(50), 3);
        let channel = ProgressChannel::new(Arc::new(transport), policy);
        let mut subscription = channel.subscribe_batch("b-1", CancellationToken::new());

        let text = subscription.next_event().await.unwrap().unwrap();
        assert_eq!(text.progress, Some(10.0));
        let binary = subscription.next_event().await.unwrap().unwrap();
        assert_eq!(binary.progress, Some(20.0));
        let last = subscription.next_event().await.unwrap().unwrap();
        assert_eq!(last.kind, EventKind::BatchComplete);
        assert_eq!(subscription.state(), ConnectionState::Terminated);

        let (subscribes, closed_by_client) = server.await.unwrap();
        assert_eq!(subscribes.len(), 2);
        for text in &subscribes {
            let message: WireMessage = serde_json::from_str(text).unwrap();
            assert_eq!(message.event, "subscribe_batch");
            assert_eq!(message.data["batch_id"], "b-1");
        }
        assert!(closed_by_client);
        assert_eq!(
            *keys.lock().unwrap(),
            vec![Some("k-1".to_string()), Some("k-1".to_string())]
        );
    }

    #[tokio::test]
    async fn wss_url_attempts_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let config = ClientConfig::for_api_url(&format!("https://{addr}"));
        let transport = WebSocketTransport::from_config(&config);
        assert_eq!(transport.url(), format!("wss://{addr}/ws"));

        let err = match transport.connect().await {
            Ok(_) => panic!("handshake with a plain TCP peer must fail"),
            Err(e) => e.to_string(),
        };
        assert!(!err.contains("TLS support not compiled in"), "{err}");
        server.await.unwrap();
    }
}
