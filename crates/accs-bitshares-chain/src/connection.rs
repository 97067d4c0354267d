use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use accs_error::AccsError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A process-scoped handle to a single Bitshares WebSocket endpoint.
///
/// One connection per swap, lazily created and explicitly torn down on
/// every exit path. `connect` performs the socket handshake only — the
/// graphene login/API-id negotiation a full client performs is out of
/// scope here, so `call` below assumes API id 0 (the default "database"
/// API) the way a minimal client would after a successful login.
pub struct BitsharesConnection {
    socket: Mutex<WsStream>,
    next_id: AtomicU64,
}

impl BitsharesConnection {
    pub async fn connect(endpoint: &str) -> Result<Self, AccsError> {
        let (socket, _response) = connect_async(endpoint)
            .await
            .map_err(|e| AccsError::ChainQuery(format!("bitshares connect failed: {e}")))?;
        debug!(endpoint, "bitshares websocket connected");
        Ok(Self {
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issues a JSON-RPC 2.0 call against the given graphene API id.
    pub async fn call(&self, api_id: u64, method: &str, params: Value) -> Result<Value, AccsError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": [api_id, method, params],
            "id": id,
        });

        let mut socket = self.socket.lock().await;
        socket
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| AccsError::ChainQuery(format!("bitshares send failed: {e}")))?;

        while let Some(message) = socket.next().await {
            let message = message.map_err(|e| AccsError::ChainQuery(format!("bitshares recv failed: {e}")))?;
            let Message::Text(text) = message else {
                continue;
            };
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| AccsError::ChainQuery(format!("bitshares bad json: {e}")))?;
            if value["id"].as_u64() != Some(id) {
                continue;
            }
            if let Some(error) = value.get("error") {
                return Err(AccsError::ChainQuery(format!("bitshares rpc error: {error}")));
            }
            return Ok(value["result"].clone());
        }
        Err(AccsError::ChainQuery("bitshares connection closed before a response arrived".into()))
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.socket.lock().await.close(None).await {
            warn!(error = %e, "error closing bitshares websocket");
        }
    }
}
