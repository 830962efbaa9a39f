use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::Message as WsFrame, MaybeTlsStream, WebSocketStream,
};

use super::{chat::ChatChannel, ApiClient, ClientError};
use crate::models::{ClientEvent, ServerEvent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn socket_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::Socket(e.to_string())
}

/// Writing half of the chat socket.
pub struct SocketChannel {
    sink: SplitSink<Socket, WsFrame>,
}

/// Reading half of the chat socket.
pub struct SocketEvents {
    stream: SplitStream<Socket>,
}

/// Opens `/ws` with the client's session token.
pub async fn connect(api: &ApiClient) -> Result<(SocketChannel, SocketEvents), ClientError> {
    let token = api.token().ok_or(ClientError::NotConnected)?;
    let url = format!("{}?token={}", api.ws_url(), token);

    let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(socket_error)?;
    let (sink, stream) = socket.split();
    tracing::debug!("chat socket connected");
    Ok((SocketChannel { sink }, SocketEvents { stream }))
}

#[async_trait]
impl ChatChannel for SocketChannel {
    async fn emit(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        let json = serde_json::to_string(event).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.sink.send(WsFrame::Text(json)).await.map_err(socket_error)
    }
}

impl SocketChannel {
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.sink.close().await.map_err(socket_error)
    }
}

impl SocketEvents {
    /// Next server event, skipping control frames. `None` once the socket
    /// is closed.
    pub async fn next(&mut self) -> Option<Result<ServerEvent, ClientError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(WsFrame::Text(text)) => return Some(decode_event(&text)),
                Ok(WsFrame::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(socket_error(e))),
            }
        }
        None
    }
}

pub fn decode_event(text: &str) -> Result<ServerEvent, ClientError> {
    serde_json::from_str(text).map_err(|e| ClientError::Decode(format!("server event: {}", e)))
}
