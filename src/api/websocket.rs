use std::{collections::HashMap, time::Duration};

use axum::{
    extract::{
        ws::{Message as WsFrame, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, watch, RwLock},
    task::JoinSet,
};
use uuid::Uuid;

use super::middleware::AuthUser;
use crate::{
    models::{ClientEvent, Message, ServerEvent},
    services::chat::ChatService,
    storage::redis::RedisClient,
    AppState,
};

const PRESENCE_TTL: Duration = Duration::from_secs(120);
const PRESENCE_REFRESH: Duration = Duration::from_secs(60);

/// Registry of open sockets, keyed by connection id.
pub struct WsHub {
    clients: RwLock<HashMap<Uuid, Uuid>>,
    redis: RedisClient,
}

impl WsHub {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            redis,
        }
    }

    /// Keeps presence alive for every user with an open socket.
    pub async fn run(&self) {
        loop {
            tokio::time::sleep(PRESENCE_REFRESH).await;
            for user_id in self.online_users().await {
                if let Err(e) = self.redis.mark_online(user_id, PRESENCE_TTL).await {
                    tracing::warn!(user_id = %user_id, error = %e, "presence refresh failed");
                }
            }
        }
    }

    async fn online_users(&self) -> Vec<Uuid> {
        let clients = self.clients.read().await;
        let mut users: Vec<Uuid> = clients.values().copied().collect();
        users.sort();
        users.dedup();
        users
    }

    pub async fn register(&self, connection_id: Uuid, user_id: Uuid) {
        self.clients.write().await.insert(connection_id, user_id);
        let _ = self.redis.mark_online(user_id, PRESENCE_TTL).await;
        tracing::info!(connection_id = %connection_id, user_id = %user_id, "client registered");
    }

    pub async fn unregister(&self, connection_id: Uuid) {
        let mut clients = self.clients.write().await;
        let Some(user_id) = clients.remove(&connection_id) else {
            return;
        };
        let still_connected = clients.values().any(|u| *u == user_id);
        drop(clients);

        if !still_connected {
            let _ = self.redis.mark_offline(user_id).await;
        }
        tracing::info!(connection_id = %connection_id, user_id = %user_id, "client unregistered");
    }
}

/// Whether a bus message belongs on this socket: it must be for the chat
/// currently selected and must not be the user's own message echoed back.
pub fn should_forward(message: &Message, user_id: Uuid, selection: Option<Uuid>) -> bool {
    selection == Some(message.chat_id) && message.sender_id != user_id
}

pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user.id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<ServerEvent>(256);
    let (selection_tx, selection_rx) = watch::channel::<Option<Uuid>>(None);

    state.ws_hub.register(connection_id, user_id).await;

    // Bus -> socket, scoped to the current selection
    let redis = state.redis.clone();
    let bus_tx = tx.clone();
    let mut tasks = JoinSet::new();
    tasks.spawn(async move {
        let mut pubsub = match redis.subscribe_messages(user_id).await {
            Ok(pubsub) => pubsub,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "chat bus subscription failed");
                return;
            }
        };
        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let Ok(payload) = msg.get_payload::<String>() else {
                continue;
            };
            let Ok(message) = serde_json::from_str::<Message>(&payload) else {
                tracing::warn!(user_id = %user_id, "malformed bus message");
                continue;
            };
            let selected = *selection_rx.borrow();
            if should_forward(&message, user_id, selected) {
                if bus_tx.send(ServerEvent::Message(message)).await.is_err() {
                    break;
                }
            }
        }
    });

    tasks.spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_sender.send(WsFrame::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    tasks.spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(WsFrame::Text(text)) => {
                    let reply = match ClientEvent::parse(&text) {
                        Ok(event) => {
                            handle_event(&recv_state, user_id, &selection_tx, event).await
                        }
                        Err(e) => Some(ServerEvent::error(format!("Invalid event: {}", e))),
                    };
                    if let Some(reply) = reply {
                        if tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(WsFrame::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    supervise(tasks).await;
    state.ws_hub.unregister(connection_id).await;
}

/// Waits for the first socket task to end, then aborts the others and waits
/// for them so the bus subscription is gone before the socket is forgotten.
async fn supervise(mut tasks: JoinSet<()>) {
    if let Some(Err(e)) = tasks.join_next().await {
        if e.is_panic() {
            tracing::error!(error = %e, "socket task panicked");
        }
    }
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}

async fn handle_event(
    state: &AppState,
    user_id: Uuid,
    selection: &watch::Sender<Option<Uuid>>,
    event: ClientEvent,
) -> Option<ServerEvent> {
    let chat = ChatService::new(state.db.clone(), state.redis.clone());

    match event {
        ClientEvent::JoinChat { chat_id } => match chat.open_conversation(chat_id, user_id).await {
            Ok(_) => {
                selection.send_replace(Some(chat_id));
                tracing::debug!(user_id = %user_id, chat_id = %chat_id, "joined chat");
                Some(ServerEvent::Joined { chat_id })
            }
            Err(e) => Some(ServerEvent::error(e.to_string())),
        },
        ClientEvent::LeaveChat => {
            selection.send_replace(None);
            None
        }
        ClientEvent::Message {
            chat_id,
            content,
            client_id,
        } => {
            let selected = *selection.borrow();
            if selected != Some(chat_id) {
                return Some(ServerEvent::error("Join the chat before sending messages"));
            }
            match chat.send(chat_id, user_id, &content, client_id).await {
                Ok(saved) => Some(ServerEvent::Ack {
                    client_id,
                    message_id: saved.message.id,
                }),
                Err(e) => {
                    tracing::warn!(user_id = %user_id, chat_id = %chat_id, error = %e, "message not sent");
                    Some(ServerEvent::error(e.to_string()))
                }
            }
        }
        ClientEvent::Ping => Some(ServerEvent::Pong),
    }
}
