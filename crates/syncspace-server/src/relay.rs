//! Room bookkeeping and per-connection presence relay.
//!
//! The relay keeps no presence state of its own beyond room membership:
//! it forwards `user_joined` and `cursor_move` to the rest of the room and
//! synthesizes `user_left` when a connection goes away.

use dashmap::DashMap;
use std::collections::HashSet;
use syncspace_core::presence::{ClientEvent, ServerEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// A relayed event tagged with the sending connection's id.
pub type Relayed = (String, ServerEvent);

struct Room {
    tx: broadcast::Sender<Relayed>,
    members: HashSet<String>,
}

/// Active rooms keyed by room id (the project id).
pub struct Rooms {
    rooms: DashMap<String, Room>,
    capacity: usize,
}

impl Rooms {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add a connection to a room, creating it on first join.
    pub fn join(&self, room_id: &str, conn_id: &str) -> broadcast::Receiver<Relayed> {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(|| Room {
            tx: broadcast::channel(self.capacity).0,
            members: HashSet::new(),
        });
        room.members.insert(conn_id.to_string());
        room.tx.subscribe()
    }

    /// Remove a connection. Empty rooms are dropped.
    pub fn leave(&self, room_id: &str, conn_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.members.remove(conn_id);
            if room.members.is_empty() {
                drop(room);
                self.rooms.remove(room_id);
                debug!("Dropped empty room {}", room_id);
            }
        }
    }

    /// Send to every subscriber of a room. Returns how many received it.
    pub fn broadcast(&self, room_id: &str, from: &str, event: ServerEvent) -> usize {
        match self.rooms.get(room_id) {
            Some(room) => room.tx.send((from.to_string(), event)).unwrap_or(0),
            None => 0,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.members.len())
    }
}

/// One WebSocket client.
pub struct Connection {
    id: String,
    room: Option<String>,
    /// User id from the client's `user_joined`, used for `user_left`.
    announced: Option<String>,
    rx: Option<broadcast::Receiver<Relayed>>,
}

impl Connection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            room: None,
            announced: None,
            rx: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Handle a text frame. Returns a reply for this client, if any.
    pub fn handle_text(&mut self, rooms: &Rooms, text: &str) -> Option<ServerEvent> {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => {
                self.handle(rooms, event);
                None
            }
            Err(e) => {
                warn!("Invalid message from {}: {}", self.id, e);
                Some(ServerEvent::Error {
                    message: format!("Invalid message: {e}"),
                })
            }
        }
    }

    pub fn handle(&mut self, rooms: &Rooms, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { room_id } => {
                self.leave(rooms);
                self.rx = Some(rooms.join(&room_id, &self.id));
                info!("Connection {} joined room {}", self.id, room_id);
                self.room = Some(room_id);
            }
            ClientEvent::UserJoined {
                room_id,
                id,
                name,
                color,
                cursor,
            } => {
                self.announced = Some(id.clone());
                rooms.broadcast(
                    &room_id,
                    &self.id,
                    ServerEvent::UserJoined {
                        id,
                        name,
                        color,
                        cursor,
                    },
                );
            }
            ClientEvent::CursorMove { room_id, point, id } => {
                rooms.broadcast(&room_id, &self.id, ServerEvent::CursorMove { id, point });
            }
            ClientEvent::LeaveRoom { room_id } => {
                if self.room.as_deref() == Some(room_id.as_str()) {
                    self.leave(rooms);
                }
            }
        }
    }

    /// Leave the current room and tell the others.
    pub fn leave(&mut self, rooms: &Rooms) {
        let Some(room) = self.room.take() else {
            return;
        };
        let id = self.announced.take().unwrap_or_else(|| self.id.clone());
        self.rx = None;
        rooms.leave(&room, &self.id);
        rooms.broadcast(&room, &self.id, ServerEvent::UserLeft { id });
        info!("Connection {} left room {}", self.id, room);
    }

    /// Next event from the room that this client did not send itself.
    /// Pending forever while not in a room.
    pub async fn recv(&mut self) -> ServerEvent {
        loop {
            let Some(rx) = self.rx.as_mut() else {
                return std::future::pending().await;
            };
            match rx.recv().await {
                Ok((from, _)) if from == self.id => continue,
                Ok((_, event)) => return event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Connection {} lagged, skipped {} events", self.id, skipped);
                }
                Err(RecvError::Closed) => self.rx = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use syncspace_core::shapes::SerializableColor;
    use kurbo::Point;
    use tokio::time::timeout;

    const ROOM: &str = "project-1";

    fn joined(rooms: &Rooms, id: &str) -> Connection {
        let mut conn = Connection::new(id);
        conn.handle(
            rooms,
            ClientEvent::JoinRoom {
                room_id: ROOM.to_string(),
            },
        );
        conn
    }

    fn announce(rooms: &Rooms, conn: &mut Connection, user: &str) {
        conn.handle(
            rooms,
            ClientEvent::UserJoined {
                room_id: ROOM.to_string(),
                id: user.to_string(),
                name: format!("Guest {user}"),
                color: SerializableColor::new(59, 130, 246, 255),
                cursor: Point::ZERO,
            },
        );
    }

    async fn nothing_for(conn: &mut Connection) -> bool {
        timeout(Duration::from_millis(50), conn.recv()).await.is_err()
    }

    #[tokio::test]
    async fn test_relay_without_echo() {
        let rooms = Rooms::new(16);
        let mut a = joined(&rooms, "conn-a");
        let mut b = joined(&rooms, "conn-b");
        assert_eq!(rooms.member_count(ROOM), 2);

        announce(&rooms, &mut a, "user-a");
        match b.recv().await {
            ServerEvent::UserJoined { id, name, .. } => {
                assert_eq!(id, "user-a");
                assert_eq!(name, "Guest user-a");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(nothing_for(&mut a).await);

        a.handle(
            &rooms,
            ClientEvent::CursorMove {
                room_id: ROOM.to_string(),
                point: Point::new(10.0, 20.0),
                id: "user-a".to_string(),
            },
        );
        assert_eq!(
            b.recv().await,
            ServerEvent::CursorMove {
                id: "user-a".to_string(),
                point: Point::new(10.0, 20.0)
            }
        );
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let rooms = Rooms::new(16);
        let mut a = joined(&rooms, "conn-a");
        let mut other = Connection::new("conn-x");
        other.handle(
            &rooms,
            ClientEvent::JoinRoom {
                room_id: "elsewhere".to_string(),
            },
        );
        announce(&rooms, &mut a, "user-a");
        assert!(nothing_for(&mut other).await);
        assert_eq!(rooms.room_count(), 2);
    }

    #[tokio::test]
    async fn test_leave_uses_announced_id_and_drops_room() {
        let rooms = Rooms::new(16);
        let mut a = joined(&rooms, "conn-a");
        let mut b = joined(&rooms, "conn-b");
        announce(&rooms, &mut a, "user-a");
        b.recv().await;

        a.leave(&rooms);
        assert_eq!(
            b.recv().await,
            ServerEvent::UserLeft {
                id: "user-a".to_string()
            }
        );
        assert_eq!(a.room(), None);

        // Never announced: falls back to the connection id.
        b.leave(&rooms);
        assert_eq!(rooms.room_count(), 0);
        assert_eq!(rooms.broadcast(ROOM, "conn-b", ServerEvent::UserLeft { id: "x".into() }), 0);
    }

    #[tokio::test]
    async fn test_rejoin_leaves_previous_room() {
        let rooms = Rooms::new(16);
        let mut a = joined(&rooms, "conn-a");
        let mut b = joined(&rooms, "conn-b");

        a.handle(
            &rooms,
            ClientEvent::JoinRoom {
                room_id: "project-2".to_string(),
            },
        );
        assert_eq!(
            b.recv().await,
            ServerEvent::UserLeft {
                id: "conn-a".to_string()
            }
        );
        assert_eq!(a.room(), Some("project-2"));
        assert_eq!(rooms.member_count(ROOM), 1);
    }

    #[tokio::test]
    async fn test_leave_room_for_other_room_is_ignored() {
        let rooms = Rooms::new(16);
        let mut a = joined(&rooms, "conn-a");
        a.handle(
            &rooms,
            ClientEvent::LeaveRoom {
                room_id: "project-9".to_string(),
            },
        );
        assert_eq!(a.room(), Some(ROOM));
        a.handle(
            &rooms,
            ClientEvent::LeaveRoom {
                room_id: ROOM.to_string(),
            },
        );
        assert_eq!(a.room(), None);
    }

    #[tokio::test]
    async fn test_invalid_frame_gets_error_reply() {
        let rooms = Rooms::new(16);
        let mut a = Connection::new("conn-a");
        match a.handle_text(&rooms, r#"{"type":"dance"}"#) {
            Some(ServerEvent::Error { message }) => assert!(message.starts_with("Invalid message")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(a.handle_text(&rooms, r#"{"type":"join_room","roomId":"p"}"#).is_none());
        assert_eq!(a.room(), Some("p"));
    }
}
