//! Ephemeral presence: who is in the room and where their cursor is.
//!
//! Nothing here touches the shape store or the durable store.

use crate::shapes::SerializableColor;
use crate::transport::{PresenceTransport, TransportEvent};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Frames a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinRoom {
        room_id: String,
    },
    UserJoined {
        room_id: String,
        id: String,
        name: String,
        color: SerializableColor,
        cursor: Point,
    },
    CursorMove {
        room_id: String,
        point: Point,
        id: String,
    },
    LeaveRoom {
        room_id: String,
    },
}

/// Frames the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    UserJoined {
        id: String,
        name: String,
        color: SerializableColor,
        cursor: Point,
    },
    UserLeft {
        id: String,
    },
    CursorMove {
        id: String,
        point: Point,
    },
    Error {
        message: String,
    },
}

/// Another user in the room.
#[derive(Debug, Clone, PartialEq)]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    pub color: SerializableColor,
    pub cursor: Point,
}

/// The identity announced to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalUser {
    pub id: String,
    pub name: String,
    pub color: SerializableColor,
}

impl Default for LocalUser {
    fn default() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            name: format!("Guest {}", &id[..4]),
            id,
            color: SerializableColor::new(0x3B, 0x82, 0xF6, 255),
        }
    }
}

/// Something the user may want to be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceNotice {
    Connected,
    Disconnected,
    Joined(String),
    Left(String),
}

/// Presence state for one room plus its transport.
pub struct PresenceChannel {
    room: String,
    me: LocalUser,
    transport: Option<Box<dyn PresenceTransport>>,
    collaborators: Vec<Collaborator>,
    coalesce: bool,
    pending_cursor: Option<Point>,
    /// Last local pointer position, sent along with every announce.
    cursor: Point,
    connected: bool,
}

impl PresenceChannel {
    pub fn new(room: impl Into<String>, me: LocalUser, coalesce: bool) -> Self {
        Self {
            room: room.into(),
            me,
            transport: None,
            collaborators: Vec::new(),
            coalesce,
            pending_cursor: None,
            cursor: Point::ZERO,
            connected: false,
        }
    }

    pub fn me(&self) -> &LocalUser {
        &self.me
    }

    /// Take ownership of a transport. The room is joined once it reports a
    /// connection.
    pub fn attach(&mut self, transport: Box<dyn PresenceTransport>) {
        self.transport = Some(transport);
    }

    pub fn is_attached(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Users other than this one, in join order.
    pub fn collaborators(&self) -> &[Collaborator] {
        &self.collaborators
    }

    /// Leave the room and close the transport.
    pub fn detach(&mut self) {
        if self.connected {
            self.emit(ClientEvent::LeaveRoom {
                room_id: self.room.clone(),
            });
        }
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.connected = false;
        self.collaborators.clear();
        self.pending_cursor = None;
    }

    /// Record the local pointer in world space.
    ///
    /// With coalescing on, only the newest point is kept until
    /// [`flush_frame`](Self::flush_frame).
    pub fn pointer_moved(&mut self, world: Point) {
        self.cursor = world;
        if self.coalesce {
            self.pending_cursor = Some(world);
        } else {
            self.send_cursor(world);
        }
    }

    /// Emit at most one cursor update for this animation frame.
    pub fn flush_frame(&mut self) {
        if let Some(point) = self.pending_cursor.take() {
            self.send_cursor(point);
        }
    }

    fn send_cursor(&mut self, point: Point) {
        if !self.connected {
            return;
        }
        self.emit(ClientEvent::CursorMove {
            room_id: self.room.clone(),
            point,
            id: self.me.id.clone(),
        });
    }

    fn join(&mut self) {
        self.emit(ClientEvent::JoinRoom {
            room_id: self.room.clone(),
        });
        self.announce();
    }

    fn announce(&mut self) {
        self.emit(ClientEvent::UserJoined {
            room_id: self.room.clone(),
            id: self.me.id.clone(),
            name: self.me.name.clone(),
            color: self.me.color,
            cursor: self.cursor,
        });
    }

    fn emit(&mut self, event: ClientEvent) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let frame = match serde_json::to_string(&event) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("failed to encode presence frame: {e}");
                return;
            }
        };
        if let Err(e) = transport.send(frame) {
            log::debug!("presence frame dropped: {e}");
        }
    }

    /// Drain the transport and update the collaborator list.
    pub fn poll(&mut self) -> Vec<PresenceNotice> {
        let events = match self.transport.as_mut() {
            Some(transport) => transport.poll(),
            None => return Vec::new(),
        };
        let mut notices = Vec::new();
        for event in events {
            match event {
                TransportEvent::Connected => {
                    log::info!("presence connected to room {}", self.room);
                    self.connected = true;
                    self.join();
                    notices.push(PresenceNotice::Connected);
                }
                TransportEvent::Disconnected => {
                    log::info!("presence disconnected from room {}", self.room);
                    self.connected = false;
                    self.collaborators.clear();
                    notices.push(PresenceNotice::Disconnected);
                }
                TransportEvent::Error(message) => log::warn!("presence transport error: {message}"),
                TransportEvent::Message(text) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => notices.extend(self.apply(event)),
                    Err(e) => log::warn!("malformed presence frame: {e}"),
                },
            }
        }
        notices
    }

    /// Apply one inbound event.
    pub fn apply(&mut self, event: ServerEvent) -> Option<PresenceNotice> {
        match event {
            ServerEvent::UserJoined {
                id,
                name,
                color,
                cursor,
            } => {
                if id == self.me.id {
                    return None;
                }
                let entry = Collaborator {
                    id,
                    name: name.clone(),
                    color,
                    cursor,
                };
                match self.collaborators.iter_mut().find(|c| c.id == entry.id) {
                    Some(existing) => {
                        *existing = entry;
                        None
                    }
                    None => {
                        self.collaborators.push(entry);
                        // Let the newcomer learn about us too.
                        self.announce();
                        Some(PresenceNotice::Joined(name))
                    }
                }
            }
            ServerEvent::UserLeft { id } => {
                let index = self.collaborators.iter().position(|c| c.id == id)?;
                let gone = self.collaborators.remove(index);
                Some(PresenceNotice::Left(gone.name))
            }
            ServerEvent::CursorMove { id, point } => {
                if let Some(c) = self.collaborators.iter_mut().find(|c| c.id == id) {
                    c.cursor = point;
                }
                None
            }
            ServerEvent::Error { message } => {
                log::warn!("presence relay error: {message}");
                None
            }
        }
    }
}
