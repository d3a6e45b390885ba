//! SyncSpace Core Library
//!
//! Shape model, interaction state machine, optimistic sync and presence for
//! the SyncSpace collaborative whiteboard. Pixels live in `syncspace-render`.

pub mod camera;
pub mod clipboard;
pub mod config;
pub mod geometry;
pub mod history;
pub mod input;
pub mod interaction;
pub mod presence;
pub mod session;
pub mod shapes;
pub mod shortcuts;
pub mod storage;
pub mod store;
pub mod sync;
pub mod tools;
pub mod transport;

pub use camera::Camera;
pub use clipboard::Clipboard;
pub use config::{ConfigError, SessionConfig};
pub use geometry::{Corner, HandleKind, handle_at_point, point_in_shape, rotate_point};
pub use history::{Edit, History};
pub use input::{KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use interaction::{Gesture, Interaction, Outcome, Preview};
pub use presence::{ClientEvent, Collaborator, LocalUser, PresenceChannel, ServerEvent};
pub use session::{Notification, NotificationKind, Session, SessionError};
pub use shapes::{SerializableColor, Shape, ShapeId, ShapeKind, ShapePatch, ShapeStyle};
pub use shortcuts::{Command, ShortcutRegistry};
pub use storage::{AccountStore, DurableStore, MemoryStore, StoreError};
pub use store::{ShapeStore, ZOrder};
pub use sync::{ConnectionStatus, SyncEngine};
pub use tools::ToolKind;
pub use transport::{LoopbackTransport, PresenceTransport, TransportError, TransportEvent};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::WsTransport;
