//! The whiteboard session: one open project with its store subscription
//! and presence room.
//!
//! Every mutation goes the same way: apply to the local [`ShapeStore`],
//! queue the request on the [`SyncEngine`], record it in the [`History`].
//! [`Session::on_frame`] then flushes the queue, swaps in the newest
//! authoritative snapshot and pumps presence.

use crate::camera::Camera;
use crate::clipboard::{Clipboard, copies_of};
use crate::config::SessionConfig;
use crate::history::{Edit, History, PatchChange};
use crate::input::{KeyEvent, Modifiers, MouseButton, PointerEvent};
use crate::interaction::{Interaction, Outcome};
use crate::presence::{Collaborator, PresenceChannel, PresenceNotice};
use crate::shapes::{
    MIN_SHAPE_SIZE, SerializableColor, Shape, ShapeId, ShapeKind, ShapePatch, ShapeStyle,
    StylePatch,
};
use crate::shortcuts::{Command, ShortcutRegistry};
use crate::storage::{DurableStore, StoreError};
use crate::store::{EditError, Removed, ShapeStore, ZOrder};
use crate::sync::{ConnectionStatus, SyncEngine};
use crate::tools::ToolKind;
use crate::transport::{PresenceTransport, TransportError};
use kurbo::{Point, Rect, Vec2};
use std::sync::Arc;
use thiserror::Error;

/// Widest an inserted image is allowed to start out.
pub const MAX_IMAGE_WIDTH: f64 = 300.0;
/// World position of inserted images.
pub const IMAGE_ORIGIN: Point = Point::new(100.0, 100.0);
pub const DEFAULT_STICKER_SIZE: f64 = 100.0;
pub const MIN_STICKER_SIZE: f64 = 30.0;
pub const MAX_STICKER_SIZE: f64 = 300.0;
/// Offset of stickers and emoji from the top-left of the view.
const STICKER_INSET: f64 = 100.0;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// A short message for the host to show, like a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

pub struct Session {
    config: SessionConfig,
    durable: Arc<dyn DurableStore>,
    store: ShapeStore,
    interaction: Interaction,
    camera: Camera,
    history: History,
    clipboard: Clipboard,
    sync: SyncEngine,
    presence: Option<PresenceChannel>,
    notifications: Vec<Notification>,
    tick: u64,
    dirty: bool,
}

impl Session {
    /// Open the configured project: subscribe to its shapes and, with a
    /// transport, join its presence room.
    pub fn open(
        config: SessionConfig,
        durable: Arc<dyn DurableStore>,
        transport: Option<Box<dyn PresenceTransport>>,
    ) -> Result<Self, SessionError> {
        let mut sync = SyncEngine::new(config.project_id.clone());
        sync.subscribe(durable.as_ref())?;

        let presence = transport.map(|transport| {
            let mut channel = PresenceChannel::new(
                config.project_id.clone(),
                config.user.clone(),
                config.coalesce_cursor,
            );
            channel.attach(transport);
            channel
        });

        let mut interaction = Interaction::new();
        interaction.set_style(config.default_style);
        interaction.set_grid(config.grid());

        log::info!("opened session for project {}", config.project_id);
        Ok(Self {
            camera: Camera::with_limits(config.min_zoom, config.max_zoom),
            config,
            durable,
            store: ShapeStore::new(),
            interaction,
            history: History::new(),
            clipboard: Clipboard::new(),
            sync,
            presence,
            notifications: Vec::new(),
            tick: 0,
            dirty: true,
        })
    }

    /// Like [`open`](Self::open), connecting to `presence_url` when the
    /// config names one.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn connect(config: SessionConfig, durable: Arc<dyn DurableStore>) -> Result<Self, SessionError> {
        let transport: Option<Box<dyn PresenceTransport>> = match config.presence_url.as_deref() {
            Some(url) => Some(Box::new(crate::transport::WsTransport::connect(url)?)),
            None => None,
        };
        Self::open(config, durable, transport)
    }

    /// Submit anything still queued, then drop the subscription and leave
    /// the room.
    pub fn close(&mut self) {
        self.flush_outbox();
        self.sync.unsubscribe();
        if let Some(presence) = self.presence.as_mut() {
            presence.detach();
        }
        log::info!("closed session for project {}", self.config.project_id);
    }

    // --- accessors ---

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &ShapeStore {
        &self.store
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn collaborators(&self) -> &[Collaborator] {
        match &self.presence {
            Some(presence) => presence.collaborators(),
            None => &[],
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.interaction.tool()
    }

    /// Bumped on every visible change.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        if self.sync.pending() > 0 {
            return ConnectionStatus::Syncing;
        }
        let presence_down = self.presence.as_ref().is_some_and(|p| !p.is_connected());
        if !self.sync.is_subscribed() || presence_down {
            ConnectionStatus::Offline
        } else {
            ConnectionStatus::Online
        }
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Ask for a redraw without changing state, e.g. after an image decoded.
    pub fn request_redraw(&mut self) {
        self.touch();
    }

    fn touch(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        self.dirty = true;
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    // --- frame pump ---

    /// Per-frame work. Returns whether anything visible changed since the
    /// previous frame.
    pub fn on_frame(&mut self) -> bool {
        self.flush_outbox();
        self.apply_snapshot();
        self.pump_presence();
        std::mem::take(&mut self.dirty)
    }

    fn flush_outbox(&mut self) {
        for failure in self.sync.flush(self.durable.as_ref()) {
            self.notify(Notification::error(format!(
                "Failed to {} shape: {}",
                failure.request.verb(),
                failure.error
            )));
        }
    }

    fn apply_snapshot(&mut self) {
        let Some(snapshot) = self.sync.latest_snapshot() else {
            return;
        };
        let settled = self.sync.settle(&snapshot);
        let selected: Vec<ShapeId> = self
            .store
            .selected_ids()
            .into_iter()
            .map(|id| settled.get(&id).cloned().unwrap_or(id))
            .collect();
        self.history.remap_ids(&settled);
        self.interaction.remap_ids(&settled);

        log::debug!(
            "replacing {} local shapes with snapshot of {}",
            self.store.len(),
            snapshot.len()
        );
        self.store.replace_all(snapshot);
        self.store.set_selection(selected);
        self.touch();
    }

    fn pump_presence(&mut self) {
        let Some(presence) = self.presence.as_mut() else {
            return;
        };
        let notices = presence.poll();
        presence.flush_frame();
        for notice in notices {
            match notice {
                PresenceNotice::Joined(name) => self.notify(Notification::info(format!("{name} joined"))),
                PresenceNotice::Left(name) => self.notify(Notification::info(format!("{name} left"))),
                PresenceNotice::Disconnected => {
                    self.notify(Notification::error("Lost connection to collaborators"))
                }
                PresenceNotice::Connected => {}
            }
            self.touch();
        }
    }

    // --- input ---

    pub fn pointer_down(&mut self, screen: Point, button: MouseButton, modifiers: Modifiers) {
        let world = self.camera.screen_to_world(screen);
        self.interaction.pointer_down(
            world,
            screen,
            button,
            modifiers.shift,
            &mut self.store,
            self.camera.zoom,
        );
        self.touch();
    }

    pub fn pointer_move(&mut self, screen: Point) {
        let world = self.camera.screen_to_world(screen);
        if let Some(presence) = self.presence.as_mut() {
            presence.pointer_moved(world);
        }
        if self.interaction.is_idle() {
            return;
        }
        if let Some(outcome) = self.interaction.pointer_move(world, screen, &mut self.store) {
            self.handle_outcome(outcome);
        }
        self.touch();
    }

    /// End the gesture. Hosts deliver this from a window-level listener so
    /// a release off the canvas still lands here.
    pub fn pointer_up(&mut self, screen: Point) {
        let world = self.camera.screen_to_world(screen);
        if let Some(outcome) = self.interaction.pointer_up(world, &self.store) {
            self.handle_outcome(outcome);
        }
        self.touch();
    }

    /// Dispatch a pointer event from the host's event loop.
    pub fn handle_pointer(&mut self, event: PointerEvent, modifiers: Modifiers) {
        match event {
            PointerEvent::Down { position, button } => self.pointer_down(position, button, modifiers),
            PointerEvent::Move { position } => self.pointer_move(position),
            PointerEvent::Up { position, .. } => self.pointer_up(position),
            PointerEvent::Wheel { position, delta } => self.wheel(position, delta, modifiers),
        }
    }

    /// Ctrl/Cmd + wheel zooms about the pointer; a plain wheel pans.
    pub fn wheel(&mut self, screen: Point, delta: Vec2, modifiers: Modifiers) {
        self.camera.scroll(screen, delta, modifiers.command());
        self.touch();
    }

    /// Handle a key press. Returns whether it was consumed.
    pub fn key_down(&mut self, event: &KeyEvent) -> bool {
        let Some(command) = ShortcutRegistry::resolve(event) else {
            return false;
        };
        match command {
            Command::SetTool(tool) => self.set_tool(tool),
            Command::DeleteSelection => self.delete_selection(),
            Command::Copy => self.copy(),
            Command::Paste => self.paste(),
            Command::Duplicate => self.duplicate(),
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::Cancel => self.cancel(),
        }
        true
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Live { id, patch } => self.sync.submit_update(&id, patch),
            Outcome::Finished(changes) => {
                for change in &changes {
                    self.sync.submit_update(&change.id, change.after.clone());
                }
                self.history.record(Edit::Patch(changes));
            }
            Outcome::Create(shape) => {
                self.commit_add(vec![shape]);
            }
            Outcome::Pan(delta) => self.camera.pan_by(delta),
        }
    }

    // --- view ---

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.interaction.set_tool(tool);
        self.touch();
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.camera.pan_by(delta);
        self.touch();
    }

    pub fn zoom_in(&mut self) {
        self.camera.zoom_in();
        self.touch();
    }

    pub fn zoom_out(&mut self) {
        self.camera.zoom_out();
        self.touch();
    }

    pub fn reset_view(&mut self) {
        self.camera.reset();
        self.touch();
    }

    // --- edits ---

    /// Add shapes on top of the stack and queue their creation.
    fn commit_add(&mut self, shapes: Vec<Shape>) -> Vec<ShapeId> {
        let mut added = Vec::with_capacity(shapes.len());
        for shape in shapes {
            self.sync.submit_create(&shape);
            added.push(Removed {
                index: self.store.len(),
                shape: shape.clone(),
            });
            self.store.add(shape);
        }
        let ids = added.iter().map(|r| r.shape.id.clone()).collect();
        self.history.record(Edit::Add(added));
        self.touch();
        ids
    }

    /// Add a fully formed shape, e.g. one built by the host.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let mut ids = self.commit_add(vec![shape]);
        ids.pop().unwrap_or_else(ShapeId::temporary)
    }

    pub fn select(&mut self, ids: impl IntoIterator<Item = ShapeId>) {
        self.store.set_selection(ids);
        self.touch();
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
        self.touch();
    }

    /// Apply one patch to several shapes as a single undoable edit.
    pub fn update_shapes(&mut self, ids: &[ShapeId], patch: ShapePatch) {
        if let Err(e) = patch.validate() {
            self.notify(Notification::error(e.to_string()));
            return;
        }
        let mut changes = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.update(id, &patch) {
                Ok(before) => {
                    self.sync.submit_update(id, patch.clone());
                    changes.push(PatchChange {
                        id: id.clone(),
                        before: patch.inverse_for(&before),
                        after: patch.clone(),
                    });
                }
                Err(EditError::NotFound(_)) => log::debug!("update skipped missing shape {id}"),
                Err(e) => self.notify(Notification::error(e.to_string())),
            }
        }
        self.history.record(Edit::Patch(changes));
        self.touch();
    }

    pub fn delete_selection(&mut self) {
        let ids = self.store.selected_ids();
        if ids.is_empty() {
            return;
        }
        let removed = self.store.delete(&ids);
        self.sync
            .submit_delete(removed.iter().map(|r| r.shape.id.clone()).collect());
        self.history.record(Edit::Delete(removed));
        self.notify(Notification::info("Deleted"));
        self.touch();
    }

    pub fn copy(&mut self) {
        let selected = self.selected_shapes();
        if selected.is_empty() {
            return;
        }
        self.clipboard.copy(selected);
        self.notify(Notification::info("Copied"));
    }

    /// Paste the clipboard offset by (20, 20) and select the copies.
    pub fn paste(&mut self) {
        if self.clipboard.is_empty() {
            return;
        }
        let ids = self.commit_add(self.clipboard.paste());
        self.store.set_selection(ids);
        self.notify(Notification::info("Pasted"));
    }

    pub fn duplicate(&mut self) {
        let copies = copies_of(&self.selected_shapes());
        if copies.is_empty() {
            return;
        }
        let ids = self.commit_add(copies);
        self.store.set_selection(ids);
        self.notify(Notification::info("Duplicated"));
    }

    fn selected_shapes(&self) -> Vec<Shape> {
        self.store
            .iter()
            .filter(|s| self.store.is_selected(&s.id))
            .cloned()
            .collect()
    }

    /// Drop the selection and abandon the gesture.
    pub fn cancel(&mut self) {
        if let Some(outcome) = self.interaction.cancel(&self.store) {
            self.handle_outcome(outcome);
        }
        self.store.clear_selection();
        self.touch();
    }

    /// Lock the selection, or unlock it when every selected shape is locked.
    pub fn toggle_lock(&mut self) {
        let selected = self.selected_shapes();
        if selected.is_empty() {
            return;
        }
        let locked = !selected.iter().all(|s| s.locked);
        let ids: Vec<ShapeId> = selected.into_iter().map(|s| s.id).collect();
        self.update_shapes(&ids, ShapePatch::Lock { locked });
    }

    pub fn bring_to_front(&mut self) {
        self.reorder_selection(ZOrder::Front);
    }

    pub fn send_to_back(&mut self) {
        self.reorder_selection(ZOrder::Back);
    }

    /// Z-order is local only; the next snapshot may put it back.
    fn reorder_selection(&mut self, to: ZOrder) {
        let ids = self.store.selected_ids();
        if ids.is_empty() {
            return;
        }
        let before = self.store.reorder(&ids, to);
        let after = self.store.order();
        self.history.record(Edit::Reorder { before, after });
        self.touch();
    }

    pub fn set_color(&mut self, color: SerializableColor) {
        self.restyle(StylePatch {
            color: Some(color),
            ..Default::default()
        });
    }

    pub fn set_stroke_width(&mut self, stroke_width: f64) {
        self.restyle(StylePatch {
            stroke_width: Some(stroke_width),
            ..Default::default()
        });
    }

    pub fn set_fill_opacity(&mut self, fill_opacity: f64) {
        self.restyle(StylePatch {
            fill_opacity: Some(fill_opacity),
            ..Default::default()
        });
    }

    /// Change the tool style and every selected shape with it.
    fn restyle(&mut self, style: StylePatch) {
        let patch = ShapePatch::Style(style);
        if let Err(e) = patch.validate() {
            self.notify(Notification::error(e.to_string()));
            return;
        }
        let current = self.interaction.style();
        self.interaction.set_style(ShapeStyle {
            color: style.color.unwrap_or(current.color),
            stroke_width: style.stroke_width.unwrap_or(current.stroke_width),
            fill_opacity: style.fill_opacity.unwrap_or(current.fill_opacity),
        });
        let ids = self.store.selected_ids();
        if ids.is_empty() {
            self.touch();
            return;
        }
        self.update_shapes(&ids, patch);
    }

    pub fn set_text(&mut self, id: &ShapeId, text: impl Into<String>) {
        self.update_shapes(std::slice::from_ref(id), ShapePatch::Text { text: text.into() });
    }

    // --- inserted content ---

    /// Place an image at the fixed insert position, capped in width and
    /// keeping its aspect ratio.
    pub fn insert_image(&mut self, url: impl Into<String>, natural_width: f64, natural_height: f64) -> ShapeId {
        let (width, height) = if natural_width > 0.0 && natural_height > 0.0 {
            let width = natural_width.min(MAX_IMAGE_WIDTH);
            (width, natural_height / natural_width * width)
        } else {
            (MAX_IMAGE_WIDTH, MAX_IMAGE_WIDTH)
        };
        let bounds = Rect::from_origin_size(
            IMAGE_ORIGIN,
            (width.max(MIN_SHAPE_SIZE), height.max(MIN_SHAPE_SIZE)),
        );
        let shape = Shape::new(ShapeKind::Image, bounds, image_style()).with_image_url(url);
        self.add_shape(shape)
    }

    pub fn insert_sticker(&mut self, url: impl Into<String>, size: f64) -> ShapeId {
        let shape = Shape::new(ShapeKind::Image, self.sticker_box(size), image_style()).with_image_url(url);
        self.add_shape(shape)
    }

    /// An emoji is a text shape in the current color.
    pub fn insert_emoji(&mut self, symbol: impl Into<String>, size: f64) -> ShapeId {
        let style = ShapeStyle {
            color: self.interaction.style().color,
            stroke_width: 0.0,
            fill_opacity: 1.0,
        };
        let shape = Shape::new(ShapeKind::Text, self.sticker_box(size), style).with_text(symbol);
        self.add_shape(shape)
    }

    fn sticker_box(&self, size: f64) -> Rect {
        let size = if size.is_finite() {
            size.clamp(MIN_STICKER_SIZE, MAX_STICKER_SIZE)
        } else {
            DEFAULT_STICKER_SIZE
        };
        let origin = Point::new(
            -self.camera.pan.x + STICKER_INSET,
            -self.camera.pan.y + STICKER_INSET,
        );
        Rect::from_origin_size(origin, (size, size))
    }

    // --- history ---

    pub fn undo(&mut self) {
        match self.history.undo() {
            Some(edit) => self.replay(edit),
            None => log::debug!("nothing to undo"),
        }
    }

    pub fn redo(&mut self) {
        match self.history.redo() {
            Some(edit) => self.replay(edit),
            None => log::debug!("nothing to redo"),
        }
    }

    /// Apply an edit from the log through the normal optimistic path.
    /// Targets that no longer exist are skipped.
    fn replay(&mut self, edit: Edit) {
        match edit {
            Edit::Add(items) => {
                for Removed { index, shape } in items {
                    if self.store.contains(&shape.id) {
                        log::debug!("replay skipped existing shape {}", shape.id);
                        continue;
                    }
                    self.sync.submit_create(&shape);
                    self.store.insert_at(index, shape);
                }
            }
            Edit::Delete(items) => {
                let ids: Vec<ShapeId> = items
                    .into_iter()
                    .map(|r| r.shape.id)
                    .filter(|id| self.store.contains(id))
                    .collect();
                self.store.delete(&ids);
                self.sync.submit_delete(ids);
            }
            Edit::Patch(changes) => {
                for change in changes {
                    match self.store.update(&change.id, &change.after) {
                        Ok(_) => self.sync.submit_update(&change.id, change.after),
                        Err(EditError::NotFound(id)) => log::debug!("replay skipped missing shape {id}"),
                        Err(e) => self.notify(Notification::error(e.to_string())),
                    }
                }
            }
            Edit::Reorder { after, .. } => self.store.restore_order(&after),
        }
        self.touch();
    }
}

fn image_style() -> ShapeStyle {
    ShapeStyle {
        color: SerializableColor::transparent(),
        stroke_width: 0.0,
        fill_opacity: 1.0,
    }
}
