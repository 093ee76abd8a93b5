//! Long-lived dialogs created once at startup and shown/hidden many times.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use wren_common::events::{Event, EventBus};
use wren_common::rect::{Rect, RectPatch};
use wren_common::types::DialogName;
use wren_common::Result;
use wren_host::events::ContentMessage;
use wren_host::{HostWindow, Surface, SurfaceFactory};

use super::{dialog_url, TRANSPARENT_BACKGROUND_SCRIPT};

/// A dialog whose surface survives hides. Hiding can be deferred by a
/// timeout so a quickly-following `show` reuses the still-attached surface
/// without an attach/detach flicker.
pub struct PersistentDialog {
    name: DialogName,
    surface: Arc<dyn Surface>,
    host: Option<Arc<dyn HostWindow>>,
    bus: EventBus,
    visible: bool,
    bounds: Rect,
    hide_timeout: Option<Duration>,
    pending_detach: Option<JoinHandle<()>>,
}

impl PersistentDialog {
    pub fn new(
        name: DialogName,
        factory: &dyn SurfaceFactory,
        bus: EventBus,
        hide_timeout: Option<Duration>,
    ) -> Result<Self> {
        let surface = factory.create()?;
        Ok(Self {
            name,
            surface,
            host: None,
            bus,
            visible: false,
            bounds: Rect::default(),
            hide_timeout,
            pending_detach: None,
        })
    }

    pub fn name(&self) -> DialogName {
        self.name
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Start loading the dialog document. Load failures are absorbed: the
    /// dialog simply stays blank until the next show reloads nothing.
    pub async fn load(&mut self, base_url: &str) {
        let url = dialog_url(base_url, self.name);
        if let Err(e) = self.surface.load_url(&url).await {
            warn!(dialog = %self.name, error = %e, "dialog document load failed");
            return;
        }

        let surface = Arc::clone(&self.surface);
        tokio::spawn(async move {
            surface.wait_ready().await;
            if let Err(e) = surface.execute_script(TRANSPARENT_BACKGROUND_SCRIPT).await {
                warn!(error = %e, "transparency script failed");
            }
        });
    }

    /// Attach and reveal. Cancels any deferred detach first, so a
    /// hide-then-show inside the hide timeout keeps the surface attached
    /// throughout. When already visible only focus is refreshed.
    pub async fn show(
        &mut self,
        host: Arc<dyn HostWindow>,
        focus: bool,
        wait_for_load: bool,
    ) {
        if let Some(pending) = self.pending_detach.take() {
            pending.abort();
        }

        if wait_for_load && !self.surface.is_ready() {
            self.surface.wait_ready().await;
        }

        if self.visible {
            if focus {
                self.surface.focus();
            }
            return;
        }

        self.bus.publish(Event::DialogVisibilityChanged {
            name: self.name,
            visible: true,
        });
        host.attach(&self.surface);
        self.host = Some(host);
        self.visible = true;
        self.surface.set_bounds(self.bounds);
        if focus {
            self.surface.focus();
        }
        debug!(dialog = %self.name, "persistent dialog shown");
    }

    /// Hide the dialog. With a hide timeout the detach is deferred; the
    /// visible flag drops immediately either way. `hide_visually` only
    /// signals the content to blank itself without touching attachment.
    pub fn hide(&mut self, bring_to_top: bool, hide_visually: bool) {
        let Some(host) = self.host.clone() else {
            return;
        };
        if !self.visible {
            return;
        }

        if hide_visually {
            self.surface.push(&ContentMessage::VisibilityHint(false));
        }

        self.bus.publish(Event::DialogVisibilityChanged {
            name: self.name,
            visible: false,
        });

        if bring_to_top {
            // Re-attach to put the surface above the content while it fades.
            host.detach(&self.surface);
            host.attach(&self.surface);
        }

        if let Some(pending) = self.pending_detach.take() {
            pending.abort();
        }

        self.visible = false;
        match self.hide_timeout {
            Some(timeout) => {
                let surface = Arc::clone(&self.surface);
                self.pending_detach = Some(tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    host.detach(&surface);
                }));
            }
            None => host.detach(&self.surface),
        }
        debug!(dialog = %self.name, deferred = self.hide_timeout.is_some(), "persistent dialog hidden");
    }

    /// Merge a bounds patch; the surface is only touched while visible.
    pub fn rearrange(&mut self, patch: &RectPatch) {
        self.bounds = patch.apply_to(self.bounds);
        if self.visible {
            self.surface.set_bounds(self.bounds);
        }
    }

    pub fn push(&self, message: &ContentMessage) {
        self.surface.push(message);
    }
}
