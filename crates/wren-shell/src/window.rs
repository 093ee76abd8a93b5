//! One chrome window: the view manager and dialog service behind it, plus
//! the event routing between them.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use wren_common::events::{Event, EventBus};
use wren_common::Result;
use wren_host::events::{SurfaceEvent, WindowEvent};
use wren_host::{HostWindow, SurfaceFactory};
use wren_storage::DocumentStore;

use crate::dialogs::{DialogShowOptions, DialogsService};
use crate::ipc::UiRequest;
use crate::view_manager::{CreateViewOptions, ViewManager, ZoomConfig};

/// Owns everything scoped to a single host window and pumps the internal
/// event bus between the view side and the dialog side.
pub struct ShellWindow {
    host: Arc<dyn HostWindow>,
    pub views: ViewManager,
    pub dialogs: DialogsService,
    bus: EventBus,
    bus_rx: broadcast::Receiver<Event>,
}

impl ShellWindow {
    pub fn new(
        host: Arc<dyn HostWindow>,
        factory: Arc<dyn SurfaceFactory>,
        store: Arc<dyn DocumentStore>,
        base_url: impl Into<String>,
    ) -> Self {
        let bus = EventBus::default();
        let views = ViewManager::new(
            Arc::clone(&host),
            Arc::clone(&factory),
            store,
            bus.clone(),
            ZoomConfig::default(),
        );
        let dialogs = DialogsService::new(factory, Arc::clone(&host), bus.clone(), base_url);
        let bus_rx = bus.subscribe();
        Self {
            host,
            views,
            dialogs,
            bus,
            bus_rx,
        }
    }

    /// Boot the dialog layer. Call once after construction.
    pub async fn run(&mut self) -> Result<()> {
        self.dialogs.run().await
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn host(&self) -> &Arc<dyn HostWindow> {
        &self.host
    }

    // -- event routing ------------------------------------------------------

    /// React to a host-window lifecycle event.
    pub async fn handle_window_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Resized | WindowEvent::Moved => {
                if let Some(disposition) = event.into() {
                    self.dialogs.on_window_bounds_changed(disposition);
                }
                self.views.fix_bounds().await;
            }
            WindowEvent::FullscreenEntered => {
                self.bus.publish(Event::FullscreenChanged(true));
                self.views.fix_bounds().await;
            }
            WindowEvent::FullscreenLeft => {
                self.bus.publish(Event::FullscreenChanged(false));
                self.views.fix_bounds().await;
            }
            WindowEvent::HtmlFullscreen(on) => {
                self.views.set_fullscreen(on).await;
            }
        }
    }

    /// Feed a surface event through the view side, then flush the bus so
    /// the dialog side observes the consequences.
    pub async fn handle_surface_event(&mut self, event: SurfaceEvent) {
        self.views.handle_surface_event(event).await;
        self.route_bus();
    }

    /// Drain a batch of surface events and settle the routing afterwards.
    pub async fn pump(&mut self, events: impl IntoIterator<Item = SurfaceEvent>) {
        for event in events {
            self.views.handle_surface_event(event).await;
        }
        self.settle().await;
    }

    /// Drain the internal bus into the dialog service.
    pub fn route_bus(&mut self) {
        loop {
            match self.bus_rx.try_recv() {
                Ok(Event::TabActivated(tab)) => self.dialogs.on_tab_activated(tab),
                Ok(Event::TabRemoved(tab)) => self.dialogs.on_tab_removed(tab),
                Ok(Event::ZoomFactorUpdated { factor, .. }) => self.dialogs.push_zoom(factor),
                Ok(event) => debug!(?event, "bus event not routed to dialogs"),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "window bus receiver lagged");
                }
                Err(_) => break,
            }
        }
    }

    /// Wait for selection work to finish, then flush the bus.
    pub async fn settle(&mut self) {
        self.views.until_idle().await;
        self.route_bus();
    }

    // -- UI commands --------------------------------------------------------

    /// Execute a chrome-UI command. Replies carry the value the UI needs
    /// to update itself, when there is one.
    pub async fn handle_ui_request(&mut self, request: UiRequest) -> Result<Option<Value>> {
        let reply = match request {
            UiRequest::CreateView { url, active } => {
                let id = self.views.create(
                    CreateViewOptions {
                        url,
                        active,
                        ..Default::default()
                    },
                    true,
                )?;
                Some(Value::from(id.0))
            }
            UiRequest::SelectView { id, focus } => {
                self.views.select(id, focus);
                None
            }
            UiRequest::DestroyView { id } => {
                self.views.destroy(id);
                None
            }
            UiRequest::ChangeZoom { direction } => {
                self.views.change_zoom(direction).map(Value::from)
            }
            UiRequest::ResetZoom => self.views.reset_zoom().map(Value::from),
            UiRequest::SetMuted { id, muted } => {
                self.views.set_muted(id, muted);
                None
            }
            UiRequest::ShowDialog { name, bounds } => {
                let shown = self.dialogs.show(DialogShowOptions::fixed(name, bounds))?;
                Some(Value::from(shown.surface().0))
            }
            UiRequest::HideDialog { name } => {
                self.dialogs.hide(name, None);
                None
            }
            UiRequest::RearrangeDialog { name, bounds } => {
                self.dialogs.rearrange(name, &bounds);
                None
            }
        };
        self.settle().await;
        Ok(reply)
    }

    pub fn update_title(&self) {
        self.views.update_window_title();
    }

    /// Window close: drop every view and dialog surface.
    pub fn close(&mut self) {
        self.views.clear();
        self.dialogs.destroy_all();
    }
}
