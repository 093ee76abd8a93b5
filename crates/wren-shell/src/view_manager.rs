//! Owns the tab set for one host window: serialized selection, content
//! bounds against the chrome height, zoom/mute/fullscreen state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use wren_common::events::{Event, EventBus};
use wren_common::rect::Rect;
use wren_common::types::TabId;
use wren_common::Result;
use wren_host::events::{SurfaceEvent, SurfaceEventKind};
use wren_host::{HostWindow, Surface, SurfaceFactory};
use wren_storage::models::{encode, Favicon, HistoryItem};
use wren_storage::{DocumentStore, Query, Scope};

use crate::view::{View, ViewInfo};

const APP_NAME: &str = "Wren";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomDirection {
    In,
    Out,
}

/// Zoom limits, inclusive. Steps are dyadic so repeated increments land
/// exactly on the bounds.
#[derive(Debug, Clone, Copy)]
pub struct ZoomConfig {
    pub min: f64,
    pub max: f64,
    pub increment: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 0.25,
            max: 5.0,
            increment: 0.25,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateViewOptions {
    pub url: String,
    pub active: bool,
    pub pinned: bool,
    pub tab_group: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
struct PendingSelection {
    id: TabId,
    focus: bool,
}

struct ManagerState {
    views: HashMap<TabId, View>,
    selected: Option<TabId>,
    /// Single-slot selection queue: the most recent not-yet-started request.
    pending: Option<PendingSelection>,
    /// Whether a drain task is currently applying selections.
    processing: bool,
    fullscreen: bool,
}

/// The view manager for one host window. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ViewManager {
    state: Arc<Mutex<ManagerState>>,
    host: Arc<dyn HostWindow>,
    factory: Arc<dyn SurfaceFactory>,
    store: Arc<dyn DocumentStore>,
    bus: EventBus,
    zoom: ZoomConfig,
    busy: Arc<watch::Sender<bool>>,
}

impl ViewManager {
    pub fn new(
        host: Arc<dyn HostWindow>,
        factory: Arc<dyn SurfaceFactory>,
        store: Arc<dyn DocumentStore>,
        bus: EventBus,
        zoom: ZoomConfig,
    ) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(ManagerState {
                views: HashMap::new(),
                selected: None,
                pending: None,
                processing: false,
                fullscreen: false,
            })),
            host,
            factory,
            store,
            bus,
            zoom,
            busy: Arc::new(busy),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn selected_id(&self) -> Option<TabId> {
        self.state.lock().unwrap().selected
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.state.lock().unwrap().views.keys().copied().collect()
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.state.lock().unwrap().views.contains_key(&id)
    }

    pub fn view_count(&self) -> usize {
        self.state.lock().unwrap().views.len()
    }

    pub fn fullscreen(&self) -> bool {
        self.state.lock().unwrap().fullscreen
    }

    pub fn view_info(&self, id: TabId) -> Option<ViewInfo> {
        let state = self.state.lock().unwrap();
        state.views.get(&id).map(ViewInfo::from)
    }

    pub fn requested_permission(&self, id: TabId) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .views
            .get(&id)
            .and_then(|v| v.requested_permission.clone())
    }

    pub fn set_requested_permission(&self, id: TabId, request: Option<Value>) {
        let mut state = self.state.lock().unwrap();
        if let Some(view) = state.views.get_mut(&id) {
            view.requested_permission = request;
        }
    }

    // -----------------------------------------------------------------------
    // Creation / destruction
    // -----------------------------------------------------------------------

    /// Allocate a surface and insert a new view. Returns synchronously; the
    /// content load runs in the background and its failures are absorbed.
    pub fn create(&self, details: CreateViewOptions, notify_ui: bool) -> Result<TabId> {
        let surface = self.factory.create()?;
        let mut view = View::new(Arc::clone(&surface), details.url.clone());
        view.pinned = details.pinned;
        view.tab_group = details.tab_group;
        let id = view.id();

        self.state.lock().unwrap().views.insert(id, view);
        debug!(tab = %id, url = %details.url, "view created");

        let url = details.url;
        tokio::spawn(async move {
            if let Err(e) = surface.load_url(&url).await {
                warn!(url = %url, error = %e, "initial tab load failed");
            }
        });

        if notify_ui {
            self.bus.publish(Event::TabCreated(id));
        }
        if details.active {
            self.select(id, true);
        }
        Ok(id)
    }

    /// Detach and release a view. Missing id is a no-op. If the destroyed
    /// tab was selected, selection of an arbitrary survivor is enqueued so
    /// the window is never left without a selection while tabs exist.
    pub fn destroy(&self, id: TabId) {
        let (surface, was_selected, survivor) = {
            let mut state = self.state.lock().unwrap();
            let Some(view) = state.views.remove(&id) else {
                return;
            };
            let was_selected = state.selected == Some(id);
            if was_selected {
                state.selected = None;
            }
            let survivor = state.views.keys().next().copied();
            (Arc::clone(view.surface()), was_selected, survivor)
        };

        self.host.detach(&surface);
        surface.destroy();
        debug!(tab = %id, "view destroyed");
        self.bus.publish(Event::TabRemoved(id));

        if was_selected {
            if let Some(next) = survivor {
                self.select(next, true);
            }
        }
    }

    /// Destroy every view. Used on window teardown.
    pub fn clear(&self) {
        let views: Vec<View> = {
            let mut state = self.state.lock().unwrap();
            state.selected = None;
            state.pending = None;
            state.views.drain().map(|(_, v)| v).collect()
        };
        for view in views {
            self.host.detach(view.surface());
            view.surface().destroy();
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Request selection of a tab. Requests are coalesced latest-wins: a new
    /// request replaces any not-yet-started pending one, so rapid sequences
    /// converge on the last target without intermediate attach/detach
    /// cycles. Selecting the current tab is a no-op.
    pub fn select(&self, id: TabId, focus: bool) {
        {
            let mut state = self.state.lock().unwrap();
            if state.selected == Some(id) {
                return;
            }
            state.pending = Some(PendingSelection { id, focus });
            if state.processing {
                return;
            }
            state.processing = true;
            // send_replace: the value must land even while nobody is
            // subscribed, or a later until_idle() would see stale state.
            self.busy.send_replace(true);
        }

        let manager = self.clone();
        tokio::spawn(async move {
            manager.drain_selection_queue().await;
        });
    }

    /// Wait until no selection is pending or being applied.
    pub async fn until_idle(&self) {
        let mut rx = self.busy.subscribe();
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    async fn drain_selection_queue(&self) {
        loop {
            let next = {
                let mut state = self.state.lock().unwrap();
                match state.pending.take() {
                    Some(request) => Some(request),
                    None => {
                        state.processing = false;
                        self.busy.send_replace(false);
                        None
                    }
                }
            };
            let Some(request) = next else { break };
            self.apply_selection(request).await;
        }
    }

    async fn apply_selection(&self, request: PendingSelection) {
        let (previous, surface) = {
            let mut state = self.state.lock().unwrap();
            let Some(view) = state.views.get(&request.id) else {
                // Raced with teardown; silently converge on whatever is next.
                return;
            };
            let surface = Arc::clone(view.surface());
            let previous = state
                .selected
                .and_then(|id| state.views.get(&id))
                .map(|v| Arc::clone(v.surface()));
            state.selected = Some(request.id);
            (previous, surface)
        };

        if let Some(previous) = previous {
            self.host.detach(&previous);
        }
        self.host.attach(&surface);

        if request.focus {
            surface.focus();
        } else {
            self.host.focus_chrome();
        }

        self.update_window_title();
        self.refresh_bookmark_state(request.id).await;
        self.fix_bounds().await;

        let nav = surface.navigation_state();
        {
            let mut state = self.state.lock().unwrap();
            if let Some(view) = state.views.get_mut(&request.id) {
                view.nav = nav;
            }
        }
        self.bus.publish(Event::NavigationStateChanged {
            tab: request.id,
            state: nav,
        });

        // Attach/detach has fully completed; listeners never observe a
        // transient state.
        self.bus.publish(Event::TabActivated(request.id));
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    /// Recompute the selected view's content rectangle against the window
    /// size and the dynamically-reported chrome height. Applies only when
    /// the rectangle changed; returns whether it was applied. Measurement
    /// failures are logged and the update skipped for this cycle.
    pub async fn fix_bounds(&self) -> bool {
        let (id, surface, last, fullscreen) = {
            let state = self.state.lock().unwrap();
            let Some(id) = state.selected else {
                return false;
            };
            let Some(view) = state.views.get(&id) else {
                return false;
            };
            (
                id,
                Arc::clone(view.surface()),
                view.bounds,
                state.fullscreen,
            )
        };

        let (width, height) = match self.host.content_size() {
            Ok(size) => size,
            Err(e) => {
                warn!(error = %e, "content size query failed, skipping bounds update");
                return false;
            }
        };
        let chrome_height = match self.host.chrome_height().await {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "chrome height query failed, skipping bounds update");
                return false;
            }
        };

        let bounds = if fullscreen {
            Rect::new(0, 0, width, height)
        } else {
            Rect::new(0, chrome_height, width, height - chrome_height)
        };

        if last == Some(bounds) {
            return false;
        }

        surface.set_bounds(bounds);
        let mut state = self.state.lock().unwrap();
        if let Some(view) = state.views.get_mut(&id) {
            view.bounds = Some(bounds);
        }
        true
    }

    /// HTML-element fullscreen: drop the chrome offset while active.
    pub async fn set_fullscreen(&self, fullscreen: bool) {
        self.state.lock().unwrap().fullscreen = fullscreen;
        self.bus.publish(Event::FullscreenChanged(fullscreen));
        self.fix_bounds().await;
    }

    // -----------------------------------------------------------------------
    // Zoom / mute
    // -----------------------------------------------------------------------

    /// Step the selected tab's zoom. Out-of-range results are rejected
    /// outright (no clamping): the factor does not change and `None` is
    /// returned so the caller may suppress the default action.
    pub fn change_zoom(&self, direction: ZoomDirection) -> Option<f64> {
        let (id, surface) = self.selected_surface()?;
        let delta = match direction {
            ZoomDirection::In => self.zoom.increment,
            ZoomDirection::Out => -self.zoom.increment,
        };
        let factor = surface.zoom_factor() + delta;
        if factor < self.zoom.min || factor > self.zoom.max {
            debug!(tab = %id, factor, "zoom change rejected");
            return None;
        }
        self.apply_zoom(id, &surface, factor, true);
        Some(factor)
    }

    pub fn reset_zoom(&self) -> Option<f64> {
        let (id, surface) = self.selected_surface()?;
        self.apply_zoom(id, &surface, 1.0, true);
        Some(1.0)
    }

    fn apply_zoom(&self, id: TabId, surface: &Arc<dyn Surface>, factor: f64, show_dialog: bool) {
        surface.set_zoom_factor(factor);
        {
            let mut state = self.state.lock().unwrap();
            if let Some(view) = state.views.get_mut(&id) {
                view.zoom_factor = factor;
            }
        }
        self.bus.publish(Event::ZoomFactorUpdated {
            tab: id,
            factor,
            show_dialog,
        });
    }

    pub fn set_muted(&self, id: TabId, muted: bool) {
        let surface = {
            let mut state = self.state.lock().unwrap();
            let Some(view) = state.views.get_mut(&id) else {
                return;
            };
            view.muted = muted;
            Arc::clone(view.surface())
        };
        surface.set_muted(muted);
    }

    fn selected_surface(&self) -> Option<(TabId, Arc<dyn Surface>)> {
        let state = self.state.lock().unwrap();
        let id = state.selected?;
        let view = state.views.get(&id)?;
        Some((id, Arc::clone(view.surface())))
    }

    // -----------------------------------------------------------------------
    // Surface events / chrome state
    // -----------------------------------------------------------------------

    /// Apply an event reported by a tab's surface. Events for surfaces that
    /// are not views (dialog overlays) are ignored here.
    pub async fn handle_surface_event(&self, event: SurfaceEvent) {
        let tab = TabId(event.surface.0);
        if !self.contains(tab) {
            return;
        }

        match event.kind {
            SurfaceEventKind::Ready => {}
            SurfaceEventKind::Destroyed => self.destroy(tab),
            SurfaceEventKind::LoadFailed(reason) => {
                warn!(tab = %tab, reason, "tab content load failed");
            }
            SurfaceEventKind::Navigated { url } => {
                {
                    let mut state = self.state.lock().unwrap();
                    if let Some(view) = state.views.get_mut(&tab) {
                        view.url = url.clone();
                    }
                }
                self.refresh_bookmark_state(tab).await;
                self.record_visit(tab).await;
            }
            SurfaceEventKind::TitleChanged(title) => {
                let selected = {
                    let mut state = self.state.lock().unwrap();
                    if let Some(view) = state.views.get_mut(&tab) {
                        view.title = title;
                    }
                    state.selected == Some(tab)
                };
                if selected {
                    self.update_window_title();
                }
            }
            SurfaceEventKind::FaviconChanged(favicon) => {
                {
                    let mut state = self.state.lock().unwrap();
                    if let Some(view) = state.views.get_mut(&tab) {
                        view.favicon = Some(favicon.clone());
                    }
                }
                self.record_favicon(tab, favicon).await;
            }
            SurfaceEventKind::NavigationStateChanged(nav) => {
                {
                    let mut state = self.state.lock().unwrap();
                    if let Some(view) = state.views.get_mut(&tab) {
                        view.nav = nav;
                    }
                }
                self.bus
                    .publish(Event::NavigationStateChanged { tab, state: nav });
            }
        }
    }

    /// Set the window title from the selected view, app name fallback.
    pub fn update_window_title(&self) {
        let title = {
            let state = self.state.lock().unwrap();
            let Some(view) = state.selected.and_then(|id| state.views.get(&id)) else {
                return;
            };
            if view.title.trim().is_empty() {
                APP_NAME.to_string()
            } else {
                format!("{} - {}", view.title, APP_NAME)
            }
        };
        self.host.set_title(&title);
    }

    async fn refresh_bookmark_state(&self, id: TabId) {
        let Some(url) = ({
            let state = self.state.lock().unwrap();
            state.views.get(&id).map(|v| v.url.clone())
        }) else {
            return;
        };

        match self
            .store
            .find_one(Scope::Bookmarks, &Query::field("url", url))
            .await
        {
            Ok(record) => {
                let mut state = self.state.lock().unwrap();
                if let Some(view) = state.views.get_mut(&id) {
                    view.bookmarked = record.is_some();
                }
            }
            Err(e) => warn!(tab = %id, error = %e, "bookmark lookup failed"),
        }
    }

    async fn record_visit(&self, id: TabId) {
        let Some((url, title, favicon)) = ({
            let state = self.state.lock().unwrap();
            state
                .views
                .get(&id)
                .map(|v| (v.url.clone(), v.title.clone(), v.favicon.clone()))
        }) else {
            return;
        };

        let item = HistoryItem {
            url,
            title,
            favicon,
            date: Utc::now(),
        };
        let value = match encode(&item) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "history encode failed");
                return;
            }
        };
        if let Err(e) = self.store.insert(Scope::History, value).await {
            warn!(tab = %id, error = %e, "history insert failed");
        }
    }

    async fn record_favicon(&self, id: TabId, data: String) {
        let Some(url) = ({
            let state = self.state.lock().unwrap();
            state.views.get(&id).map(|v| v.url.clone())
        }) else {
            return;
        };

        let favicon = Favicon {
            page_url: url.clone(),
            data,
        };
        let value = match encode(&favicon) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "favicon encode failed");
                return;
            }
        };
        let query = Query::field("page_url", url);
        let result = async {
            let updated = self
                .store
                .update(Scope::Favicons, &query, value.clone(), false)
                .await?;
            if updated == 0 {
                self.store.insert(Scope::Favicons, value).await?;
            }
            Ok::<_, wren_common::StorageError>(())
        }
        .await;
        if let Err(e) = result {
            warn!(tab = %id, error = %e, "favicon upsert failed");
        }
    }
}
