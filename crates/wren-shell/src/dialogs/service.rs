//! On-demand dialogs multiplexed over a pool of reusable surfaces.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use wren_common::events::{Event, EventBus};
use wren_common::rect::{Rect, RectPatch};
use wren_common::types::{DialogName, SurfaceId, TabId};
use wren_common::{Result, ShellError};
use wren_host::events::{BoundsDisposition, ContentMessage};
use wren_host::{HostWindow, Surface, SurfaceFactory};

use crate::ipc::{ChannelHandler, ChannelHub, DialogRequest};

use super::{dialog_url, PersistentDialog, TRANSPARENT_BACKGROUND_SCRIPT};

/// How long the quick-search dialog stays attached after a hide.
const SEARCH_HIDE_TIMEOUT: Duration = Duration::from_millis(200);

pub type BoundsProvider = Arc<dyn Fn() -> RectPatch + Send + Sync>;
pub type HideCallback = Arc<dyn Fn(DialogName) + Send + Sync>;
/// Invoked when the host window moves or resizes; a returned patch is
/// layered over the provider bounds and applied.
pub type WindowBoundsCallback = Arc<dyn Fn(BoundsDisposition) -> Option<RectPatch> + Send + Sync>;

// ---------------------------------------------------------------------------
// Show options / results
// ---------------------------------------------------------------------------

/// Ties a dialog instance to the tabs that requested it and to the chrome
/// state it edits on their behalf.
#[derive(Clone, Default)]
pub struct TabAssociation {
    pub tab_id: Option<TabId>,
    pub get_tab_info: Option<Arc<dyn Fn(TabId) -> Option<Value> + Send + Sync>>,
    pub set_tab_info: Option<Arc<dyn Fn(TabId, Value) + Send + Sync>>,
}

pub struct DialogShowOptions {
    pub name: DialogName,
    /// Recomputed on every rearrange, so window-size-derived positions stay
    /// current without the caller re-showing.
    pub bounds: BoundsProvider,
    pub association: Option<TabAssociation>,
    pub on_window_bounds_update: Option<WindowBoundsCallback>,
    pub on_hide: Option<HideCallback>,
}

impl DialogShowOptions {
    pub fn new(name: DialogName, bounds: BoundsProvider) -> Self {
        Self {
            name,
            bounds,
            association: None,
            on_window_bounds_update: None,
            on_hide: None,
        }
    }

    pub fn fixed(name: DialogName, bounds: RectPatch) -> Self {
        Self::new(name, Arc::new(move || bounds))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogShown {
    /// A surface was taken from the pool (or allocated) and booted.
    Created(SurfaceId),
    /// The dialog was already up; the existing instance gained a tab.
    Reused(SurfaceId),
}

impl DialogShown {
    pub fn surface(self) -> SurfaceId {
        match self {
            DialogShown::Created(id) | DialogShown::Reused(id) => id,
        }
    }

    pub fn created(self) -> bool {
        matches!(self, DialogShown::Created(_))
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

struct SurfacePool {
    free: Vec<Arc<dyn Surface>>,
}

impl SurfacePool {
    fn acquire(&mut self, factory: &dyn SurfaceFactory) -> Result<Arc<dyn Surface>> {
        if let Some(surface) = self.free.pop() {
            return Ok(surface);
        }
        factory.create().map_err(|e| {
            warn!(error = %e, "dialog surface allocation failed");
            ShellError::SurfacePoolExhausted
        })
    }

    /// Return a surface to the pool, resetting its document.
    fn release(&mut self, surface: Arc<dyn Surface>) {
        {
            let surface = Arc::clone(&surface);
            tokio::spawn(async move {
                if let Err(e) = surface.load_url("about:blank").await {
                    warn!(error = %e, "pooled surface reset failed");
                }
            });
        }
        self.free.push(surface);
    }
}

// ---------------------------------------------------------------------------
// Active dialog
// ---------------------------------------------------------------------------

struct ActiveDialog {
    name: DialogName,
    surface: Arc<dyn Surface>,
    /// Tabs currently owning this instance. Only meaningful when the dialog
    /// is tab-scoped (has an association); empty means teardown.
    tab_ids: Vec<TabId>,
    bounds: BoundsProvider,
    association: Option<TabAssociation>,
    on_window_bounds_update: Option<WindowBoundsCallback>,
    on_hide: Option<HideCallback>,
}

impl ActiveDialog {
    fn is_tab_scoped(&self) -> bool {
        self.association.is_some()
    }

    fn owns(&self, tab: TabId) -> bool {
        self.tab_ids.contains(&tab)
    }

    /// Apply `patch` layered over the provider's current bounds.
    fn rearrange(&self, patch: &RectPatch) {
        let rect = (self.bounds)().merge(*patch).apply_to(Rect::default());
        self.surface.set_bounds(rect);
    }

    fn send_tab_info(&self, tab: TabId) {
        let Some(get) = self
            .association
            .as_ref()
            .and_then(|a| a.get_tab_info.as_ref())
        else {
            return;
        };
        if let Some(data) = get(tab) {
            self.surface.push(&ContentMessage::TabInfo { tab, data });
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// One instance per host window. At most one live instance per dialog name;
/// repeated shows re-target the existing instance instead of stacking.
pub struct DialogsService {
    factory: Arc<dyn SurfaceFactory>,
    host: Arc<dyn HostWindow>,
    bus: EventBus,
    base_url: String,
    pool: SurfacePool,
    dialogs: HashMap<DialogName, ActiveDialog>,
    persistent: HashMap<DialogName, PersistentDialog>,
    hub: ChannelHub,
    active_tab: Option<TabId>,
}

impl DialogsService {
    pub fn new(
        factory: Arc<dyn SurfaceFactory>,
        host: Arc<dyn HostWindow>,
        bus: EventBus,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            factory,
            host,
            bus,
            base_url: base_url.into(),
            pool: SurfacePool { free: Vec::new() },
            dialogs: HashMap::new(),
            persistent: HashMap::new(),
            hub: ChannelHub::new(),
            active_tab: None,
        }
    }

    /// Warm the pool and boot the always-alive dialogs.
    pub async fn run(&mut self) -> Result<()> {
        if self.pool.free.is_empty() {
            let surface = self.factory.create()?;
            self.pool.free.push(surface);
        }

        for (name, timeout) in [
            (DialogName::Search, Some(SEARCH_HIDE_TIMEOUT)),
            (DialogName::Preview, None),
        ] {
            let mut dialog =
                PersistentDialog::new(name, self.factory.as_ref(), self.bus.clone(), timeout)?;
            dialog.load(&self.base_url).await;
            self.persistent.insert(name, dialog);
        }
        Ok(())
    }

    // -- visibility ---------------------------------------------------------

    /// Show a dialog, reusing a live instance of the same name if any.
    pub fn show(&mut self, options: DialogShowOptions) -> Result<DialogShown> {
        let name = options.name;
        let tab = options.association.as_ref().and_then(|a| a.tab_id);

        if let Some(dialog) = self.dialogs.get_mut(&name) {
            if let Some(tab) = tab {
                if !dialog.owns(tab) {
                    dialog.tab_ids.push(tab);
                }
                dialog.send_tab_info(tab);
            }
            self.bus.publish(Event::DialogVisibilityChanged {
                name,
                visible: true,
            });
            // Move back to the front and re-derive bounds.
            self.host.attach(&dialog.surface);
            dialog.rearrange(&RectPatch::default());
            debug!(dialog = %name, "dialog reused");
            return Ok(DialogShown::Reused(dialog.surface.id()));
        }

        let surface = self.pool.acquire(self.factory.as_ref())?;
        let id = surface.id();

        self.bus.publish(Event::DialogVisibilityChanged {
            name,
            visible: true,
        });
        self.host.attach(&surface);
        // Placeholder: kept tiny until the document is ready and the
        // provider bounds land.
        surface.set_bounds(Rect::new(0, 0, 1, 1));

        let boot_bounds = Arc::clone(&options.bounds);
        let get_tab_info = options
            .association
            .as_ref()
            .and_then(|a| a.get_tab_info.clone());
        let dialog = ActiveDialog {
            name,
            surface: Arc::clone(&surface),
            tab_ids: tab.into_iter().collect(),
            bounds: options.bounds,
            association: options.association,
            on_window_bounds_update: options.on_window_bounds_update,
            on_hide: options.on_hide,
        };
        self.dialogs.insert(name, dialog);

        let url = dialog_url(&self.base_url, name);
        tokio::spawn(async move {
            if let Err(e) = surface.load_url(&url).await {
                warn!(url = %url, error = %e, "dialog document load failed");
                return;
            }
            surface.wait_ready().await;
            if let Err(e) = surface.execute_script(TRANSPARENT_BACKGROUND_SCRIPT).await {
                warn!(error = %e, "transparency script failed");
            }
            surface.set_bounds(boot_bounds().apply_to(Rect::default()));
            surface.focus();
            if let (Some(tab), Some(get)) = (tab, get_tab_info) {
                if let Some(data) = get(tab) {
                    surface.push(&ContentMessage::TabInfo { tab, data });
                }
            }
        });

        debug!(dialog = %name, surface = %id, "dialog created");
        Ok(DialogShown::Created(id))
    }

    /// Hide a dialog for one tab (or the active tab when `tab` is `None`).
    /// The instance is torn down once no owning tab remains; until then a
    /// hide for the visible owner only detaches the surface. Unknown names
    /// are ignored.
    pub fn hide(&mut self, name: DialogName, tab: Option<TabId>) {
        let Some(dialog) = self.dialogs.get_mut(&name) else {
            debug!(dialog = %name, "hide for inactive dialog ignored");
            return;
        };

        if dialog.is_tab_scoped() {
            if let Some(target) = tab.or(self.active_tab) {
                dialog.tab_ids.retain(|t| *t != target);
            }
            if !dialog.tab_ids.is_empty() {
                // Other tabs still own the instance; at most drop it from
                // view if the hidden tab is the one on screen.
                if tab.is_none() || tab == self.active_tab {
                    self.bus.publish(Event::DialogVisibilityChanged {
                        name,
                        visible: false,
                    });
                    self.host.detach(&dialog.surface);
                }
                return;
            }
        }

        let surface = Arc::clone(&dialog.surface);
        let on_hide = dialog.on_hide.clone();

        self.bus.publish(Event::DialogVisibilityChanged {
            name,
            visible: false,
        });
        self.dialogs.remove(&name);
        self.host.detach(&surface);
        self.hub.remove_surface(surface.id());
        self.pool.release(surface);
        if let Some(on_hide) = on_hide {
            on_hide(name);
        }
        debug!(dialog = %name, "dialog torn down");
    }

    pub fn is_visible(&self, name: DialogName) -> bool {
        self.dialogs.contains_key(&name)
            || self
                .persistent
                .get(&name)
                .map(|d| d.is_visible())
                .unwrap_or(false)
    }

    // -- tab / window routing ----------------------------------------------

    /// Swap tab-scoped dialogs in and out as the selected tab changes.
    pub fn on_tab_activated(&mut self, tab: TabId) {
        self.active_tab = Some(tab);
        for dialog in self.dialogs.values_mut() {
            if !dialog.is_tab_scoped() {
                continue;
            }
            let owns = dialog.owns(tab);
            self.bus.publish(Event::DialogVisibilityChanged {
                name: dialog.name,
                visible: owns,
            });
            if owns {
                self.host.attach(&dialog.surface);
                dialog.send_tab_info(tab);
            } else {
                self.host.detach(&dialog.surface);
            }
        }
    }

    /// Release a removed tab's stake in every dialog it owns.
    pub fn on_tab_removed(&mut self, tab: TabId) {
        let names: Vec<DialogName> = self
            .dialogs
            .values()
            .filter(|d| d.owns(tab))
            .map(|d| d.name)
            .collect();
        for name in names {
            self.hide(name, Some(tab));
        }
        if self.active_tab == Some(tab) {
            self.active_tab = None;
        }
    }

    /// Window geometry changed; let each subscribed dialog decide how to
    /// follow. A tab-scoped instance whose owner is the tab on screen sits
    /// this out: selection already keeps it in place.
    pub fn on_window_bounds_changed(&mut self, disposition: BoundsDisposition) {
        let active = self.active_tab;
        for dialog in self.dialogs.values() {
            let Some(callback) = dialog.on_window_bounds_update.as_ref() else {
                continue;
            };
            if !dialog.is_tab_scoped() || active.map(|t| dialog.owns(t)).unwrap_or(false) {
                continue;
            }
            if let Some(patch) = callback(disposition) {
                dialog.rearrange(&patch);
            }
        }
    }

    pub fn rearrange(&mut self, name: DialogName, patch: &RectPatch) {
        if let Some(dialog) = self.dialogs.get(&name) {
            dialog.rearrange(patch);
        } else if let Some(dialog) = self.persistent.get_mut(&name) {
            dialog.rearrange(patch);
        }
    }

    // -- messaging ----------------------------------------------------------

    /// Route a raw message arriving from a dialog surface. Lifecycle
    /// requests are handled here; everything else goes to the channel
    /// registered for this surface and request kind.
    pub fn dispatch(&mut self, surface: SurfaceId, raw: &str) -> Result<Option<Value>> {
        let request = DialogRequest::from_json(raw)?;
        let name = self
            .dialogs
            .values()
            .find(|d| d.surface.id() == surface)
            .map(|d| d.name);

        match &request {
            DialogRequest::Hide => {
                if let Some(name) = name {
                    self.hide(name, None);
                } else if let Some(dialog) = self
                    .persistent
                    .values_mut()
                    .find(|d| d.surface().id() == surface)
                {
                    dialog.hide(false, false);
                }
                Ok(None)
            }
            DialogRequest::Loaded => {
                if let Some(dialog) = name.and_then(|n| self.dialogs.get(&n)) {
                    let tab = self
                        .active_tab
                        .filter(|t| dialog.owns(*t))
                        .or_else(|| dialog.tab_ids.last().copied());
                    if let Some(tab) = tab {
                        dialog.send_tab_info(tab);
                    }
                }
                Ok(None)
            }
            DialogRequest::UpdateTabInfo { tab, data } => {
                let set = name
                    .and_then(|n| self.dialogs.get(&n))
                    .and_then(|d| d.association.as_ref())
                    .and_then(|a| a.set_tab_info.clone());
                if let Some(set) = set {
                    set(*tab, data.clone());
                }
                Ok(None)
            }
            other => match self.hub.get(surface, other.kind()) {
                Some(handler) => Ok(handler(other)),
                None => {
                    debug!(surface = %surface, kind = other.kind(), "unrouted dialog message");
                    Ok(None)
                }
            },
        }
    }

    /// Register a channel on a live dialog's surface.
    pub fn handle(
        &mut self,
        name: DialogName,
        kind: &'static str,
        handler: ChannelHandler,
    ) -> Result<()> {
        let Some(dialog) = self.dialogs.get(&name) else {
            return Err(ShellError::NoSuchDialog(name.as_str().to_string()));
        };
        self.hub.register(dialog.surface.id(), kind, handler);
        Ok(())
    }

    pub fn send_to_all(&self, message: &ContentMessage) {
        for dialog in self.dialogs.values() {
            dialog.surface.push(message);
        }
        for dialog in self.persistent.values() {
            dialog.push(message);
        }
    }

    pub fn push_zoom(&self, factor: f64) {
        self.send_to_all(&ContentMessage::ZoomFactor(factor));
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn persistent(&self, name: DialogName) -> Option<&PersistentDialog> {
        self.persistent.get(&name)
    }

    pub fn persistent_mut(&mut self, name: DialogName) -> Option<&mut PersistentDialog> {
        self.persistent.get_mut(&name)
    }

    pub fn host(&self) -> &Arc<dyn HostWindow> {
        &self.host
    }

    /// Tear everything down on window close.
    pub fn destroy_all(&mut self) {
        let names: Vec<DialogName> = self.dialogs.keys().copied().collect();
        for name in names {
            self.hide(name, None);
            // hide() may have kept a tab-scoped instance alive for other
            // owners; force the rest out.
            if let Some(dialog) = self.dialogs.remove(&name) {
                self.host.detach(&dialog.surface);
                self.hub.remove_surface(dialog.surface.id());
                dialog.surface.destroy();
            }
        }
        for (_, dialog) in self.persistent.drain() {
            dialog.surface().destroy();
        }
        for surface in self.pool.free.drain(..) {
            surface.destroy();
        }
    }

    // -- inspection ---------------------------------------------------------

    pub fn dialog_surface(&self, name: DialogName) -> Option<SurfaceId> {
        self.dialogs.get(&name).map(|d| d.surface.id())
    }

    pub fn free_surfaces(&self) -> usize {
        self.pool.free.len()
    }

    pub fn active_dialogs(&self) -> usize {
        self.dialogs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::broadcast;
    use wren_host::{MemoryHost, MemoryWindow};

    struct Fixture {
        host: Arc<MemoryHost>,
        window: Arc<MemoryWindow>,
        service: DialogsService,
        rx: broadcast::Receiver<Event>,
    }

    fn fixture() -> Fixture {
        let host = MemoryHost::new();
        let window = MemoryWindow::new();
        let bus = EventBus::new(64);
        let rx = bus.subscribe();
        let service = DialogsService::new(
            Arc::clone(&host) as Arc<dyn SurfaceFactory>,
            Arc::clone(&window) as Arc<dyn HostWindow>,
            bus,
            "wren://ui/",
        );
        Fixture {
            host,
            window,
            service,
            rx,
        }
    }

    fn visibility_events(rx: &mut broadcast::Receiver<Event>) -> Vec<(DialogName, bool)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::DialogVisibilityChanged { name, visible } = event {
                out.push((name, visible));
            }
        }
        out
    }

    fn menu_options() -> DialogShowOptions {
        DialogShowOptions::fixed(
            DialogName::Menu,
            RectPatch {
                x: Some(500.0),
                y: Some(72.0),
                width: Some(330.0),
                height: Some(460.0),
            },
        )
    }

    fn tab_scoped(name: DialogName, tab: TabId) -> DialogShowOptions {
        let mut options = DialogShowOptions::fixed(
            name,
            RectPatch {
                x: Some(0.0),
                y: Some(72.0),
                width: Some(366.0),
                height: Some(165.0),
            },
        );
        options.association = Some(TabAssociation {
            tab_id: Some(tab),
            get_tab_info: Some(Arc::new(move |t| {
                Some(serde_json::json!({ "tab": t.0 }))
            })),
            set_tab_info: None,
        });
        options
    }

    #[tokio::test]
    async fn show_boots_a_surface_and_applies_bounds() {
        let mut f = fixture();
        let shown = f.service.show(menu_options()).unwrap();
        assert!(shown.created());

        let surface = f.host.surface(shown.surface()).unwrap();
        assert!(f.window.is_attached(shown.surface()));
        // Only the placeholder until the document reports ready.
        assert_eq!(surface.applied_bounds(), vec![Rect::new(0, 0, 1, 1)]);

        tokio::task::yield_now().await;
        assert_eq!(surface.loaded_urls(), vec!["wren://ui/menu.html"]);
        assert_eq!(
            surface.executed_scripts(),
            vec![TRANSPARENT_BACKGROUND_SCRIPT]
        );
        assert_eq!(
            surface.applied_bounds(),
            vec![Rect::new(0, 0, 1, 1), Rect::new(500, 72, 330, 460)]
        );
        assert!(surface.focus_count() > 0);
        assert_eq!(visibility_events(&mut f.rx), vec![(DialogName::Menu, true)]);
    }

    #[tokio::test]
    async fn tab_info_waits_for_the_document() {
        let mut f = fixture();
        f.service.on_tab_activated(TabId(1));
        let shown = f.service.show(tab_scoped(DialogName::Permissions, TabId(1))).unwrap();
        let surface = f.host.surface(shown.surface()).unwrap();
        assert!(surface.pushed_messages().is_empty());

        tokio::task::yield_now().await;
        assert!(matches!(
            surface.pushed_messages().last(),
            Some(ContentMessage::TabInfo { tab, .. }) if *tab == TabId(1)
        ));
    }

    #[tokio::test]
    async fn second_show_reuses_the_instance() {
        let mut f = fixture();
        let first = f.service.show(tab_scoped(DialogName::Permissions, TabId(1))).unwrap();
        let second = f.service.show(tab_scoped(DialogName::Permissions, TabId(2))).unwrap();

        assert!(first.created());
        assert_eq!(second, DialogShown::Reused(first.surface()));
        assert_eq!(f.service.active_dialogs(), 1);
        assert_eq!(f.service.free_surfaces(), 0);

        // The reused instance was handed the second tab's data.
        let surface = f.host.surface(first.surface()).unwrap();
        assert!(surface.pushed_messages().iter().any(
            |m| matches!(m, ContentMessage::TabInfo { tab, .. } if *tab == TabId(2))
        ));
    }

    #[tokio::test]
    async fn tab_scoped_hide_tears_down_only_when_last_owner_leaves() {
        let mut f = fixture();
        f.service.on_tab_activated(TabId(1));
        let shown = f.service.show(tab_scoped(DialogName::Permissions, TabId(1))).unwrap();
        f.service.show(tab_scoped(DialogName::Permissions, TabId(2))).unwrap();
        visibility_events(&mut f.rx);

        // Tab 2 is not on screen: its hide drops ownership silently.
        f.service.hide(DialogName::Permissions, Some(TabId(2)));
        assert_eq!(f.service.active_dialogs(), 1);
        assert!(f.window.is_attached(shown.surface()));
        assert!(visibility_events(&mut f.rx).is_empty());

        // The last owner is the active tab: full teardown.
        f.service.hide(DialogName::Permissions, Some(TabId(1)));
        assert_eq!(f.service.active_dialogs(), 0);
        assert!(!f.window.is_attached(shown.surface()));
        assert_eq!(f.service.free_surfaces(), 1);
        assert_eq!(
            visibility_events(&mut f.rx),
            vec![(DialogName::Permissions, false)]
        );
    }

    #[tokio::test]
    async fn hide_for_the_visible_owner_detaches_but_keeps_the_instance() {
        let mut f = fixture();
        f.service.on_tab_activated(TabId(1));
        let shown = f.service.show(tab_scoped(DialogName::Permissions, TabId(1))).unwrap();
        f.service.show(tab_scoped(DialogName::Permissions, TabId(2))).unwrap();
        visibility_events(&mut f.rx);

        f.service.hide(DialogName::Permissions, Some(TabId(1)));
        assert_eq!(f.service.active_dialogs(), 1);
        assert!(!f.window.is_attached(shown.surface()));
        assert_eq!(f.service.free_surfaces(), 0);
        assert_eq!(
            visibility_events(&mut f.rx),
            vec![(DialogName::Permissions, false)]
        );
    }

    #[tokio::test]
    async fn hide_of_unknown_dialog_is_ignored() {
        let mut f = fixture();
        f.service.hide(DialogName::Downloads, None);
        assert!(visibility_events(&mut f.rx).is_empty());
    }

    #[tokio::test]
    async fn released_surfaces_are_reused_and_reset() {
        let mut f = fixture();
        let first = f.service.show(menu_options()).unwrap();
        f.service.hide(DialogName::Menu, None);
        tokio::task::yield_now().await;

        let surface = f.host.surface(first.surface()).unwrap();
        assert_eq!(
            surface.loaded_urls().last().map(String::as_str),
            Some("about:blank")
        );

        let second = f.service.show(menu_options()).unwrap();
        assert_eq!(second.surface(), first.surface());
    }

    #[tokio::test]
    async fn exhausted_pool_is_an_error() {
        let mut f = fixture();
        f.host.set_allocation_fails(true);
        assert!(matches!(
            f.service.show(menu_options()),
            Err(ShellError::SurfacePoolExhausted)
        ));
        // Nothing was registered for the failed show.
        assert_eq!(f.service.active_dialogs(), 0);
    }

    #[tokio::test]
    async fn tab_activation_swaps_scoped_dialogs() {
        let mut f = fixture();
        f.service.on_tab_activated(TabId(1));
        let shown = f.service.show(tab_scoped(DialogName::Permissions, TabId(1))).unwrap();
        visibility_events(&mut f.rx);

        f.service.on_tab_activated(TabId(2));
        assert!(!f.window.is_attached(shown.surface()));
        assert_eq!(
            visibility_events(&mut f.rx),
            vec![(DialogName::Permissions, false)]
        );

        f.service.on_tab_activated(TabId(1));
        assert!(f.window.is_attached(shown.surface()));
        assert_eq!(
            visibility_events(&mut f.rx),
            vec![(DialogName::Permissions, true)]
        );
    }

    #[tokio::test]
    async fn tab_removal_releases_its_dialogs() {
        let mut f = fixture();
        f.service.on_tab_activated(TabId(1));
        f.service.show(tab_scoped(DialogName::Permissions, TabId(1))).unwrap();

        f.service.on_tab_removed(TabId(1));
        assert_eq!(f.service.active_dialogs(), 0);
        assert_eq!(f.service.free_surfaces(), 1);
    }

    #[tokio::test]
    async fn window_bounds_updates_reach_dialogs_owned_by_background_tabs() {
        let mut f = fixture();
        f.service.on_tab_activated(TabId(1));

        let mut options = tab_scoped(DialogName::Permissions, TabId(1));
        options.on_window_bounds_update = Some(Arc::new(|disposition| {
            (disposition == BoundsDisposition::Resize).then(RectPatch::default)
        }));
        let shown = f.service.show(options).unwrap();
        tokio::task::yield_now().await;
        let surface = f.host.surface(shown.surface()).unwrap();
        let applied = surface.applied_bounds().len();

        // The owning tab is on screen: selection keeps the dialog placed.
        f.service.on_window_bounds_changed(BoundsDisposition::Resize);
        assert_eq!(surface.applied_bounds().len(), applied);

        // Owner in the background: the callback decides, and it skips moves.
        f.service.on_tab_activated(TabId(2));
        f.service.on_window_bounds_changed(BoundsDisposition::Move);
        assert_eq!(surface.applied_bounds().len(), applied);

        f.service.on_window_bounds_changed(BoundsDisposition::Resize);
        assert_eq!(surface.applied_bounds().len(), applied + 1);
    }

    #[tokio::test]
    async fn dispatch_routes_lifecycle_and_channels() {
        let mut f = fixture();
        let shown = f.service.show(menu_options()).unwrap();
        let surface_id = shown.surface();

        // Unregistered kind falls through without error.
        assert_eq!(
            f.service
                .dispatch(surface_id, r#"{"type":"result","data":{"granted":true}}"#)
                .unwrap(),
            None
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            f.service
                .handle(
                    DialogName::Menu,
                    "result",
                    Arc::new(move |req| {
                        if let DialogRequest::Result { granted } = req {
                            seen.lock().unwrap().push(*granted);
                        }
                        Some(Value::Bool(true))
                    }),
                )
                .unwrap();
        }
        let reply = f
            .service
            .dispatch(surface_id, r#"{"type":"result","data":{"granted":true}}"#)
            .unwrap();
        assert_eq!(reply, Some(Value::Bool(true)));
        assert_eq!(*seen.lock().unwrap(), vec![true]);

        // The hide request tears the dialog down and drops its channels.
        f.service.dispatch(surface_id, r#"{"type":"hide"}"#).unwrap();
        assert_eq!(f.service.active_dialogs(), 0);
        assert!(matches!(
            f.service.handle(DialogName::Menu, "result", Arc::new(|_| None)),
            Err(ShellError::NoSuchDialog(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_rejects_malformed_payloads() {
        let mut f = fixture();
        let shown = f.service.show(menu_options()).unwrap();
        assert!(matches!(
            f.service.dispatch(shown.surface(), "not json"),
            Err(ShellError::MalformedMessage(_))
        ));
    }

    #[tokio::test]
    async fn loaded_replays_tab_info() {
        let mut f = fixture();
        f.service.on_tab_activated(TabId(7));
        let shown = f.service.show(tab_scoped(DialogName::Permissions, TabId(7))).unwrap();
        let surface = f.host.surface(shown.surface()).unwrap();
        let before = surface.pushed_messages().len();

        f.service
            .dispatch(shown.surface(), r#"{"type":"loaded"}"#)
            .unwrap();
        let messages = surface.pushed_messages();
        assert_eq!(messages.len(), before + 1);
        assert!(matches!(
            messages.last(),
            Some(ContentMessage::TabInfo { tab, .. }) if *tab == TabId(7)
        ));
    }

    #[tokio::test]
    async fn update_tab_info_invokes_the_setter() {
        let mut f = fixture();
        let written = Arc::new(Mutex::new(None));
        let mut options = tab_scoped(DialogName::Permissions, TabId(3));
        {
            let written = Arc::clone(&written);
            options.association.as_mut().unwrap().set_tab_info =
                Some(Arc::new(move |tab, data| {
                    *written.lock().unwrap() = Some((tab, data));
                }));
        }
        let shown = f.service.show(options).unwrap();

        f.service
            .dispatch(
                shown.surface(),
                r#"{"type":"update-tab-info","data":{"tab":3,"data":{"granted":false}}}"#,
            )
            .unwrap();
        let written = written.lock().unwrap();
        assert_eq!(
            *written,
            Some((TabId(3), serde_json::json!({ "granted": false })))
        );
    }

    #[tokio::test]
    async fn run_warms_the_pool_and_boots_persistent_dialogs() {
        let mut f = fixture();
        f.service.run().await.unwrap();
        assert_eq!(f.service.free_surfaces(), 1);

        let search = f.service.persistent_mut(DialogName::Search).unwrap();
        assert_eq!(search.name(), DialogName::Search);
        let surface = f.host.surface(search.surface().id()).unwrap();
        assert_eq!(surface.loaded_urls(), vec!["wren://ui/search.html"]);
        assert!(f.service.persistent_mut(DialogName::Preview).is_some());
    }

    #[tokio::test]
    async fn persistent_hide_request_routes_to_the_dialog() {
        let mut f = fixture();
        f.service.run().await.unwrap();

        let window = Arc::clone(&f.window) as Arc<dyn HostWindow>;
        let search = f.service.persistent_mut(DialogName::Search).unwrap();
        search.show(window, true, false).await;
        let id = search.surface().id();
        assert!(f.service.is_visible(DialogName::Search));

        f.service.dispatch(id, r#"{"type":"hide"}"#).unwrap();
        assert!(!f.service.is_visible(DialogName::Search));
    }

    #[tokio::test]
    async fn push_zoom_reaches_every_dialog_surface() {
        let mut f = fixture();
        f.service.run().await.unwrap();
        let shown = f.service.show(menu_options()).unwrap();

        f.service.push_zoom(1.25);
        let surface = f.host.surface(shown.surface()).unwrap();
        assert!(surface
            .pushed_messages()
            .iter()
            .any(|m| matches!(m, ContentMessage::ZoomFactor(z) if *z == 1.25)));
        let search = f.service.persistent_mut(DialogName::Search).unwrap();
        let search_surface = f.host.surface(search.surface().id()).unwrap();
        assert!(search_surface
            .pushed_messages()
            .iter()
            .any(|m| matches!(m, ContentMessage::ZoomFactor(_))));
    }

    #[tokio::test]
    async fn destroy_all_releases_every_surface() {
        let mut f = fixture();
        f.service.run().await.unwrap();
        let shown = f.service.show(menu_options()).unwrap();

        f.service.destroy_all();
        assert_eq!(f.service.active_dialogs(), 0);
        assert_eq!(f.service.free_surfaces(), 0);
        assert!(f.window.stack().is_empty() || !f.window.is_attached(shown.surface()));
        // Every surface the service ever held is destroyed.
        assert!(f.host.surface(shown.surface()).unwrap().is_destroyed());
    }
}
