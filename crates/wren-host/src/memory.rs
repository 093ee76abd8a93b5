//! In-process host implementation.
//!
//! Backs the chrome core in tests and headless embedding: surfaces record
//! what was asked of them, windows keep a real attach stack, and surface
//! events land in a drainable sink for the window's event pump.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, warn};

use wren_common::errors::HostError;
use wren_common::rect::Rect;
use wren_common::types::{NavigationState, SurfaceId};

use crate::events::{ContentMessage, SurfaceEvent, SurfaceEventKind};
use crate::filter::{AllowAll, RequestFilter};
use crate::traits::{HostWindow, Surface, SurfaceFactory};

// ---------------------------------------------------------------------------
// Host / factory
// ---------------------------------------------------------------------------

/// Allocates [`MemorySurface`]s and collects their events.
pub struct MemoryHost {
    next_id: AtomicU32,
    auto_ready: AtomicBool,
    fail_allocation: AtomicBool,
    filter: Arc<dyn RequestFilter>,
    events: Arc<Mutex<Vec<SurfaceEvent>>>,
    surfaces: Mutex<HashMap<SurfaceId, Arc<MemorySurface>>>,
}

impl MemoryHost {
    pub fn new() -> Arc<Self> {
        Self::with_filter(Arc::new(AllowAll))
    }

    pub fn with_filter(filter: Arc<dyn RequestFilter>) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU32::new(1),
            auto_ready: AtomicBool::new(true),
            fail_allocation: AtomicBool::new(false),
            filter,
            events: Arc::new(Mutex::new(Vec::new())),
            surfaces: Mutex::new(HashMap::new()),
        })
    }

    /// When disabled, surfaces stay not-ready until `complete_load`.
    pub fn set_auto_ready(&self, auto: bool) {
        self.auto_ready.store(auto, Ordering::SeqCst);
    }

    /// Make subsequent `create` calls fail (resource-exhaustion path).
    pub fn set_allocation_fails(&self, fails: bool) {
        self.fail_allocation.store(fails, Ordering::SeqCst);
    }

    /// Drain all pending surface events.
    pub fn drain_events(&self) -> Vec<SurfaceEvent> {
        let mut events = self.events.lock().unwrap();
        std::mem::take(&mut *events)
    }

    /// Look up a live surface by id.
    pub fn surface(&self, id: SurfaceId) -> Option<Arc<MemorySurface>> {
        self.surfaces.lock().unwrap().get(&id).cloned()
    }

    /// Create a surface, keeping the concrete handle for inspection.
    pub fn create_surface(&self) -> Result<Arc<MemorySurface>, HostError> {
        if self.fail_allocation.load(Ordering::SeqCst) {
            return Err(HostError::SurfaceCreation(
                "allocation disabled by host".into(),
            ));
        }

        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let surface = Arc::new(MemorySurface {
            id,
            auto_ready: self.auto_ready.load(Ordering::SeqCst),
            filter: Arc::clone(&self.filter),
            events: Arc::clone(&self.events),
            ready_notify: Notify::new(),
            state: Mutex::new(SurfaceState::default()),
        });

        self.surfaces.lock().unwrap().insert(id, Arc::clone(&surface));
        debug!(surface = %id, "memory surface created");
        Ok(surface)
    }
}

impl SurfaceFactory for MemoryHost {
    fn create(&self) -> Result<Arc<dyn Surface>, HostError> {
        Ok(self.create_surface()? as Arc<dyn Surface>)
    }
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SurfaceState {
    url: String,
    loads: Vec<String>,
    scripts: Vec<String>,
    bounds_log: Vec<Rect>,
    messages: Vec<ContentMessage>,
    focus_count: u32,
    muted: bool,
    zoom: Option<f64>,
    nav: NavigationState,
    ready: bool,
    destroyed: bool,
}

/// A surface that records everything applied to it.
pub struct MemorySurface {
    id: SurfaceId,
    auto_ready: bool,
    filter: Arc<dyn RequestFilter>,
    events: Arc<Mutex<Vec<SurfaceEvent>>>,
    ready_notify: Notify,
    state: Mutex<SurfaceState>,
}

impl MemorySurface {
    fn emit(&self, kind: SurfaceEventKind) {
        self.events.lock().unwrap().push(SurfaceEvent {
            surface: self.id,
            kind,
        });
    }

    /// Signal paint-readiness, releasing `wait_ready` callers.
    pub fn complete_load(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.ready {
                return;
            }
            state.ready = true;
        }
        self.emit(SurfaceEventKind::Ready);
        self.ready_notify.notify_waiters();
    }

    /// Simulate a committed navigation reported by the engine.
    pub fn report_navigation(&self, url: &str, nav: NavigationState) {
        {
            let mut state = self.state.lock().unwrap();
            state.url = url.to_string();
            state.nav = nav;
        }
        self.emit(SurfaceEventKind::Navigated {
            url: url.to_string(),
        });
        self.emit(SurfaceEventKind::NavigationStateChanged(nav));
    }

    pub fn report_title(&self, title: &str) {
        self.emit(SurfaceEventKind::TitleChanged(title.to_string()));
    }

    pub fn report_favicon(&self, favicon: &str) {
        self.emit(SurfaceEventKind::FaviconChanged(favicon.to_string()));
    }

    // Inspection helpers used by tests.

    pub fn loaded_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().loads.clone()
    }

    pub fn executed_scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    pub fn applied_bounds(&self) -> Vec<Rect> {
        self.state.lock().unwrap().bounds_log.clone()
    }

    pub fn pushed_messages(&self) -> Vec<ContentMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn focus_count(&self) -> u32 {
        self.state.lock().unwrap().focus_count
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().unwrap().destroyed
    }
}

#[async_trait]
impl Surface for MemorySurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    async fn load_url(&self, url: &str) -> Result<(), HostError> {
        if self.filter.should_block(url) {
            warn!(surface = %self.id, url, "load blocked by request filter");
            self.emit(SurfaceEventKind::LoadFailed(format!("blocked: {url}")));
            return Err(HostError::Blocked(url.to_string()));
        }

        {
            let mut state = self.state.lock().unwrap();
            state.url = url.to_string();
            state.loads.push(url.to_string());
        }

        if self.auto_ready {
            self.complete_load();
        }
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<Value, HostError> {
        let mut state = self.state.lock().unwrap();
        if state.destroyed {
            return Err(HostError::ScriptFailed("surface destroyed".into()));
        }
        state.scripts.push(script.to_string());
        Ok(Value::Null)
    }

    fn set_bounds(&self, bounds: Rect) {
        self.state.lock().unwrap().bounds_log.push(bounds);
    }

    fn focus(&self) {
        self.state.lock().unwrap().focus_count += 1;
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn zoom_factor(&self) -> f64 {
        self.state.lock().unwrap().zoom.unwrap_or(1.0)
    }

    fn set_zoom_factor(&self, factor: f64) {
        self.state.lock().unwrap().zoom = Some(factor);
    }

    fn navigation_state(&self) -> NavigationState {
        self.state.lock().unwrap().nav
    }

    fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }

    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    async fn wait_ready(&self) {
        loop {
            let notified = self.ready_notify.notified();
            if self.state.lock().unwrap().ready {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, message: &ContentMessage) {
        self.state.lock().unwrap().messages.push(message.clone());
    }

    fn destroy(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
        }
        self.emit(SurfaceEventKind::Destroyed);
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// A host window with a real attach stack and settable layout metrics.
pub struct MemoryWindow {
    stack: Mutex<Vec<SurfaceId>>,
    content_size: Mutex<(i32, i32)>,
    chrome_height: Mutex<i32>,
    closed: AtomicBool,
    title: Mutex<String>,
    chrome_focus_count: AtomicU32,
}

impl MemoryWindow {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stack: Mutex::new(Vec::new()),
            content_size: Mutex::new((900, 700)),
            chrome_height: Mutex::new(72),
            closed: AtomicBool::new(false),
            title: Mutex::new(String::new()),
            chrome_focus_count: AtomicU32::new(0),
        })
    }

    pub fn set_content_size(&self, width: i32, height: i32) {
        *self.content_size.lock().unwrap() = (width, height);
    }

    pub fn set_chrome_height(&self, height: i32) {
        *self.chrome_height.lock().unwrap() = height;
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// The attach stack, front (topmost) last.
    pub fn stack(&self) -> Vec<SurfaceId> {
        self.stack.lock().unwrap().clone()
    }

    pub fn is_attached(&self, id: SurfaceId) -> bool {
        self.stack.lock().unwrap().contains(&id)
    }

    pub fn top(&self) -> Option<SurfaceId> {
        self.stack.lock().unwrap().last().copied()
    }

    pub fn title(&self) -> String {
        self.title.lock().unwrap().clone()
    }

    pub fn chrome_focus_count(&self) -> u32 {
        self.chrome_focus_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostWindow for MemoryWindow {
    fn attach(&self, surface: &Arc<dyn Surface>) {
        let id = surface.id();
        let mut stack = self.stack.lock().unwrap();
        stack.retain(|s| *s != id);
        stack.push(id);
    }

    fn detach(&self, surface: &Arc<dyn Surface>) {
        let id = surface.id();
        self.stack.lock().unwrap().retain(|s| *s != id);
    }

    fn content_size(&self) -> Result<(i32, i32), HostError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HostError::WindowClosed);
        }
        Ok(*self.content_size.lock().unwrap())
    }

    async fn chrome_height(&self) -> Result<i32, HostError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HostError::WindowClosed);
        }
        Ok(*self.chrome_height.lock().unwrap())
    }

    fn focus_chrome(&self) {
        self.chrome_focus_count.fetch_add(1, Ordering::SeqCst);
    }

    fn set_title(&self, title: &str) {
        *self.title.lock().unwrap() = title.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DomainBlocklist;

    #[test]
    fn surface_ids_are_unique_and_monotonic() {
        let host = MemoryHost::new();
        let a = host.create_surface().unwrap();
        let b = host.create_surface().unwrap();
        assert_ne!(a.id(), b.id());
        assert!(b.id().0 > a.id().0);
    }

    #[test]
    fn allocation_failure_is_an_error() {
        let host = MemoryHost::new();
        host.set_allocation_fails(true);
        assert!(matches!(
            host.create_surface(),
            Err(HostError::SurfaceCreation(_))
        ));
    }

    #[tokio::test]
    async fn load_marks_ready_when_auto() {
        let host = MemoryHost::new();
        let surface = host.create_surface().unwrap();
        surface.load_url("wren://ui/search.html").await.unwrap();

        assert!(surface.is_ready());
        surface.wait_ready().await;
        assert_eq!(surface.loaded_urls(), vec!["wren://ui/search.html"]);
    }

    #[tokio::test]
    async fn wait_ready_blocks_until_complete_load() {
        let host = MemoryHost::new();
        host.set_auto_ready(false);
        let surface = host.create_surface().unwrap();
        surface.load_url("https://example.org").await.unwrap();
        assert!(!surface.is_ready());

        let waiter = {
            let surface = Arc::clone(&surface);
            tokio::spawn(async move {
                surface.wait_ready().await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        surface.complete_load();
        waiter.await.unwrap();
        assert!(surface.is_ready());
    }

    #[tokio::test]
    async fn blocked_load_fails_and_reports() {
        let host = MemoryHost::with_filter(Arc::new(DomainBlocklist::new(["ads.example"])));
        let surface = host.create_surface().unwrap();

        let err = surface.load_url("https://ads.example/x").await.unwrap_err();
        assert!(matches!(err, HostError::Blocked(_)));

        let events = host.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, SurfaceEventKind::LoadFailed(_))));
    }

    #[test]
    fn destroy_is_idempotent_and_reported_once() {
        let host = MemoryHost::new();
        let surface = host.create_surface().unwrap();
        surface.destroy();
        surface.destroy();

        let destroyed = host
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e.kind, SurfaceEventKind::Destroyed))
            .count();
        assert_eq!(destroyed, 1);
        assert!(surface.is_destroyed());
    }

    #[test]
    fn attach_moves_existing_surface_to_front() {
        let host = MemoryHost::new();
        let window = MemoryWindow::new();
        let a: Arc<dyn Surface> = host.create_surface().unwrap();
        let b: Arc<dyn Surface> = host.create_surface().unwrap();

        window.attach(&a);
        window.attach(&b);
        assert_eq!(window.stack(), vec![a.id(), b.id()]);

        window.attach(&a);
        assert_eq!(window.stack(), vec![b.id(), a.id()]);
        assert_eq!(window.top(), Some(a.id()));

        window.detach(&a);
        assert_eq!(window.stack(), vec![b.id()]);
        // Detaching again is a no-op.
        window.detach(&a);
        assert_eq!(window.stack(), vec![b.id()]);
    }

    #[tokio::test]
    async fn closed_window_fails_layout_queries() {
        let window = MemoryWindow::new();
        assert_eq!(window.content_size().unwrap(), (900, 700));
        assert_eq!(window.chrome_height().await.unwrap(), 72);

        window.close();
        assert!(matches!(window.content_size(), Err(HostError::WindowClosed)));
        assert!(matches!(
            window.chrome_height().await,
            Err(HostError::WindowClosed)
        ));
    }
}
