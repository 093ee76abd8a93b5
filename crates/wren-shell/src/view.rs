//! One tab's rendering surface plus its chrome-side state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wren_common::rect::Rect;
use wren_common::types::{NavigationState, TabId};
use wren_host::Surface;

/// A tab. The surface does the actual rendering; the view tracks what the
/// chrome needs to know about it.
pub struct View {
    surface: Arc<dyn Surface>,
    pub url: String,
    pub title: String,
    pub favicon: Option<String>,
    /// Bounds last applied to the surface, for change detection.
    pub bounds: Option<Rect>,
    pub zoom_factor: f64,
    pub pinned: bool,
    pub muted: bool,
    pub tab_group: Option<u32>,
    pub nav: NavigationState,
    pub bookmarked: bool,
    /// Permission request currently pending for this tab, if any. Read and
    /// written by the permissions dialog through its tab association.
    pub requested_permission: Option<Value>,
}

impl View {
    pub fn new(surface: Arc<dyn Surface>, url: impl Into<String>) -> Self {
        Self {
            surface,
            url: url.into(),
            title: String::new(),
            favicon: None,
            bounds: None,
            zoom_factor: 1.0,
            pinned: false,
            muted: false,
            tab_group: None,
            nav: NavigationState::default(),
            bookmarked: false,
            requested_permission: None,
        }
    }

    /// The tab's id: the host-assigned id of its backing surface.
    pub fn id(&self) -> TabId {
        self.surface.id().into()
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }
}

/// A cloned-out snapshot of a view's chrome-side state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub favicon: Option<String>,
    pub zoom_factor: f64,
    pub pinned: bool,
    pub muted: bool,
    pub tab_group: Option<u32>,
    pub nav: NavigationState,
    pub bookmarked: bool,
}

impl From<&View> for ViewInfo {
    fn from(view: &View) -> Self {
        Self {
            id: view.id(),
            url: view.url.clone(),
            title: view.title.clone(),
            favicon: view.favicon.clone(),
            zoom_factor: view.zoom_factor,
            pinned: view.pinned,
            muted: view.muted,
            tab_group: view.tab_group,
            nav: view.nav,
            bookmarked: view.bookmarked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wren_host::MemoryHost;

    #[test]
    fn view_id_is_the_surface_id() {
        let host = MemoryHost::new();
        let surface = host.create_surface().unwrap();
        let view = View::new(surface.clone(), "https://example.org");
        assert_eq!(view.id().0, surface.id().0);
    }

    #[test]
    fn snapshot_copies_state() {
        let host = MemoryHost::new();
        let surface = host.create_surface().unwrap();
        let mut view = View::new(surface, "https://example.org");
        view.title = "Example".into();
        view.muted = true;
        view.zoom_factor = 1.5;

        let info = ViewInfo::from(&view);
        assert_eq!(info.url, "https://example.org");
        assert_eq!(info.title, "Example");
        assert!(info.muted);
        assert_eq!(info.zoom_factor, 1.5);
        assert!(!info.bookmarked);
    }
}
