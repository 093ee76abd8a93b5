//! Host-side event and message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wren_common::types::{NavigationState, SurfaceId, TabId};

/// An event reported by a rendering surface.
#[derive(Debug, Clone)]
pub struct SurfaceEvent {
    pub surface: SurfaceId,
    pub kind: SurfaceEventKind,
}

#[derive(Debug, Clone)]
pub enum SurfaceEventKind {
    /// First paint-ready signal; the surface's content can be shown.
    Ready,
    /// A navigation committed. Carries the new URL.
    Navigated { url: String },
    TitleChanged(String),
    FaviconChanged(String),
    NavigationStateChanged(NavigationState),
    /// Content failed to load. Logged by consumers, never fatal.
    LoadFailed(String),
    /// The surface was destroyed by the host runtime.
    Destroyed,
}

/// Host-window lifecycle events routed into the managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Resized,
    Moved,
    FullscreenEntered,
    FullscreenLeft,
    /// Content-initiated (HTML element) fullscreen toggled.
    HtmlFullscreen(bool),
}

/// Why a host-window bounds callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsDisposition {
    Move,
    Resize,
}

impl From<WindowEvent> for Option<BoundsDisposition> {
    fn from(event: WindowEvent) -> Self {
        match event {
            WindowEvent::Resized => Some(BoundsDisposition::Resize),
            WindowEvent::Moved => Some(BoundsDisposition::Move),
            _ => None,
        }
    }
}

/// A typed chrome-to-content notification, pushed into a surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ContentMessage {
    /// Hide or reveal by visual signal only; the surface stays attached.
    VisibilityHint(bool),
    /// Tab-scoped dialog data for the given owning tab.
    TabInfo { tab: TabId, data: Value },
    ZoomFactor(f64),
}
