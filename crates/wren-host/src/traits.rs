//! Collaborator traits the chrome core is written against.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use wren_common::errors::HostError;
use wren_common::rect::Rect;
use wren_common::types::{NavigationState, SurfaceId};

use crate::events::ContentMessage;

/// One rendering surface provided by the host runtime.
///
/// Implementations use interior mutability; the chrome holds surfaces as
/// `Arc<dyn Surface>` and may call into them from spawned tasks.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Host-assigned identity, unique for the surface's lifetime.
    fn id(&self) -> SurfaceId;

    /// Navigate the surface's content. Resolves when the load has been
    /// handed to the engine, not when it finishes.
    async fn load_url(&self, url: &str) -> Result<(), HostError>;

    /// Run a script in the content context and return its value.
    async fn execute_script(&self, script: &str) -> Result<Value, HostError>;

    fn set_bounds(&self, bounds: Rect);

    fn focus(&self);

    fn set_muted(&self, muted: bool);

    fn zoom_factor(&self) -> f64;

    fn set_zoom_factor(&self, factor: f64);

    fn navigation_state(&self) -> NavigationState;

    /// Current URL, best-effort.
    fn url(&self) -> String;

    /// Whether the first paint-ready signal has been seen.
    fn is_ready(&self) -> bool;

    /// Wait for the first paint-ready signal. Returns immediately if it
    /// already happened.
    async fn wait_ready(&self);

    /// Push a typed notification into the content.
    fn push(&self, message: &ContentMessage);

    /// Release the surface's engine resources.
    fn destroy(&self);
}

/// Allocates rendering surfaces. Allocation failure is the chrome's
/// resource-exhaustion error path.
pub trait SurfaceFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn Surface>, HostError>;
}

/// The top-level application window surfaces attach into.
#[async_trait]
pub trait HostWindow: Send + Sync {
    /// Attach a surface to the window's view stack. Attaching an
    /// already-attached surface moves it to the front.
    fn attach(&self, surface: &Arc<dyn Surface>);

    /// Detach a surface from the view stack. Not-attached is a no-op.
    fn detach(&self, surface: &Arc<dyn Surface>);

    /// Inner content area size in pixels.
    fn content_size(&self) -> Result<(i32, i32), HostError>;

    /// Measure the chrome (toolbar) height. Reported dynamically by the
    /// chrome document, so this is an asynchronous round trip.
    async fn chrome_height(&self) -> Result<i32, HostError>;

    /// Move keyboard focus to the window chrome.
    fn focus_chrome(&self);

    fn set_title(&self, title: &str);
}
