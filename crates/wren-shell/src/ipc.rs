//! Message types exchanged with dialog surfaces and the chrome UI, plus the
//! per-surface channel registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wren_common::rect::RectPatch;
use wren_common::types::{DialogName, SurfaceId, TabId};
use wren_common::{Result, ShellError};

use crate::view_manager::ZoomDirection;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A message sent by a dialog surface back into the chrome core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum DialogRequest {
    /// The dialog asks to be hidden.
    Hide,
    /// A user decision (permission prompts and the like).
    Result { granted: bool },
    /// The dialog edited its owning tab's associated data.
    UpdateTabInfo { tab: TabId, data: Value },
    /// The dialog's document finished booting and wants its initial data.
    Loaded,
}

impl DialogRequest {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ShellError::MalformedMessage(e.to_string()))
    }

    /// The channel key this request dispatches on.
    pub fn kind(&self) -> &'static str {
        match self {
            DialogRequest::Hide => "hide",
            DialogRequest::Result { .. } => "result",
            DialogRequest::UpdateTabInfo { .. } => "update-tab-info",
            DialogRequest::Loaded => "loaded",
        }
    }
}

/// A command from the chrome UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum UiRequest {
    CreateView { url: String, active: bool },
    SelectView { id: TabId, focus: bool },
    DestroyView { id: TabId },
    ChangeZoom { direction: ZoomDirection },
    ResetZoom,
    SetMuted { id: TabId, muted: bool },
    ShowDialog { name: DialogName, bounds: RectPatch },
    HideDialog { name: DialogName },
    RearrangeDialog { name: DialogName, bounds: RectPatch },
}

// ---------------------------------------------------------------------------
// Channel registry
// ---------------------------------------------------------------------------

pub type ChannelHandler = Arc<dyn Fn(&DialogRequest) -> Option<Value> + Send + Sync>;

/// Handlers registered per surface and request kind. A surface's channels
/// live exactly as long as its dialog instance; teardown removes them all.
#[derive(Default)]
pub struct ChannelHub {
    handlers: HashMap<(SurfaceId, &'static str), ChannelHandler>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, surface: SurfaceId, kind: &'static str, handler: ChannelHandler) {
        self.handlers.insert((surface, kind), handler);
    }

    pub fn get(&self, surface: SurfaceId, kind: &str) -> Option<ChannelHandler> {
        self.handlers.get(&(surface, kind)).map(Arc::clone)
    }

    /// Drop every channel owned by a surface.
    pub fn remove_surface(&mut self, surface: SurfaceId) {
        self.handlers.retain(|(owner, _), _| *owner != surface);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
