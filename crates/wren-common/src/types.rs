use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a tab. Equal to the id of the surface backing it, which the
/// host runtime assigns at creation and never reuses while the tab is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Identity of a rendering surface (tab content or dialog overlay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

impl From<SurfaceId> for TabId {
    fn from(id: SurfaceId) -> Self {
        TabId(id.0)
    }
}

/// Back/forward availability of a view, as last reported by its surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

/// The closed set of overlay dialogs the chrome can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialogName {
    Search,
    Preview,
    Permissions,
    Menu,
    Downloads,
    Zoom,
    AddBookmark,
}

impl DialogName {
    /// Stable string form, used for content URLs and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogName::Search => "search",
            DialogName::Preview => "preview",
            DialogName::Permissions => "permissions",
            DialogName::Menu => "menu",
            DialogName::Downloads => "downloads",
            DialogName::Zoom => "zoom",
            DialogName::AddBookmark => "add-bookmark",
        }
    }
}

impl fmt::Display for DialogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
