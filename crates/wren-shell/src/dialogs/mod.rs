//! Dialog overlays: a pooled registry for on-demand dialogs and the
//! long-lived dialogs that are created once and re-shown.

mod persistent;
mod service;

pub use persistent::PersistentDialog;
pub use service::{
    BoundsProvider, DialogShowOptions, DialogShown, DialogsService, HideCallback, TabAssociation,
    WindowBoundsCallback,
};

use wren_common::types::DialogName;

/// Injected after first paint so the overlay never flashes opaque.
pub(crate) const TRANSPARENT_BACKGROUND_SCRIPT: &str =
    "document.documentElement.style.background = 'transparent';";

/// Where a dialog's document lives under the chrome UI origin.
pub(crate) fn dialog_url(base: &str, name: DialogName) -> String {
    format!("{}{}.html", base, name.as_str())
}
