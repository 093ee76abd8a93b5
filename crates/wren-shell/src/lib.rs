//! Browser-chrome core: view and dialog lifecycle management.
//!
//! One [`ShellWindow`] per host window wires together:
//! - [`ViewManager`] — the tab table, latest-wins selection, content bounds
//! - [`DialogsService`] — overlay dialogs multiplexed over a surface pool
//! - [`PersistentDialog`] — long-lived overlays (search box, preview)
//! - typed IPC channels between dialog content and the chrome
//!
//! The rendering engine and the document store stay behind the `wren-host`
//! and `wren-storage` trait boundaries.

pub mod dialogs;
pub mod ipc;
pub mod permissions;
pub mod view;
pub mod view_manager;
pub mod window;

pub use dialogs::{
    DialogShowOptions, DialogShown, DialogsService, PersistentDialog, TabAssociation,
    WindowBoundsCallback,
};
pub use ipc::{ChannelHub, DialogRequest, UiRequest};
pub use view::{View, ViewInfo};
pub use view_manager::{CreateViewOptions, ViewManager, ZoomConfig, ZoomDirection};
pub use window::ShellWindow;
