//! Permission prompts routed through a tab-scoped dialog.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use wren_common::rect::RectPatch;
use wren_common::types::{DialogName, TabId};
use wren_common::{Result, ShellError};
use wren_host::events::BoundsDisposition;

use crate::dialogs::{DialogShowOptions, DialogsService, TabAssociation};
use crate::ipc::DialogRequest;
use crate::view_manager::ViewManager;

const DIALOG_WIDTH: f64 = 366.0;
const DIALOG_HEIGHT: f64 = 165.0;
const DIALOG_TOP: f64 = 72.0;

/// A content-originated permission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub media_types: Vec<String>,
}

impl PermissionRequest {
    /// Kinds denied without ever prompting the user.
    fn auto_denied(&self) -> bool {
        self.name == "unknown"
            || self.name == "midiSysex"
            || (self.name == "media" && self.media_types.is_empty())
    }
}

/// Ask the user to grant `request` on behalf of `tab`. Resolves through the
/// returned receiver once the prompt dialog reports a decision; unsupported
/// kinds resolve to a denial immediately. A newer request for the same
/// dialog supersedes a still-pending one, whose receiver then errors.
pub fn request_permission(
    dialogs: &mut DialogsService,
    views: &ViewManager,
    tab: TabId,
    request: PermissionRequest,
) -> Result<oneshot::Receiver<bool>> {
    let (tx, rx) = oneshot::channel();

    if request.auto_denied() {
        debug!(tab = %tab, name = %request.name, "permission auto-denied");
        let _ = tx.send(false);
        return Ok(rx);
    }

    let payload =
        serde_json::to_value(&request).map_err(|e| ShellError::MalformedMessage(e.to_string()))?;
    views.set_requested_permission(tab, Some(payload));

    let mut options = DialogShowOptions::fixed(
        DialogName::Permissions,
        RectPatch {
            x: Some(0.0),
            y: Some(DIALOG_TOP),
            width: Some(DIALOG_WIDTH),
            height: Some(DIALOG_HEIGHT),
        },
    );
    // Follow window resizes while the owning tab is in the background;
    // plain moves leave the prompt anchored where it was.
    options.on_window_bounds_update = Some(Arc::new(|disposition| {
        (disposition == BoundsDisposition::Resize).then(RectPatch::default)
    }));
    options.association = Some(TabAssociation {
        tab_id: Some(tab),
        get_tab_info: {
            let views = views.clone();
            Some(Arc::new(move |t| views.requested_permission(t)))
        },
        set_tab_info: {
            let views = views.clone();
            Some(Arc::new(move |t, data| {
                views.set_requested_permission(t, Some(data))
            }))
        },
    });
    options.on_hide = {
        let views = views.clone();
        Some(Arc::new(move |_| {
            views.set_requested_permission(tab, None);
        }))
    };

    dialogs.show(options)?;

    let sender = Mutex::new(Some(tx));
    dialogs.handle(
        DialogName::Permissions,
        "result",
        Arc::new(move |request| {
            if let DialogRequest::Result { granted } = request {
                if let Some(tx) = sender.lock().unwrap().take() {
                    let _ = tx.send(*granted);
                }
            }
            None
        }),
    )?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wren_common::events::EventBus;
    use wren_common::rect::Rect;
    use wren_host::events::ContentMessage;
    use wren_host::{HostWindow, MemoryHost, MemoryWindow, SurfaceFactory};
    use wren_storage::{DocumentStore, MemoryStore};

    use crate::view_manager::{CreateViewOptions, ZoomConfig};

    struct Fixture {
        host: Arc<MemoryHost>,
        views: ViewManager,
        dialogs: DialogsService,
    }

    fn fixture() -> Fixture {
        let host = MemoryHost::new();
        let window = MemoryWindow::new();
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::new(64);
        let views = ViewManager::new(
            Arc::clone(&window) as Arc<dyn HostWindow>,
            Arc::clone(&host) as Arc<dyn SurfaceFactory>,
            store as Arc<dyn DocumentStore>,
            bus.clone(),
            ZoomConfig::default(),
        );
        let dialogs = DialogsService::new(
            Arc::clone(&host) as Arc<dyn SurfaceFactory>,
            window as Arc<dyn HostWindow>,
            bus,
            "wren://ui/",
        );
        Fixture {
            host,
            views,
            dialogs,
        }
    }

    fn tab(f: &Fixture, url: &str) -> TabId {
        f.views
            .create(
                CreateViewOptions {
                    url: url.into(),
                    ..Default::default()
                },
                false,
            )
            .unwrap()
    }

    fn notifications(url: &str) -> PermissionRequest {
        PermissionRequest {
            name: "notifications".into(),
            url: url.into(),
            media_types: Vec::new(),
        }
    }

    #[tokio::test]
    async fn unsupported_kinds_are_denied_without_a_prompt() {
        let mut f = fixture();
        let t = tab(&f, "https://a.example");

        for request in [
            PermissionRequest {
                name: "unknown".into(),
                url: "https://a.example".into(),
                media_types: Vec::new(),
            },
            PermissionRequest {
                name: "midiSysex".into(),
                url: "https://a.example".into(),
                media_types: Vec::new(),
            },
            PermissionRequest {
                name: "media".into(),
                url: "https://a.example".into(),
                media_types: Vec::new(),
            },
        ] {
            let rx = request_permission(&mut f.dialogs, &f.views, t, request).unwrap();
            assert_eq!(rx.await.unwrap(), false);
        }
        assert_eq!(f.dialogs.active_dialogs(), 0);
    }

    #[tokio::test]
    async fn media_with_types_prompts() {
        let mut f = fixture();
        let t = tab(&f, "https://a.example");
        let request = PermissionRequest {
            name: "media".into(),
            url: "https://a.example".into(),
            media_types: vec!["audio".into()],
        };

        let _rx = request_permission(&mut f.dialogs, &f.views, t, request).unwrap();
        assert_eq!(f.dialogs.active_dialogs(), 1);
    }

    #[tokio::test]
    async fn decision_resolves_the_receiver() {
        let mut f = fixture();
        let t = tab(&f, "https://a.example");
        f.dialogs.on_tab_activated(t);

        let rx =
            request_permission(&mut f.dialogs, &f.views, t, notifications("https://a.example"))
                .unwrap();
        let surface_id = f.dialogs.dialog_surface(DialogName::Permissions).unwrap();
        tokio::task::yield_now().await;

        // Once ready, the prompt carries the request payload for its tab.
        let surface = f.host.surface(surface_id).unwrap();
        assert!(surface.pushed_messages().iter().any(|m| matches!(
            m,
            ContentMessage::TabInfo { tab, data }
                if *tab == t && data["name"] == "notifications"
        )));
        assert_eq!(
            surface.applied_bounds().last().copied(),
            Some(Rect::new(0, 72, 366, 165))
        );

        f.dialogs
            .dispatch(surface_id, r#"{"type":"result","data":{"granted":true}}"#)
            .unwrap();
        assert_eq!(rx.await.unwrap(), true);

        // A second decision has no receiver left and is absorbed.
        f.dialogs
            .dispatch(surface_id, r#"{"type":"result","data":{"granted":false}}"#)
            .unwrap();
    }

    #[tokio::test]
    async fn teardown_clears_the_pending_request_state() {
        let mut f = fixture();
        let t = tab(&f, "https://a.example");
        f.dialogs.on_tab_activated(t);

        let _rx =
            request_permission(&mut f.dialogs, &f.views, t, notifications("https://a.example"))
                .unwrap();
        assert!(f.views.requested_permission(t).is_some());

        f.dialogs.hide(DialogName::Permissions, Some(t));
        assert!(f.views.requested_permission(t).is_none());
    }

    #[tokio::test]
    async fn newer_request_supersedes_a_pending_one() {
        let mut f = fixture();
        let a = tab(&f, "https://a.example");
        let b = tab(&f, "https://b.example");
        f.dialogs.on_tab_activated(a);

        let first =
            request_permission(&mut f.dialogs, &f.views, a, notifications("https://a.example"))
                .unwrap();
        let second =
            request_permission(&mut f.dialogs, &f.views, b, notifications("https://b.example"))
                .unwrap();
        assert_eq!(f.dialogs.active_dialogs(), 1);

        let surface_id = f.dialogs.dialog_surface(DialogName::Permissions).unwrap();
        f.dialogs
            .dispatch(surface_id, r#"{"type":"result","data":{"granted":true}}"#)
            .unwrap();

        // The replaced handler dropped the first sender.
        assert!(first.await.is_err());
        assert_eq!(second.await.unwrap(), true);
    }

    #[tokio::test]
    async fn resize_repositions_a_background_tabs_prompt() {
        let mut f = fixture();
        let a = tab(&f, "https://a.example");
        let b = tab(&f, "https://b.example");
        f.dialogs.on_tab_activated(a);

        let _rx =
            request_permission(&mut f.dialogs, &f.views, a, notifications("https://a.example"))
                .unwrap();
        let surface_id = f.dialogs.dialog_surface(DialogName::Permissions).unwrap();
        tokio::task::yield_now().await;
        let surface = f.host.surface(surface_id).unwrap();
        let applied = surface.applied_bounds().len();

        // While its tab is on screen the prompt holds still.
        f.dialogs.on_window_bounds_changed(BoundsDisposition::Resize);
        assert_eq!(surface.applied_bounds().len(), applied);

        f.dialogs.on_tab_activated(b);
        f.dialogs.on_window_bounds_changed(BoundsDisposition::Move);
        assert_eq!(surface.applied_bounds().len(), applied);

        f.dialogs.on_window_bounds_changed(BoundsDisposition::Resize);
        assert_eq!(surface.applied_bounds().len(), applied + 1);
        assert_eq!(
            surface.applied_bounds().last().copied(),
            Some(Rect::new(0, 72, 366, 165))
        );
    }
}
