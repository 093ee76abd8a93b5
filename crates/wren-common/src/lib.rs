pub mod errors;
pub mod events;
pub mod rect;
pub mod types;

pub use errors::{HostError, ShellError, StorageError};
pub use events::{Event, EventBus};
pub use rect::{Rect, RectPatch};
pub use types::{DialogName, NavigationState, SurfaceId, TabId};

pub type Result<T> = std::result::Result<T, ShellError>;
