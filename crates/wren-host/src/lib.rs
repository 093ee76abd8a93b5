//! Interface boundary to the rendering-engine collaborator.
//!
//! The chrome core never talks to a rendering engine directly; it goes
//! through the traits here:
//! - [`Surface`] — one paintable/interactive region (tab content or dialog)
//! - [`SurfaceFactory`] — allocates surfaces; the resource-exhaustion path
//! - [`HostWindow`] — the top-level window's view stack and layout queries
//! - [`RequestFilter`] — the ad-block hook consulted on loads
//!
//! `memory` provides an in-process host implementation for tests and
//! headless embedding.

pub mod events;
pub mod filter;
pub mod memory;
pub mod traits;

pub use events::{BoundsDisposition, ContentMessage, SurfaceEvent, SurfaceEventKind, WindowEvent};
pub use filter::{AllowAll, DomainBlocklist, RequestFilter};
pub use memory::{MemoryHost, MemorySurface, MemoryWindow};
pub use traits::{HostWindow, Surface, SurfaceFactory};
