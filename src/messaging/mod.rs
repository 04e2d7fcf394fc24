pub mod channel;
pub mod context;
mod engine;
pub mod handle;
mod intern;
pub mod listener;
pub mod message;
pub mod payload;
pub mod registry;
pub mod router;
pub mod subscriber;

// Публичный API подсистемы сообщений.
pub use channel::*;
pub use context::{BroadcastContext, BroadcastControl, BroadcastResult};
pub(crate) use engine::{dispatch, DispatchEntry, Outgoing};
pub use handle::{Handle, HandleId, HandleKind, ListenerHandle, Plain, RouterId, Spatial, SpatialListenerHandle};
pub(crate) use handle::{forget_router, register_router, ListenerHost};
pub(crate) use intern::{intern_channel, intern_rust_type};
pub use listener::*;
pub use message::*;
pub use payload::*;
pub use registry::*;
pub use router::*;
pub use subscriber::*;
