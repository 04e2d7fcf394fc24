/// Router settings loading and validation.
pub mod config;
/// Crate-level error types: channel parsing, settings, subscriptions.
pub mod error;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Channel router: channels, payload types, listeners, dispatch, handles.
pub mod messaging;
/// Spatial router: world points, grid cells, cell index.
pub mod spatial;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Router configuration.
pub use config::RouterConfig;
/// Operation errors and result types.
pub use error::{
    ChannelError, ErrorExt, RecvError, RouterError, SettingsError, StatusCode, TryRecvError,
};
/// Logging setup.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Channel router API.
pub use messaging::{
    BroadcastContext, BroadcastControl, BroadcastResult, Channel, Delivery, HandleId,
    ListenerHandle, ListenerParams, MatchType, Message, MessageRouter, PayloadTypeKey, Priority,
    SpatialListenerHandle, SpatialSubscription, Subscription, TargetId,
};
/// Spatial router API.
pub use spatial::{GridCell, SpatialListenerParams, SpatialRouter, WorldPoint};
