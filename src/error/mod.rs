pub mod channel;
pub mod settings;
pub mod subscription;

use std::fmt;

use tracing::{debug, error, info, trace, warn};

// Ошибки, специфичные для корневого крейта. Общие типы (`RouterError`,
// `StatusCode`) живут в `gridcast-error`.
pub use channel::ChannelError;
pub use gridcast_error::{ErrorExt, LogLevel, RouterError, StatusCode};
pub use settings::SettingsError;
pub use subscription::{RecvError, TryRecvError};

/// Логирует неудачную операцию маршрутизатора на уровне, который задаёт
/// код статуса ошибки.
pub(crate) fn log_router_error(
    router: impl fmt::Display,
    op: &'static str,
    err: &RouterError,
) {
    let status = err.status_code();
    match status.log_level() {
        LogLevel::Trace => trace!(%router, op, %status, %err, "Router operation failed"),
        LogLevel::Debug => debug!(%router, op, %status, %err, "Router operation failed"),
        LogLevel::Info => info!(%router, op, %status, %err, "Router operation failed"),
        LogLevel::Warn => warn!(%router, op, %status, %err, "Router operation failed"),
        LogLevel::Error => error!(%router, op, %status, %err, "Router operation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::capture_logs;

    /// Тест проверяет, что ошибка handle логируется как warn с кодом статуса.
    #[test]
    fn test_handle_error_logged_as_warn() {
        let out = capture_logs(|| {
            log_router_error(
                7,
                "unregister",
                &RouterError::ForeignHandle {
                    handle_router: 2,
                    router: 7,
                },
            )
        });
        assert!(out.contains("WARN"), "got: {out}");
        assert!(out.contains("op=\"unregister\""), "got: {out}");
        assert!(out.contains("ForeignHandle (3001)"), "got: {out}");
    }

    /// Тест проверяет, что некорректная позиция логируется как info.
    #[test]
    fn test_invalid_position_logged_as_info() {
        let out = capture_logs(|| {
            log_router_error(
                1,
                "update_listener_location",
                &RouterError::InvalidPosition {
                    x: f64::NAN,
                    y: 0.0,
                    z: 0.0,
                },
            )
        });
        assert!(out.contains("INFO"), "got: {out}");
        assert!(!out.contains("WARN"), "got: {out}");
        assert!(out.contains("InvalidPosition (4001)"), "got: {out}");
    }
}
