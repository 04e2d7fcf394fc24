use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки операций маршрутизатора сообщений.
///
/// Ни одна из них не фатальна: публичные операции Unregister/Broadcast
/// логируют предупреждение и продолжают работу, а `Result` с этими
/// вариантами возвращают только `try_*` методы.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    /// Handle с нулевым идентификатором.
    #[error("handle is invalid (id 0)")]
    InvalidHandle,

    /// Handle выдан другим экземпляром маршрутизатора.
    #[error("handle belongs to router {handle_router}, not to router {router}")]
    ForeignHandle { handle_router: u64, router: u64 },

    /// Слушатель с таким идентификатором не зарегистрирован.
    #[error("no listener registered with handle id {handle_id}")]
    UnknownListener { handle_id: u64 },

    /// Маршрутизатор, выдавший handle, уже уничтожен.
    #[error("router {router} is no longer alive")]
    RouterGone { router: u64 },

    /// Ожидаемый слушатель отсутствует в ячейке сетки.
    #[error("listener {handle_id} expected in grid cell {cell} but not found")]
    SpatialConsistency { handle_id: u64, cell: i64 },

    /// Некорректное имя канала.
    #[error("invalid channel '{channel}': {reason}")]
    InvalidChannel { channel: String, reason: String },

    /// Отрицательный или нечисловой радиус.
    #[error("invalid listen radius {radius}")]
    InvalidRadius { radius: f64 },

    /// Позиция содержит NaN или бесконечность.
    #[error("invalid world position ({x}, {y}, {z})")]
    InvalidPosition { x: f64, y: f64, z: f64 },
}

impl ErrorExt for RouterError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidHandle => StatusCode::InvalidHandle,
            Self::ForeignHandle { .. } => StatusCode::ForeignHandle,
            Self::UnknownListener { .. } => StatusCode::UnknownListener,
            Self::RouterGone { .. } => StatusCode::RouterGone,
            Self::SpatialConsistency { .. } => StatusCode::SpatialInconsistency,
            Self::InvalidChannel { .. } => StatusCode::InvalidChannel,
            Self::InvalidRadius { .. } => StatusCode::InvalidRadius,
            Self::InvalidPosition { .. } => StatusCode::InvalidPosition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RouterError::InvalidHandle.status_code(),
            StatusCode::InvalidHandle
        );
        assert_eq!(
            RouterError::SpatialConsistency {
                handle_id: 1,
                cell: 2
            }
            .status_code(),
            StatusCode::SpatialInconsistency
        );
        assert_eq!(
            RouterError::InvalidRadius { radius: -1.0 }.status_code(),
            StatusCode::InvalidRadius
        );
    }

    #[test]
    fn test_display() {
        let err = RouterError::ForeignHandle {
            handle_router: 2,
            router: 5,
        };
        assert_eq!(
            err.to_string(),
            "handle belongs to router 2, not to router 5"
        );
    }

    /// Тест проверяет уровни логирования: ошибки handle идут в warn,
    /// некорректные координаты в info.
    #[test]
    fn test_log_levels() {
        assert_eq!(
            RouterError::UnknownListener { handle_id: 4 }
                .status_code()
                .log_level(),
            crate::LogLevel::Warn
        );
        assert_eq!(
            RouterError::InvalidPosition {
                x: f64::NAN,
                y: 0.0,
                z: 0.0
            }
            .status_code()
            .log_level(),
            crate::LogLevel::Info
        );
    }
}
