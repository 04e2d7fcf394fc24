use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Коды статуса для категоризации ошибок маршрутизатора.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (каналы, типы payload)
/// - 3xxx: Жизненный цикл handle и слушателей
/// - 4xxx: Пространственный индекс
/// - 5xxx: Конфигурация / IO
///
/// `num_enum::TryFromPrimitive` даёт реализацию `TryFrom<u32>`, опционально
/// `serde_repr` сериализует код как число (feature = "serde").
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Internal = 1002,
    InvalidArgs = 1003,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    AlreadyExists = 2001,
    TypeMismatch = 2002,
    InvalidChannel = 2003,
    InvalidValue = 2004,

    // === 3xxx: Handle / слушатели ===
    InvalidHandle = 3000,
    ForeignHandle = 3001,
    RouterGone = 3002,
    StaleListener = 3003,
    UnknownListener = 3004,

    // === 4xxx: Пространственный индекс ===
    InvalidRadius = 4000,
    InvalidPosition = 4001,
    SpatialInconsistency = 4002,

    // === 5xxx: Конфигурация/IO ===
    ConfigInvalid = 5000,
    ConfigLoad = 5001,
    Io = 5002,
    InvalidUtf8 = 5003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    ///
    /// Возвращает `None`, если значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::AlreadyExists => LogLevel::Debug,
            Self::TypeMismatch => LogLevel::Debug,
            Self::InvalidArgs
            | Self::InvalidChannel
            | Self::InvalidValue
            | Self::InvalidRadius
            | Self::InvalidPosition => LogLevel::Info,
            Self::InvalidHandle
            | Self::ForeignHandle
            | Self::RouterGone
            | Self::StaleListener
            | Self::UnknownListener
            | Self::SpatialInconsistency => LogLevel::Warn,
            Self::Internal | Self::ConfigLoad | Self::Io => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет конвертацию через `TryFrom<u32>` и вспомогательную
    /// `from_u32`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::ForeignHandle.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::ForeignHandle);
        assert!(StatusCode::from_u32(99999).is_none());
    }

    /// Тест проверяет получение числового представления и `From<StatusCode>
    /// for u32`.
    #[test]
    fn test_code_and_into() {
        let c = StatusCode::NotFound;
        assert_eq!(c.code(), 2000);
        let n: u32 = c.into();
        assert_eq!(n, 2000);
        assert!(StatusCode::is_success(StatusCode::Success.code()));
        assert!(!StatusCode::is_success(StatusCode::NotFound.code()));
    }

    /// Тест проверяет уровни логирования для разных кодов.
    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::NotFound.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::InvalidHandle.log_level(), LogLevel::Warn);
        assert_eq!(StatusCode::Internal.log_level(), LogLevel::Error);
        assert_eq!(StatusCode::InvalidPosition.log_level(), LogLevel::Info);
        assert_eq!(StatusCode::SpatialInconsistency.log_level(), LogLevel::Warn);
    }

    /// Тест проверяет формат `Display`: имя варианта и числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::InvalidRadius);
        assert!(s.contains("4000"), "Display must contain code, got: {s}");
        assert!(
            s.contains("InvalidRadius"),
            "Display must contain variant name, got: {s}"
        );
    }

    /// Тест проверяет, что с feature `serde` код сериализуется числом.
    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&StatusCode::ForeignHandle).unwrap();
        assert_eq!(json, "3001");
        let back: StatusCode = serde_json::from_str("4002").unwrap();
        assert_eq!(back, StatusCode::SpatialInconsistency);
    }
}
