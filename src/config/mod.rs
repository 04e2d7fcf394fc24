use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{error::SettingsError, spatial::DEFAULT_CELL_SIZE};

/// Префикс переменных окружения: `GRIDCAST_CELL_SIZE`, `GRIDCAST_LOG_MESSAGES`.
pub const ENV_PREFIX: &str = "GRIDCAST";

/// Порог ячеек на слушателя по умолчанию: круг радиусом около 36 ячеек.
pub const DEFAULT_MAX_LISTENER_CELLS: usize = 4096;

/// Настройки маршрутизатора.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Логировать каждую рассылку на уровне `info`.
    pub log_messages: bool,
    /// Размер ячейки сетки пространственного маршрутизатора.
    pub cell_size: f64,
    /// Давать каждой вложенной рассылке собственный контекст отмены.
    pub isolate_nested_broadcasts: bool,
    /// Сколько ячеек сетки может занимать один слушатель, прежде чем
    /// регистрация или перемещение залогирует предупреждение.
    pub max_listener_cells: usize,
}

impl RouterConfig {
    /// Загружает настройки из переменных окружения с префиксом `GRIDCAST`.
    pub fn load() -> Result<Self, SettingsError> {
        Self::build(None, ENV_PREFIX)
    }

    /// Загружает настройки из файла; переменные окружения имеют приоритет.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::build(Some(path.as_ref()), ENV_PREFIX)
    }

    pub fn with_prefix(prefix: &str) -> Result<Self, SettingsError> {
        Self::build(None, prefix)
    }

    fn build(
        file: Option<&Path>,
        prefix: &str,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("log_messages", false)?
            .set_default("cell_size", DEFAULT_CELL_SIZE)?
            .set_default("isolate_nested_broadcasts", false)?
            .set_default("max_listener_cells", DEFAULT_MAX_LISTENER_CELLS as u64)?;
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        let cfg: RouterConfig = builder
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(SettingsError::invalid(
                "cell_size",
                format!("must be a positive finite number, got {}", self.cell_size),
            ));
        }
        if self.max_listener_cells == 0 {
            return Err(SettingsError::invalid(
                "max_listener_cells",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            log_messages: false,
            cell_size: DEFAULT_CELL_SIZE,
            isolate_nested_broadcasts: false,
            max_listener_cells: DEFAULT_MAX_LISTENER_CELLS,
        }
    }
}
