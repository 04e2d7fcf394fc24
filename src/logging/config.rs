use std::{env, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use crate::error::SettingsError;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

/// Настройки вывода в консоль.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки вывода в файл с ежедневной ротацией.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub format: LogFormat,
    /// Префикс имени файла; к нему добавляется дата.
    pub filename: String,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень для модулей крейта: `trace`, `debug`, `info`, `warn`, `error`, `off`.
    pub level: String,
    /// Дополнительные директивы `EnvFilter`, например `gridcast::spatial=trace`.
    pub directives: Vec<String>,
    pub console_enabled: bool,
    pub console: ConsoleConfig,
    pub file_enabled: bool,
    pub file: FileConfig,
    pub log_dir: PathBuf,
}

impl LoggingConfig {
    /// Переопределяет поля из `GRIDCAST_LOG_LEVEL`, `GRIDCAST_LOG_FORMAT`,
    /// `GRIDCAST_LOG_DIR` и `GRIDCAST_LOG_FILE` (`true`/`false`).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("GRIDCAST_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(format) = env::var("GRIDCAST_LOG_FORMAT")
            .ok()
            .and_then(|f| f.parse().ok())
        {
            self.console.format = format;
        }
        if let Ok(dir) = env::var("GRIDCAST_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = env::var("GRIDCAST_LOG_FILE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.file_enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.level.parse::<LevelFilter>().map_err(|_| {
            SettingsError::invalid("level", format!("unknown log level '{}'", self.level))
        })?;
        if self.file_enabled && self.file.filename.trim().is_empty() {
            return Err(SettingsError::invalid("file.filename", "must not be empty"));
        }
        Ok(())
    }

    /// Создаёт каталог логов, если включён вывод в файл.
    pub fn ensure_log_dir(&self) -> Result<(), SettingsError> {
        if !self.file_enabled {
            return Ok(());
        }
        std::fs::create_dir_all(&self.log_dir).map_err(|source| SettingsError::LogDir {
            path: self.log_dir.clone(),
            source,
        })
    }

    /// Директива `EnvFilter`: уровень для крейтов проекта плюс
    /// пользовательские директивы.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![
            format!("gridcast={}", self.level),
            format!("gridcast_error={}", self.level),
        ];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filename: "gridcast.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            console_enabled: true,
            console: ConsoleConfig::default(),
            file_enabled: false,
            file: FileConfig::default(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(SettingsError::invalid(
                "format",
                format!("unknown log format '{other}'"),
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        };
        f.write_str(name)
    }
}
