use std::{fmt, str::FromStr, sync::Arc};

use super::intern_channel;
use crate::error::ChannelError;

/// Имя канала по умолчанию для "простых" регистраций и рассылок.
pub const DEFAULT_CHANNEL: &str = "Message";

/// Правило сопоставления канала слушателя с каналом рассылки.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// Только тот же самый канал: `A.B` слышит `A.B`, но не `A.B.C`.
    #[default]
    Exact,
    /// Канал и все его потомки: `A.B` слышит `A.B` и `A.B.C`.
    Partial,
}

/// Иерархический канал из сегментов, разделённых точкой (`Combat.Damage.Fire`).
///
/// Строка интернируется, поэтому клонирование и сравнение дешёвые.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(Arc<str>);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Channel {
    /// Разбирает и проверяет имя канала.
    ///
    /// Сегменты непустые и состоят из ASCII-букв, цифр, `_` и `-`.
    ///
    /// Имя попадает в общий для процесса пул интернирования и остаётся там
    /// до завершения процесса: записи пула никогда не удаляются. Пул растёт
    /// с числом различных имён, поэтому имена каналов не стоит собирать из
    /// неограниченных данных (идентификаторов сущностей, пользовательского
    /// ввода).
    pub fn new(name: &str) -> Result<Self, ChannelError> {
        if name.is_empty() {
            return Err(ChannelError::Empty);
        }
        for (index, segment) in name.split('.').enumerate() {
            if segment.is_empty() {
                return Err(ChannelError::EmptySegment {
                    channel: name.to_string(),
                    index,
                });
            }
            if let Some(ch) = segment
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
            {
                return Err(ChannelError::InvalidCharacter {
                    channel: name.to_string(),
                    ch,
                });
            }
        }
        Ok(Self(intern_channel(name)))
    }

    /// Канал `"Message"`.
    pub fn default_channel() -> Self {
        Self(intern_channel(DEFAULT_CHANNEL))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Количество сегментов.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Родительский канал (`A.B.C` → `A.B`), `None` для корневого.
    pub fn parent(&self) -> Option<Channel> {
        self.0
            .rfind('.')
            .map(|pos| Channel(intern_channel(&self.0[..pos])))
    }

    /// `true`, если `self` равен `ancestor` или лежит под ним.
    ///
    /// Сравнение посегментное: `A.BC` не является потомком `A.B`.
    pub fn is_descendant_or_equal(
        &self,
        ancestor: &Channel,
    ) -> bool {
        if Arc::ptr_eq(&self.0, &ancestor.0) {
            return true;
        }
        let (me, other) = (self.as_str(), ancestor.as_str());
        match me.strip_prefix(other) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }

    /// Проверяет, слышит ли слушатель на `listener` рассылку на `self`.
    pub fn matches(
        &self,
        listener: &Channel,
        match_type: MatchType,
    ) -> bool {
        match match_type {
            MatchType::Exact => self == listener,
            MatchType::Partial => self.is_descendant_or_equal(listener),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Channel
////////////////////////////////////////////////////////////////////////////////

impl Default for Channel {
    fn default() -> Self {
        Self::default_channel()
    }
}

impl FromStr for Channel {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Channel {
    type Error = ChannelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Channel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
