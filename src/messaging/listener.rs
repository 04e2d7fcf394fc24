use std::{any::Any, fmt, sync::Arc};

use super::{BroadcastControl, Channel, HandleId, MatchType, PayloadTypeKey, TargetId};

/// Приоритет слушателя: меньшее значение вызывается раньше.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

/// Колбэк слушателя. `R` это тип маршрутизатора, доставившего сообщение.
pub type ListenerFn<R> = Arc<dyn Fn(&mut Delivery<'_, R>) + Send + Sync>;

/// Параметры регистрации обычного слушателя.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerParams {
    pub match_type: MatchType,
    pub priority: Priority,
    /// Если задан, слушатель получает только рассылки на эту цель.
    pub target: Option<TargetId>,
}

/// Запись реестра: всё, что нужно для фильтрации и вызова слушателя.
pub struct ListenerEntry<R> {
    pub id: HandleId,
    pub channel: Channel,
    pub payload_type: PayloadTypeKey,
    pub match_type: MatchType,
    pub priority: Priority,
    pub target: Option<TargetId>,
    pub callback: ListenerFn<R>,
}

/// Состояние одной доставки, передаваемое в колбэк.
///
/// Через него слушатель читает или подменяет полезную нагрузку и может
/// отменить текущую рассылку.
pub struct Delivery<'a, R> {
    router: &'a R,
    channel: &'a Channel,
    payload_type: &'a PayloadTypeKey,
    payload: &'a mut dyn Any,
    listener: HandleId,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const HIGHER: Priority = Priority(25);
    pub const DEFAULT: Priority = Priority(50);
    pub const LOWER: Priority = Priority(75);
    pub const LOWEST: Priority = Priority(100);
    /// Для слушателей-наблюдателей, которые должны видеть итог рассылки.
    pub const MONITOR: Priority = Priority(255);

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl ListenerParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Partial` с приоритетом по умолчанию, как у "простых" регистраций.
    pub fn partial() -> Self {
        Self {
            match_type: MatchType::Partial,
            ..Self::default()
        }
    }

    pub fn with_match_type(
        mut self,
        match_type: MatchType,
    ) -> Self {
        self.match_type = match_type;
        self
    }

    pub fn with_priority(
        mut self,
        priority: Priority,
    ) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_target(
        mut self,
        target: TargetId,
    ) -> Self {
        self.target = Some(target);
        self
    }
}

impl<R> ListenerEntry<R> {
    /// Проверяет канал и фильтр цели. Тип полезной нагрузки проверяется
    /// отдельно.
    pub fn accepts(
        &self,
        channel: &Channel,
        target: Option<TargetId>,
    ) -> bool {
        if let Some(wanted) = self.target {
            if target != Some(wanted) {
                return false;
            }
        }
        channel.matches(&self.channel, self.match_type)
    }
}

impl<'a, R> Delivery<'a, R> {
    pub(crate) fn new(
        router: &'a R,
        channel: &'a Channel,
        payload_type: &'a PayloadTypeKey,
        payload: &'a mut dyn Any,
        listener: HandleId,
    ) -> Self {
        Self {
            router,
            channel,
            payload_type,
            payload,
            listener,
        }
    }

    /// Маршрутизатор, выполняющий рассылку. Безопасен для повторного входа.
    pub fn router(&self) -> &'a R {
        self.router
    }

    /// Канал рассылки (а не канал, на котором зарегистрирован слушатель).
    pub fn channel(&self) -> &Channel {
        self.channel
    }

    pub fn payload_type(&self) -> &PayloadTypeKey {
        self.payload_type
    }

    /// Идентификатор вызываемого слушателя.
    pub fn listener(&self) -> HandleId {
        self.listener
    }

    /// Полезная нагрузка как `T`, `None` при несовпадении типа.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.downcast_mut::<T>()
    }

    pub fn raw_payload(&self) -> &dyn Any {
        &*self.payload
    }

    /// Подменяет полезную нагрузку для всех следующих слушателей и для
    /// вызывающей стороны. Возвращает `false`, если тип не совпадает.
    pub fn override_payload<T: Any>(
        &mut self,
        value: T,
    ) -> bool {
        match self.payload.downcast_mut::<T>() {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl<R: BroadcastControl> Delivery<'_, R> {
    /// Помечает текущую рассылку отменённой и, при `interrupt`, прерывает её.
    pub fn cancel(
        &self,
        cancel: bool,
        interrupt: bool,
    ) {
        self.router.cancel_current(cancel, interrupt);
    }

    /// Отменяет и прерывает рассылку: следующие слушатели не вызываются.
    pub fn stop(&self) {
        self.cancel(true, true);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl<R> Clone for ListenerEntry<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            channel: self.channel.clone(),
            payload_type: self.payload_type.clone(),
            match_type: self.match_type,
            priority: self.priority,
            target: self.target,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<R> fmt::Debug for ListenerEntry<R> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("payload_type", &self.payload_type)
            .field("match_type", &self.match_type)
            .field("priority", &self.priority)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
