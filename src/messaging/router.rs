use std::{
    any::Any,
    sync::{Arc, Weak},
};

use gridcast_error::RouterError;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
    context::{cancel_on, BroadcastScope, ContextStack},
    dispatch, forget_router, register_router, BroadcastControl, BroadcastResult, Channel,
    Delivery, HandleId, ListenerEntry, ListenerHandle, ListenerHost, ListenerParams,
    ListenerRegistry, Outgoing, PayloadTypeKey, Priority, RouterId, TargetId,
};
use crate::{config::RouterConfig, error::log_router_error};

/// Маршрутизатор сообщений по каналам и типам полезной нагрузки.
///
/// Клонирование дешёвое: клоны разделяют один реестр. Колбэки получают
/// маршрутизатор через [`Delivery::router`]; захват клона в колбэк создаёт
/// цикл ссылок, и маршрутизатор не будет освобождён.
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    id: RouterId,
    config: RouterConfig,
    state: Mutex<RouterState>,
    contexts: Mutex<ContextStack>,
}

struct RouterState {
    registry: ListenerRegistry<PayloadTypeKey, ListenerEntry<MessageRouter>>,
    last_id: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl MessageRouter {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        let inner = Arc::new(RouterInner {
            id: RouterId::next(),
            contexts: Mutex::new(ContextStack::new(config.isolate_nested_broadcasts)),
            config,
            state: Mutex::new(RouterState {
                registry: ListenerRegistry::new(),
                last_id: 0,
            }),
        });
        let host: Weak<dyn ListenerHost> = Arc::downgrade(&inner) as Weak<dyn ListenerHost>;
        register_router(inner.id, host);
        debug!(router = %inner.id, "Message router created");
        Self { inner }
    }

    pub fn id(&self) -> RouterId {
        self.inner.id
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// Регистрирует слушателя для полезной нагрузки типа `T`.
    pub fn register_listener<T, F>(
        &self,
        channel: &Channel,
        params: ListenerParams,
        callback: F,
    ) -> ListenerHandle
    where
        T: Any,
        F: Fn(&mut Delivery<'_, Self>) + Send + Sync + 'static,
    {
        self.register_listener_raw(channel, PayloadTypeKey::of::<T>(), params, callback)
    }

    /// Регистрирует слушателя для произвольного ключа типа.
    ///
    /// Для выведенного из обращения типа возвращает недействительный handle.
    pub fn register_listener_raw<F>(
        &self,
        channel: &Channel,
        payload_type: PayloadTypeKey,
        params: ListenerParams,
        callback: F,
    ) -> ListenerHandle
    where
        F: Fn(&mut Delivery<'_, Self>) + Send + Sync + 'static,
    {
        if !payload_type.is_live() {
            warn!(
                router = %self.inner.id,
                payload_type = %payload_type,
                "Refusing to register a listener for a retired payload type"
            );
            return ListenerHandle::invalid();
        }

        let id = {
            let mut state = self.inner.state.lock();
            state.last_id += 1;
            let id = HandleId::new(state.last_id);
            state.registry.insert(
                payload_type.clone(),
                ListenerEntry {
                    id,
                    channel: channel.clone(),
                    payload_type: payload_type.clone(),
                    match_type: params.match_type,
                    priority: params.priority,
                    target: params.target,
                    callback: Arc::new(callback),
                },
            );
            id
        };

        debug!(
            router = %self.inner.id,
            listener = %id,
            channel = %channel,
            payload_type = %payload_type,
            priority = params.priority.get(),
            "Listener registered"
        );
        ListenerHandle::new(self.inner.id, payload_type, id)
    }

    /// Слушатель на канале по умолчанию с частичным сопоставлением.
    pub fn register_simple_listener<T, F>(
        &self,
        priority: Priority,
        callback: F,
    ) -> ListenerHandle
    where
        T: Any,
        F: Fn(&mut Delivery<'_, Self>) + Send + Sync + 'static,
    {
        self.register_listener::<T, F>(
            &Channel::default_channel(),
            ListenerParams::partial().with_priority(priority),
            callback,
        )
    }

    /// Снимает слушателя с регистрации. Недействительный или чужой handle
    /// приводит только к предупреждению в логе.
    pub fn unregister(
        &self,
        handle: &mut ListenerHandle,
    ) {
        if let Err(err) = self.try_unregister(handle) {
            log_router_error(self.inner.id, "unregister", &err);
        }
    }

    pub fn try_unregister(
        &self,
        handle: &mut ListenerHandle,
    ) -> Result<(), RouterError> {
        let Some(owner) = handle.router_id().filter(|_| handle.is_valid()) else {
            return Err(RouterError::InvalidHandle);
        };
        if owner != self.inner.id {
            return Err(RouterError::ForeignHandle {
                handle_router: owner.get(),
                router: self.inner.id.get(),
            });
        }
        let result = self.inner.release(handle.payload_type(), handle.id());
        handle.reset();
        result
    }

    /// Рассылает `payload` всем подходящим слушателям.
    ///
    /// Слушатели могут изменить или подменить значение; изменения видны
    /// вызывающей стороне после возврата.
    pub fn broadcast<T: Any>(
        &self,
        channel: &Channel,
        payload: &mut T,
    ) -> BroadcastResult {
        self.broadcast_raw(channel, &PayloadTypeKey::of::<T>(), payload, None)
    }

    /// Рассылка для конкретной цели. Слушатели с другим фильтром цели её не
    /// получат, слушатели без фильтра получат.
    pub fn broadcast_to<T: Any>(
        &self,
        channel: &Channel,
        payload: &mut T,
        target: TargetId,
    ) -> BroadcastResult {
        self.broadcast_raw(channel, &PayloadTypeKey::of::<T>(), payload, Some(target))
    }

    /// Рассылка на канал по умолчанию.
    pub fn broadcast_simple<T: Any>(
        &self,
        payload: &mut T,
        target: Option<TargetId>,
    ) -> BroadcastResult {
        self.broadcast_raw(
            &Channel::default_channel(),
            &PayloadTypeKey::of::<T>(),
            payload,
            target,
        )
    }

    pub fn broadcast_raw(
        &self,
        channel: &Channel,
        payload_type: &PayloadTypeKey,
        payload: &mut dyn Any,
        target: Option<TargetId>,
    ) -> BroadcastResult {
        if !payload_type.accepts(payload) {
            warn!(
                router = %self.inner.id,
                channel = %channel,
                payload_type = %payload_type,
                "Payload value does not match the declared payload type, broadcast dropped"
            );
            return BroadcastResult::default();
        }
        if self.inner.config.log_messages {
            info!(
                router = %self.inner.id,
                channel = %channel,
                payload_type = %payload_type,
                target = ?target.map(TargetId::get),
                "Broadcasting message"
            );
        }

        let scope = BroadcastScope::enter(&self.inner.contexts);
        let candidates = {
            let state = self.inner.state.lock();
            state.registry.candidates(payload_type)
        };
        let Some(candidates) = candidates else {
            return scope.finish();
        };

        dispatch(
            self,
            scope,
            Outgoing {
                channel,
                payload_type,
                payload,
            },
            candidates,
            |entry| entry.accepts(channel, target),
            |entry| self.evict(entry),
        )
    }

    /// Удаляет всех слушателей. Выданные handle становятся "неизвестными".
    pub fn clear(&self) {
        let removed = {
            let mut state = self.inner.state.lock();
            let count = state.registry.entry_count();
            state.registry.clear();
            count
        };
        info!(router = %self.inner.id, removed, "Message router cleared");
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().registry.entry_count()
    }

    /// Количество типов полезной нагрузки, у которых есть слушатели.
    pub fn payload_type_count(&self) -> usize {
        self.inner.state.lock().registry.key_count()
    }

    /// Идентификаторы слушателей типа в порядке вызова.
    pub fn listener_ids(
        &self,
        payload_type: &PayloadTypeKey,
    ) -> Vec<HandleId> {
        self.inner
            .state
            .lock()
            .registry
            .list(payload_type)
            .map(|list| list.ids())
            .unwrap_or_default()
    }

    pub fn is_registered(
        &self,
        handle: &ListenerHandle,
    ) -> bool {
        if handle.router_id() != Some(self.inner.id) {
            return false;
        }
        let Some(payload_type) = handle.payload_type() else {
            return false;
        };
        self.inner
            .state
            .lock()
            .registry
            .contains(payload_type, handle.id())
    }

    fn evict(
        &self,
        entry: &ListenerEntry<MessageRouter>,
    ) {
        let mut state = self.inner.state.lock();
        if state.registry.remove(&entry.payload_type, entry.id).is_none() {
            debug!(listener = %entry.id, "Stale listener already removed");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для MessageRouter
////////////////////////////////////////////////////////////////////////////////

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastControl for MessageRouter {
    fn cancel_current(
        &self,
        cancel: bool,
        interrupt: bool,
    ) {
        cancel_on(&self.inner.contexts, cancel, interrupt);
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("id", &self.inner.id)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ListenerHost for RouterInner {
    fn release(
        &self,
        payload_type: Option<&PayloadTypeKey>,
        id: HandleId,
    ) -> Result<(), RouterError> {
        let payload_type = payload_type.ok_or(RouterError::InvalidHandle)?;
        let removed = self.state.lock().registry.remove(payload_type, id);
        match removed {
            Some(_) => {
                debug!(router = %self.id, listener = %id, "Listener unregistered");
                Ok(())
            }
            None => Err(RouterError::UnknownListener {
                handle_id: id.get(),
            }),
        }
    }
}

impl Drop for RouterInner {
    fn drop(&mut self) {
        forget_router(self.id);
        debug!(router = %self.id, "Message router dropped");
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    fn ch(s: &str) -> Channel {
        Channel::new(s).unwrap()
    }

    #[test]
    fn test_ids_are_monotonic_and_nonzero() {
        let router = MessageRouter::new();
        let a = router.register_listener::<Ping, _>(&ch("A"), ListenerParams::new(), |_| {});
        let b = router.register_listener::<Ping, _>(&ch("A"), ListenerParams::new(), |_| {});
        assert!(a.id().is_valid());
        assert!(b.id() > a.id());
        assert_eq!(router.listener_count(), 2);
        assert_eq!(router.payload_type_count(), 1);
    }

    /// Тест проверяет, что чужой handle не снимает слушателя и не обнуляется.
    #[test]
    fn test_foreign_handle_is_rejected() {
        let first = MessageRouter::new();
        let second = MessageRouter::new();
        let mut handle =
            first.register_listener::<Ping, _>(&ch("A"), ListenerParams::new(), |_| {});

        assert!(matches!(
            second.try_unregister(&mut handle),
            Err(RouterError::ForeignHandle { .. })
        ));
        assert!(handle.is_valid());
        assert!(first.is_registered(&handle));

        second.unregister(&mut handle);
        assert_eq!(first.listener_count(), 1);
    }

    #[test]
    fn test_mismatched_raw_payload_is_dropped() {
        let router = MessageRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        router.register_listener::<Ping, _>(&ch("A"), ListenerParams::new(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result =
            router.broadcast_raw(&ch("A"), &PayloadTypeKey::of::<Ping>(), &mut 5u8, None);
        assert_eq!(result, BroadcastResult::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_retired_type_registration_is_refused() {
        let router = MessageRouter::new();
        let key = PayloadTypeKey::declare("Gone");
        key.retire();
        let handle = router.register_listener_raw(&ch("A"), key, ListenerParams::new(), |_| {});
        assert!(!handle.is_valid());
        assert_eq!(router.listener_count(), 0);
    }

    #[test]
    fn test_clear() {
        let router = MessageRouter::new();
        let mut handle =
            router.register_listener::<Ping, _>(&ch("A"), ListenerParams::new(), |_| {});
        router.clear();
        assert_eq!(router.listener_count(), 0);
        assert!(matches!(
            router.try_unregister(&mut handle),
            Err(RouterError::UnknownListener { .. })
        ));
    }

    /// Тест проверяет, что handle, переживший маршрутизатор, безопасно
    /// обнуляется.
    #[test]
    fn test_handle_outlives_router() {
        let router = MessageRouter::new();
        let mut handle =
            router.register_listener::<Ping, _>(&ch("A"), ListenerParams::new(), |_| {});
        drop(router);
        assert!(matches!(
            handle.try_unregister(),
            Err(RouterError::RouterGone { .. })
        ));
        assert!(!handle.is_valid());
    }
}
