use std::{any::Any, time::Duration};

use tokio::sync::mpsc;
use tracing::debug;

use super::{
    Channel, Handle, HandleKind, ListenerParams, Message, MessageRouter, Plain, Spatial,
};
use crate::{
    error::{RecvError, TryRecvError},
    spatial::{SpatialListenerParams, SpatialRouter},
};

/// Подписка, превращающая колбэк-слушателя в очередь сообщений.
///
/// Каждая подходящая рассылка клонирует полезную нагрузку в неограниченную
/// очередь. Слушатель снимается с регистрации при `Drop`.
pub struct Subscription<T, K: HandleKind = Plain> {
    /// Канал, на котором зарегистрирован слушатель.
    channel: Channel,
    handle: Handle<K>,
    /// Внутренний приёмник для входящих сообщений.
    inner: mpsc::UnboundedReceiver<Message<T>>,
}

pub type SpatialSubscription<T> = Subscription<T, Spatial>;

impl MessageRouter {
    /// Подписывается на рассылки `T` на канале `channel`.
    pub fn subscribe<T>(
        &self,
        channel: &Channel,
        params: ListenerParams,
    ) -> Subscription<T>
    where
        T: Any + Clone + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.register_listener::<T, _>(channel, params, move |delivery| {
            if let Some(payload) = delivery.payload::<T>() {
                let _ = tx.send(Message::new(delivery.channel().clone(), payload.clone()));
            }
        });
        Subscription::new(channel.clone(), handle, rx)
    }
}

impl SpatialRouter {
    /// Подписывается на рассылки `T`, слышимые из точки `params.position`.
    pub fn subscribe<T>(
        &self,
        channel: &Channel,
        params: SpatialListenerParams,
    ) -> SpatialSubscription<T>
    where
        T: Any + Clone + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.register_listener::<T, _>(channel, params, move |delivery| {
            if let Some(payload) = delivery.payload::<T>() {
                let _ = tx.send(Message::new(delivery.channel().clone(), payload.clone()));
            }
        });
        Subscription::new(channel.clone(), handle, rx)
    }
}

impl<T, K: HandleKind> Subscription<T, K> {
    fn new(
        channel: Channel,
        handle: Handle<K>,
        inner: mpsc::UnboundedReceiver<Message<T>>,
    ) -> Self {
        Self {
            channel,
            handle,
            inner,
        }
    }

    /// Асинхронно ожидает следующее сообщение.
    ///
    /// # Возвращает
    /// - `Ok(Message)` при успешном получении сообщения
    /// - `Err(RecvError::Closed)` если слушатель снят или маршрутизатор
    ///   уничтожен, а очередь пуста
    pub async fn recv(&mut self) -> Result<Message<T>, RecvError> {
        self.inner.recv().await.ok_or(RecvError::Closed)
    }

    /// Как [`Subscription::recv`], но не дольше `timeout`.
    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Message<T>, RecvError> {
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(RecvError::Closed),
            Err(_) => Err(RecvError::Timeout),
        }
    }

    /// Пытается получить сообщение без ожидания.
    pub fn try_recv(&mut self) -> Result<Message<T>, TryRecvError> {
        self.inner.try_recv().map_err(Into::into)
    }

    /// Явно отписаться. Аналогично `drop(self)`.
    pub fn unsubscribe(self) {}

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Handle слушателя, например для обновления позиции пространственной
    /// подписки.
    pub fn handle(&self) -> &Handle<K> {
        &self.handle
    }

    /// Количество сообщений в очереди.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Отправитель уничтожен: новых сообщений не будет.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<T, K: HandleKind> Drop for Subscription<T, K> {
    fn drop(&mut self) {
        if !self.handle.is_valid() {
            return;
        }
        if let Err(err) = self.handle.try_unregister() {
            debug!(channel = %self.channel, %err, "Subscription listener already gone");
        }
    }
}
