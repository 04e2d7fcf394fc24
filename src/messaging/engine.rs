use std::any::Any;

use tracing::{trace, warn};

use super::{
    context::BroadcastScope, BroadcastResult, Channel, Delivery, ListenerEntry, PayloadTypeKey,
};

/// Кандидат на доставку: обычная запись или пространственная обёртка над ней.
pub(crate) trait DispatchEntry<R> {
    fn listener(&self) -> &ListenerEntry<R>;
}

/// Рассылаемое сообщение.
pub(crate) struct Outgoing<'a> {
    pub channel: &'a Channel,
    pub payload_type: &'a PayloadTypeKey,
    pub payload: &'a mut dyn Any,
}

/// Обходит снимок кандидатов и вызывает подходящих слушателей.
///
/// Порядок проверок для каждого кандидата:
/// 1. тип полезной нагрузки жив, иначе выселение через `evict`;
/// 2. тип совпадает с типом рассылки;
/// 3. `accepts`: фильтр цели или расстояния и сопоставление канала;
/// 4. вызов колбэка, затем проверка флага прерывания.
///
/// Ни одна блокировка не удерживается во время вызова колбэка.
pub(crate) fn dispatch<R, E>(
    router: &R,
    scope: BroadcastScope<'_>,
    message: Outgoing<'_>,
    candidates: Vec<E>,
    mut accepts: impl FnMut(&E) -> bool,
    mut evict: impl FnMut(&E),
) -> BroadcastResult
where
    E: DispatchEntry<R>,
{
    let Outgoing {
        channel,
        payload_type,
        payload,
    } = message;

    for candidate in &candidates {
        let entry = candidate.listener();

        if !entry.payload_type.is_live() {
            warn!(
                listener = %entry.id,
                payload_type = %entry.payload_type,
                "Evicting listener registered for a retired payload type"
            );
            evict(candidate);
            continue;
        }
        if entry.payload_type != *payload_type {
            continue;
        }
        if !accepts(candidate) {
            continue;
        }

        trace!(listener = %entry.id, channel = %channel, "Invoking listener");
        let mut delivery = Delivery::new(router, channel, payload_type, &mut *payload, entry.id);
        (entry.callback)(&mut delivery);

        if scope.interrupted() {
            trace!(listener = %entry.id, "Broadcast interrupted");
            break;
        }
    }

    scope.finish()
}

impl<R> DispatchEntry<R> for ListenerEntry<R> {
    fn listener(&self) -> &ListenerEntry<R> {
        self
    }
}
