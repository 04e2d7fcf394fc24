use std::{
    any::Any,
    sync::{Arc, Weak},
};

use gridcast_error::RouterError;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{Footprint, GridCell, RelocateStats, SpatialIndex, SpatialListenerEntry, WorldPoint};
use crate::{
    config::RouterConfig,
    error::{log_router_error, ErrorExt},
    messaging::{
        context::{cancel_on, BroadcastScope, ContextStack},
        dispatch, forget_router, register_router, BroadcastControl, BroadcastResult, Channel,
        Delivery, HandleId, ListenerEntry, ListenerHost, MatchType, Outgoing, PayloadTypeKey,
        Priority, RouterId, SpatialListenerHandle,
    },
};

/// Параметры регистрации пространственного слушателя.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialListenerParams {
    pub match_type: MatchType,
    pub priority: Priority,
    pub position: WorldPoint,
    /// Радиус слышимости. Отрицательный или нечисловой заменяется нулём.
    ///
    /// Слушатель записывается в каждую ячейку, которую задевает его круг,
    /// поэтому стоимость регистрации, перемещения и памяти растёт как
    /// `(radius / cell_size)^2`. Верхней границы нет: при превышении
    /// `RouterConfig::max_listener_cells` выводится только предупреждение.
    pub radius: f64,
}

/// Маршрутизатор, доставляющий сообщения только слушателям, в радиусе
/// которых находится точка рассылки.
///
/// Слушатель при регистрации раскладывается по всем ячейкам сетки, которые
/// задевает его круг, поэтому рассылке достаточно просмотреть одну ячейку.
#[derive(Clone)]
pub struct SpatialRouter {
    inner: Arc<SpatialInner>,
}

struct SpatialInner {
    id: RouterId,
    config: RouterConfig,
    state: Mutex<SpatialState>,
    contexts: Mutex<ContextStack>,
}

struct SpatialState {
    index: SpatialIndex<SpatialRouter>,
    last_id: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SpatialListenerParams {
    pub fn new(
        position: WorldPoint,
        radius: f64,
    ) -> Self {
        Self {
            match_type: MatchType::default(),
            priority: Priority::default(),
            position,
            radius,
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
}

impl SpatialRouter {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Размер ячейки берётся из `config.cell_size`. Некорректные
    /// `cell_size` и `max_listener_cells` заменяются значениями по умолчанию.
    pub fn with_config(mut config: RouterConfig) -> Self {
        if let Err(err) = config.validate() {
            warn!(
                status = %err.status_code(),
                %err,
                "Invalid router config, replacing invalid fields with defaults"
            );
            let defaults = RouterConfig::default();
            if !(config.cell_size.is_finite() && config.cell_size > 0.0) {
                config.cell_size = defaults.cell_size;
            }
            if config.max_listener_cells == 0 {
                config.max_listener_cells = defaults.max_listener_cells;
            }
        }
        let inner = Arc::new(SpatialInner {
            id: RouterId::next(),
            contexts: Mutex::new(ContextStack::new(config.isolate_nested_broadcasts)),
            state: Mutex::new(SpatialState {
                index: SpatialIndex::new(config.cell_size),
                last_id: 0,
            }),
            config,
        });
        let host: Weak<dyn ListenerHost> = Arc::downgrade(&inner) as Weak<dyn ListenerHost>;
        register_router(inner.id, host);
        debug!(
            router = %inner.id,
            cell_size = inner.config.cell_size,
            "Spatial router created"
        );
        Self { inner }
    }

    pub fn id(&self) -> RouterId {
        self.inner.id
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn cell_size(&self) -> f64 {
        self.inner.config.cell_size
    }

    pub fn register_listener<T, F>(
        &self,
        channel: &Channel,
        params: SpatialListenerParams,
        callback: F,
    ) -> SpatialListenerHandle
    where
        T: Any,
        F: Fn(&mut Delivery<'_, Self>) + Send + Sync + 'static,
    {
        self.register_listener_raw(channel, PayloadTypeKey::of::<T>(), params, callback)
    }

    /// Регистрирует слушателя в точке `params.position` с радиусом
    /// `params.radius`.
    pub fn register_listener_raw<F>(
        &self,
        channel: &Channel,
        payload_type: PayloadTypeKey,
        params: SpatialListenerParams,
        callback: F,
    ) -> SpatialListenerHandle
    where
        F: Fn(&mut Delivery<'_, Self>) + Send + Sync + 'static,
    {
        if !payload_type.is_live() {
            warn!(
                router = %self.inner.id,
                payload_type = %payload_type,
                "Refusing to register a listener for a retired payload type"
            );
            return SpatialListenerHandle::invalid();
        }
        if !params.position.is_finite() {
            warn!(
                router = %self.inner.id,
                position = %params.position,
                "Listener position is not finite, it will not hear broadcasts"
            );
        }
        let radius = sanitize_radius(params.radius).unwrap_or_else(|| {
            warn!(
                router = %self.inner.id,
                radius = params.radius,
                "Invalid listen radius, using 0"
            );
            0.0
        });

        let (id, cells) = {
            let mut state = self.inner.state.lock();
            state.last_id += 1;
            let id = HandleId::new(state.last_id);
            let cells = state.index.insert(SpatialListenerEntry {
                listener: ListenerEntry {
                    id,
                    channel: channel.clone(),
                    payload_type: payload_type.clone(),
                    match_type: params.match_type,
                    priority: params.priority,
                    target: None,
                    callback: Arc::new(callback),
                },
                position: params.position,
                radius,
            });
            (id, cells)
        };

        debug!(
            router = %self.inner.id,
            listener = %id,
            channel = %channel,
            payload_type = %payload_type,
            position = %params.position,
            radius,
            cells,
            "Spatial listener registered"
        );
        self.check_cell_budget(id, cells);
        SpatialListenerHandle::new(self.inner.id, payload_type, id)
    }

    /// Слушатель на канале по умолчанию с частичным сопоставлением.
    pub fn register_simple_listener<T, F>(
        &self,
        position: WorldPoint,
        radius: f64,
        priority: Priority,
        callback: F,
    ) -> SpatialListenerHandle
    where
        T: Any,
        F: Fn(&mut Delivery<'_, Self>) + Send + Sync + 'static,
    {
        self.register_listener::<T, F>(
            &Channel::default_channel(),
            SpatialListenerParams::new(position, radius)
                .with_match_type(MatchType::Partial)
                .with_priority(priority),
            callback,
        )
    }

    pub fn unregister(
        &self,
        handle: &mut SpatialListenerHandle,
    ) {
        if let Err(err) = self.try_unregister(handle) {
            log_router_error(self.inner.id, "unregister", &err);
        }
    }

    pub fn try_unregister(
        &self,
        handle: &mut SpatialListenerHandle,
    ) -> Result<(), RouterError> {
        self.check_owner(handle)?;
        let result = self.inner.release(handle.payload_type(), handle.id());
        handle.reset();
        result
    }

    /// Рассылает `payload` из точки `position`.
    pub fn broadcast<T: Any>(
        &self,
        channel: &Channel,
        payload: &mut T,
        position: WorldPoint,
    ) -> BroadcastResult {
        self.broadcast_raw(channel, &PayloadTypeKey::of::<T>(), payload, position)
    }

    /// Рассылка на канал по умолчанию.
    pub fn broadcast_simple<T: Any>(
        &self,
        payload: &mut T,
        position: WorldPoint,
    ) -> BroadcastResult {
        self.broadcast_raw(
            &Channel::default_channel(),
            &PayloadTypeKey::of::<T>(),
            payload,
            position,
        )
    }

    pub fn broadcast_raw(
        &self,
        channel: &Channel,
        payload_type: &PayloadTypeKey,
        payload: &mut dyn Any,
        position: WorldPoint,
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
                position = %position,
                "Broadcasting spatial message"
            );
        }

        let scope = BroadcastScope::enter(&self.inner.contexts);
        let candidates = {
            let state = self.inner.state.lock();
            state.index.candidates_at(&position)
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
            |entry| {
                entry.footprint().hears(&position)
                    && channel.matches(&entry.listener.channel, entry.listener.match_type)
            },
            |entry| self.evict(entry.listener.id),
        )
    }

    /// Перемещает слушателя. `None` или отрицательный `radius` сохраняет
    /// прежний радиус. Возвращает `false`, если слушатель не найден.
    pub fn update_listener_location(
        &self,
        handle: &SpatialListenerHandle,
        position: WorldPoint,
        radius: Option<f64>,
    ) -> bool {
        match self.try_update_listener_location(handle, position, radius) {
            Ok(_) => true,
            Err(err) => {
                log_router_error(self.inner.id, "update_listener_location", &err);
                false
            }
        }
    }

    pub fn try_update_listener_location(
        &self,
        handle: &SpatialListenerHandle,
        position: WorldPoint,
        radius: Option<f64>,
    ) -> Result<RelocateStats, RouterError> {
        self.check_owner(handle)?;
        if !position.is_finite() {
            return Err(RouterError::InvalidPosition {
                x: position.x,
                y: position.y,
                z: position.z,
            });
        }
        let radius = match radius {
            Some(r) if r.is_nan() || r.is_infinite() => {
                return Err(RouterError::InvalidRadius { radius: r });
            }
            Some(r) if r < 0.0 => None,
            other => other,
        };

        let stats = self
            .inner
            .state
            .lock()
            .index
            .relocate(handle.id(), position, radius)?;
        debug!(
            router = %self.inner.id,
            listener = %handle.id(),
            position = %position,
            left = stats.left,
            entered = stats.entered,
            kept = stats.kept,
            "Spatial listener moved"
        );
        self.check_cell_budget(handle.id(), stats.entered + stats.kept);
        Ok(stats)
    }

    pub fn clear(&self) {
        let removed = {
            let mut state = self.inner.state.lock();
            let count = state.index.listener_count();
            state.index.clear();
            count
        };
        info!(router = %self.inner.id, removed, "Spatial router cleared");
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().index.listener_count()
    }

    /// Количество непустых ячеек сетки.
    pub fn cell_count(&self) -> usize {
        self.inner.state.lock().index.cell_count()
    }

    /// Ячейки, в которых зарегистрирован слушатель.
    pub fn cells_of(
        &self,
        handle: &SpatialListenerHandle,
    ) -> Vec<GridCell> {
        if handle.router_id() != Some(self.inner.id) {
            return Vec::new();
        }
        self.inner
            .state
            .lock()
            .index
            .cells_of(handle.id())
            .unwrap_or_default()
    }

    pub fn cell_listener_ids(
        &self,
        cell: GridCell,
    ) -> Vec<HandleId> {
        self.inner.state.lock().index.cell_listener_ids(cell)
    }

    /// Текущие позиция и радиус слушателя.
    pub fn footprint(
        &self,
        handle: &SpatialListenerHandle,
    ) -> Option<Footprint> {
        if handle.router_id() != Some(self.inner.id) {
            return None;
        }
        self.inner.state.lock().index.footprint(handle.id())
    }

    pub fn is_registered(
        &self,
        handle: &SpatialListenerHandle,
    ) -> bool {
        handle.router_id() == Some(self.inner.id)
            && self.inner.state.lock().index.contains(handle.id())
    }

    /// Проверяет согласованность сетки и обратного индекса.
    pub fn check_consistency(&self) -> Result<(), RouterError> {
        self.inner.state.lock().index.check_consistency()
    }

    fn check_owner(
        &self,
        handle: &SpatialListenerHandle,
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
        Ok(())
    }

    fn check_cell_budget(
        &self,
        id: HandleId,
        cells: usize,
    ) {
        let budget = self.inner.config.max_listener_cells;
        if cells > budget {
            warn!(
                router = %self.inner.id,
                listener = %id,
                cells,
                budget,
                "Listener spans more grid cells than the configured budget"
            );
        }
    }

    fn evict(
        &self,
        id: HandleId,
    ) {
        if let Err(err) = self.inner.state.lock().index.remove(id) {
            debug!(listener = %id, %err, "Stale spatial listener already removed");
        }
    }
}

/// `None` для нечислового или отрицательного радиуса.
fn sanitize_radius(radius: f64) -> Option<f64> {
    (radius.is_finite() && radius >= 0.0).then_some(radius)
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для SpatialRouter
////////////////////////////////////////////////////////////////////////////////

impl Default for SpatialRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastControl for SpatialRouter {
    fn cancel_current(
        &self,
        cancel: bool,
        interrupt: bool,
    ) {
        cancel_on(&self.inner.contexts, cancel, interrupt);
    }
}

impl std::fmt::Debug for SpatialRouter {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SpatialRouter")
            .field("id", &self.inner.id)
            .field("cell_size", &self.inner.config.cell_size)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ListenerHost for SpatialInner {
    fn release(
        &self,
        _payload_type: Option<&PayloadTypeKey>,
        id: HandleId,
    ) -> Result<(), RouterError> {
        self.state.lock().index.remove(id)?;
        debug!(router = %self.id, listener = %id, "Spatial listener unregistered");
        Ok(())
    }
}

impl Drop for SpatialInner {
    fn drop(&mut self) {
        forget_router(self.id);
        debug!(router = %self.id, "Spatial router dropped");
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::capture_logs;

    #[derive(Debug, Clone)]
    struct Noise;

    fn router() -> SpatialRouter {
        SpatialRouter::with_config(RouterConfig {
            cell_size: 100.0,
            ..RouterConfig::default()
        })
    }

    #[test]
    fn test_invalid_radius_is_clamped() {
        let router = router();
        let handle = router.register_simple_listener::<Noise, _>(
            WorldPoint::new(10.0, 10.0, 0.0),
            -50.0,
            Priority::DEFAULT,
            |_| {},
        );
        assert_eq!(router.footprint(&handle).unwrap().radius, 0.0);
        assert_eq!(router.cells_of(&handle), vec![GridCell::from_coords(0, 0)]);
    }

    #[test]
    fn test_update_rejects_non_finite_position() {
        let router = router();
        let handle = router.register_simple_listener::<Noise, _>(
            WorldPoint::ORIGIN,
            10.0,
            Priority::DEFAULT,
            |_| {},
        );
        assert!(matches!(
            router.try_update_listener_location(
                &handle,
                WorldPoint::new(f64::NAN, 0.0, 0.0),
                None
            ),
            Err(RouterError::InvalidPosition { .. })
        ));
        assert!(!router.update_listener_location(
            &handle,
            WorldPoint::ORIGIN,
            Some(f64::INFINITY)
        ));
        assert_eq!(router.footprint(&handle).unwrap().position, WorldPoint::ORIGIN);
    }

    /// Тест проверяет, что отрицательный радиус при перемещении сохраняет
    /// прежний.
    #[test]
    fn test_negative_radius_keeps_previous() {
        let router = router();
        let handle = router.register_simple_listener::<Noise, _>(
            WorldPoint::ORIGIN,
            25.0,
            Priority::DEFAULT,
            |_| {},
        );
        assert!(router.update_listener_location(&handle, WorldPoint::new(300.0, 0.0, 0.0), Some(-1.0)));
        let footprint = router.footprint(&handle).unwrap();
        assert_eq!(footprint.radius, 25.0);
        assert_eq!(footprint.position, WorldPoint::new(300.0, 0.0, 0.0));
        assert!(router.check_consistency().is_ok());
    }

    #[test]
    fn test_foreign_handle_update() {
        let a = router();
        let b = router();
        let handle = a.register_simple_listener::<Noise, _>(
            WorldPoint::ORIGIN,
            10.0,
            Priority::DEFAULT,
            |_| {},
        );
        assert!(matches!(
            b.try_update_listener_location(&handle, WorldPoint::ORIGIN, None),
            Err(RouterError::ForeignHandle { .. })
        ));
        assert!(b.cells_of(&handle).is_empty());
    }

    #[test]
    fn test_clear() {
        let router = router();
        let mut handle = router.register_simple_listener::<Noise, _>(
            WorldPoint::ORIGIN,
            150.0,
            Priority::DEFAULT,
            |_| {},
        );
        assert!(router.cell_count() > 1);
        router.clear();
        assert_eq!(router.cell_count(), 0);
        assert!(matches!(
            router.try_unregister(&mut handle),
            Err(RouterError::UnknownListener { .. })
        ));
    }

    /// Тест проверяет, что нулевой размер ячейки заменяется значением по
    /// умолчанию.
    #[test]
    fn test_invalid_cell_size_falls_back() {
        let router = SpatialRouter::with_config(RouterConfig {
            cell_size: 0.0,
            ..RouterConfig::default()
        });
        assert_eq!(router.cell_size(), crate::spatial::DEFAULT_CELL_SIZE);
    }

    /// Тест проверяет предупреждение, когда радиус слушателя задевает больше
    /// ячеек, чем разрешено `max_listener_cells`.
    #[test]
    fn test_cell_budget_warning() {
        let router = SpatialRouter::with_config(RouterConfig {
            cell_size: 100.0,
            max_listener_cells: 4,
            ..RouterConfig::default()
        });
        let channel = Channel::new("World").unwrap();

        let out = capture_logs(|| {
            let small = router.register_listener::<Noise, _>(
                &channel,
                SpatialListenerParams::new(WorldPoint::new(50.0, 50.0, 0.0), 10.0),
                |_| {},
            );
            assert_eq!(router.cells_of(&small).len(), 1);
        });
        assert!(!out.contains("configured budget"), "got: {out}");

        let out = capture_logs(|| {
            let wide = router.register_listener::<Noise, _>(
                &channel,
                SpatialListenerParams::new(WorldPoint::new(50.0, 50.0, 0.0), 250.0),
                |_| {},
            );
            assert!(router.cells_of(&wide).len() > 4);
            assert!(router.is_registered(&wide));
        });
        assert!(out.contains("configured budget"), "got: {out}");
        assert!(out.contains("budget=4"), "got: {out}");
        router.check_consistency().unwrap();
    }

    /// Тест проверяет, что нулевой бюджет ячеек заменяется значением по
    /// умолчанию.
    #[test]
    fn test_zero_cell_budget_falls_back() {
        let router = SpatialRouter::with_config(RouterConfig {
            max_listener_cells: 0,
            ..RouterConfig::default()
        });
        assert_eq!(
            router.config().max_listener_cells,
            crate::config::DEFAULT_MAX_LISTENER_CELLS
        );
        assert_eq!(router.cell_size(), crate::spatial::DEFAULT_CELL_SIZE);
    }
}
