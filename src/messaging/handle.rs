use std::{
    fmt,
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use dashmap::DashMap;
use gridcast_error::RouterError;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::PayloadTypeKey;

/// Идентификатор слушателя внутри маршрутизатора. `0` означает недействительный.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(u64);

/// Идентификатор экземпляра маршрутизатора, уникальный в пределах процесса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouterId(u64);

/// Вид маршрутизатора, выдавшего handle.
pub trait HandleKind: sealed::Sealed + Send + Sync + 'static {
    const NAME: &'static str;
}

/// Handle обычного маршрутизатора.
pub enum Plain {}

/// Handle пространственного маршрутизатора.
pub enum Spatial {}

/// Handle зарегистрированного слушателя.
///
/// Сам по себе ничего не удерживает: при уничтожении handle слушатель
/// остаётся зарегистрированным. После `unregister` handle обнуляется,
/// повторный вызов ничего не делает.
pub struct Handle<K: HandleKind> {
    router: Option<RouterId>,
    payload_type: Option<PayloadTypeKey>,
    id: HandleId,
    _kind: PhantomData<fn() -> K>,
}

pub type ListenerHandle = Handle<Plain>;
pub type SpatialListenerHandle = Handle<Spatial>;

/// Маршрутизатор, которому handle может вернуть слушателя.
pub(crate) trait ListenerHost: Send + Sync {
    fn release(
        &self,
        payload_type: Option<&PayloadTypeKey>,
        id: HandleId,
    ) -> Result<(), RouterError>;
}

static NEXT_ROUTER_ID: AtomicU64 = AtomicU64::new(1);

/// Живые маршрутизаторы процесса. Запись удаляется при уничтожении
/// маршрутизатора, поэтому handle переживает его без висячих ссылок.
static LIVE_ROUTERS: Lazy<DashMap<RouterId, Weak<dyn ListenerHost>>> = Lazy::new(DashMap::new);

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Plain {}
    impl Sealed for super::Spatial {}
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl HandleId {
    pub const INVALID: HandleId = HandleId(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl RouterId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ROUTER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl<K: HandleKind> Handle<K> {
    pub(crate) fn new(
        router: RouterId,
        payload_type: PayloadTypeKey,
        id: HandleId,
    ) -> Self {
        Self {
            router: Some(router),
            payload_type: Some(payload_type),
            id,
            _kind: PhantomData,
        }
    }

    /// Пустой handle, не связанный ни с каким слушателем.
    pub fn invalid() -> Self {
        Self {
            router: None,
            payload_type: None,
            id: HandleId::INVALID,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn router_id(&self) -> Option<RouterId> {
        self.router
    }

    pub fn payload_type(&self) -> Option<&PayloadTypeKey> {
        self.payload_type.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.id.is_valid() && self.router.is_some()
    }

    /// Снимает слушателя с регистрации через выдавший handle маршрутизатор.
    ///
    /// Если маршрутизатор уже уничтожен, только обнуляет handle.
    pub fn unregister(&mut self) {
        if let Err(err) = self.try_unregister() {
            match err {
                RouterError::RouterGone { .. } => debug!(%err, "Handle outlived its router"),
                _ => warn!(kind = K::NAME, %err, "Failed to unregister listener"),
            }
        }
    }

    /// Как [`Handle::unregister`], но возвращает причину неудачи. Handle
    /// обнуляется в любом случае, кроме недействительного.
    pub fn try_unregister(&mut self) -> Result<(), RouterError> {
        let Some(router) = self.router.filter(|_| self.id.is_valid()) else {
            return Err(RouterError::InvalidHandle);
        };
        let result = match resolve(router) {
            Some(host) => host.release(self.payload_type.as_ref(), self.id),
            None => Err(RouterError::RouterGone { router: router.0 }),
        };
        self.reset();
        result
    }

    pub(crate) fn reset(&mut self) {
        self.router = None;
        self.payload_type = None;
        self.id = HandleId::INVALID;
    }
}

/// Регистрирует маршрутизатор в таблице живых.
pub(crate) fn register_router(
    id: RouterId,
    host: Weak<dyn ListenerHost>,
) {
    LIVE_ROUTERS.insert(id, host);
}

pub(crate) fn forget_router(id: RouterId) {
    LIVE_ROUTERS.remove(&id);
}

fn resolve(id: RouterId) -> Option<Arc<dyn ListenerHost>> {
    LIVE_ROUTERS.get(&id).and_then(|weak| weak.upgrade())
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl HandleKind for Plain {
    const NAME: &'static str = "plain";
}

impl HandleKind for Spatial {
    const NAME: &'static str = "spatial";
}

impl<K: HandleKind> Default for Handle<K> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<K: HandleKind> Clone for Handle<K> {
    fn clone(&self) -> Self {
        Self {
            router: self.router,
            payload_type: self.payload_type.clone(),
            id: self.id,
            _kind: PhantomData,
        }
    }
}

impl<K: HandleKind> PartialEq for Handle<K> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.router == other.router && self.id == other.id
    }
}

impl<K: HandleKind> Eq for Handle<K> {}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &K::NAME)
            .field("router", &self.router.map(RouterId::get))
            .field("id", &self.id.0)
            .field("payload_type", &self.payload_type.as_ref().map(|k| k.name()))
            .finish()
    }
}

impl fmt::Display for HandleId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RouterId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "router#{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
