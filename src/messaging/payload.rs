use std::{
    any::{type_name, Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use super::intern_rust_type;

/// Непрозрачный ключ типа полезной нагрузки.
///
/// Два вида ключей:
/// - `of::<T>()`: статический Rust-тип, интернируется и живёт вечно;
/// - `declare(name)`: динамически объявленный тип (скрипты, горячая
///   перезагрузка). Такой ключ можно "retire": все слушатели, подписанные на
///   него, будут выселены при ближайшей рассылке.
///
/// Равенство и хеш определяются идентичностью ключа, а не его именем.
#[derive(Clone)]
pub struct PayloadTypeKey(Arc<PayloadTypeInfo>);

struct PayloadTypeInfo {
    name: Arc<str>,
    rust_type: Option<TypeId>,
    live: AtomicBool,
}

/// Идентификатор цели для фильтрации по идентичности.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl PayloadTypeKey {
    /// Ключ для Rust-типа `T`. Повторные вызовы возвращают тот же ключ.
    pub fn of<T: Any>() -> Self {
        intern_rust_type(TypeId::of::<T>(), || {
            Self(Arc::new(PayloadTypeInfo {
                name: Arc::from(type_name::<T>()),
                rust_type: Some(TypeId::of::<T>()),
                live: AtomicBool::new(true),
            }))
        })
    }

    /// Объявляет новый динамический тип. Каждый вызов создаёт отдельный ключ,
    /// даже при совпадающем имени.
    pub fn declare(name: impl Into<Arc<str>>) -> Self {
        Self(Arc::new(PayloadTypeInfo {
            name: name.into(),
            rust_type: None,
            live: AtomicBool::new(true),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// `TypeId` для ключей, созданных через [`PayloadTypeKey::of`].
    pub fn rust_type(&self) -> Option<TypeId> {
        self.0.rust_type
    }

    pub fn is_dynamic(&self) -> bool {
        self.0.rust_type.is_none()
    }

    pub fn is_live(&self) -> bool {
        self.0.live.load(Ordering::Acquire)
    }

    /// Выводит динамический тип из обращения.
    ///
    /// Возвращает `false` для статических Rust-типов: они не умирают.
    pub fn retire(&self) -> bool {
        if !self.is_dynamic() {
            return false;
        }
        self.0.live.store(false, Ordering::Release);
        true
    }

    /// Проверяет, что значение может быть полезной нагрузкой этого типа.
    ///
    /// Динамические ключи принимают любое значение.
    pub fn accepts(
        &self,
        payload: &dyn Any,
    ) -> bool {
        match self.0.rust_type {
            Some(id) => payload.type_id() == id,
            None => true,
        }
    }
}

impl TargetId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для PayloadTypeKey
////////////////////////////////////////////////////////////////////////////////

impl PartialEq for PayloadTypeKey {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for PayloadTypeKey {}

impl Hash for PayloadTypeKey {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for PayloadTypeKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("PayloadTypeKey")
            .field("name", &self.name())
            .field("dynamic", &self.is_dynamic())
            .field("live", &self.is_live())
            .finish()
    }
}

impl fmt::Display for PayloadTypeKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TargetId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct Damage;
    struct Heal;

    #[test]
    fn test_rust_type_keys_are_interned() {
        assert_eq!(PayloadTypeKey::of::<Damage>(), PayloadTypeKey::of::<Damage>());
        assert_ne!(PayloadTypeKey::of::<Damage>(), PayloadTypeKey::of::<Heal>());
        assert!(PayloadTypeKey::of::<Damage>().name().ends_with("Damage"));
    }

    /// Тест проверяет, что одинаковое имя не делает динамические типы равными.
    #[test]
    fn test_declared_keys_are_distinct() {
        let a = PayloadTypeKey::declare("ScriptEvent");
        let b = PayloadTypeKey::declare("ScriptEvent");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let set: HashSet<_> = [a.clone(), b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_retire() {
        let key = PayloadTypeKey::declare("Reloaded");
        let clone = key.clone();
        assert!(clone.is_live());
        assert!(key.retire());
        assert!(!clone.is_live());

        let rust = PayloadTypeKey::of::<Heal>();
        assert!(!rust.retire());
        assert!(rust.is_live());
    }

    #[test]
    fn test_accepts() {
        let key = PayloadTypeKey::of::<u32>();
        assert!(key.accepts(&5u32));
        assert!(!key.accepts(&5u64));
        assert!(PayloadTypeKey::declare("Any").accepts(&"anything"));
    }
}
