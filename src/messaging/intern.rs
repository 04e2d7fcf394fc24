use std::{any::TypeId, sync::Arc};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::PayloadTypeKey;

/// Пул для повторного использования Arc<str> по одинаковым именам каналов.
/// Записи не удаляются до завершения процесса.
static CHANNEL_INTERN: Lazy<DashMap<String, Arc<str>>> = Lazy::new(DashMap::new);

/// Ключи типов payload, объявленных через `PayloadTypeKey::of::<T>()`.
static RUST_TYPES: Lazy<DashMap<TypeId, PayloadTypeKey>> = Lazy::new(DashMap::new);

/// Возвращает interned Arc<str> для данного канала.
/// При первом вызове для нового имени создаёт Arc<str> и сохраняет его в пуле.
#[inline(always)]
pub(crate) fn intern_channel<S: AsRef<str>>(chan: S) -> Arc<str> {
    let key = chan.as_ref();
    if let Some(existing) = CHANNEL_INTERN.get(key) {
        return existing.clone();
    }
    CHANNEL_INTERN
        .entry(key.to_string())
        .or_insert_with(|| Arc::from(key))
        .clone()
}

/// Возвращает единственный ключ для Rust-типа `T`.
///
/// `entry` держит шард под блокировкой, поэтому два потока, впервые
/// запросившие один тип, получат один и тот же ключ.
pub(crate) fn intern_rust_type(
    type_id: TypeId,
    make: impl FnOnce() -> PayloadTypeKey,
) -> PayloadTypeKey {
    if let Some(existing) = RUST_TYPES.get(&type_id) {
        return existing.clone();
    }
    RUST_TYPES.entry(type_id).or_insert_with(make).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Проверяет, что при первом вызове создаётся Arc<str> с правильным содержимым,
    /// а при повторном возвращается тот же самый объект (zero-copy).
    #[test]
    fn intern_new_and_repeats() {
        let a1 = intern_channel("Combat.Damage");
        assert_eq!(&*a1, "Combat.Damage");

        let a2 = intern_channel("Combat.Damage");
        assert!(
            Arc::ptr_eq(&a1, &a2),
            "Должен вернуть тот же Arc по указателю"
        );
    }

    /// Проверяет, что для разных имён каналов создаются разные Arc<str>.
    #[test]
    fn intern_different_keys() {
        let a1 = intern_channel("Ui.Open");
        let a2 = intern_channel("Ui.Close");
        assert!(!Arc::ptr_eq(&a1, &a2), "Разные ключи - разные Arc");
    }

    /// Проверяет, что при конкурентных вызовах `intern_channel`
    /// для одинаковых строк в разных потоках возвращается один и тот же `Arc<str>`.
    #[test]
    fn intern_concurrent() {
        let keys = ["A.B", "A.C", "A.B", "A.D", "A.C", "A.B"];
        let handles: Vec<_> = keys
            .iter()
            .map(|&k| std::thread::spawn(move || intern_channel(k)))
            .collect();

        let arcs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let first = arcs[0].clone();
        for arc in arcs.iter().filter(|arc| arc.as_ref() == "A.B") {
            assert!(Arc::ptr_eq(&first, arc));
        }
    }

    /// Проверяет, что запись пула переживает все каналы с этим именем, а
    /// повторный разбор имени возвращает тот же Arc.
    #[test]
    fn intern_entries_outlive_channels() {
        let first = crate::Channel::new("Intern.Retained").unwrap();
        let ptr = Arc::as_ptr(&intern_channel(first.as_str()));
        drop(first);

        assert!(CHANNEL_INTERN.contains_key("Intern.Retained"));
        let again = crate::Channel::new("Intern.Retained").unwrap();
        assert_eq!(Arc::as_ptr(&intern_channel(again.as_str())), ptr);
    }

    #[test]
    fn intern_rust_type_is_stable() {
        struct Marker;
        let a = intern_rust_type(TypeId::of::<Marker>(), || {
            PayloadTypeKey::declare("Marker")
        });
        let b = intern_rust_type(TypeId::of::<Marker>(), || {
            PayloadTypeKey::declare("Other")
        });
        assert_eq!(a, b);
        assert_eq!(b.name(), "Marker");
    }
}
