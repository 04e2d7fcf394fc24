use std::{fmt::Debug, hash::Hash};

use rustc_hash::FxHashMap;

use super::{HandleId, ListenerEntry, Priority};

/// Запись, которую можно хранить в упорядоченном списке слушателей.
pub trait RegistryEntry: Clone {
    fn handle_id(&self) -> HandleId;
    fn priority(&self) -> Priority;
}

/// Список слушателей, упорядоченный по приоритету.
///
/// При равных приоритетах сохраняется порядок регистрации.
#[derive(Debug, Clone)]
pub struct ListenerList<E> {
    entries: Vec<E>,
}

/// Отображение ключа (тип полезной нагрузки или ячейка сетки) в список
/// слушателей. Пустые списки удаляются.
#[derive(Debug)]
pub struct ListenerRegistry<K, E> {
    lists: FxHashMap<K, ListenerList<E>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<E: RegistryEntry> ListenerList<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Вставляет запись после всех записей с приоритетом `<=` её приоритета.
    /// Позиция ищется с хвоста.
    pub fn insert(
        &mut self,
        entry: E,
    ) {
        let priority = entry.priority();
        let mut pos = self.entries.len();
        while pos > 0 && self.entries[pos - 1].priority() > priority {
            pos -= 1;
        }
        self.entries.insert(pos, entry);
    }

    pub fn remove(
        &mut self,
        id: HandleId,
    ) -> Option<E> {
        let pos = self.entries.iter().position(|e| e.handle_id() == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn get(
        &self,
        id: HandleId,
    ) -> Option<&E> {
        self.entries.iter().find(|e| e.handle_id() == id)
    }

    /// Изменяет запись на месте. Приоритет менять нельзя: порядок не
    /// пересчитывается.
    pub fn get_mut(
        &mut self,
        id: HandleId,
    ) -> Option<&mut E> {
        self.entries.iter_mut().find(|e| e.handle_id() == id)
    }

    pub fn contains(
        &self,
        id: HandleId,
    ) -> bool {
        self.get(id).is_some()
    }

    /// Копия списка для обхода без удержания блокировки.
    pub fn snapshot(&self) -> Vec<E> {
        self.entries.clone()
    }

    pub fn ids(&self) -> Vec<HandleId> {
        self.entries.iter().map(RegistryEntry::handle_id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, E> ListenerRegistry<K, E>
where
    K: Eq + Hash + Clone + Debug,
    E: RegistryEntry,
{
    pub fn new() -> Self {
        Self {
            lists: FxHashMap::default(),
        }
    }

    pub fn insert(
        &mut self,
        key: K,
        entry: E,
    ) {
        self.lists.entry(key).or_default().insert(entry);
    }

    /// Удаляет запись; при опустевшем списке удаляет и ключ.
    pub fn remove(
        &mut self,
        key: &K,
        id: HandleId,
    ) -> Option<E> {
        let list = self.lists.get_mut(key)?;
        let removed = list.remove(id);
        if list.is_empty() {
            self.lists.remove(key);
        }
        removed
    }

    pub fn list(
        &self,
        key: &K,
    ) -> Option<&ListenerList<E>> {
        self.lists.get(key)
    }

    pub fn get_mut(
        &mut self,
        key: &K,
        id: HandleId,
    ) -> Option<&mut E> {
        self.lists.get_mut(key)?.get_mut(id)
    }

    pub fn contains(
        &self,
        key: &K,
        id: HandleId,
    ) -> bool {
        self.lists.get(key).is_some_and(|list| list.contains(id))
    }

    /// Снимок списка для ключа, `None` если слушателей нет.
    pub fn candidates(
        &self,
        key: &K,
    ) -> Option<Vec<E>> {
        self.lists.get(key).map(ListenerList::snapshot)
    }

    /// Ищет ключ, под которым хранится запись. Линейный обход всех списков.
    pub fn find_key(
        &self,
        id: HandleId,
    ) -> Option<&K> {
        self.lists
            .iter()
            .find(|(_, list)| list.contains(id))
            .map(|(key, _)| key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.lists.keys()
    }

    /// Количество ключей с непустыми списками.
    pub fn key_count(&self) -> usize {
        self.lists.len()
    }

    /// Общее количество записей во всех списках.
    pub fn entry_count(&self) -> usize {
        self.lists.values().map(ListenerList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<E: RegistryEntry> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> Default for ListenerRegistry<K, E>
where
    K: Eq + Hash + Clone + Debug,
    E: RegistryEntry,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> RegistryEntry for ListenerEntry<R> {
    fn handle_id(&self) -> HandleId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
