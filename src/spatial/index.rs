use gridcast_error::RouterError;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use super::{cell_of, listener_cells, GridCell, WorldPoint};
use crate::messaging::{
    DispatchEntry, HandleId, ListenerEntry, ListenerRegistry, Priority, RegistryEntry,
};

/// Запись пространственного слушателя. Копия хранится в каждой ячейке,
/// которую задевает круг слышимости.
pub struct SpatialListenerEntry<R> {
    pub listener: ListenerEntry<R>,
    pub position: WorldPoint,
    pub radius: f64,
}

/// Позиция и радиус слушателя: из них однозначно выводится множество ячеек.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub position: WorldPoint,
    pub radius: f64,
}

/// Итог перемещения слушателя.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocateStats {
    /// Ячейки, из которых слушатель удалён.
    pub left: usize,
    /// Ячейки, в которые слушатель добавлен.
    pub entered: usize,
    /// Ячейки, где запись обновлена на месте.
    pub kept: usize,
}

/// Сеточный индекс слушателей с обратным индексом по идентификатору.
pub struct SpatialIndex<R> {
    cell_size: f64,
    cells: ListenerRegistry<GridCell, SpatialListenerEntry<R>>,
    footprints: FxHashMap<HandleId, Footprint>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Footprint {
    pub fn cells(
        &self,
        cell_size: f64,
    ) -> Vec<GridCell> {
        listener_cells(&self.position, self.radius, cell_size)
    }

    /// Слышит ли слушатель рассылку из точки `from`.
    pub fn hears(
        &self,
        from: &WorldPoint,
    ) -> bool {
        self.position.distance_squared(from) <= self.radius * self.radius
    }
}

impl<R> SpatialListenerEntry<R> {
    pub fn footprint(&self) -> Footprint {
        Footprint {
            position: self.position,
            radius: self.radius,
        }
    }
}

impl<R> SpatialIndex<R> {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: ListenerRegistry::new(),
            footprints: FxHashMap::default(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Добавляет запись во все ячейки её круга. Возвращает число ячеек.
    pub fn insert(
        &mut self,
        entry: SpatialListenerEntry<R>,
    ) -> usize {
        let id = entry.listener.id;
        let footprint = entry.footprint();
        let cells = footprint.cells(self.cell_size);
        for cell in &cells {
            self.cells.insert(*cell, entry.clone());
        }
        self.footprints.insert(id, footprint);
        cells.len()
    }

    /// Удаляет слушателя из всех его ячеек.
    ///
    /// Ячейки пересчитываются из сохранённых позиции и радиуса. Отсутствие
    /// записи в ожидаемой ячейке логируется, удаление продолжается.
    pub fn remove(
        &mut self,
        id: HandleId,
    ) -> Result<SpatialListenerEntry<R>, RouterError> {
        let footprint = self
            .footprints
            .remove(&id)
            .ok_or(RouterError::UnknownListener { handle_id: id.get() })?;

        let cells = footprint.cells(self.cell_size);
        let mut removed = None;
        for cell in &cells {
            match self.cells.remove(cell, id) {
                Some(entry) => {
                    removed.get_or_insert(entry);
                }
                None => warn!(
                    listener = %id,
                    cell = %cell,
                    "Listener missing from an expected grid cell during removal"
                ),
            }
        }

        removed.ok_or(RouterError::SpatialConsistency {
            handle_id: id.get(),
            cell: cells.first().map_or(0, |c| c.key()),
        })
    }

    /// Перемещает слушателя, меняя только разность старого и нового
    /// множеств ячеек. `None` в `radius` сохраняет прежний радиус.
    pub fn relocate(
        &mut self,
        id: HandleId,
        position: WorldPoint,
        radius: Option<f64>,
    ) -> Result<RelocateStats, RouterError> {
        let old = *self
            .footprints
            .get(&id)
            .ok_or(RouterError::UnknownListener { handle_id: id.get() })?;
        let new = Footprint {
            position,
            radius: radius.unwrap_or(old.radius),
        };

        let old_cells: FxHashSet<GridCell> = old.cells(self.cell_size).into_iter().collect();
        let new_cells: FxHashSet<GridCell> = new.cells(self.cell_size).into_iter().collect();

        let template = old_cells
            .iter()
            .find_map(|cell| self.cells.list(cell).and_then(|list| list.get(id)))
            .cloned()
            .ok_or_else(|| RouterError::SpatialConsistency {
                handle_id: id.get(),
                cell: old_cells.iter().next().map_or(0, |c| c.key()),
            })?;
        let moved = SpatialListenerEntry {
            position: new.position,
            radius: new.radius,
            ..template
        };

        let mut stats = RelocateStats::default();
        for cell in old_cells.difference(&new_cells) {
            if self.cells.remove(cell, id).is_none() {
                warn!(listener = %id, cell = %cell, "Listener missing from a cell it is leaving");
            }
            stats.left += 1;
        }
        for cell in new_cells.difference(&old_cells) {
            self.cells.insert(*cell, moved.clone());
            stats.entered += 1;
        }
        for cell in old_cells.intersection(&new_cells) {
            match self.cells.get_mut(cell, id) {
                Some(entry) => {
                    entry.position = new.position;
                    entry.radius = new.radius;
                }
                None => {
                    warn!(listener = %id, cell = %cell, "Listener missing from a cell it stays in, re-inserting");
                    self.cells.insert(*cell, moved.clone());
                }
            }
            stats.kept += 1;
        }

        self.footprints.insert(id, new);
        Ok(stats)
    }

    /// Снимок слушателей ячейки, содержащей `position`.
    pub fn candidates_at(
        &self,
        position: &WorldPoint,
    ) -> Option<Vec<SpatialListenerEntry<R>>> {
        self.cells.candidates(&cell_of(position, self.cell_size))
    }

    pub fn footprint(
        &self,
        id: HandleId,
    ) -> Option<Footprint> {
        self.footprints.get(&id).copied()
    }

    pub fn contains(
        &self,
        id: HandleId,
    ) -> bool {
        self.footprints.contains_key(&id)
    }

    /// Ячейки слушателя в порядке возрастания ключа.
    pub fn cells_of(
        &self,
        id: HandleId,
    ) -> Option<Vec<GridCell>> {
        let mut cells = self.footprints.get(&id)?.cells(self.cell_size);
        cells.sort_unstable();
        Some(cells)
    }

    /// Идентификаторы слушателей ячейки в порядке вызова.
    pub fn cell_listener_ids(
        &self,
        cell: GridCell,
    ) -> Vec<HandleId> {
        self.cells
            .list(&cell)
            .map(|list| list.ids())
            .unwrap_or_default()
    }

    /// Количество непустых ячеек.
    pub fn cell_count(&self) -> usize {
        self.cells.key_count()
    }

    pub fn listener_count(&self) -> usize {
        self.footprints.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.footprints.clear();
    }

    /// Сверяет сетку с обратным индексом: каждый слушатель присутствует ровно
    /// в ячейках своего круга, и в сетке нет лишних записей.
    pub fn check_consistency(&self) -> Result<(), RouterError> {
        let mut expected = 0;
        for (id, footprint) in &self.footprints {
            for cell in footprint.cells(self.cell_size) {
                if !self.cells.contains(&cell, *id) {
                    return Err(RouterError::SpatialConsistency {
                        handle_id: id.get(),
                        cell: cell.key(),
                    });
                }
                expected += 1;
            }
        }

        let actual = self.cells.entry_count();
        if actual != expected {
            let stray = self.cells.keys().find_map(|cell| {
                self.cells.list(cell).and_then(|list| {
                    list.iter()
                        .find(|e| !self.expects(e.listener.id, *cell))
                        .map(|e| (e.listener.id, *cell))
                })
            });
            let (id, cell) = stray.unwrap_or((HandleId::INVALID, GridCell::from_key(0)));
            return Err(RouterError::SpatialConsistency {
                handle_id: id.get(),
                cell: cell.key(),
            });
        }
        Ok(())
    }

    fn expects(
        &self,
        id: HandleId,
        cell: GridCell,
    ) -> bool {
        self.footprints
            .get(&id)
            .is_some_and(|fp| fp.cells(self.cell_size).contains(&cell))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<R> Clone for SpatialListenerEntry<R> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            position: self.position,
            radius: self.radius,
        }
    }
}

impl<R> std::fmt::Debug for SpatialListenerEntry<R> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SpatialListenerEntry")
            .field("listener", &self.listener)
            .field("position", &self.position)
            .field("radius", &self.radius)
            .finish()
    }
}

impl<R> RegistryEntry for SpatialListenerEntry<R> {
    fn handle_id(&self) -> HandleId {
        self.listener.id
    }

    fn priority(&self) -> Priority {
        self.listener.priority
    }
}

impl<R> DispatchEntry<R> for SpatialListenerEntry<R> {
    fn listener(&self) -> &ListenerEntry<R> {
        &self.listener
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
