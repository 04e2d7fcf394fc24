//! Равномерная двумерная сетка на плоскости XY.
//!
//! Ячейка кодируется одним `i64`: старшие 32 бита хранят индекс по X, младшие
//! индекс по Y. Ось Z в сетке не участвует.

use std::fmt;

use super::{BoundingBox, WorldPoint};

/// Размер ячейки по умолчанию в мировых единицах.
pub const DEFAULT_CELL_SIZE: f64 = 1600.0;

/// Ключ ячейки сетки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridCell(i64);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl GridCell {
    pub const fn from_coords(
        ix: i32,
        iy: i32,
    ) -> Self {
        Self(((ix as i64) << 32) | (iy as i64 & 0xFFFF_FFFF))
    }

    pub const fn from_key(key: i64) -> Self {
        Self(key)
    }

    /// Индексы ячейки `(ix, iy)`.
    pub const fn coords(self) -> (i32, i32) {
        ((self.0 >> 32) as i32, self.0 as i32)
    }

    pub const fn key(self) -> i64 {
        self.0
    }
}

/// Индекс ячейки вдоль одной оси. Насыщается на границах `i32`.
pub fn cell_coord(
    value: f64,
    cell_size: f64,
) -> i32 {
    (value / cell_size).floor() as i32
}

/// Ячейка, содержащая проекцию точки на XY.
pub fn cell_of(
    position: &WorldPoint,
    cell_size: f64,
) -> GridCell {
    GridCell::from_coords(
        cell_coord(position.x, cell_size),
        cell_coord(position.y, cell_size),
    )
}

/// Границы ячейки.
pub fn cell_bounds(
    cell: GridCell,
    cell_size: f64,
) -> BoundingBox {
    let (ix, iy) = cell.coords();
    let min_x = f64::from(ix) * cell_size;
    let min_y = f64::from(iy) * cell_size;
    BoundingBox {
        min_x,
        max_x: min_x + cell_size,
        min_y,
        max_y: min_y + cell_size,
    }
}

/// Центр ячейки с `z = 0`.
pub fn cell_center(
    cell: GridCell,
    cell_size: f64,
) -> WorldPoint {
    let bounds = cell_bounds(cell, cell_size);
    WorldPoint::new(
        (bounds.min_x + bounds.max_x) * 0.5,
        (bounds.min_y + bounds.max_y) * 0.5,
        0.0,
    )
}

/// Ячейки, которые пересекает круг радиуса `radius` вокруг `center`.
///
/// Перебираются ячейки ограничивающего квадрата; ячейка попадает в результат,
/// если ближайшая к центру точка ячейки лежит в пределах радиуса. Для
/// отрицательного или бесконечного радиуса результат пуст. Число ячеек
/// не ограничено и растёт квадратично с `radius / cell_size`.
pub fn cells_in_radius(
    center: &WorldPoint,
    radius: f64,
    cell_size: f64,
) -> Vec<GridCell> {
    if !radius.is_finite() || radius < 0.0 {
        return Vec::new();
    }
    let bbox = BoundingBox::around(center, radius);
    let radius_sq = radius * radius;
    let (min_x, max_x) = (
        cell_coord(bbox.min_x, cell_size),
        cell_coord(bbox.max_x, cell_size),
    );
    let (min_y, max_y) = (
        cell_coord(bbox.min_y, cell_size),
        cell_coord(bbox.max_y, cell_size),
    );

    let mut cells = Vec::new();
    for ix in min_x..=max_x {
        for iy in min_y..=max_y {
            let cell = GridCell::from_coords(ix, iy);
            let closest = cell_bounds(cell, cell_size).closest_point(center);
            if closest.distance_squared(center) <= radius_sq {
                cells.push(cell);
            }
        }
    }
    cells
}

/// Множество ячеек слушателя: пересечённые кругом или, если таких нет,
/// ячейка позиции.
pub fn listener_cells(
    position: &WorldPoint,
    radius: f64,
    cell_size: f64,
) -> Vec<GridCell> {
    let cells = cells_in_radius(position, radius, cell_size);
    if cells.is_empty() {
        vec![cell_of(position, cell_size)]
    } else {
        cells
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для GridCell
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for GridCell {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let (ix, iy) = self.coords();
        write!(f, "[{ix}, {iy}]")
    }
}

impl From<GridCell> for i64 {
    fn from(cell: GridCell) -> Self {
        cell.0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
