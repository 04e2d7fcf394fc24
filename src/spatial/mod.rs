pub mod geometry;
pub mod grid;
pub mod index;
pub mod router;

// Пространственный вариант маршрутизатора: геометрия, сетка и индекс.
pub use geometry::*;
pub use grid::*;
pub use index::*;
pub use router::*;
