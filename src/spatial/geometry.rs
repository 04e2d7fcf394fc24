use std::fmt;

/// Точка в мировых координатах.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Прямоугольник на плоскости XY.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl WorldPoint {
    pub const ORIGIN: WorldPoint = WorldPoint::new(0.0, 0.0, 0.0);

    pub const fn new(
        x: f64,
        y: f64,
        z: f64,
    ) -> Self {
        Self { x, y, z }
    }

    /// Квадрат евклидова расстояния в трёх измерениях.
    pub fn distance_squared(
        &self,
        other: &WorldPoint,
    ) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(
        &self,
        other: &WorldPoint,
    ) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Все координаты конечны.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl BoundingBox {
    /// Квадрат со стороной `2 * radius` вокруг проекции `center` на XY.
    pub fn around(
        center: &WorldPoint,
        radius: f64,
    ) -> Self {
        Self {
            min_x: center.x - radius,
            max_x: center.x + radius,
            min_y: center.y - radius,
            max_y: center.y + radius,
        }
    }

    /// Ближайшая к `point` точка прямоугольника. Z берётся из `point`.
    pub fn closest_point(
        &self,
        point: &WorldPoint,
    ) -> WorldPoint {
        WorldPoint::new(
            point.x.clamp(self.min_x, self.max_x),
            point.y.clamp(self.min_y, self.max_y),
            point.z,
        )
    }

    pub fn contains(
        &self,
        point: &WorldPoint,
    ) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl From<(f64, f64, f64)> for WorldPoint {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<[f64; 3]> for WorldPoint {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for WorldPoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что расстояние учитывает ось Z.
    #[test]
    fn test_distance_squared_is_3d() {
        let a = WorldPoint::new(0.0, 0.0, 0.0);
        let b = WorldPoint::new(3.0, 4.0, 12.0);
        assert_eq!(a.distance_squared(&b), 169.0);
        assert_eq!(a.distance(&b), 13.0);
    }

    #[test]
    fn test_closest_point_clamps() {
        let bbox = BoundingBox {
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
        };
        let p = bbox.closest_point(&WorldPoint::new(-5.0, 15.0, 7.0));
        assert_eq!(p, WorldPoint::new(0.0, 10.0, 7.0));
        assert!(bbox.contains(&WorldPoint::new(5.0, 5.0, 100.0)));
        assert!(!bbox.contains(&WorldPoint::new(11.0, 5.0, 0.0)));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(WorldPoint::from((1.0, 2.0, 3.0)), WorldPoint::new(1.0, 2.0, 3.0));
        assert_eq!(WorldPoint::from([1.0, 2.0, 3.0]).to_string(), "(1, 2, 3)");
        assert!(!WorldPoint::new(f64::NAN, 0.0, 0.0).is_finite());
    }
}
