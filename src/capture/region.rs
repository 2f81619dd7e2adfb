use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Прямоугольник захвата в экранных координатах, `x2 > x1`, `y2 > y1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        let region = Self { x1, y1, x2, y2 };
        if !region.is_valid() {
            return Err(AppError::InvalidRegion(region.to_string()));
        }
        Ok(region)
    }

    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Источник текущей области захвата. Вызывается на каждой итерации цикла,
/// поэтому должен быть дешёвым и неблокирующим.
pub trait RegionProvider: Send + Sync {
    fn get_position(&self) -> Region;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_validation() {
        assert!(Region::new(0, 0, 10, 10).is_ok());
        assert!(matches!(Region::new(10, 0, 10, 5), Err(AppError::InvalidRegion(_))));
        assert!(Region::new(0, 5, 10, 1).is_err());
    }

    #[test]
    fn test_region_dimensions() {
        let region = Region::new(-20, 5, 60, 15).unwrap();
        assert_eq!(region.width(), 80);
        assert_eq!(region.height(), 10);
        assert_eq!(region.to_string(), "(-20, 5, 60, 15)");
    }
}
