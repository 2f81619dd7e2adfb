//! Overlay geometry and its persistence.
//!
//! The capture region sits inside the overlay border: for an overlay whose
//! top-left corner is `(x, y)` the region is `(x+b, y+b, x+b+w, y+b+h)`.

use crate::capture::{Region, RegionProvider};
use crate::config::InstanceConfig;
use crate::error::{AppError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Положение окна-оверлея одного экземпляра
pub struct OverlayRegion {
    origin: RwLock<(i32, i32)>,
    width: u32,
    height: u32,
    border: u32,
}

impl OverlayRegion {
    pub fn new(origin: (i32, i32), width: u32, height: u32, border: u32) -> Self {
        Self {
            origin: RwLock::new(origin),
            width,
            height,
            border,
        }
    }

    pub fn for_instance(instance: &InstanceConfig, origin: (i32, i32)) -> Self {
        Self::new(origin, instance.width, instance.height, instance.border_width)
    }

    pub fn origin(&self) -> (i32, i32) {
        *self.origin.read()
    }

    pub fn move_to(&self, x: i32, y: i32) {
        *self.origin.write() = (x, y);
    }
}

impl RegionProvider for OverlayRegion {
    fn get_position(&self) -> Region {
        let (x, y) = self.origin();
        // Позиция приходит из редактируемого файла: переполнение даёт пустую область
        let b = i32::try_from(self.border).unwrap_or(i32::MAX);
        let x1 = x.saturating_add(b);
        let y1 = y.saturating_add(b);
        Region {
            x1,
            y1,
            x2: x1.saturating_add(i32::try_from(self.width).unwrap_or(i32::MAX)),
            y2: y1.saturating_add(i32::try_from(self.height).unwrap_or(i32::MAX)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SavedPosition {
    x: i32,
    y: i32,
}

/// Файлы `detector_<id>_position.json` в заданной директории
#[derive(Debug, Clone)]
pub struct PositionStore {
    directory: PathBuf,
}

impl PositionStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, id: u32) -> PathBuf {
        self.directory.join(format!("detector_{}_position.json", id))
    }

    pub fn load(&self, id: u32) -> Result<Option<(i32, i32)>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        let saved: SavedPosition = serde_json::from_str(&text)?;
        Ok(Some((saved.x, saved.y)))
    }

    pub fn save(&self, id: u32, origin: (i32, i32)) -> Result<()> {
        let path = self.path_for(id);
        let text = serde_json::to_string(&SavedPosition {
            x: origin.0,
            y: origin.1,
        })?;
        std::fs::write(&path, text)
            .map_err(|e| AppError::Internal(format!("не удалось сохранить {}: {}", path.display(), e)))?;
        debug!("Позиция детектора {} сохранена: {:?}", id, origin);
        Ok(())
    }

    pub fn default_position(id: u32) -> (i32, i32) {
        let step = id.saturating_sub(1) as i32;
        (100 + step * 250, 100 + step * 50)
    }

    /// Сохранённая позиция, затем позиция из конфигурации, затем лесенка по умолчанию
    pub fn resolve(&self, instance: &InstanceConfig) -> (i32, i32) {
        match self.load(instance.id) {
            Ok(Some(origin)) => {
                info!("Детектор {}: загружена позиция {:?}", instance.id, origin);
                return origin;
            }
            Ok(None) => {}
            Err(e) => warn!("Детектор {}: позиция не прочитана ({}), используем запасную", instance.id, e),
        }

        instance
            .position
            .map(|[x, y]| (x, y))
            .unwrap_or_else(|| Self::default_position(instance.id))
    }
}
