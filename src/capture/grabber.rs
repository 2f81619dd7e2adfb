//! Screen grab primitive.
//!
//! This is the infrastructure layer: it talks to the display server through `xcap`
//! and asks the monitor for the requested region only. Monitors are resolved once
//! and cached by their bounds; a region outside every cached monitor triggers a
//! fresh lookup.

use super::{Frame, Region};
use crate::app_error;
use crate::error::Result;
use parking_lot::Mutex;
use tracing::debug;
use xcap::Monitor;

pub trait ScreenGrabber: Send + Sync {
    fn grab(&self, region: Region) -> Result<Frame>;
}

/// Границы монитора в экранных координатах
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MonitorBounds {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl MonitorBounds {
    fn contains(&self, x: i32, y: i32) -> bool {
        let dx = i64::from(x) - i64::from(self.x);
        let dy = i64::from(y) - i64::from(self.y);
        (0..i64::from(self.width)).contains(&dx) && (0..i64::from(self.height)).contains(&dy)
    }

    /// Область в координатах монитора, обрезанная по его краю
    fn clip(&self, region: Region) -> Option<(u32, u32, u32, u32)> {
        if !self.contains(region.x1, region.y1) {
            return None;
        }
        let left = (i64::from(region.x1) - i64::from(self.x)) as u32;
        let top = (i64::from(region.y1) - i64::from(self.y)) as u32;
        let width = region.width().min(self.width - left);
        let height = region.height().min(self.height - top);
        Some((left, top, width, height))
    }
}

struct CachedMonitor {
    bounds: MonitorBounds,
    monitor: Monitor,
}

/// Захват через xcap: только область, с монитора, на котором лежит её левый верхний угол
#[derive(Default)]
pub struct XcapGrabber {
    monitors: Mutex<Vec<CachedMonitor>>,
}

impl XcapGrabber {
    pub fn new() -> Self {
        Self::default()
    }

    fn monitor_at(&self, x: i32, y: i32) -> Result<(MonitorBounds, Monitor)> {
        if let Some(cached) = self.monitors.lock().iter().find(|m| m.bounds.contains(x, y)) {
            return Ok((cached.bounds, cached.monitor.clone()));
        }

        let monitor = Monitor::from_point(x, y)
            .map_err(|e| app_error!(capture, "нет монитора в точке ({}, {}): {}", x, y, e))?;
        let bounds = MonitorBounds {
            x: monitor.x().map_err(|e| app_error!(capture, "координата монитора: {}", e))?,
            y: monitor.y().map_err(|e| app_error!(capture, "координата монитора: {}", e))?,
            width: monitor.width().map_err(|e| app_error!(capture, "ширина монитора: {}", e))?,
            height: monitor.height().map_err(|e| app_error!(capture, "высота монитора: {}", e))?,
        };
        debug!("Монитор {:?} для точки ({}, {})", bounds, x, y);

        self.monitors.lock().push(CachedMonitor {
            bounds,
            monitor: monitor.clone(),
        });
        Ok((bounds, monitor))
    }
}

impl ScreenGrabber for XcapGrabber {
    fn grab(&self, region: Region) -> Result<Frame> {
        let (bounds, monitor) = self.monitor_at(region.x1, region.y1)?;
        let (left, top, width, height) = bounds
            .clip(region)
            .ok_or_else(|| app_error!(capture, "область {} вне монитора {:?}", region, bounds))?;

        let image = match monitor.capture_region(left, top, width, height) {
            Ok(image) => image,
            Err(e) => {
                // Мониторы могли смениться: следующий захват найдёт их заново
                self.monitors.lock().clear();
                return Err(app_error!(capture, "снимок области {}: {}", region, e));
            }
        };

        Ok(Frame::from_rgba(&image))
    }
}
