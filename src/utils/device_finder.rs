use crate::error::{AppError, Result};
use evdev::{Device, KeyCode as EvKey};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BY_ID_DIR: &str = "/dev/input/by-id";
const INPUT_DIR: &str = "/dev/input";
const POINTER_MARKERS: [&str; 4] = ["mouse", "deathadder", "touchpad", "trackpoint"];

/// Поиск клавиатуры, с которой читаются горячие клавиши
pub struct DeviceFinder;

impl DeviceFinder {
    /// `auto`: автопоиск, иначе путь к устройству
    pub fn find_keyboard_device(device_path: &str) -> Result<PathBuf> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            if !path.exists() {
                return AppError::device_not_found(format!("Указанное устройство не найдено: {:?}", path));
            }
            info!("Используется указанное устройство: {:?}", path);
            return Ok(path);
        }

        info!("Автопоиск клавиатурного устройства...");
        if let Some(device) = Self::find_by_id() {
            info!("Найдено устройство по ID: {:?}", device);
            return Ok(device);
        }
        if let Some(device) = Self::find_by_event_devices()? {
            info!("Найдено устройство среди event устройств: {:?}", device);
            return Ok(device);
        }

        AppError::device_not_found(
            "Не удалось найти клавиатуру. Убедитесь, что пользователь добавлен в группу 'input'",
        )
    }

    /// Приоритет ссылки из by-id; `None`: не клавиатура
    fn by_id_priority(name: &str) -> Option<u8> {
        let lower = name.to_lowercase();
        if !lower.contains("event") || Self::looks_like_pointer(&lower) {
            return None;
        }
        if lower.ends_with("event-kbd") {
            Some(100)
        } else if lower.contains("keyboard") {
            Some(50)
        } else if lower.contains("kbd") {
            Some(10)
        } else {
            None
        }
    }

    fn looks_like_pointer(name: &str) -> bool {
        let lower = name.to_lowercase();
        POINTER_MARKERS.iter().any(|marker| lower.contains(marker))
    }

    fn find_by_id() -> Option<PathBuf> {
        let entries = match fs::read_dir(BY_ID_DIR) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("{} недоступна: {}", BY_ID_DIR, e);
                return None;
            }
        };

        let mut candidates: Vec<(PathBuf, u8)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let priority = Self::by_id_priority(&name)?;
                Self::is_keyboard_device(&path).then_some((path, priority))
            })
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.into_iter().next().map(|(path, _)| path)
    }

    fn find_by_event_devices() -> Result<Option<PathBuf>> {
        let entries = fs::read_dir(INPUT_DIR)
            .map_err(|e| AppError::Permission(format!("Нет доступа к {}: {}", INPUT_DIR, e)))?;

        let mut event_devices: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("event"))
            })
            .collect();
        event_devices.sort();

        Ok(event_devices.into_iter().find(|path| Self::is_keyboard_device(path)))
    }

    /// Клавиатура: открывается, не похожа на мышь и умеет A, SPACE, ENTER и ещё много клавиш
    fn is_keyboard_device(device_path: &Path) -> bool {
        let device = match Device::open(device_path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть устройство {:?}: {}", device_path, e);
                return false;
            }
        };

        let device_name = device.name().unwrap_or("Unknown").to_string();
        if Self::looks_like_pointer(&device_name) {
            debug!("Исключаем устройство как мышь/тачпад: {:?} ({})", device_path, device_name);
            return false;
        }

        let has_keys = device.supported_keys().is_some_and(|keys| {
            keys.contains(EvKey::KEY_A)
                && keys.contains(EvKey::KEY_SPACE)
                && keys.contains(EvKey::KEY_ENTER)
                && keys.iter().count() > 20
        });

        if has_keys {
            debug!("Устройство {:?} ({}) подходит как клавиатура", device_path, device_name);
        } else {
            debug!("Устройство {:?} ({}) не похоже на клавиатуру", device_path, device_name);
        }
        has_keys
    }
}
