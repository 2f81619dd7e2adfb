use crate::error::{AppError, Result};
use crate::events::{KeyCode, KeyState, VirtualKeyEvent};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Инъекция нажатий на уровне ОС
pub trait KeyInjector: Send + Sync {
    fn press(&self, key: KeyCode) -> Result<()>;
    fn release(&self, key: KeyCode) -> Result<()>;

    /// Отпустить всё, что инжектор считает нажатым
    fn release_all(&self) -> Result<()>;
}

/// Виртуальная клавиатура uinput. В dry-run режиме события только логируются.
pub struct VirtualDevice {
    device: Mutex<Option<uinput::Device>>,
    held: Mutex<HashSet<KeyCode>>,
    device_name: String,
    dry_run: bool,
}

impl VirtualDevice {
    pub fn new(device_name: &str, dry_run: bool) -> Result<Self> {
        info!("Инициализация VirtualDevice '{}' (dry_run: {})", device_name, dry_run);

        let device = if dry_run {
            None
        } else {
            Some(Self::create_virtual_device(device_name)?)
        };

        Ok(Self {
            device: Mutex::new(device),
            held: Mutex::new(HashSet::new()),
            device_name: device_name.to_string(),
            dry_run,
        })
    }

    fn create_virtual_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}' для инъекции клавиш", device_name);

        let virtual_device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| AppError::Internal(format!("Не удалось создать виртуальное устройство '{}': {}", device_name, e)))?;

        info!("Виртуальное устройство '{}' создано успешно", device_name);
        Ok(virtual_device)
    }

    pub fn send_event(&self, event: VirtualKeyEvent) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] {:?} {}", event.state, event.key_code);
            self.track(event);
            return Ok(());
        }

        let mut guard = self.device.lock();
        let device = guard
            .as_mut()
            .ok_or_else(|| AppError::Internal("Виртуальное устройство недоступно".to_string()))?;

        let keycode = event.key_code.value() as i32;

        // EV_KEY
        device
            .write(1, keycode, event.state.raw())
            .map_err(|e| AppError::Internal(format!("Не удалось отправить событие клавиши {}: {}", keycode, e)))?;

        // EV_SYN
        device
            .write(0, 0, 0)
            .map_err(|e| AppError::Internal(format!("Не удалось синхронизировать события: {}", e)))?;

        drop(guard);
        self.track(event);
        debug!("Виртуальное событие {:?} {} отправлено", event.state, event.key_code);
        Ok(())
    }

    fn track(&self, event: VirtualKeyEvent) {
        let mut held = self.held.lock();
        match event.state {
            KeyState::Pressed => {
                held.insert(event.key_code);
            }
            KeyState::Released => {
                held.remove(&event.key_code);
            }
            KeyState::Repeat => {}
        }
    }

    pub fn held_keys(&self) -> Vec<KeyCode> {
        self.held.lock().iter().copied().collect()
    }
}

impl KeyInjector for VirtualDevice {
    fn press(&self, key: KeyCode) -> Result<()> {
        self.send_event(VirtualKeyEvent::press(key))
    }

    fn release(&self, key: KeyCode) -> Result<()> {
        self.send_event(VirtualKeyEvent::release(key))
    }

    fn release_all(&self) -> Result<()> {
        let held = self.held_keys();
        if held.is_empty() {
            return Ok(());
        }

        warn!("Отпускаем {} удерживаемых клавиш на '{}'", held.len(), self.device_name);
        let mut first_error = None;
        for key in held {
            if let Err(e) = self.release(key) {
                warn!("Не удалось отпустить {}: {}", key, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if let Err(e) = self.release_all() {
            warn!("Клавиши не отпущены при закрытии устройства: {}", e);
        }
        if !self.dry_run {
            info!("Закрытие виртуального устройства");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_tracks_held_keys() {
        let device = VirtualDevice::new("test", true).unwrap();
        device.press(KeyCode(30)).unwrap();
        device.press(KeyCode(31)).unwrap();
        device.release(KeyCode(30)).unwrap();
        assert_eq!(device.held_keys(), vec![KeyCode(31)]);

        device.release_all().unwrap();
        assert!(device.held_keys().is_empty());
    }
}
