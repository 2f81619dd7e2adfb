use super::HotkeyRegistry;
use crate::config::HotkeyConfig;
use crate::error::{AppError, Result};
use crate::events::{KeyCode, KeyState};
use crate::trace_if_enabled;
use crate::utils::DeviceFinder;
use evdev::{Device, EventType};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

// errno: устройство отключено
const ENODEV: i32 = 19;

/// Источник событий физической клавиатуры для реестра горячих клавиш
#[async_trait::async_trait]
pub trait HotkeyListenerTrait {
    async fn run(self: Box<Self>) -> Result<()>;
}

pub fn create_hotkey_listener(
    config: &HotkeyConfig,
    registry: Arc<HotkeyRegistry>,
    dry_run: bool,
) -> Result<Box<dyn HotkeyListenerTrait + Send>> {
    if dry_run {
        Ok(Box::new(DryRunHotkeyListener::new(registry)))
    } else {
        Ok(Box::new(RealHotkeyListener::new(config, registry)?))
    }
}

/// Читает клавиатуру через evdev без эксклюзивного захвата:
/// нажатия продолжают доходить до остальных приложений.
pub struct RealHotkeyListener {
    device: Device,
    registry: Arc<HotkeyRegistry>,
}

impl RealHotkeyListener {
    pub fn new(config: &HotkeyConfig, registry: Arc<HotkeyRegistry>) -> Result<Self> {
        info!("Инициализация RealHotkeyListener");

        let device_path = DeviceFinder::find_keyboard_device(&config.device_path)?;
        let device = Device::open(&device_path).map_err(|e| {
            AppError::DeviceNotFound(format!("Не удалось открыть устройство {:?}: {}", device_path, e))
        })?;

        info!("Горячие клавиши читаются с: {}", device.name().unwrap_or("Unknown"));
        Ok(Self { device, registry })
    }

    /// Блокирующий цикл чтения; выполняется в отдельном потоке
    fn read_loop(mut device: Device, registry: Arc<HotkeyRegistry>) -> Result<()> {
        loop {
            let events: Vec<evdev::InputEvent> = match device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) if e.raw_os_error() == Some(ENODEV) => {
                    return Err(AppError::DeviceNotFound(format!("Клавиатура отключена: {}", e)));
                }
                Err(e) => {
                    error!("Ошибка чтения событий: {}", e);
                    thread::sleep(Duration::from_millis(100));
                    continue;
                }
            };

            for event in events {
                if event.event_type() != EventType::KEY {
                    continue;
                }
                let Some(state) = KeyState::from_raw(event.value()) else {
                    debug!("Неизвестное значение события: {}", event.value());
                    continue;
                };
                let key = KeyCode(event.code());
                let fired = registry.dispatch(key, state);
                if fired > 0 {
                    trace_if_enabled!("{} -> {} обработчиков", key, fired);
                }
            }
        }
    }

    async fn run_impl(self) -> Result<()> {
        info!("RealHotkeyListener запущен");
        let (tx, rx) = oneshot::channel();
        let Self { device, registry } = self;

        // Поток не присоединяется: fetch_events блокирует до следующего события
        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                let _ = tx.send(Self::read_loop(device, registry));
            })
            .map_err(|e| AppError::Internal(format!("не удалось запустить поток горячих клавиш: {}", e)))?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(AppError::Internal("поток горячих клавиш завершился паникой".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl HotkeyListenerTrait for RealHotkeyListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

pub struct DryRunHotkeyListener {
    registry: Arc<HotkeyRegistry>,
}

impl DryRunHotkeyListener {
    pub fn new(registry: Arc<HotkeyRegistry>) -> Self {
        info!("Инициализация DryRunHotkeyListener");
        Self { registry }
    }

    async fn run_impl(self) -> Result<()> {
        warn!("Dry-run режим - горячие клавиши с клавиатуры не читаются");
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            debug!("HotkeyListener работает в dry-run режиме ({} клавиш)", self.registry.len());
        }
    }
}

#[async_trait::async_trait]
impl HotkeyListenerTrait for DryRunHotkeyListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
