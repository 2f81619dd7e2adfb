use crate::capture::{FrameSource, PollingSource, ScreenGrabber, SlotPool, StreamingSource};
use crate::config::{CaptureBackend, CaptureConfig, Config};
use crate::error::Result;
use crate::events::KeyCode;
use crate::services::activation::SharedActivation;
use crate::services::actuator::{Actuator, ActuatorStats, TelemetryPolicy};
use crate::services::hotkey::HotkeyRegistry;
use crate::services::KeyInjector;
use crate::ui::{OverlayRegion, PositionStore, RenderSink};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const TOGGLE_HOTKEY_ID: &str = "global-toggle";

/// Переключает все экземпляры в одно состояние.
///
/// Если хотя бы один включён, выключаются все; иначе включаются все.
/// Новое значение записывается и в общий флаг, чтобы его увидели другие процессы.
pub struct Lockstep {
    actuators: Vec<Arc<Actuator>>,
    activation: Arc<SharedActivation>,
}

impl Lockstep {
    pub fn toggle_all(&self) -> bool {
        let next = !self.actuators.iter().any(|actuator| actuator.is_active());
        for actuator in &self.actuators {
            actuator.set_active(next);
        }
        self.activation.set(next);
        info!("Все детекторы {}", if next { "включены" } else { "выключены" });
        next
    }
}

#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub stats: Vec<(u32, Option<ActuatorStats>)>,
    pub failed_positions: Vec<u32>,
}

/// Фиксированный набор экземпляров из конфигурации
pub struct Coordinator {
    actuators: Vec<Arc<Actuator>>,
    overlays: Vec<(u32, Arc<OverlayRegion>)>,
    activation: Arc<SharedActivation>,
    positions: PositionStore,
    registry: Arc<HotkeyRegistry>,
    toggle_key: KeyCode,
    lockstep: Arc<Lockstep>,
    pool: Arc<SlotPool>,
}

impl Coordinator {
    pub fn build<F>(
        config: &Config,
        injector: Arc<dyn KeyInjector>,
        grabber: Arc<dyn ScreenGrabber>,
        registry: Arc<HotkeyRegistry>,
        mut sink_for: F,
    ) -> Result<Self>
    where
        F: FnMut(u32) -> Arc<dyn RenderSink>,
    {
        let toggle_key = KeyCode::from_name(&config.hotkey.toggle_key)?;
        let activation = SharedActivation::with_file(&config.activation.state_file, config.activation.poll_interval());
        let pool = SlotPool::new(config.capture.slot_count);
        let positions = PositionStore::new(&config.positions.directory);
        let policy = TelemetryPolicy::from(&config.telemetry);

        let mut actuators = Vec::with_capacity(config.instances.len());
        let mut overlays = Vec::with_capacity(config.instances.len());

        for instance in &config.instances {
            let source = Self::create_source(&config.capture, &pool, &grabber)?;
            let overlay = Arc::new(OverlayRegion::for_instance(instance, positions.resolve(instance)));

            let actuator = Actuator::new(
                instance,
                source,
                overlay.clone(),
                Arc::clone(&injector),
                Arc::clone(&activation),
                sink_for(instance.id),
                policy.clone(),
            )?;

            overlays.push((instance.id, overlay));
            actuators.push(Arc::new(actuator));
        }

        info!(
            "Создано {} детекторов, занято слотов захвата: {}/{}",
            actuators.len(),
            pool.in_use(),
            pool.capacity()
        );

        let lockstep = Arc::new(Lockstep {
            actuators: actuators.clone(),
            activation: Arc::clone(&activation),
        });

        Ok(Self {
            actuators,
            overlays,
            activation,
            positions,
            registry,
            toggle_key,
            lockstep,
            pool,
        })
    }

    /// Исчерпание слотов пробрасывается наверх, если явно не разрешён запасной захват
    fn create_source(
        capture: &CaptureConfig,
        pool: &Arc<SlotPool>,
        grabber: &Arc<dyn ScreenGrabber>,
    ) -> Result<Box<dyn FrameSource>> {
        let period = capture.frame_period();
        match capture.backend {
            CaptureBackend::Polling => Ok(Box::new(PollingSource::new(Arc::clone(grabber), period))),
            CaptureBackend::Streaming => match StreamingSource::new(pool, Arc::clone(grabber), period) {
                Ok(source) => Ok(Box::new(source)),
                Err(e) if e.is_slots_exhausted() && capture.fallback_on_exhaustion => {
                    warn!("{}; используем синхронный захват", e);
                    Ok(Box::new(PollingSource::new(Arc::clone(grabber), period)))
                }
                Err(e) => Err(e),
            },
        }
    }

    pub fn start(&self) -> Result<()> {
        for actuator in &self.actuators {
            actuator.start()?;
        }

        self.activation.start_watch();

        let lockstep = Arc::clone(&self.lockstep);
        self.registry.add_hotkey(TOGGLE_HOTKEY_ID, self.toggle_key, move || {
            lockstep.toggle_all();
        });

        info!("Переключение всех детекторов: {}", self.toggle_key);
        Ok(())
    }

    pub fn toggle_all(&self) -> bool {
        self.lockstep.toggle_all()
    }

    pub fn actuators(&self) -> &[Arc<Actuator>] {
        &self.actuators
    }

    pub fn overlay(&self, id: u32) -> Option<&Arc<OverlayRegion>> {
        self.overlays.iter().find(|(overlay_id, _)| *overlay_id == id).map(|(_, overlay)| overlay)
    }

    pub fn activation(&self) -> &Arc<SharedActivation> {
        &self.activation
    }

    pub fn slots_in_use(&self) -> usize {
        self.pool.in_use()
    }

    /// Остановить все экземпляры и сохранить их позиции.
    /// Ошибка сохранения одной позиции не мешает остальным.
    pub fn shutdown(&self) -> ShutdownReport {
        info!("Остановка детекторов...");
        self.registry.remove_hotkey(TOGGLE_HOTKEY_ID);
        self.activation.stop_watch();

        let mut report = ShutdownReport::default();
        for actuator in &self.actuators {
            report.stats.push((actuator.id(), actuator.stop()));
        }

        for (id, overlay) in &self.overlays {
            if let Err(e) = self.positions.save(*id, overlay.origin()) {
                error!("Детектор {}: позиция не сохранена: {}", id, e);
                report.failed_positions.push(*id);
            }
        }

        info!(
            "Детекторы остановлены, позиции сохранены: {}/{}",
            self.overlays.len() - report.failed_positions.len(),
            self.overlays.len()
        );
        report
    }
}
