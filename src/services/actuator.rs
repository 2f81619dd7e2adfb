//! Per-instance capture loop.
//!
//! Each iteration runs strictly in order: region check, frame, classification,
//! edge detection, key action, telemetry. A key press is only ever sent on a
//! rising edge of the effective signal and a release on the falling edge, so
//! every press is matched by exactly one release. `stop()` releases a held key
//! before it returns.

use crate::capture::{Frame, FrameSource, Region, RegionProvider};
use crate::config::{InstanceConfig, TelemetryConfig};
use crate::detector::{Detection, Detector, Rgb};
use crate::error::{AppError, Result};
use crate::events::KeyCode;
use crate::services::activation::{SharedActivation, SubscriptionId};
use crate::services::KeyInjector;
use crate::ui::RenderSink;
use crate::debug_if_enabled;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const FPS_WINDOW: usize = 30;
const IDLE_BACKOFF: Duration = Duration::from_millis(1);
const CLASSIFIER_WARN_INTERVAL: Duration = Duration::from_secs(5);
const MIN_FPS_INTERVAL: Duration = Duration::from_secs(1);

/// Частота телеметрии и логов
#[derive(Debug, Clone)]
pub struct TelemetryPolicy {
    pub fps_interval: Duration,
    pub ui_every_n: u64,
    pub log_every_n: u64,
    pub log_detections: bool,
}

impl From<&TelemetryConfig> for TelemetryPolicy {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            fps_interval: Duration::from_millis(config.fps_update_interval_ms).max(MIN_FPS_INTERVAL),
            ui_every_n: u64::from(config.ui_every_n_frames.max(1)),
            log_every_n: config.log_every_n_frames,
            log_detections: config.log_detections,
        }
    }
}

impl Default for TelemetryPolicy {
    fn default() -> Self {
        Self::from(&TelemetryConfig::default())
    }
}

/// Скользящее окно длительностей итераций
#[derive(Debug, Clone)]
pub struct FpsWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl FpsWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn fps(&self) -> f64 {
        let total: Duration = self.samples.iter().sum();
        if total.is_zero() {
            return 0.0;
        }
        self.samples.len() as f64 / total.as_secs_f64()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Default)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    pub fn update(&mut self, value: bool) -> Option<Edge> {
        let edge = match (self.previous, value) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        };
        self.previous = value;
        edge
    }

    pub fn reset(&mut self) {
        self.previous = false;
    }
}

/// Клавиша экземпляра: нажатие на фронте, отпускание на спаде
pub struct KeyTrigger {
    key: KeyCode,
    injector: Arc<dyn KeyInjector>,
    edges: EdgeDetector,
    held: bool,
}

impl KeyTrigger {
    pub fn new(key: KeyCode, injector: Arc<dyn KeyInjector>) -> Self {
        Self {
            key,
            injector,
            edges: EdgeDetector::default(),
            held: false,
        }
    }

    pub fn apply(&mut self, effective: bool) -> Option<Edge> {
        let edge = self.edges.update(effective);
        match edge {
            Some(Edge::Rising) => match self.injector.press(self.key) {
                Ok(()) => self.held = true,
                Err(e) => warn!("Не удалось нажать {}: {}", self.key, e),
            },
            Some(Edge::Falling) => self.release(),
            None => {}
        }
        edge
    }

    /// Отпустить клавишу, если она удерживается
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        match self.injector.release(self.key) {
            Ok(()) => self.held = false,
            Err(e) => error!("Не удалось отпустить {}: {}", self.key, e),
        }
    }

    pub fn reset(&mut self) {
        self.release();
        self.edges.reset();
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn key(&self) -> KeyCode {
        self.key
    }
}

impl Drop for KeyTrigger {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NoFrame,
    InvalidRegion,
    Processed {
        detected: bool,
        effective: bool,
        edge: Option<Edge>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorStats {
    pub frames: u64,
    pub elapsed: Duration,
    pub average_fps: f64,
}

/// Состояние одного цикла захвата. Живёт в рабочем потоке, пока экземпляр запущен.
pub struct CaptureLoop {
    id: u32,
    name: String,
    source: Box<dyn FrameSource>,
    region: Arc<dyn RegionProvider>,
    detector: Detector,
    trigger: KeyTrigger,
    active: Arc<AtomicBool>,
    sink: Arc<dyn RenderSink>,
    policy: TelemetryPolicy,
    fps: FpsWindow,
    current_region: Option<Region>,
    frames: u64,
    started: Instant,
    last_frame_at: Option<Instant>,
    last_fps_update: Option<Instant>,
    last_classifier_warning: Option<Instant>,
}

impl CaptureLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        name: String,
        source: Box<dyn FrameSource>,
        region: Arc<dyn RegionProvider>,
        detector: Detector,
        trigger: KeyTrigger,
        active: Arc<AtomicBool>,
        sink: Arc<dyn RenderSink>,
        policy: TelemetryPolicy,
    ) -> Self {
        Self {
            id,
            name,
            source,
            region,
            detector,
            trigger,
            active,
            sink,
            policy,
            fps: FpsWindow::new(FPS_WINDOW),
            current_region: None,
            frames: 0,
            started: Instant::now(),
            last_frame_at: None,
            last_fps_update: None,
            last_classifier_warning: None,
        }
    }

    fn reset(&mut self) {
        self.trigger.reset();
        self.fps.clear();
        self.current_region = None;
        self.frames = 0;
        self.started = Instant::now();
        self.last_frame_at = None;
        self.last_fps_update = None;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_key_held(&self) -> bool {
        self.trigger.is_held()
    }

    /// Одна итерация цикла
    pub fn tick(&mut self) -> TickOutcome {
        // Выключение отпускает клавишу сразу, даже если кадров нет
        if !self.active.load(Ordering::Acquire) && self.trigger.apply(false) == Some(Edge::Falling) {
            self.sink.update_key_indicator(false);
        }

        let region = self.region.get_position();
        if !region.is_valid() {
            debug_if_enabled!("[{}] некорректная область {}", self.name, region);
            return TickOutcome::InvalidRegion;
        }

        if self.current_region != Some(region) {
            if let Err(e) = self.source.configure(region) {
                warn!("[{}] не удалось перенастроить захват на {}: {}", self.name, region, e);
                return TickOutcome::NoFrame;
            }
            self.current_region = Some(region);
        }

        let Some(frame) = self.source.latest_frame() else {
            return TickOutcome::NoFrame;
        };

        let average = frame.average_color().unwrap_or_default();
        let detection = self.classify(&frame, average);
        let effective = detection.detected && self.active.load(Ordering::Acquire);
        let edge = self.trigger.apply(effective);

        let now = Instant::now();
        if let Some(previous) = self.last_frame_at.replace(now) {
            self.fps.push(now - previous);
        }
        self.frames += 1;

        self.emit_telemetry(&frame, average, now);
        self.log_frame(&detection, average, edge);

        TickOutcome::Processed {
            detected: detection.detected,
            effective,
            edge,
        }
    }

    fn classify(&mut self, frame: &Frame, average: Rgb) -> Detection {
        if frame.is_empty() {
            return Detection::none();
        }

        let detector = &self.detector;
        Self::contain_panic(&self.name, &mut self.last_classifier_warning, || {
            detector.classify_sample(frame, average)
        })
    }

    /// Паника классификатора означает "не обнаружено"; предупреждение не чаще раза в 5 с
    fn contain_panic<F>(name: &str, last_warning: &mut Option<Instant>, classify: F) -> Detection
    where
        F: FnOnce() -> Detection,
    {
        match catch_unwind(AssertUnwindSafe(classify)) {
            Ok(detection) => detection,
            Err(_) => {
                let due = last_warning.map_or(true, |at| at.elapsed() >= CLASSIFIER_WARN_INTERVAL);
                if due {
                    warn!("[{}] классификатор завершился паникой, кадр пропущен", name);
                    *last_warning = Some(Instant::now());
                }
                Detection::none()
            }
        }
    }

    fn emit_telemetry(&mut self, frame: &Frame, average: Rgb, now: Instant) {
        if self.frames % self.policy.ui_every_n == 0 {
            self.sink.update_color_swatch(frame.center_pixel().unwrap_or(average));
            self.sink.update_key_indicator(self.trigger.is_held());
        }

        let fps_due = self
            .last_fps_update
            .map_or(true, |at| now.duration_since(at) >= self.policy.fps_interval);
        if fps_due {
            self.sink.update_fps(self.fps.fps());
            self.last_fps_update = Some(now);
        }
    }

    fn log_frame(&self, detection: &Detection, average: Rgb, edge: Option<Edge>) {
        if self.policy.log_detections && edge == Some(Edge::Rising) {
            if let Some(message) = &detection.message {
                info!("[{}] {} -> {}", self.name, message, self.trigger.key());
            }
        }

        if self.policy.log_every_n > 0 && self.frames % self.policy.log_every_n == 0 {
            debug_if_enabled!(
                "[{}] {:.2}s | FPS: {:.1} | RGB {} {} {} | кадров: {}{}",
                self.name,
                self.started.elapsed().as_secs_f64(),
                self.fps.fps(),
                average,
                average.hex(),
                average.ansi_block(6),
                self.frames,
                if detection.detected {
                    format!(" | {}", self.detector.name())
                } else {
                    String::new()
                }
            );
        }
    }

    /// Завершение: отпустить клавишу, освободить источник, посчитать статистику
    pub fn finish(&mut self) -> ActuatorStats {
        self.trigger.release();
        self.sink.update_key_indicator(false);
        self.source.shutdown();
        self.current_region = None;

        let elapsed = self.started.elapsed();
        let average_fps = if elapsed.is_zero() {
            0.0
        } else {
            self.frames as f64 / elapsed.as_secs_f64()
        };

        info!("=== СТАТИСТИКА [{}] #{} ===", self.name, self.id);
        info!("Кадров: {}", self.frames);
        info!("Время: {:.2} с", elapsed.as_secs_f64());
        info!("Средний FPS: {:.1}", average_fps);

        ActuatorStats {
            frames: self.frames,
            elapsed,
            average_fps,
        }
    }
}

/// Экземпляр: цикл захвата в своём потоке плюс подписка на общий флаг
pub struct Actuator {
    id: u32,
    name: String,
    active: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    activation: Arc<SharedActivation>,
    sink: Arc<dyn RenderSink>,
    subscription: Mutex<Option<SubscriptionId>>,
    pending: Mutex<Option<CaptureLoop>>,
    worker: Mutex<Option<JoinHandle<CaptureLoop>>>,
}

impl Actuator {
    pub fn new(
        instance: &InstanceConfig,
        source: Box<dyn FrameSource>,
        region: Arc<dyn RegionProvider>,
        injector: Arc<dyn KeyInjector>,
        activation: Arc<SharedActivation>,
        sink: Arc<dyn RenderSink>,
        policy: TelemetryPolicy,
    ) -> Result<Self> {
        let key = KeyCode::from_name(&instance.trigger_key)?;
        let detector = Detector::from_settings(&instance.detector);
        let active = Arc::new(AtomicBool::new(instance.enabled && activation.get()));

        info!(
            "Детектор #{} '{}': {} -> клавиша {} (источник: {})",
            instance.id,
            instance.name,
            detector.name(),
            key,
            source.kind()
        );

        let capture = CaptureLoop::new(
            instance.id,
            instance.name.clone(),
            source,
            region,
            detector,
            KeyTrigger::new(key, injector),
            Arc::clone(&active),
            Arc::clone(&sink),
            policy,
        );

        Ok(Self {
            id: instance.id,
            name: instance.name.clone(),
            active,
            running: Arc::new(AtomicBool::new(false)),
            activation,
            sink,
            subscription: Mutex::new(None),
            pending: Mutex::new(Some(capture)),
            worker: Mutex::new(None),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Локальное включение экземпляра; общий флаг не меняется
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
        self.sink.update_active(active);
    }

    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let mut capture = self
            .pending
            .lock()
            .take()
            .ok_or_else(|| AppError::Internal(format!("цикл захвата #{} недоступен для запуска", self.id)))?;
        capture.reset();

        let active = Arc::clone(&self.active);
        let sink = Arc::clone(&self.sink);
        let subscription = self.activation.subscribe(move |value| {
            active.store(value, Ordering::Release);
            sink.update_active(value);
            Ok(())
        });
        *self.subscription.lock() = Some(subscription);

        self.running.store(true, Ordering::Release);
        self.sink.update_active(self.is_active());

        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name(format!("capture-{}", self.id))
            .spawn(move || Self::run_loop(capture, running));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!("Детектор #{} '{}' запущен", self.id, self.name);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.unsubscribe();
                Err(AppError::Internal(format!("не удалось запустить поток захвата #{}: {}", self.id, e)))
            }
        }
    }

    fn run_loop(mut capture: CaptureLoop, running: Arc<AtomicBool>) -> CaptureLoop {
        while running.load(Ordering::Acquire) {
            match capture.tick() {
                TickOutcome::Processed { .. } => {}
                TickOutcome::NoFrame | TickOutcome::InvalidRegion => thread::sleep(IDLE_BACKOFF),
            }
        }
        capture
    }

    fn unsubscribe(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.activation.unsubscribe(id);
        }
    }

    /// Остановить цикл. Удерживаемая клавиша отпускается до возврата.
    /// Можно вызывать из любого потока; повторный вызов возвращает `None`.
    pub fn stop(&self) -> Option<ActuatorStats> {
        let handle = self.worker.lock().take()?;
        self.running.store(false, Ordering::Release);
        self.unsubscribe();

        match handle.join() {
            Ok(mut capture) => {
                let stats = capture.finish();
                *self.pending.lock() = Some(capture);
                info!("Детектор #{} '{}' остановлен", self.id, self.name);
                Some(stats)
            }
            Err(_) => {
                // Клавиша отпущена в Drop при раскрутке стека
                error!("Поток захвата #{} завершился паникой", self.id);
                self.sink.update_key_indicator(false);
                None
            }
        }
    }
}

impl Drop for Actuator {
    fn drop(&mut self) {
        self.stop();
    }
}
