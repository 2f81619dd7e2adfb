use super::{Frame, FrameSource, Region, ScreenGrabber, SlotLease, SlotPool};
use crate::debug_if_enabled;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Быстрая стратегия: фоновый поток постоянно снимает область и кладёт
/// последний кадр в ячейку, цикл захвата только забирает его.
///
/// Каждый экземпляр держит свой слот пула на всё время жизни.
pub struct StreamingSource {
    lease: SlotLease,
    grabber: Arc<dyn ScreenGrabber>,
    period: Duration,
    latest: Arc<Mutex<Option<Frame>>>,
    region: Option<Region>,
    worker: Option<GrabWorker>,
}

struct GrabWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StreamingSource {
    /// Исчерпание пула: фатальная ошибка конструктора
    pub fn new(pool: &Arc<SlotPool>, grabber: Arc<dyn ScreenGrabber>, period: Duration) -> Result<Self> {
        let lease = pool.acquire()?;
        info!("Потоковый источник кадров на слоте #{}", lease.index());

        Ok(Self {
            lease,
            grabber,
            period,
            latest: Arc::new(Mutex::new(None)),
            region: None,
            worker: None,
        })
    }

    pub fn slot(&self) -> usize {
        self.lease.index()
    }

    fn start_worker(&mut self, region: Region) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let grabber = Arc::clone(&self.grabber);
        let latest = Arc::clone(&self.latest);
        let period = self.period;
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(format!("grab-slot-{}", self.lease.index()))
            .spawn(move || Self::grab_loop(region, grabber, latest, period, flag))
            .map_err(|e| AppError::Internal(format!("не удалось запустить поток захвата: {}", e)))?;

        self.worker = Some(GrabWorker { running, handle });
        Ok(())
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::Release);
            if worker.handle.join().is_err() {
                error!("Поток захвата слота #{} завершился паникой", self.lease.index());
            }
        }
    }

    fn grab_loop(
        region: Region,
        grabber: Arc<dyn ScreenGrabber>,
        latest: Arc<Mutex<Option<Frame>>>,
        period: Duration,
        running: Arc<AtomicBool>,
    ) {
        while running.load(Ordering::Acquire) {
            let started = Instant::now();

            match grabber.grab(region) {
                Ok(frame) => *latest.lock() = Some(frame),
                Err(e) => debug_if_enabled!("Кадр для {} не получен: {}", region, e),
            }

            if let Some(rest) = period.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }
}

impl FrameSource for StreamingSource {
    fn configure(&mut self, region: Region) -> Result<()> {
        if self.region == Some(region) && self.worker.is_some() {
            return Ok(());
        }

        self.stop_worker();
        self.latest.lock().take();
        info!("Слот #{}: область захвата {}", self.lease.index(), region);
        self.start_worker(region)?;
        self.region = Some(region);
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        self.latest.lock().take()
    }

    fn shutdown(&mut self) {
        self.stop_worker();
        self.latest.lock().take();
        self.region = None;
    }

    fn kind(&self) -> &'static str {
        "streaming"
    }
}

impl Drop for StreamingSource {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
