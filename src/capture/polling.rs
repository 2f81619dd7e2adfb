use super::{Frame, FrameSource, Region, ScreenGrabber};
use crate::debug_if_enabled;
use crate::error::Result;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Запасная стратегия: синхронный захват на каждый запрос, без слотов.
///
/// Частота ограничена явно: между захватами выдерживается период целевого FPS.
pub struct PollingSource {
    grabber: Arc<dyn ScreenGrabber>,
    period: Duration,
    region: Option<Region>,
    last_grab: Option<Instant>,
}

impl PollingSource {
    pub fn new(grabber: Arc<dyn ScreenGrabber>, period: Duration) -> Self {
        Self {
            grabber,
            period,
            region: None,
            last_grab: None,
        }
    }

    fn throttle(&mut self) {
        if let Some(last) = self.last_grab {
            if let Some(rest) = self.period.checked_sub(last.elapsed()) {
                thread::sleep(rest);
            }
        }
        self.last_grab = Some(Instant::now());
    }
}

impl FrameSource for PollingSource {
    fn configure(&mut self, region: Region) -> Result<()> {
        self.region = Some(region);
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        let region = self.region?;
        self.throttle();

        match self.grabber.grab(region) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug_if_enabled!("Кадр для {} не получен: {}", region, e);
                None
            }
        }
    }

    fn shutdown(&mut self) {
        self.region = None;
        self.last_grab = None;
    }

    fn kind(&self) -> &'static str {
        "polling"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Rgb;
    use crate::testing::CountingGrabber;

    #[test]
    fn no_frame_before_configuration() {
        let grabber = Arc::new(CountingGrabber::new(Rgb::default()));
        let mut source = PollingSource::new(grabber.clone(), Duration::ZERO);
        assert!(source.latest_frame().is_none());
        assert_eq!(grabber.grabs(), 0);
    }

    #[test]
    fn grabs_are_rate_limited() {
        let grabber = Arc::new(CountingGrabber::new(Rgb::new(9, 9, 9)));
        let mut source = PollingSource::new(grabber.clone(), Duration::from_millis(20));
        source.configure(Region::new(0, 0, 2, 2).unwrap()).unwrap();

        let started = Instant::now();
        for _ in 0..3 {
            assert!(source.latest_frame().is_some());
        }
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(grabber.grabs(), 3);
    }

    #[test]
    fn failed_grab_yields_none() {
        let grabber = Arc::new(CountingGrabber::failing());
        let mut source = PollingSource::new(grabber, Duration::ZERO);
        source.configure(Region::new(0, 0, 2, 2).unwrap()).unwrap();
        assert!(source.latest_frame().is_none());
    }
}
