//! Test doubles for the collaborators of the capture loop.

use crate::capture::{Frame, FrameSource, Region, RegionProvider, ScreenGrabber};
use crate::detector::Rgb;
use crate::error::{AppError, Result};
use crate::events::{KeyCode, KeyState, UiEvent, VirtualKeyEvent};
use crate::services::KeyInjector;
use crate::ui::RenderSink;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Grabber returning a solid frame of the requested size
pub struct CountingGrabber {
    rgb: Rgb,
    fail: bool,
    grabs: AtomicUsize,
    last: Mutex<Option<Region>>,
}

impl CountingGrabber {
    pub fn new(rgb: Rgb) -> Self {
        Self {
            rgb,
            fail: false,
            grabs: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Rgb::default())
        }
    }

    pub fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }

    pub fn last_region(&self) -> Option<Region> {
        *self.last.lock()
    }
}

impl ScreenGrabber for CountingGrabber {
    fn grab(&self, region: Region) -> Result<Frame> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(region);
        if self.fail {
            return Err(AppError::Capture("scripted failure".to_string()));
        }
        Ok(Frame::filled(region.width(), region.height(), self.rgb))
    }
}

#[derive(Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<VirtualKeyEvent>>,
}

impl RecordingInjector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<VirtualKeyEvent> {
        self.events.lock().clone()
    }

    pub fn presses(&self) -> usize {
        self.count(KeyState::Pressed)
    }

    pub fn releases(&self) -> usize {
        self.count(KeyState::Released)
    }

    fn count(&self, state: KeyState) -> usize {
        self.events.lock().iter().filter(|e| e.state == state).count()
    }
}

impl KeyInjector for RecordingInjector {
    fn press(&self, key: KeyCode) -> Result<()> {
        self.events.lock().push(VirtualKeyEvent::press(key));
        Ok(())
    }

    fn release(&self, key: KeyCode) -> Result<()> {
        self.events.lock().push(VirtualKeyEvent::release(key));
        Ok(())
    }

    fn release_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Replays a queue of frames; `None` entries are "no frame yet".
/// An exhausted queue keeps returning its last entry.
#[derive(Default)]
pub struct ScriptedSource {
    queue: VecDeque<Option<Frame>>,
    last: Option<Frame>,
    pub configured: Arc<Mutex<Vec<Region>>>,
    pub shut_down: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Option<Frame>>) -> Self {
        Self {
            queue: frames.into(),
            ..Self::default()
        }
    }

    /// Solid frames: `true` is a colour the pink range detector accepts
    pub fn pink_script(pattern: &[bool]) -> Self {
        let frames = pattern
            .iter()
            .map(|hit| {
                let rgb = if *hit { Rgb::new(220, 150, 200) } else { Rgb::new(0, 0, 0) };
                Some(Frame::filled(4, 4, rgb))
            })
            .collect();
        Self::new(frames)
    }
}

impl FrameSource for ScriptedSource {
    fn configure(&mut self, region: Region) -> Result<()> {
        self.configured.lock().push(region);
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        match self.queue.pop_front() {
            Some(next) => {
                self.last = next.clone();
                next
            }
            None => self.last.clone(),
        }
    }

    fn shutdown(&mut self) {
        self.shut_down.fetch_add(1, Ordering::SeqCst);
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }
}

pub struct FixedRegion {
    region: Mutex<Region>,
}

impl FixedRegion {
    pub fn new(region: Region) -> Arc<Self> {
        Arc::new(Self {
            region: Mutex::new(region),
        })
    }

    pub fn set(&self, region: Region) {
        *self.region.lock() = region;
    }
}

impl RegionProvider for FixedRegion {
    fn get_position(&self) -> Region {
        *self.region.lock()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn last_indicator(&self) -> Option<bool> {
        self.events.lock().iter().rev().find_map(|e| match e {
            UiEvent::KeyIndicator { pressed, .. } => Some(*pressed),
            _ => None,
        })
    }
}

impl RenderSink for RecordingSink {
    fn update_color_swatch(&self, rgb: Rgb) {
        self.events.lock().push(UiEvent::ColorSwatch { instance: 0, rgb });
    }

    fn update_fps(&self, fps: f64) {
        self.events.lock().push(UiEvent::Fps { instance: 0, fps });
    }

    fn update_key_indicator(&self, pressed: bool) {
        self.events.lock().push(UiEvent::KeyIndicator { instance: 0, pressed });
    }

    fn update_active(&self, active: bool) {
        self.events.lock().push(UiEvent::Active { instance: 0, active });
    }
}
