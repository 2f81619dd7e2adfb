use crate::detector::Rgb;
use std::fmt;

/// Сообщение из рабочего потока в поток отображения.
///
/// Любое изменение состояния отображения проходит только через эти сообщения.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEvent {
    ColorSwatch { instance: u32, rgb: Rgb },
    Fps { instance: u32, fps: f64 },
    KeyIndicator { instance: u32, pressed: bool },
    Active { instance: u32, active: bool },
}

impl UiEvent {
    pub fn instance(&self) -> u32 {
        match self {
            UiEvent::ColorSwatch { instance, .. }
            | UiEvent::Fps { instance, .. }
            | UiEvent::KeyIndicator { instance, .. }
            | UiEvent::Active { instance, .. } => *instance,
        }
    }
}

impl fmt::Display for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiEvent::ColorSwatch { instance, rgb } => write!(f, "#{} цвет {}", instance, rgb.hex()),
            UiEvent::Fps { instance, fps } => write!(f, "#{} FPS {:.1}", instance, fps),
            UiEvent::KeyIndicator { instance, pressed } => {
                write!(f, "#{} клавиша {}", instance, if *pressed { "нажата" } else { "отпущена" })
            }
            UiEvent::Active { instance, active } => {
                write!(f, "#{} {}", instance, if *active { "включён" } else { "выключен" })
            }
        }
    }
}
