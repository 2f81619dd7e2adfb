pub mod keyboard;
pub mod telemetry;

pub use keyboard::{KeyCode, KeyState, VirtualKeyEvent};
pub use telemetry::UiEvent;
