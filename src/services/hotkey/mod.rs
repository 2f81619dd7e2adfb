mod listener;
mod registry;

pub use listener::create_hotkey_listener;
pub use registry::HotkeyRegistry;
