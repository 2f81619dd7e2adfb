pub mod activation;
pub mod actuator;
pub mod coordinator;
pub mod hotkey;
pub mod virtual_device;

pub use coordinator::Coordinator;
pub use hotkey::{create_hotkey_listener, HotkeyRegistry};
pub use virtual_device::{KeyInjector, VirtualDevice};
