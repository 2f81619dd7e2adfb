use crate::error::{AppError, Result};
use crate::mappings::KeyNames;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояние клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
    Repeat,
}

impl KeyState {
    /// Значение поля `value` у evdev/uinput события
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Released),
            1 => Some(KeyState::Pressed),
            2 => Some(KeyState::Repeat),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            KeyState::Released => 0,
            KeyState::Pressed => 1,
            KeyState::Repeat => 2,
        }
    }
}

/// Код клавиши (evdev коды)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Разбор имени из конфигурации ("a", "f8", "space")
    pub fn from_name(name: &str) -> Result<Self> {
        KeyNames::code_for(name)
            .map(Self)
            .ok_or_else(|| AppError::InvalidKey(name.to_string()))
    }

    pub fn name(&self) -> Option<&'static str> {
        KeyNames::name_for(self.0)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "KEY_{}", self.0),
        }
    }
}

/// Событие для виртуальной клавиатуры
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualKeyEvent {
    pub key_code: KeyCode,
    pub state: KeyState,
}

impl VirtualKeyEvent {
    pub fn press(key_code: KeyCode) -> Self {
        Self {
            key_code,
            state: KeyState::Pressed,
        }
    }

    pub fn release(key_code: KeyCode) -> Self {
        Self {
            key_code,
            state: KeyState::Released,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_code_from_name() {
        assert_eq!(KeyCode::from_name("a").unwrap(), KeyCode(30));
        assert!(matches!(
            KeyCode::from_name("nope"),
            Err(AppError::InvalidKey(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_key_code_display() {
        assert_eq!(KeyCode(66).to_string(), "f8");
        assert_eq!(KeyCode(500).to_string(), "KEY_500");
    }

    #[test]
    fn test_key_state_raw_roundtrip() {
        for state in [KeyState::Pressed, KeyState::Released, KeyState::Repeat] {
            assert_eq!(KeyState::from_raw(state.raw()), Some(state));
        }
        assert_eq!(KeyState::from_raw(7), None);
    }
}
