/// Трансляция имён клавиш из конфигурации в evdev коды и обратно.
///
/// Таблица покрывает то, что реально назначают на триггер: буквы, цифры верхнего
/// ряда, F1-F12, модификаторы, стрелки и навигационные клавиши.
pub struct KeyNames;

const KEY_TABLE: &[(&str, u16)] = &[
    ("esc", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("minus", 12),
    ("equal", 13),
    ("backspace", 14),
    ("tab", 15),
    ("q", 16),
    ("w", 17),
    ("e", 18),
    ("r", 19),
    ("t", 20),
    ("y", 21),
    ("u", 22),
    ("i", 23),
    ("o", 24),
    ("p", 25),
    ("enter", 28),
    ("ctrl", 29),
    ("a", 30),
    ("s", 31),
    ("d", 32),
    ("f", 33),
    ("g", 34),
    ("h", 35),
    ("j", 36),
    ("k", 37),
    ("l", 38),
    ("shift", 42),
    ("z", 44),
    ("x", 45),
    ("c", 46),
    ("v", 47),
    ("b", 48),
    ("n", 49),
    ("m", 50),
    ("rightshift", 54),
    ("alt", 56),
    ("space", 57),
    ("capslock", 58),
    ("f1", 59),
    ("f2", 60),
    ("f3", 61),
    ("f4", 62),
    ("f5", 63),
    ("f6", 64),
    ("f7", 65),
    ("f8", 66),
    ("f9", 67),
    ("f10", 68),
    ("scrolllock", 70),
    ("f11", 87),
    ("f12", 88),
    ("rightctrl", 97),
    ("rightalt", 100),
    ("home", 102),
    ("up", 103),
    ("pageup", 104),
    ("left", 105),
    ("right", 106),
    ("end", 107),
    ("down", 108),
    ("pagedown", 109),
    ("insert", 110),
    ("delete", 111),
    ("pause", 119),
];

/// Синонимы, которые встречаются в конфигурациях
const ALIASES: &[(&str, &str)] = &[
    ("escape", "esc"),
    ("return", "enter"),
    ("control", "ctrl"),
    ("leftctrl", "ctrl"),
    ("leftshift", "shift"),
    ("leftalt", "alt"),
    ("del", "delete"),
    ("ins", "insert"),
];

impl KeyNames {
    /// evdev код по имени клавиши (регистронезависимо)
    pub fn code_for(name: &str) -> Option<u16> {
        let normalized = name.trim().to_lowercase();
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, target)| *target)
            .unwrap_or(normalized.as_str());

        KEY_TABLE
            .iter()
            .find(|(key, _)| *key == canonical)
            .map(|(_, code)| *code)
    }

    /// Каноническое имя клавиши по evdev коду
    pub fn name_for(code: u16) -> Option<&'static str> {
        KEY_TABLE
            .iter()
            .find(|(_, value)| *value == code)
            .map(|(key, _)| *key)
    }

    pub fn is_known(name: &str) -> bool {
        Self::code_for(name).is_some()
    }
}
