use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Все слоты захвата заняты (доступно: {capacity})")]
    SlotsExhausted { capacity: usize },

    #[error("Ошибка захвата экрана: {0}")]
    Capture(String),

    #[error("Неизвестная клавиша: {0}")]
    InvalidKey(String),

    #[error("Некорректная область захвата: {0}")]
    InvalidRegion(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl AppError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(AppError::DeviceNotFound(msg.into()))
    }

    /// Исчерпание слотов захвата: вызывающий решает, падать или брать запасную стратегию
    pub fn is_slots_exhausted(&self) -> bool {
        matches!(self, AppError::SlotsExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! app_error {
    (device_not_found, $($arg:tt)*) => {
        $crate::error::AppError::DeviceNotFound(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::AppError::Permission(format!($($arg)*))
    };
    (capture, $($arg:tt)*) => {
        $crate::error::AppError::Capture(format!($($arg)*))
    };
    (invalid_key, $($arg:tt)*) => {
        $crate::error::AppError::InvalidKey(format!($($arg)*))
    };
    (invalid_region, $($arg:tt)*) => {
        $crate::error::AppError::InvalidRegion(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::AppError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_exhausted_is_recognised() {
        let err = AppError::SlotsExhausted { capacity: 4 };
        assert!(err.is_slots_exhausted());
        assert!(err.to_string().contains('4'));
        assert!(!app_error!(capture, "нет кадра {}", 1).is_slots_exhausted());
    }
}
