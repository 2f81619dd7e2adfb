use crate::error::{AppError, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

const INPUT_DIR: &str = "/dev/input";
const UINPUT_DEVICE: &str = "/dev/uinput";

/// Предварительная проверка доступа к устройствам ввода и к uinput.
/// В dry-run режиме не вызывается.
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_input_devices_access(Path::new(INPUT_DIR))?;
    check_uinput_access(Path::new(UINPUT_DEVICE))?;
    check_not_root();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access(input_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(AppError::Permission(format!(
            "Директория {} не существует",
            input_dir.display()
        )));
    }

    fs::read_dir(input_dir).map_err(|e| {
        AppError::Permission(format!(
            "Нет доступа к {}: {}. Добавьте пользователя в группу 'input'",
            input_dir.display(),
            e
        ))
    })?;

    info!("Доступ к {} подтвержден", input_dir.display());
    Ok(())
}

fn check_uinput_access(uinput_device: &Path) -> Result<()> {
    if !uinput_device.exists() {
        // Модуль может быть загружен позже, создание устройства сообщит точную ошибку
        warn!("{} не существует, возможно модуль uinput не загружен", uinput_device.display());
        return Ok(());
    }

    let metadata = fs::metadata(uinput_device).map_err(|e| {
        AppError::Permission(format!(
            "Не удалось проверить права доступа к {}: {}",
            uinput_device.display(),
            e
        ))
    })?;

    if !mode_allows_access(metadata.permissions().mode()) {
        return Err(AppError::Permission(format!(
            "Нет прав доступа к {}. Добавьте пользователя в группу 'uinput' или 'input'",
            uinput_device.display()
        )));
    }

    info!("Доступ к {} подтвержден", uinput_device.display());
    Ok(())
}

/// Группа или остальные должны иметь хоть какие-то права (обычно 660 или 666)
fn mode_allows_access(mode: u32) -> bool {
    mode & 0o006 != 0 || mode & 0o060 != 0
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("Приложение запущено от имени root");
            for line in setup_commands() {
                warn!("   {}", line);
            }
        }
        Ok(user) => info!("Приложение запущено от имени пользователя: {}", user),
        Err(_) => warn!("Не удалось определить пользователя"),
    }
}

/// Команды настройки прав для запуска без root
pub fn setup_commands() -> Vec<&'static str> {
    vec![
        "sudo usermod -a -G input,uinput $USER",
        "sudo modprobe uinput",
        "echo 'uinput' | sudo tee /etc/modules-load.d/uinput.conf",
        "(затем перезайдите в систему)",
    ]
}
