use crate::detector::Channel;
use crate::mappings::KeyNames;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub capture: CaptureConfig,
    pub activation: ActivationConfig,
    pub hotkey: HotkeyConfig,
    pub telemetry: TelemetryConfig,
    pub positions: PositionsConfig,
    pub instances: Vec<InstanceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Стратегия захвата кадров
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// Фоновый захват, привязанный к ограниченному слоту
    Streaming,
    /// Синхронный захват с ограничением FPS, без слотов
    Polling,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub backend: CaptureBackend,
    pub target_fps: u32,
    pub slot_count: usize,
    pub fallback_on_exhaustion: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::Streaming,
            target_fps: 120,
            slot_count: 4,
            fallback_on_exhaustion: false,
        }
    }
}

impl CaptureConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivationConfig {
    pub state_file: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("global_state.json"),
            poll_interval_ms: 1000,
        }
    }
}

impl ActivationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub toggle_key: String,
    pub device_path: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle_key: "f8".to_string(),
            device_path: "auto".to_string(),
        }
    }
}

/// Частота телеметрии и логов: это настройка производительности, а не корректности
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub fps_update_interval_ms: u64,
    pub ui_every_n_frames: u32,
    pub log_every_n_frames: u64,
    pub log_detections: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            fps_update_interval_ms: 1000,
            ui_every_n_frames: 1,
            log_every_n_frames: 30,
            log_detections: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PositionsConfig {
    pub directory: PathBuf,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
    pub trigger_key: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<[i32; 2]>,
    pub detector: DetectorSettings,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Detector 1".to_string(),
            width: 80,
            height: 10,
            border_width: 3,
            trigger_key: "a".to_string(),
            enabled: true,
            position: None,
            detector: DetectorSettings::default(),
        }
    }
}

/// Параметры детектора, вариант выбирается полем `kind`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorSettings {
    Range {
        #[serde(default = "default_min_rgb")]
        min_rgb: [i32; 3],
        #[serde(default = "default_max_rgb")]
        max_rgb: [i32; 3],
        #[serde(default = "default_min_percent")]
        min_percent: f64,
    },
    Dominance {
        #[serde(default = "default_channel")]
        channel: Channel,
        #[serde(default = "default_min_level")]
        min_level: i32,
        #[serde(default = "default_dominance_caps")]
        max_rgb: [i32; 3],
        #[serde(default = "default_dominance")]
        dominance: i32,
    },
}

impl Default for DetectorSettings {
    fn default() -> Self {
        DetectorSettings::Range {
            min_rgb: default_min_rgb(),
            max_rgb: default_max_rgb(),
            min_percent: default_min_percent(),
        }
    }
}

fn default_min_rgb() -> [i32; 3] {
    [200, 120, 180]
}

fn default_max_rgb() -> [i32; 3] {
    [255, 200, 255]
}

fn default_min_percent() -> f64 {
    0.01
}

fn default_channel() -> Channel {
    Channel::Blue
}

fn default_min_level() -> i32 {
    100
}

fn default_dominance_caps() -> [i32; 3] {
    [100, 100, 100]
}

fn default_dominance() -> i32 {
    50
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CTRIG_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    /// Конфигурация по умолчанию на четыре экземпляра: красный, зелёный, синий, жёлтый
    pub fn with_default_instances() -> Self {
        let ranges: [([i32; 3], [i32; 3]); 4] = [
            ([200, 0, 0], [255, 50, 50]),
            ([0, 200, 0], [50, 255, 50]),
            ([0, 0, 200], [50, 50, 255]),
            ([200, 200, 0], [255, 255, 50]),
        ];

        let instances = ranges
            .iter()
            .zip(1u32..)
            .map(|((min_rgb, max_rgb), id)| InstanceConfig {
                id,
                name: format!("Detector {}", id),
                width: 200,
                height: 200,
                border_width: 6,
                trigger_key: id.to_string(),
                enabled: true,
                position: None,
                detector: DetectorSettings::Range {
                    min_rgb: *min_rgb,
                    max_rgb: *max_rgb,
                    min_percent: default_min_percent(),
                },
            })
            .collect();

        Self {
            capture: CaptureConfig {
                target_fps: 90,
                ..CaptureConfig::default()
            },
            instances,
            ..Self::default()
        }
    }

    /// Записать конфигурацию по умолчанию, если файла ещё нет
    pub fn write_default_if_missing<P: AsRef<Path>>(config_path: P) -> Result<bool> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            return Ok(false);
        }

        let text = toml::to_string_pretty(&Self::with_default_instances())
            .context("Не удалось сериализовать конфигурацию по умолчанию")?;
        std::fs::write(config_path, text)
            .with_context(|| format!("Не удалось записать {:?}", config_path))?;
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.capture.target_fps == 0 {
            anyhow::bail!("target_fps должно быть больше 0");
        }

        if self.capture.slot_count == 0 {
            anyhow::bail!("slot_count должно быть больше 0");
        }

        if self.activation.poll_interval_ms < 50 {
            anyhow::bail!("poll_interval_ms должно быть минимум 50");
        }

        if self.telemetry.fps_update_interval_ms < 1000 {
            anyhow::bail!("fps_update_interval_ms должно быть минимум 1000");
        }

        if self.telemetry.ui_every_n_frames == 0 {
            anyhow::bail!("ui_every_n_frames должно быть больше 0");
        }

        if !KeyNames::is_known(&self.hotkey.toggle_key) {
            anyhow::bail!("Неизвестная клавиша переключения: {}", self.hotkey.toggle_key);
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.id) {
                anyhow::bail!("Повторяющийся id экземпляра: {}", instance.id);
            }
            if instance.width == 0 || instance.height == 0 {
                anyhow::bail!("Экземпляр #{}: нулевой размер области", instance.id);
            }
            if !KeyNames::is_known(&instance.trigger_key) {
                anyhow::bail!(
                    "Экземпляр #{}: неизвестная клавиша '{}'",
                    instance.id,
                    instance.trigger_key
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validation() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::with_default_instances().validate().is_ok());
    }

    #[test]
    fn test_default_instances_layout() {
        let config = Config::with_default_instances();
        assert_eq!(config.instances.len(), 4);
        assert_eq!(config.instances[2].trigger_key, "3");
        assert_eq!(config.capture.target_fps, 90);
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[capture]
backend = "polling"

[[instances]]
id = 7
trigger_key = "space"

[instances.detector]
kind = "dominance"
min_level = 120
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.capture.backend, CaptureBackend::Polling);
        assert_eq!(config.capture.target_fps, 120);
        assert_eq!(config.activation.poll_interval(), Duration::from_secs(1));

        let instance = &config.instances[0];
        assert_eq!(instance.id, 7);
        assert_eq!(instance.width, 80);
        assert_eq!(
            instance.detector,
            DetectorSettings::Dominance {
                channel: Channel::Blue,
                min_level: 120,
                max_rgb: [100, 100, 100],
                dominance: 50,
            }
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::with_default_instances();
        config.instances[1].id = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hotkey.toggle_key = "hyper".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.instances.push(InstanceConfig {
            trigger_key: "???".to_string(),
            ..InstanceConfig::default()
        });
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.capture.slot_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.fps_update_interval_ms = 0;
        assert!(config.validate().is_err());
        config.telemetry.fps_update_interval_ms = 999;
        assert!(config.validate().is_err());
        config.telemetry.fps_update_interval_ms = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_file_is_written_once_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color_trigger.toml");

        assert!(Config::write_default_if_missing(&path).unwrap());
        assert!(!Config::write_default_if_missing(&path).unwrap());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.instances.len(), 4);
        assert_eq!(config.instances[0].border_width, 6);
    }
}
