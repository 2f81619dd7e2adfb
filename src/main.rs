use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

mod capture;
mod config;
mod detector;
mod error;
mod events;
pub mod mappings;
mod services;
mod ui;
mod utils;

#[cfg(test)]
mod testing;

use capture::XcapGrabber;
use config::{Config, LoggingConfig};
use services::{create_hotkey_listener, Coordinator, HotkeyRegistry, KeyInjector, VirtualDevice};
use ui::{render_channel, ChannelRenderSink, RenderSink, StatusBoard};

#[derive(Parser, Debug)]
#[command(name = "color-trigger")]
#[command(about = "Нажимает клавишу, пока в области экрана виден заданный цвет")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "color_trigger.toml")]
    config: String,

    /// Режим сухого запуска (нажатия только логируются)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает конфигурацию)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let created = Config::write_default_if_missing(&args.config)?;
    let config = Config::load(&args.config)?;

    init_tracing(&config.logging, args.log_level.as_deref())?;

    info!("Запуск Color Trigger v{}", env!("CARGO_PKG_VERSION"));
    if created {
        info!("Создана конфигурация по умолчанию: {}", args.config);
    }
    info!("Конфигурация загружена из: {} ({} детекторов)", args.config, config.instances.len());

    if args.dry_run {
        warn!("Режим сухого запуска - нажатия клавиш не отправляются");
    } else {
        utils::permissions::check_permissions()?;
    }

    let virtual_device = Arc::new(VirtualDevice::new("Color-Trigger Virtual Keyboard", args.dry_run)?);
    let injector: Arc<dyn KeyInjector> = virtual_device.clone();
    let registry = HotkeyRegistry::global();

    let (ui_tx, ui_rx) = render_channel();
    let board_handle = tokio::spawn(StatusBoard::new(ui_rx, Duration::from_secs(1)).run());

    let coordinator = Coordinator::build(
        &config,
        injector,
        Arc::new(XcapGrabber::new()),
        Arc::clone(&registry),
        |id| Arc::new(ChannelRenderSink::new(id, ui_tx.clone())) as Arc<dyn RenderSink>,
    )?;
    drop(ui_tx);

    let hotkey_listener = create_hotkey_listener(&config.hotkey, Arc::clone(&registry), args.dry_run)?;
    coordinator.start()?;

    let listener_handle = tokio::spawn(async move {
        if let Err(e) = hotkey_listener.run().await {
            error!("Ошибка в HotkeyListener: {}", e);
        }
    });

    info!("Все сервисы запущены, Ctrl+C для выхода");

    match signal::ctrl_c().await {
        Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
        Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
    }

    info!("Завершение работы...");

    let report = coordinator.shutdown();
    if !report.failed_positions.is_empty() {
        warn!("Не сохранены позиции детекторов: {:?}", report.failed_positions);
    }
    registry.clear();

    // Последняя страховка от залипших клавиш
    if let Err(e) = virtual_device.release_all() {
        warn!("Не удалось выполнить release_all: {}", e);
    }

    listener_handle.abort();
    drop(coordinator);

    let shutdown_result = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = listener_handle.await;
        let _ = board_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("Color Trigger завершил работу");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = level_override.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "full" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
