use crate::detector::Rgb;
use crate::events::UiEvent;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// Приёмник телеметрии одного экземпляра. Все методы fire-and-forget
/// и могут вызываться из любого потока.
pub trait RenderSink: Send + Sync {
    fn update_color_swatch(&self, rgb: Rgb);
    fn update_fps(&self, fps: f64);
    fn update_key_indicator(&self, pressed: bool);
    fn update_active(&self, active: bool);
}

/// Продакшн-приёмник: только отправляет сообщения в канал отображения
#[derive(Debug, Clone)]
pub struct ChannelRenderSink {
    instance: u32,
    tx: UnboundedSender<UiEvent>,
}

impl ChannelRenderSink {
    pub fn new(instance: u32, tx: UnboundedSender<UiEvent>) -> Self {
        Self { instance, tx }
    }

    fn send(&self, event: UiEvent) {
        // Отображение уже закрыто при завершении: молча теряем событие
        let _ = self.tx.send(event);
    }
}

impl RenderSink for ChannelRenderSink {
    fn update_color_swatch(&self, rgb: Rgb) {
        self.send(UiEvent::ColorSwatch { instance: self.instance, rgb });
    }

    fn update_fps(&self, fps: f64) {
        self.send(UiEvent::Fps { instance: self.instance, fps });
    }

    fn update_key_indicator(&self, pressed: bool) {
        self.send(UiEvent::KeyIndicator { instance: self.instance, pressed });
    }

    fn update_active(&self, active: bool) {
        self.send(UiEvent::Active { instance: self.instance, active });
    }
}

pub fn render_channel() -> (UnboundedSender<UiEvent>, UnboundedReceiver<UiEvent>) {
    mpsc::unbounded_channel()
}

/// Последнее известное состояние экземпляра
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceView {
    pub swatch: Option<Rgb>,
    pub fps: Option<f64>,
    pub key_pressed: bool,
    pub active: bool,
}

/// Единственный владелец состояния отображения
pub struct StatusBoard {
    rx: UnboundedReceiver<UiEvent>,
    views: BTreeMap<u32, InstanceView>,
    refresh: Duration,
}

impl StatusBoard {
    pub fn new(rx: UnboundedReceiver<UiEvent>, refresh: Duration) -> Self {
        Self {
            rx,
            views: BTreeMap::new(),
            refresh,
        }
    }

    pub fn apply(&mut self, event: UiEvent) {
        let view = self.views.entry(event.instance()).or_default();
        match event {
            UiEvent::ColorSwatch { rgb, .. } => view.swatch = Some(rgb),
            UiEvent::Fps { fps, .. } => view.fps = Some(fps),
            UiEvent::KeyIndicator { pressed, .. } => view.key_pressed = pressed,
            UiEvent::Active { active, .. } => view.active = active,
        }
    }

    pub fn view(&self, instance: u32) -> Option<&InstanceView> {
        self.views.get(&instance)
    }

    pub fn render_line(instance: u32, view: &InstanceView) -> String {
        let swatch = match view.swatch {
            Some(rgb) => format!("{} {}", rgb.ansi_block(4), rgb.hex()),
            None => "----".to_string(),
        };
        let fps = view.fps.map_or_else(|| "FPS: --".to_string(), |fps| format!("FPS: {:.1}", fps));

        format!(
            "#{} {} {} | {} | {}",
            instance,
            if view.active { "ON " } else { "OFF" },
            swatch,
            fps,
            if view.key_pressed { "KEY ▼" } else { "KEY ▲" }
        )
    }

    /// Цикл отображения: поглощает канал и раз в `refresh` печатает состояние.
    /// Завершается, когда закрыты все отправители.
    pub async fn run(mut self) {
        info!("Отображение состояния запущено (обновление каждые {:?})", self.refresh);
        let mut ticker = tokio::time::interval(self.refresh);
        ticker.tick().await;

        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.apply(event),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    for (instance, view) in &self.views {
                        info!("{}", Self::render_line(*instance, view));
                    }
                }
            }
        }
        debug!("Канал отображения закрыт");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_marshals_events() {
        let (tx, mut rx) = render_channel();
        let sink = ChannelRenderSink::new(3, tx);
        sink.update_color_swatch(Rgb::new(1, 2, 3));
        sink.update_key_indicator(true);

        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::ColorSwatch { instance: 3, rgb: Rgb::new(1, 2, 3) }
        );
        assert_eq!(rx.try_recv().unwrap(), UiEvent::KeyIndicator { instance: 3, pressed: true });
    }

    #[test]
    fn sink_survives_closed_board() {
        let (tx, rx) = render_channel();
        drop(rx);
        ChannelRenderSink::new(1, tx).update_fps(60.0);
    }

    #[test]
    fn board_keeps_latest_state_per_instance() {
        let (_tx, rx) = render_channel();
        let mut board = StatusBoard::new(rx, Duration::from_secs(1));
        board.apply(UiEvent::Fps { instance: 1, fps: 30.0 });
        board.apply(UiEvent::Fps { instance: 1, fps: 60.0 });
        board.apply(UiEvent::Active { instance: 2, active: true });

        assert_eq!(board.view(1).unwrap().fps, Some(60.0));
        assert!(board.view(2).unwrap().active);
        assert!(StatusBoard::render_line(1, board.view(1).unwrap()).contains("FPS: 60.0"));
    }

    #[tokio::test]
    async fn board_stops_when_senders_close() {
        let (tx, rx) = render_channel();
        let board = StatusBoard::new(rx, Duration::from_millis(10));
        let handle = tokio::spawn(board.run());
        ChannelRenderSink::new(1, tx.clone()).update_active(true);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
