//! Shared activation flag.
//!
//! One boolean gates key actuation for every instance in every process on the host.
//! The record is a single JSON file `{ "active": bool }`; writers do not coordinate,
//! the last write wins. Readers treat a missing or unreadable record as `true`.
//! Storage is behind [`ActivationStore`] so locking or versioning can be added
//! without touching callers.

use crate::error::Result;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Хранилище флага
pub trait ActivationStore: Send + Sync {
    /// `Ok(None)`: записи ещё нет
    fn load(&self) -> Result<Option<bool>>;
    fn store(&self, active: bool) -> Result<()>;
    fn describe(&self) -> String;
}

#[derive(Debug, Serialize, Deserialize)]
struct ActivationRecord {
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

/// Файл `{ "active": bool }`
#[derive(Debug, Clone)]
pub struct FileActivationStore {
    path: PathBuf,
}

impl FileActivationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ActivationStore for FileActivationStore {
    fn load(&self) -> Result<Option<bool>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: ActivationRecord = serde_json::from_str(&text)?;
        Ok(Some(record.active))
    }

    fn store(&self, active: bool) -> Result<()> {
        let text = serde_json::to_string(&ActivationRecord { active })?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub type Observer = Arc<dyn Fn(bool) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Watcher {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Общий флаг активности: get/set/toggle, подписчики и фоновый опрос
pub struct SharedActivation {
    store: Arc<dyn ActivationStore>,
    poll_interval: Duration,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
    next_id: AtomicU64,
    last_seen: Mutex<Option<bool>>,
    watcher: Mutex<Option<Watcher>>,
}

impl SharedActivation {
    pub fn new(store: Arc<dyn ActivationStore>, poll_interval: Duration) -> Arc<Self> {
        info!(
            "Общий флаг активности: {} (опрос каждые {:?})",
            store.describe(),
            poll_interval
        );
        Arc::new(Self {
            store,
            poll_interval,
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            last_seen: Mutex::new(None),
            watcher: Mutex::new(None),
        })
    }

    pub fn with_file(path: impl Into<PathBuf>, poll_interval: Duration) -> Arc<Self> {
        Self::new(Arc::new(FileActivationStore::new(path)), poll_interval)
    }

    /// Текущее значение. Ошибка чтения не фатальна: считаем флаг включённым.
    pub fn get(&self) -> bool {
        match self.store.load() {
            Ok(Some(active)) => active,
            Ok(None) => {
                // Первое чтение создаёт запись со значением по умолчанию
                if let Err(e) = self.store.store(true) {
                    debug!("Не удалось создать запись флага {}: {}", self.store.describe(), e);
                }
                true
            }
            Err(e) => {
                debug!("Запись флага {} не читается ({}), считаем true", self.store.describe(), e);
                true
            }
        }
    }

    pub fn set(&self, active: bool) {
        if let Err(e) = self.store.store(active) {
            warn!("Не удалось записать флаг активности в {}: {}", self.store.describe(), e);
        }
    }

    pub fn toggle(&self) -> bool {
        let next = !self.get();
        self.set(next);
        next
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Одна проверка записи; при изменении оповещает подписчиков и возвращает новое значение
    pub fn poll_once(&self) -> Option<bool> {
        let current = self.get();
        {
            let mut last = self.last_seen.lock();
            if *last == Some(current) {
                return None;
            }
            *last = Some(current);
        }

        info!("Флаг активности изменён: {}", if current { "включено" } else { "выключено" });
        self.notify(current);
        Some(current)
    }

    fn notify(&self, active: bool) {
        // Снимок списка: подписчик может отписаться прямо из обработчика
        let observers: Vec<(SubscriptionId, Observer)> = self.observers.read().clone();

        for (id, callback) in observers {
            match catch_unwind(AssertUnwindSafe(|| callback(active))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Подписчик {:?} вернул ошибку: {}", id, e),
                Err(_) => error!("Подписчик {:?} завершился паникой", id),
            }
        }
    }

    /// Запустить фоновый опрос. Повторный вызов ничего не делает.
    /// Требует работающего tokio runtime.
    pub fn start_watch(self: &Arc<Self>) {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return;
        }

        // Стартовое значение считается уже известным: оповещаем только о реальных изменениях
        *self.last_seen.lock() = Some(self.get());

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(this) = weak.upgrade() else { break };
                        this.poll_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Опрос флага активности остановлен");
        });

        *watcher = Some(Watcher { shutdown, handle });
        info!("Опрос флага активности запущен");
    }

    pub fn stop_watch(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            let _ = watcher.shutdown.send(true);
            watcher.handle.abort();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }
}

impl Drop for SharedActivation {
    fn drop(&mut self) {
        self.stop_watch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn temp_flag() -> (tempfile::TempDir, Arc<SharedActivation>) {
        let dir = tempfile::tempdir().unwrap();
        let flag = SharedActivation::with_file(dir.path().join("global_state.json"), Duration::from_millis(20));
        (dir, flag)
    }

    #[test]
    fn missing_record_reads_true_and_is_created() {
        let (dir, flag) = temp_flag();
        assert!(flag.get());

        let text = std::fs::read_to_string(dir.path().join("global_state.json")).unwrap();
        assert_eq!(text, r#"{"active":true}"#);
    }

    #[test]
    fn corrupt_record_reads_true() {
        let (dir, flag) = temp_flag();
        let path = dir.path().join("global_state.json");

        std::fs::write(&path, "{ not json").unwrap();
        assert!(flag.get());

        std::fs::write(&path, r#"{"active": "no"}"#).unwrap();
        assert!(flag.get());

        std::fs::write(&path, r#"{}"#).unwrap();
        assert!(flag.get());
    }

    #[test]
    fn set_and_toggle_persist() {
        let (dir, flag) = temp_flag();
        flag.set(false);
        assert!(!flag.get());
        assert!(flag.toggle());
        assert!(flag.get());

        // Другой экземпляр на том же файле видит то же значение
        let other = SharedActivation::with_file(dir.path().join("global_state.json"), Duration::from_secs(1));
        assert!(other.get());
    }

    #[test]
    fn poll_notifies_in_order_and_isolates_failures() {
        let (_dir, flag) = temp_flag();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        flag.subscribe(move |value| {
            first.lock().push(("first", value));
            Ok(())
        });
        flag.subscribe(|_| anyhow::bail!("сломанный подписчик"));
        flag.subscribe(|_| panic!("паника в подписчике"));
        let last = Arc::clone(&seen);
        flag.subscribe(move |value| {
            last.lock().push(("last", value));
            Ok(())
        });

        assert_eq!(flag.poll_once(), Some(true));
        assert_eq!(flag.poll_once(), None);

        flag.set(false);
        assert_eq!(flag.poll_once(), Some(false));

        assert_eq!(
            *seen.lock(),
            vec![("first", true), ("last", true), ("first", false), ("last", false)]
        );
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let (_dir, flag) = temp_flag();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = flag.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(flag.unsubscribe(id));
        assert!(!flag.unsubscribe(id));
        flag.poll_once();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(flag.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn watcher_broadcasts_external_change_once() {
        let (dir, flag) = temp_flag();
        flag.set(true);

        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&values);
        flag.subscribe(move |value| {
            sink.lock().push(value);
            Ok(())
        });

        flag.start_watch();
        flag.start_watch();
        assert!(flag.is_watching());

        // Запись из "другого процесса"
        FileActivationStore::new(dir.path().join("global_state.json"))
            .store(false)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*values.lock(), vec![false]);

        flag.stop_watch();
        assert!(!flag.is_watching());
    }
}
