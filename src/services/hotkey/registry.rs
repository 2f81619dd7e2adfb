use crate::events::{KeyCode, KeyState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

struct Hotkey {
    key: KeyCode,
    callback: HotkeyCallback,
}

/// Реестр глобальных горячих клавиш процесса.
///
/// Регистрация идемпотентна по идентификатору: повторный `add_hotkey` с тем же id
/// ничего не меняет, поэтому одна физическая клавиша не может вызвать обработчик дважды.
#[derive(Default)]
pub struct HotkeyRegistry {
    hotkeys: DashMap<String, Hotkey>,
}

static GLOBAL_REGISTRY: Lazy<Arc<HotkeyRegistry>> = Lazy::new(|| Arc::new(HotkeyRegistry::new()));

impl HotkeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Реестр процесса: создаётся при первом обращении, очищается `clear()` при завершении
    pub fn global() -> Arc<HotkeyRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn add_hotkey<F>(&self, id: &str, key: KeyCode, callback: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        match self.hotkeys.entry(id.to_string()) {
            Entry::Occupied(_) => {
                warn!("Горячая клавиша '{}' уже зарегистрирована, повторная регистрация пропущена", id);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Hotkey {
                    key,
                    callback: Arc::new(callback),
                });
                info!("Горячая клавиша '{}' зарегистрирована на {}", id, key);
                true
            }
        }
    }

    pub fn remove_hotkey(&self, id: &str) -> bool {
        self.hotkeys.remove(id).is_some()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.hotkeys.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.hotkeys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hotkeys.is_empty()
    }

    pub fn clear(&self) {
        self.hotkeys.clear();
    }

    /// Вызвать обработчики клавиши. Срабатывают только нажатия, автоповтор и
    /// отпускание игнорируются. Возвращает число вызванных обработчиков.
    pub fn dispatch(&self, key: KeyCode, state: KeyState) -> usize {
        if state != KeyState::Pressed {
            return 0;
        }

        // Обработчики вызываются вне блокировок карты: им разрешено менять реестр
        let callbacks: SmallVec<[(String, HotkeyCallback); 4]> = self
            .hotkeys
            .iter()
            .filter(|entry| entry.value().key == key)
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().callback)))
            .collect();

        for (id, callback) in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                error!("Обработчик горячей клавиши '{}' завершился паникой", id);
            }
        }
        callbacks.len()
    }
}
