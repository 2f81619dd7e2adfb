use crate::error::{AppError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Ограниченный пул слотов быстрого захвата.
///
/// Слоты раздаются по кругу под одной блокировкой, так что два источника
/// никогда не получают один и тот же слот. Если свободного слота нет, это ошибка,
/// а не тихое переиспользование.
#[derive(Debug)]
pub struct SlotPool {
    capacity: usize,
    state: Mutex<SlotState>,
}

#[derive(Debug)]
struct SlotState {
    busy: Vec<bool>,
    next: usize,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        info!("Пул слотов захвата: {} слотов", capacity);
        Arc::new(Self {
            capacity,
            state: Mutex::new(SlotState {
                busy: vec![false; capacity],
                next: 0,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().busy.iter().filter(|busy| **busy).count()
    }

    pub fn acquire(self: &Arc<Self>) -> Result<SlotLease> {
        let mut state = self.state.lock();

        let start = state.next;
        let free = (0..self.capacity)
            .map(|offset| (start + offset) % self.capacity)
            .find(|&index| !state.busy[index]);

        match free {
            Some(index) => {
                state.busy[index] = true;
                state.next = (index + 1) % self.capacity;
                debug!("Выдан слот захвата #{}", index);
                Ok(SlotLease {
                    pool: Arc::clone(self),
                    index,
                })
            }
            None => Err(AppError::SlotsExhausted {
                capacity: self.capacity,
            }),
        }
    }

    fn release(&self, index: usize) {
        let mut state = self.state.lock();
        if let Some(slot) = state.busy.get_mut(index) {
            *slot = false;
            debug!("Слот захвата #{} освобождён", index);
        }
    }
}

/// Занятый слот; освобождается при Drop
#[derive(Debug)]
pub struct SlotLease {
    pool: Arc<SlotPool>,
    index: usize,
}

impl SlotLease {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_distinct_and_round_robin() {
        let pool = SlotPool::new(4);
        let leases: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
        let indexes: Vec<_> = leases.iter().map(SlotLease::index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
        assert_eq!(pool.in_use(), 4);
    }

    #[test]
    fn fifth_acquire_fails_instead_of_sharing() {
        let pool = SlotPool::new(4);
        let _leases: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();

        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, AppError::SlotsExhausted { capacity: 4 }));
    }

    #[test]
    fn dropped_lease_frees_its_slot() {
        let pool = SlotPool::new(2);
        let first = pool.acquire().unwrap();
        let _second = pool.acquire().unwrap();
        assert!(pool.acquire().is_err());

        let freed = first.index();
        drop(first);
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.acquire().unwrap().index(), freed);
    }
}
