//! 键控的一次性构造槽位
//!
//! 插板注册表和 I2C 设备缓存共用的 get-or-create 容器。构造在分片锁外进行，
//! 同一键的并发请求等待同一个槽位；构造失败且没有其他请求持有该槽位时移除它，
//! 因此失败不会在映射中留下任何条目。

use crate::Result;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Slot<V> {
    value: OnceCell<V>,
    /// 持有该槽位、尚未返回的请求数；只在分片锁内增加
    pending: AtomicUsize,
}

pub(crate) struct SlotMap<K, V> {
    slots: DashMap<K, Arc<Slot<V>>>,
}

impl<K, V> SlotMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// 返回 `key` 对应的值，不存在时调用 `init` 构造
    ///
    /// 同一键同时最多一个 `init` 在运行。失败原样返回。
    pub(crate) fn get_or_try_init<F>(&self, key: K, init: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let slot = {
            let entry = self.slots.entry(key.clone()).or_insert_with(|| {
                Arc::new(Slot {
                    value: OnceCell::new(),
                    pending: AtomicUsize::new(0),
                })
            });
            entry.pending.fetch_add(1, Ordering::SeqCst);
            entry.value().clone()
        };

        let result = slot.value.get_or_try_init(init).map(V::clone);
        slot.pending.fetch_sub(1, Ordering::SeqCst);

        if result.is_err() {
            // 最后一个离开的失败请求负责移除空槽位
            self.slots.remove_if(&key, |_, current| {
                Arc::ptr_eq(current, &slot)
                    && current.value.get().is_none()
                    && current.pending.load(Ordering::SeqCst) == 0
            });
        }

        result
    }

    /// 已构造的值（不创建）
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.slots.get(key).and_then(|slot| slot.value.get().cloned())
    }

    /// 已构造的值满足 `predicate` 时移除该键
    pub(crate) fn remove_if<P>(&self, key: &K, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        self.slots
            .remove_if(key, |_, slot| slot.value.get().map_or(false, predicate))
            .is_some()
    }

    /// 所有已构造值的快照
    pub(crate) fn values(&self) -> Vec<V> {
        self.slots
            .iter()
            .filter_map(|entry| entry.value().value.get().cloned())
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.slots.clear();
    }

    /// 映射中的条目数，包括正在构造的槽位
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HubError;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_init_runs_once() {
        let map: SlotMap<u16, u32> = SlotMap::new();
        assert_eq!(map.get_or_try_init(1, || Ok(10)).unwrap(), 10);
        assert_eq!(
            map.get_or_try_init(1, || Err(HubError::hardware("unreachable")))
                .unwrap(),
            10
        );
        assert_eq!(map.get(&1), Some(10));
        assert_eq!(map.slot_count(), 1);
    }

    #[test]
    fn test_failed_init_removes_slot() {
        let map: SlotMap<u16, u32> = SlotMap::new();
        for key in 0..100 {
            assert!(map
                .get_or_try_init(key, || Err(HubError::hardware("nack")))
                .is_err());
        }
        assert_eq!(map.slot_count(), 0);
        assert!(map.values().is_empty());
    }

    #[test]
    fn test_waiter_survives_failed_init() {
        let map: SlotMap<u16, u32> = SlotMap::new();
        let map = &map;
        let (entered_tx, entered_rx) = mpsc::channel();

        let (first, second) = std::thread::scope(|scope| {
            let first = scope.spawn(move || {
                map.get_or_try_init(7, || {
                    entered_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(20));
                    Err(HubError::hardware("busy"))
                })
            });
            entered_rx.recv().unwrap();
            let second = scope.spawn(move || map.get_or_try_init(7, || Ok(42)));
            (first.join().unwrap(), second.join().unwrap())
        });

        assert!(first.is_err());
        assert_eq!(second.unwrap(), 42);
        assert_eq!(map.get(&7), Some(42));
        assert_eq!(map.slot_count(), 1);
    }

    #[test]
    fn test_remove_if_ignores_empty_and_unmatched() {
        let map: SlotMap<u16, u32> = SlotMap::new();
        map.get_or_try_init(1, || Ok(5)).unwrap();

        assert!(!map.remove_if(&1, |value| *value == 6));
        assert!(!map.remove_if(&2, |_| true));
        assert!(map.remove_if(&1, |value| *value == 5));
        assert_eq!(map.slot_count(), 0);
    }
}
