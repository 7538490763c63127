//! 插板注册表
//!
//! 类型到插板实例的映射。每种插板类型同时最多存在一个存活实例：
//! 首次请求时构造，插板释放时通过释放回调自动注销，之后的请求会构造新实例。

use super::plate::Plate;
use crate::slot::SlotMap;
use crate::{HubError, Result};
use std::any::{type_name, Any, TypeId};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 已构造的插板
#[derive(Clone)]
struct LivePlate {
    /// 用于向下转型
    instance: Arc<dyn Any + Send + Sync>,
    /// 用于释放
    plate: Arc<dyn Plate>,
    type_name: &'static str,
}

type PlateMap = SlotMap<TypeId, LivePlate>;

/// 插板注册表
pub struct PlateRegistry {
    /// 按类型存放的插板；构造失败的类型不留条目
    plates: Arc<PlateMap>,
}

impl PlateRegistry {
    pub fn new() -> Self {
        Self {
            plates: Arc::new(SlotMap::new()),
        }
    }

    /// 获取或创建插板
    ///
    /// 同一类型的并发请求只会调用一次 `factory`，竞争失败者得到胜者的实例。
    /// 构造失败原样返回，不留下任何已注册的条目。
    pub fn get_or_create_with<T, F>(&self, mut factory: F) -> Result<Arc<T>>
    where
        T: Plate,
        F: FnMut() -> Result<T>,
    {
        let key = TypeId::of::<T>();

        loop {
            let live = self
                .plates
                .get_or_try_init(key, || self.build::<T, F>(&mut factory))?;

            // 插板可能已释放但回调尚未移除条目，此时移除旧条目后重试
            if live.plate.is_disposed() {
                self.plates.remove_if(&key, |current| current.plate.is_disposed());
                continue;
            }

            return Self::downcast::<T>(&live);
        }
    }

    /// 查找已存在的插板，不创建
    pub fn get<T: Plate>(&self) -> Option<Arc<T>> {
        let live = self.plates.get(&TypeId::of::<T>())?;
        if live.plate.is_disposed() {
            return None;
        }
        Self::downcast::<T>(&live).ok()
    }

    /// 存活插板数量
    pub fn len(&self) -> usize {
        self.plates
            .values()
            .iter()
            .filter(|live| !live.plate.is_disposed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 释放全部插板，返回本次释放的数量
    ///
    /// 先取快照再逐个释放，释放回调会并发地移除各自的条目。
    pub fn dispose_all(&self) -> usize {
        let snapshot = self.plates.values();

        let mut disposed = 0;
        for live in snapshot {
            if live.plate.is_disposed() {
                continue;
            }
            live.plate.dispose();
            disposed += 1;
            debug!("Disposed plate {}", live.type_name);
        }

        self.plates.clear();
        info!("Disposed {} plates", disposed);
        disposed
    }

    fn build<T, F>(&self, factory: &mut F) -> Result<LivePlate>
    where
        T: Plate,
        F: FnMut() -> Result<T>,
    {
        let name = type_name::<T>();
        let plate = Arc::new(factory().map_err(|e| {
            warn!("Failed to construct plate {}: {}", name, e);
            e
        })?);

        // 回调只持有弱引用，避免 注册表 -> 插板 -> 回调 -> 注册表 的循环；
        // 只移除已释放的实例，新构造的实例不受影响
        let plates: Weak<PlateMap> = Arc::downgrade(&self.plates);
        plate.lifecycle().register_for_disposal(Box::new(move || {
            if let Some(plates) = plates.upgrade() {
                plates.remove_if(&TypeId::of::<T>(), |current| current.plate.is_disposed());
            }
            debug!("Plate {} deregistered", name);
        }));

        debug!("Created plate {}", name);
        Ok(LivePlate {
            instance: plate.clone(),
            plate,
            type_name: name,
        })
    }

    fn downcast<T: Plate>(live: &LivePlate) -> Result<Arc<T>> {
        live.instance
            .clone()
            .downcast::<T>()
            .map_err(|_| HubError::plate_construction::<T>("registered instance has a different type"))
    }
}

impl Default for PlateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubHandle;
    use crate::plates::PlateLifecycle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    struct CounterPlate {
        lifecycle: PlateLifecycle,
        releases: Arc<AtomicUsize>,
    }

    impl CounterPlate {
        fn new(releases: Arc<AtomicUsize>) -> Self {
            Self {
                lifecycle: PlateLifecycle::new(),
                releases,
            }
        }
    }

    impl Plate for CounterPlate {
        fn create(_hub: HubHandle) -> Result<Self> {
            Ok(Self::new(Arc::new(AtomicUsize::new(0))))
        }

        fn lifecycle(&self) -> &PlateLifecycle {
            &self.lifecycle
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct OtherPlate {
        lifecycle: PlateLifecycle,
    }

    impl Plate for OtherPlate {
        fn create(_hub: HubHandle) -> Result<Self> {
            Ok(Self {
                lifecycle: PlateLifecycle::new(),
            })
        }

        fn lifecycle(&self) -> &PlateLifecycle {
            &self.lifecycle
        }
    }

    #[test]
    fn test_single_instance_per_type() {
        let registry = PlateRegistry::new();
        let releases = Arc::new(AtomicUsize::new(0));

        let first = registry
            .get_or_create_with(|| Ok(CounterPlate::new(releases.clone())))
            .unwrap();
        let second = registry
            .get_or_create_with(|| Ok(CounterPlate::new(releases.clone())))
            .unwrap();
        let other = registry
            .get_or_create_with(|| Ok(OtherPlate { lifecycle: PlateLifecycle::new() }))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!other.is_disposed());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_creation_constructs_once() {
        let registry = PlateRegistry::new();
        let constructed = AtomicUsize::new(0);
        let barrier = Barrier::new(12);

        let plates: Vec<Arc<CounterPlate>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..12)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        registry
                            .get_or_create_with(|| {
                                constructed.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(5));
                                Ok(CounterPlate::new(Arc::new(AtomicUsize::new(0))))
                            })
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        for plate in &plates {
            assert!(Arc::ptr_eq(plate, &plates[0]));
        }
    }

    #[test]
    fn test_disposal_deregisters() {
        let registry = PlateRegistry::new();
        let releases = Arc::new(AtomicUsize::new(0));

        let first = registry
            .get_or_create_with(|| Ok(CounterPlate::new(releases.clone())))
            .unwrap();
        first.dispose();
        first.dispose();

        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(registry.get::<CounterPlate>().is_none());
        assert!(registry.is_empty());

        let second = registry
            .get_or_create_with(|| Ok(CounterPlate::new(releases.clone())))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_disposed());
    }

    #[test]
    fn test_construction_failure_leaves_nothing() {
        let registry = PlateRegistry::new();

        let result = registry.get_or_create_with::<CounterPlate, _>(|| {
            Err(HubError::hardware("plate not attached"))
        });
        assert!(matches!(result, Err(HubError::Hardware { .. })));
        assert!(registry.get::<CounterPlate>().is_none());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.plates.slot_count(), 0);

        let plate = registry
            .get_or_create_with(|| Ok(CounterPlate::new(Arc::new(AtomicUsize::new(0)))))
            .unwrap();
        assert!(registry.get::<CounterPlate>().is_some());
        assert!(!plate.is_disposed());
    }

    #[test]
    fn test_dispose_all_disposes_each_once() {
        let registry = PlateRegistry::new();
        let releases = Arc::new(AtomicUsize::new(0));

        let counter = registry
            .get_or_create_with(|| Ok(CounterPlate::new(releases.clone())))
            .unwrap();
        let other = registry
            .get_or_create_with(|| Ok(OtherPlate { lifecycle: PlateLifecycle::new() }))
            .unwrap();

        assert_eq!(registry.dispose_all(), 2);
        assert_eq!(registry.dispose_all(), 0);

        counter.dispose();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(other.is_disposed());
        assert!(registry.is_empty());
    }
}
