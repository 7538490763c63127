//! Hub 组合根
//!
//! 持有 GPIO 控制器、消息订阅、插板注册表、I2C 设备缓存和四个按键，
//! 并按固定顺序拆除：取消订阅 -> 释放插板 -> 释放 I2C 设备和控制器 -> 关闭通道。

use crate::buttons::{Button, ButtonPanel, ButtonRole};
use crate::config::HubConfig;
use crate::devices::{GpioControllerAccessor, I2cDeviceCache};
use crate::hardware::{
    GpioController, GpioControllerFactory, HardwareProvider, I2cAddress, I2cDevice,
    I2cDeviceFactory,
};
use crate::messaging::{DispatchOutcome, Message, MessageDispatcher, MessageSource, SubscriptionId};
use crate::plates::{Plate, PlateRegistry};
use crate::{HubError, Result};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

struct HubInner {
    name: String,
    self_ref: Weak<HubInner>,
    /// 资源请求持有读锁，拆除在写锁下标记 disposed
    gate: RwLock<()>,
    disposed: AtomicBool,
    controller: GpioControllerAccessor,
    devices: I2cDeviceCache,
    plates: PlateRegistry,
    buttons: Arc<ButtonPanel>,
    dispatcher: Arc<MessageDispatcher>,
    channel: Arc<dyn MessageSource>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl HubInner {
    /// 进入资源请求；已拆除时失败
    ///
    /// 使用递归读锁：插板构造过程中会再次回调 Hub。
    fn enter(&self) -> Result<RwLockReadGuard<'_, ()>> {
        let guard = self.gate.read_recursive();
        if self.disposed.load(Ordering::SeqCst) {
            return Err(HubError::Disposed);
        }
        Ok(guard)
    }

    fn handle(&self) -> HubHandle {
        HubHandle {
            inner: self.self_ref.clone(),
        }
    }

    fn get_or_create_device(&self, address: I2cAddress) -> Result<Arc<dyn I2cDevice>> {
        let _guard = self.enter()?;
        self.devices.get_or_create(address)
    }

    fn get_or_create_controller(&self) -> Result<Arc<dyn GpioController>> {
        let _guard = self.enter()?;
        Ok(self.controller.get())
    }

    fn get_or_create_plate_with<T, F>(&self, factory: F) -> Result<Arc<T>>
    where
        T: Plate,
        F: FnMut() -> Result<T>,
    {
        let _guard = self.enter()?;
        self.plates.get_or_create_with(factory)
    }

    fn get_or_create_plate<T: Plate>(&self) -> Result<Arc<T>> {
        let handle = self.handle();
        self.get_or_create_plate_with(|| T::create(handle.clone()))
    }

    fn try_get_plate<T: Plate>(&self) -> Result<Option<Arc<T>>> {
        let _guard = self.enter()?;
        Ok(self.plates.get::<T>())
    }

    fn dispatch(&self, message: &Message) -> Result<DispatchOutcome> {
        let _guard = self.enter()?;
        self.dispatcher.dispatch(message)
    }

    fn dispose(&self) -> bool {
        {
            // 等待进行中的请求完成，之后的请求都会看到 disposed
            let _write = self.gate.write();
            if self.disposed.swap(true, Ordering::SeqCst) {
                return false;
            }
        }

        info!("Disposing hub '{}'", self.name);

        if let Some(subscription) = self.subscription.lock().take() {
            self.channel.unsubscribe(subscription);
            debug!("Unsubscribed {} from message channel", subscription);
        }

        self.plates.dispose_all();
        self.devices.release_all();
        self.controller.release();
        self.channel.close();

        info!("Hub '{}' disposed", self.name);
        true
    }
}

/// 硬件访问 Hub
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// 创建 Hub：立即打开 GPIO 控制器并订阅消息通道
    pub fn new(
        config: &HubConfig,
        hardware: Arc<dyn HardwareProvider>,
        channel: Arc<dyn MessageSource>,
    ) -> Result<Self> {
        let controller = GpioControllerAccessor::open(hardware.as_ref())?;

        let buttons = Arc::new(ButtonPanel::new());
        let dispatcher = Arc::new(MessageDispatcher::new(buttons.clone()));

        let subscriber = dispatcher.clone();
        let subscription = match channel.subscribe(Arc::new(move |message: &Message| {
            subscriber.dispatch(message)
        })) {
            Ok(id) => id,
            Err(e) => {
                controller.release();
                return Err(e);
            }
        };

        let inner = Arc::new_cyclic(|self_ref| HubInner {
            name: config.hub.name.clone(),
            self_ref: self_ref.clone(),
            gate: RwLock::new(()),
            disposed: AtomicBool::new(false),
            controller,
            devices: I2cDeviceCache::new(config.hub.i2c_bus_id, hardware),
            plates: PlateRegistry::new(),
            buttons,
            dispatcher,
            channel,
            subscription: Mutex::new(Some(subscription)),
        });

        info!(
            "Hub '{}' started on I2C bus {}",
            config.hub.name, config.hub.i2c_bus_id
        );
        Ok(Self { inner })
    }

    /// 使用默认配置创建 Hub
    pub fn with_defaults(
        hardware: Arc<dyn HardwareProvider>,
        channel: Arc<dyn MessageSource>,
    ) -> Result<Self> {
        Self::new(&HubConfig::default(), hardware, channel)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn i2c_bus_id(&self) -> u32 {
        self.inner.devices.bus_id()
    }

    /// 指向本 Hub 的非拥有引用
    pub fn handle(&self) -> HubHandle {
        self.inner.handle()
    }

    /// 获取或创建插板，由插板类型自己的 `Plate::create` 构造
    pub fn get_or_create_plate<T: Plate>(&self) -> Result<Arc<T>> {
        self.inner.get_or_create_plate::<T>()
    }

    /// 获取或创建插板，由调用者提供构造函数
    pub fn get_or_create_plate_with<T, F>(&self, factory: F) -> Result<Arc<T>>
    where
        T: Plate,
        F: FnMut(HubHandle) -> Result<T>,
    {
        let handle = self.handle();
        let mut factory = factory;
        self.inner
            .get_or_create_plate_with(|| factory(handle.clone()))
    }

    /// 查找已存在的插板
    pub fn try_get_plate<T: Plate>(&self) -> Result<Option<Arc<T>>> {
        self.inner.try_get_plate::<T>()
    }

    /// 获取或创建 I2C 设备句柄
    pub fn get_or_create_device(&self, address: I2cAddress) -> Result<Arc<dyn I2cDevice>> {
        self.inner.get_or_create_device(address)
    }

    /// 共享 GPIO 控制器
    pub fn get_or_create_controller(&self) -> Result<Arc<dyn GpioController>> {
        self.inner.get_or_create_controller()
    }

    /// 直接分发一条消息，与通道订阅走同一路径
    pub fn dispatch(&self, message: &Message) -> Result<DispatchOutcome> {
        self.inner.dispatch(message)
    }

    pub fn up_button(&self) -> &Button {
        self.inner.buttons.button(ButtonRole::Up)
    }

    pub fn down_button(&self) -> &Button {
        self.inner.buttons.button(ButtonRole::Down)
    }

    pub fn select_button(&self) -> &Button {
        self.inner.buttons.button(ButtonRole::Select)
    }

    pub fn cancel_button(&self) -> &Button {
        self.inner.buttons.button(ButtonRole::Cancel)
    }

    pub fn button(&self, role: ButtonRole) -> &Button {
        self.inner.buttons.button(role)
    }

    pub fn buttons(&self) -> &ButtonPanel {
        &self.inner.buttons
    }

    pub fn live_plate_count(&self) -> usize {
        self.inner.plates.len()
    }

    pub fn cached_device_count(&self) -> usize {
        self.inner.devices.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// 拆除 Hub，返回本次调用是否执行了拆除；第二次调用什么也不做
    pub fn dispose(&self) -> bool {
        self.inner.dispose()
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl GpioControllerFactory for Hub {
    fn get_or_create_controller(&self) -> Result<Arc<dyn GpioController>> {
        Hub::get_or_create_controller(self)
    }
}

impl I2cDeviceFactory for Hub {
    fn get_or_create_i2c_device(&self, address: I2cAddress) -> Result<Arc<dyn I2cDevice>> {
        self.get_or_create_device(address)
    }
}

/// 指向 Hub 的非拥有引用，插板通过它申请资源
///
/// Hub 被拆除或丢弃后，所有请求都返回 `HubError::Disposed`。
#[derive(Clone)]
pub struct HubHandle {
    inner: Weak<HubInner>,
}

impl HubHandle {
    fn upgrade(&self) -> Result<Arc<HubInner>> {
        self.inner.upgrade().ok_or(HubError::Disposed)
    }

    pub fn is_alive(&self) -> bool {
        self.upgrade()
            .map(|inner| !inner.disposed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn get_or_create_device(&self, address: I2cAddress) -> Result<Arc<dyn I2cDevice>> {
        self.upgrade()?.get_or_create_device(address)
    }

    pub fn get_or_create_controller(&self) -> Result<Arc<dyn GpioController>> {
        self.upgrade()?.get_or_create_controller()
    }

    pub fn get_or_create_plate<T: Plate>(&self) -> Result<Arc<T>> {
        self.upgrade()?.get_or_create_plate::<T>()
    }

    pub fn try_get_plate<T: Plate>(&self) -> Result<Option<Arc<T>>> {
        self.upgrade()?.try_get_plate::<T>()
    }
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl GpioControllerFactory for HubHandle {
    fn get_or_create_controller(&self) -> Result<Arc<dyn GpioController>> {
        HubHandle::get_or_create_controller(self)
    }
}

impl I2cDeviceFactory for HubHandle {
    fn get_or_create_i2c_device(&self, address: I2cAddress) -> Result<Arc<dyn I2cDevice>> {
        self.get_or_create_device(address)
    }
}
