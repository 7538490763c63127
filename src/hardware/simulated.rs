//! 内存模拟硬件
//!
//! 记录控制器和设备的打开与释放次数，支持按地址注入打开失败。
//! 演示程序和测试都基于它运行。

use super::*;
use crate::HubError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

/// 模拟设备的寄存器空间大小
const REGISTER_SPACE: usize = 256;

/// 模拟硬件统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedStats {
    pub controllers_opened: usize,
    pub devices_opened: usize,
}

/// 模拟硬件提供者
#[derive(Default)]
pub struct SimulatedHardware {
    controllers: Mutex<Vec<Arc<SimulatedController>>>,
    devices: Mutex<Vec<Arc<SimulatedI2cDevice>>>,
    failing_addresses: Mutex<HashSet<I2cAddress>>,
    fail_controller: AtomicBool,
}

impl SimulatedHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让指定地址的设备打开失败
    pub fn fail_address(&self, address: I2cAddress) {
        self.failing_addresses.lock().insert(address);
    }

    /// 恢复指定地址
    pub fn restore_address(&self, address: I2cAddress) {
        self.failing_addresses.lock().remove(&address);
    }

    /// 让控制器打开失败
    pub fn fail_controller(&self, fail: bool) {
        self.fail_controller.store(fail, Ordering::SeqCst);
    }

    /// 已打开的控制器
    pub fn controllers(&self) -> Vec<Arc<SimulatedController>> {
        self.controllers.lock().clone()
    }

    /// 已打开的设备
    pub fn devices(&self) -> Vec<Arc<SimulatedI2cDevice>> {
        self.devices.lock().clone()
    }

    pub fn stats(&self) -> SimulatedStats {
        SimulatedStats {
            controllers_opened: self.controllers.lock().len(),
            devices_opened: self.devices.lock().len(),
        }
    }
}

impl HardwareProvider for SimulatedHardware {
    fn open_controller(&self) -> Result<Arc<dyn GpioController>> {
        if self.fail_controller.load(Ordering::SeqCst) {
            return Err(HubError::hardware("GPIO controller unavailable"));
        }

        let controller = Arc::new(SimulatedController::default());
        self.controllers.lock().push(controller.clone());
        debug!("Opened simulated GPIO controller");
        Ok(controller)
    }

    fn open_i2c_device(&self, settings: I2cConnectionSettings) -> Result<Arc<dyn I2cDevice>> {
        if self.failing_addresses.lock().contains(&settings.device_address) {
            return Err(HubError::Hardware {
                message: format!("No device responding at {}", settings),
            });
        }

        let device = Arc::new(SimulatedI2cDevice::new(settings));
        self.devices.lock().push(device.clone());
        debug!("Opened simulated I2C device {}", settings);
        Ok(device)
    }
}

/// 模拟 GPIO 控制器
#[derive(Default)]
pub struct SimulatedController {
    pins: Mutex<HashMap<PinNumber, (PinMode, PinValue)>>,
    release_count: AtomicUsize,
}

impl SimulatedController {
    /// 被释放的次数
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    /// 模拟外部驱动输入引脚
    pub fn drive_input(&self, pin: PinNumber, value: PinValue) -> Result<()> {
        let mut pins = self.pins.lock();
        match pins.get_mut(&pin) {
            Some((mode, level)) if *mode != PinMode::Output => {
                *level = value;
                Ok(())
            }
            Some(_) => Err(HubError::Hardware {
                message: format!("Pin {} is an output", pin),
            }),
            None => Err(HubError::Hardware {
                message: format!("Pin {} is not open", pin),
            }),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.release_count() > 0 {
            return Err(HubError::hardware("GPIO controller released"));
        }
        Ok(())
    }
}

impl GpioController for SimulatedController {
    fn open_pin(&self, pin: PinNumber, mode: PinMode) -> Result<()> {
        self.ensure_live()?;
        let initial = match mode {
            PinMode::InputPullUp => PinValue::High,
            _ => PinValue::Low,
        };
        self.pins.lock().insert(pin, (mode, initial));
        Ok(())
    }

    fn close_pin(&self, pin: PinNumber) -> Result<()> {
        self.ensure_live()?;
        self.pins
            .lock()
            .remove(&pin)
            .map(|_| ())
            .ok_or_else(|| HubError::Hardware {
                message: format!("Pin {} is not open", pin),
            })
    }

    fn is_pin_open(&self, pin: PinNumber) -> bool {
        self.pins.lock().contains_key(&pin)
    }

    fn write(&self, pin: PinNumber, value: PinValue) -> Result<()> {
        self.ensure_live()?;
        let mut pins = self.pins.lock();
        match pins.get_mut(&pin) {
            Some((PinMode::Output, level)) => {
                *level = value;
                Ok(())
            }
            Some(_) => Err(HubError::Hardware {
                message: format!("Pin {} is not an output", pin),
            }),
            None => Err(HubError::Hardware {
                message: format!("Pin {} is not open", pin),
            }),
        }
    }

    fn read(&self, pin: PinNumber) -> Result<PinValue> {
        self.ensure_live()?;
        self.pins
            .lock()
            .get(&pin)
            .map(|(_, level)| *level)
            .ok_or_else(|| HubError::Hardware {
                message: format!("Pin {} is not open", pin),
            })
    }

    fn release(&self) {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        self.pins.lock().clear();
    }
}

/// 模拟 I2C 设备
///
/// 寄存器模型：写入的第一个字节是寄存器指针，后续字节依次写入寄存器，
/// 读取从当前指针开始。
pub struct SimulatedI2cDevice {
    settings: I2cConnectionSettings,
    registers: Mutex<(usize, Vec<u8>)>,
    release_count: AtomicUsize,
}

impl SimulatedI2cDevice {
    fn new(settings: I2cConnectionSettings) -> Self {
        Self {
            settings,
            registers: Mutex::new((0, vec![0; REGISTER_SPACE])),
            release_count: AtomicUsize::new(0),
        }
    }

    /// 被释放的次数
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.release_count() > 0 {
            return Err(HubError::Hardware {
                message: format!("Device {} released", self.settings),
            });
        }
        Ok(())
    }
}

impl I2cDevice for SimulatedI2cDevice {
    fn connection_settings(&self) -> I2cConnectionSettings {
        self.settings
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        self.ensure_live()?;
        let Some((&pointer, values)) = data.split_first() else {
            return Ok(());
        };

        let mut guard = self.registers.lock();
        let (cursor, registers) = &mut *guard;
        *cursor = pointer as usize;
        for value in values {
            registers[*cursor] = *value;
            *cursor = (*cursor + 1) % REGISTER_SPACE;
        }
        Ok(())
    }

    fn read(&self, buffer: &mut [u8]) -> Result<()> {
        self.ensure_live()?;
        let mut guard = self.registers.lock();
        let (cursor, registers) = &mut *guard;
        for byte in buffer.iter_mut() {
            *byte = registers[*cursor];
            *cursor = (*cursor + 1) % REGISTER_SPACE;
        }
        Ok(())
    }

    fn write_read(&self, data: &[u8], buffer: &mut [u8]) -> Result<()> {
        self.write(data)?;
        self.read(buffer)
    }

    fn release(&self) {
        self.release_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_pin_roundtrip() {
        let hardware = SimulatedHardware::new();
        let controller = hardware.open_controller().unwrap();

        controller.open_pin(17, PinMode::Output).unwrap();
        controller.write(17, PinValue::High).unwrap();
        assert_eq!(controller.read(17).unwrap(), PinValue::High);

        controller.open_pin(4, PinMode::InputPullUp).unwrap();
        assert_eq!(controller.read(4).unwrap(), PinValue::High);
        assert!(controller.write(4, PinValue::Low).is_err());
    }

    #[test]
    fn test_drive_input_pin() {
        let hardware = SimulatedHardware::new();
        hardware.open_controller().unwrap();
        let controller = hardware.controllers().remove(0);

        controller.open_pin(5, PinMode::Input).unwrap();
        controller.drive_input(5, PinValue::High).unwrap();
        assert_eq!(controller.read(5).unwrap(), PinValue::High);
    }

    #[test]
    fn test_released_controller_rejects_access() {
        let hardware = SimulatedHardware::new();
        let controller = hardware.open_controller().unwrap();
        controller.open_pin(1, PinMode::Output).unwrap();
        controller.release();

        assert!(controller.read(1).is_err());
        assert_eq!(hardware.controllers()[0].release_count(), 1);
    }

    #[test]
    fn test_device_register_model() {
        let hardware = SimulatedHardware::new();
        let device = hardware
            .open_i2c_device(I2cConnectionSettings::new(1, 0x48))
            .unwrap();

        device.write(&[0x10, 0xaa, 0xbb]).unwrap();
        let mut buffer = [0u8; 2];
        device.write_read(&[0x10], &mut buffer).unwrap();
        assert_eq!(buffer, [0xaa, 0xbb]);
    }

    #[test]
    fn test_failure_injection() {
        let hardware = SimulatedHardware::new();
        hardware.fail_address(0x20);

        let result = hardware.open_i2c_device(I2cConnectionSettings::new(1, 0x20));
        assert!(matches!(result, Err(HubError::Hardware { .. })));
        assert_eq!(hardware.stats().devices_opened, 0);

        hardware.restore_address(0x20);
        assert!(hardware
            .open_i2c_device(I2cConnectionSettings::new(1, 0x20))
            .is_ok());

        hardware.fail_controller(true);
        assert!(hardware.open_controller().is_err());
    }
}
