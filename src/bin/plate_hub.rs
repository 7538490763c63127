//! PlateHub 主程序 - 配置驱动运行
//!
//! 在模拟硬件上启动 Hub，通过本地消息通道回放一段按键事件

use anyhow::Context;
use plate_hub::{
    config::{generate_default_config_file, init_logging, ConfigManager},
    GpioController, Hub, HubHandle, I2cDevice, LocalChannel, Message, MessageId, PinMode,
    PinValue, Plate, PlateLifecycle, SimulatedHardware,
};
use std::env;
use std::path::Path;
use std::sync::Arc;

/// 演示插板的 I2C 地址
const DEMO_PLATE_ADDRESS: u16 = 0x3c;
/// 演示插板的指示灯引脚
const DEMO_LED_PIN: u32 = 26;

/// 演示插板：一个 I2C 显示设备加一个指示灯
struct DemoPlate {
    lifecycle: PlateLifecycle,
    display: Arc<dyn I2cDevice>,
    controller: Arc<dyn GpioController>,
}

impl Plate for DemoPlate {
    fn create(hub: HubHandle) -> plate_hub::Result<Self> {
        let display = hub.get_or_create_device(DEMO_PLATE_ADDRESS)?;
        let controller = hub.get_or_create_controller()?;
        controller.open_pin(DEMO_LED_PIN, PinMode::Output)?;
        Ok(Self {
            lifecycle: PlateLifecycle::new(),
            display,
            controller,
        })
    }

    fn lifecycle(&self) -> &PlateLifecycle {
        &self.lifecycle
    }

    fn release(&self) {
        if let Err(e) = self.controller.write(DEMO_LED_PIN, PinValue::Low) {
            tracing::warn!("Failed to switch off LED pin {}: {}", DEMO_LED_PIN, e);
        }
        if let Err(e) = self.controller.close_pin(DEMO_LED_PIN) {
            tracing::warn!("Failed to close LED pin {}: {}", DEMO_LED_PIN, e);
        }
    }
}

impl DemoPlate {
    fn show(&self, pressed: bool) -> plate_hub::Result<()> {
        self.controller.write(DEMO_LED_PIN, PinValue::from(pressed))?;
        self.display.write(&[0x00, u8::from(pressed)])
    }
}

/// 程序入口点
#[tokio::main]
async fn main() {
    if let Err(e) = run_main().await {
        eprintln!("❌ 程序运行失败: {:#}", e);
        std::process::exit(1);
    }
}

/// 主要逻辑函数
async fn run_main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => run(ConfigManager::new_default()).await,
        2 => match args[1].as_str() {
            "init" => {
                generate_default_config_file("plate_hub.yaml").await?;
                println!("✅ 默认配置文件已生成: plate_hub.yaml");
                Ok(())
            }
            path => {
                if !Path::new(path).exists() {
                    anyhow::bail!("配置文件不存在: {} (使用 'plate_hub init' 生成)", path);
                }
                let config_manager = ConfigManager::load_from_file(path)
                    .await
                    .with_context(|| format!("loading {}", path))?;
                run(config_manager).await
            }
        },
        _ => {
            print_usage();
            Ok(())
        }
    }
}

async fn run(config_manager: ConfigManager) -> anyhow::Result<()> {
    config_manager.validate()?;
    let config = config_manager.get_config();
    init_logging(&config.logging);

    tracing::info!("🚀 启动 {} v{}", plate_hub::FRAMEWORK_NAME, plate_hub::VERSION);

    let hardware = Arc::new(SimulatedHardware::new());
    let channel = Arc::new(LocalChannel::new());
    let hub = Hub::new(config, hardware.clone(), channel.clone())?;

    let plate = hub.get_or_create_plate::<DemoPlate>()?;
    let (sender, pump) = channel.spawn_pump();

    let script = [
        MessageId::PubV3ButtonSelectPressed,
        MessageId::PubBatteryStateChanged,
        MessageId::PubV3ButtonSelectReleased,
        MessageId::PubV3ButtonUpPressed,
    ];
    for id in script {
        sender.send(Message::new(id))?;
    }
    drop(sender);
    pump.await?;

    plate.show(hub.select_button().is_pressed() || hub.up_button().is_pressed())?;
    for (role, state) in hub.buttons().snapshot() {
        tracing::info!("🔘 {:<6} {:?}", role, state);
    }

    let stats = channel.stats();
    tracing::info!(
        "📊 消息统计: 发布={}, 处理={}, 失败={}",
        stats.published, stats.delivered, stats.failed
    );

    hub.dispose();
    let hw = hardware.stats();
    tracing::info!(
        "🎉 运行完成: 控制器={}, I2C 设备={}",
        hw.controllers_opened, hw.devices_opened
    );
    Ok(())
}

/// 打印使用说明
fn print_usage() {
    println!("用法:");
    println!("  plate_hub              使用默认配置运行");
    println!("  plate_hub init         生成默认配置文件");
    println!("  plate_hub <config>     使用指定配置文件运行");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_plate_release_tolerates_released_controller() {
        let hardware = Arc::new(SimulatedHardware::new());
        let hub = Hub::with_defaults(hardware, Arc::new(LocalChannel::new())).unwrap();
        let plate = hub.get_or_create_plate::<DemoPlate>().unwrap();
        plate.show(true).unwrap();

        // 控制器已释放时，插板释放只记录警告
        plate.controller.release();
        plate.dispose();

        assert!(plate.is_disposed());
        assert!(hub.try_get_plate::<DemoPlate>().unwrap().is_none());
    }
}
