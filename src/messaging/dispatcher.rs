//! 消息分发器
//!
//! 静态分发表：目录中的每个标识都对应一个处理函数。
//! 按键的按下/松开更新对应按键状态，其余标识是保留的空处理。
//! 不在目录中的编号返回 `UnknownMessage`，与保留标识严格区分。

use super::message::{Message, MessageId};
use crate::buttons::{ButtonPanel, ButtonRole, ButtonState};
use crate::{HubError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 分发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 按键状态被写入
    ButtonChanged {
        role: ButtonRole,
        previous: ButtonState,
        current: ButtonState,
    },
    /// 已知但暂无处理逻辑的标识
    Reserved(MessageId),
}

/// 处理函数
pub type MessageHandler = fn(&ButtonPanel, MessageId, &Message) -> DispatchOutcome;

fn reserved(_: &ButtonPanel, id: MessageId, _: &Message) -> DispatchOutcome {
    DispatchOutcome::Reserved(id)
}

fn set_button(buttons: &ButtonPanel, role: ButtonRole, state: ButtonState) -> DispatchOutcome {
    let previous = buttons.button(role).set_state(state);
    DispatchOutcome::ButtonChanged {
        role,
        previous,
        current: state,
    }
}

fn up_pressed(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Up, ButtonState::Pressed)
}

fn up_released(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Up, ButtonState::Released)
}

fn down_pressed(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Down, ButtonState::Pressed)
}

fn down_released(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Down, ButtonState::Released)
}

fn select_pressed(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Select, ButtonState::Pressed)
}

fn select_released(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Select, ButtonState::Released)
}

fn cancel_pressed(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Cancel, ButtonState::Pressed)
}

fn cancel_released(buttons: &ButtonPanel, _: MessageId, _: &Message) -> DispatchOutcome {
    set_button(buttons, ButtonRole::Cancel, ButtonState::Released)
}

static DISPATCH_TABLE: Lazy<HashMap<MessageId, MessageHandler>> = Lazy::new(|| {
    let entries: [(MessageId, MessageHandler); 65] = [
        (MessageId::ReqPing, reserved),
        (MessageId::ReqGetDeviceId, reserved),
        (MessageId::ReqGetBrightness, reserved),
        (MessageId::ReqSetBrightness, reserved),
        (MessageId::ReqIncrementBrightness, reserved),
        (MessageId::ReqDecrementBrightness, reserved),
        (MessageId::ReqBlankScreen, reserved),
        (MessageId::ReqUnblankScreen, reserved),
        (MessageId::ReqGetBatteryState, reserved),
        (MessageId::ReqGetPeripheralEnabled, reserved),
        (MessageId::ReqGetScreenBlankingTimeout, reserved),
        (MessageId::ReqSetScreenBlankingTimeout, reserved),
        (MessageId::ReqGetLidOpenState, reserved),
        (MessageId::ReqGetScreenBacklightState, reserved),
        (MessageId::ReqSetScreenBacklightState, reserved),
        (MessageId::ReqGetOledControl, reserved),
        (MessageId::ReqSetOledControl, reserved),
        (MessageId::RspErrServer, reserved),
        (MessageId::RspErrMalformed, reserved),
        (MessageId::RspErrUnsupported, reserved),
        (MessageId::RspPing, reserved),
        (MessageId::RspGetDeviceId, reserved),
        (MessageId::RspGetBrightness, reserved),
        (MessageId::RspSetBrightness, reserved),
        (MessageId::RspIncrementBrightness, reserved),
        (MessageId::RspDecrementBrightness, reserved),
        (MessageId::RspGetBatteryState, reserved),
        (MessageId::RspGetPeripheralEnabled, reserved),
        (MessageId::RspGetScreenBlankingTimeout, reserved),
        (MessageId::RspSetScreenBlankingTimeout, reserved),
        (MessageId::RspGetLidOpenState, reserved),
        (MessageId::RspGetScreenBacklightState, reserved),
        (MessageId::RspSetScreenBacklightState, reserved),
        (MessageId::RspGetOledControl, reserved),
        (MessageId::RspSetOledControl, reserved),
        (MessageId::PubBrightnessChanged, reserved),
        (MessageId::PubPeripheralConnected, reserved),
        (MessageId::PubPeripheralDisconnected, reserved),
        (MessageId::PubShutdownRequested, reserved),
        (MessageId::PubRebootRequired, reserved),
        (MessageId::PubBatteryStateChanged, reserved),
        (MessageId::PubScreenBlanked, reserved),
        (MessageId::PubScreenUnblanked, reserved),
        (MessageId::PubLowBatteryWarning, reserved),
        (MessageId::PubCriticalBatteryWarning, reserved),
        (MessageId::PubLidClosed, reserved),
        (MessageId::PubLidOpened, reserved),
        (MessageId::PubUnsupportedHardware, reserved),
        (MessageId::PubV3ButtonUpPressed, up_pressed),
        (MessageId::PubV3ButtonUpReleased, up_released),
        (MessageId::PubV3ButtonDownPressed, down_pressed),
        (MessageId::PubV3ButtonDownReleased, down_released),
        (MessageId::PubV3ButtonSelectPressed, select_pressed),
        (MessageId::PubV3ButtonSelectReleased, select_released),
        (MessageId::PubV3ButtonCancelPressed, cancel_pressed),
        (MessageId::PubV3ButtonCancelReleased, cancel_released),
        (MessageId::PubKeyboardDocked, reserved),
        (MessageId::PubKeyboardUndocked, reserved),
        (MessageId::PubKeyboardConnected, reserved),
        (MessageId::PubFailedKeyboardConnect, reserved),
        (MessageId::PubOledControlChanged, reserved),
        (MessageId::PubNativeDisplayConnected, reserved),
        (MessageId::PubNativeDisplayDisconnected, reserved),
        (MessageId::PubExternalDisplayConnected, reserved),
        (MessageId::PubExternalDisplayDisconnected, reserved),
    ];

    entries.into_iter().collect()
});

/// 消息分发器
#[derive(Debug)]
pub struct MessageDispatcher {
    buttons: Arc<ButtonPanel>,
}

impl MessageDispatcher {
    pub fn new(buttons: Arc<ButtonPanel>) -> Self {
        Self { buttons }
    }

    pub fn buttons(&self) -> &ButtonPanel {
        &self.buttons
    }

    /// 分发一条消息
    pub fn dispatch(&self, message: &Message) -> Result<DispatchOutcome> {
        let id = message.id()?;
        let handler = DISPATCH_TABLE
            .get(&id)
            .ok_or(HubError::UnknownMessage { code: message.code })?;

        let outcome = handler(&self.buttons, id, message);
        debug!("Dispatched {} -> {:?}", id, outcome);
        Ok(outcome)
    }
}
