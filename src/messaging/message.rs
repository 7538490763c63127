//! 设备管理器消息目录
//!
//! 封闭的消息标识集合：请求、响应以及异步发布。
//! 编号沿用设备管理器协议：请求 110 起，错误响应 201 起，
//! 普通响应 210 起，发布 300 起。

use crate::{HubError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 消息大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Request,
    Response,
    Publication,
}

/// 目录中的消息标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum MessageId {
    ReqPing = 110,
    ReqGetDeviceId = 111,
    ReqGetBrightness = 112,
    ReqSetBrightness = 113,
    ReqIncrementBrightness = 114,
    ReqDecrementBrightness = 115,
    ReqBlankScreen = 116,
    ReqUnblankScreen = 117,
    ReqGetBatteryState = 118,
    ReqGetPeripheralEnabled = 119,
    ReqGetScreenBlankingTimeout = 120,
    ReqSetScreenBlankingTimeout = 121,
    ReqGetLidOpenState = 122,
    ReqGetScreenBacklightState = 123,
    ReqSetScreenBacklightState = 124,
    ReqGetOledControl = 125,
    ReqSetOledControl = 126,

    RspErrServer = 201,
    RspErrMalformed = 202,
    RspErrUnsupported = 203,
    RspPing = 210,
    RspGetDeviceId = 211,
    RspGetBrightness = 212,
    RspSetBrightness = 213,
    RspIncrementBrightness = 214,
    RspDecrementBrightness = 215,
    RspGetBatteryState = 218,
    RspGetPeripheralEnabled = 219,
    RspGetScreenBlankingTimeout = 220,
    RspSetScreenBlankingTimeout = 221,
    RspGetLidOpenState = 222,
    RspGetScreenBacklightState = 223,
    RspSetScreenBacklightState = 224,
    RspGetOledControl = 225,
    RspSetOledControl = 226,

    PubBrightnessChanged = 300,
    PubPeripheralConnected = 301,
    PubPeripheralDisconnected = 302,
    PubShutdownRequested = 303,
    PubRebootRequired = 304,
    PubBatteryStateChanged = 305,
    PubScreenBlanked = 306,
    PubScreenUnblanked = 307,
    PubLowBatteryWarning = 308,
    PubCriticalBatteryWarning = 309,
    PubLidClosed = 310,
    PubLidOpened = 311,
    PubUnsupportedHardware = 312,
    PubV3ButtonUpPressed = 313,
    PubV3ButtonUpReleased = 314,
    PubV3ButtonDownPressed = 315,
    PubV3ButtonDownReleased = 316,
    PubV3ButtonSelectPressed = 317,
    PubV3ButtonSelectReleased = 318,
    PubV3ButtonCancelPressed = 319,
    PubV3ButtonCancelReleased = 320,
    PubKeyboardDocked = 321,
    PubKeyboardUndocked = 322,
    PubKeyboardConnected = 323,
    PubFailedKeyboardConnect = 324,
    PubOledControlChanged = 325,
    PubNativeDisplayConnected = 326,
    PubNativeDisplayDisconnected = 327,
    PubExternalDisplayConnected = 328,
    PubExternalDisplayDisconnected = 329,
}

impl MessageId {
    /// 目录中的全部标识
    pub const ALL: [MessageId; 65] = [
        MessageId::ReqPing,
        MessageId::ReqGetDeviceId,
        MessageId::ReqGetBrightness,
        MessageId::ReqSetBrightness,
        MessageId::ReqIncrementBrightness,
        MessageId::ReqDecrementBrightness,
        MessageId::ReqBlankScreen,
        MessageId::ReqUnblankScreen,
        MessageId::ReqGetBatteryState,
        MessageId::ReqGetPeripheralEnabled,
        MessageId::ReqGetScreenBlankingTimeout,
        MessageId::ReqSetScreenBlankingTimeout,
        MessageId::ReqGetLidOpenState,
        MessageId::ReqGetScreenBacklightState,
        MessageId::ReqSetScreenBacklightState,
        MessageId::ReqGetOledControl,
        MessageId::ReqSetOledControl,
        MessageId::RspErrServer,
        MessageId::RspErrMalformed,
        MessageId::RspErrUnsupported,
        MessageId::RspPing,
        MessageId::RspGetDeviceId,
        MessageId::RspGetBrightness,
        MessageId::RspSetBrightness,
        MessageId::RspIncrementBrightness,
        MessageId::RspDecrementBrightness,
        MessageId::RspGetBatteryState,
        MessageId::RspGetPeripheralEnabled,
        MessageId::RspGetScreenBlankingTimeout,
        MessageId::RspSetScreenBlankingTimeout,
        MessageId::RspGetLidOpenState,
        MessageId::RspGetScreenBacklightState,
        MessageId::RspSetScreenBacklightState,
        MessageId::RspGetOledControl,
        MessageId::RspSetOledControl,
        MessageId::PubBrightnessChanged,
        MessageId::PubPeripheralConnected,
        MessageId::PubPeripheralDisconnected,
        MessageId::PubShutdownRequested,
        MessageId::PubRebootRequired,
        MessageId::PubBatteryStateChanged,
        MessageId::PubScreenBlanked,
        MessageId::PubScreenUnblanked,
        MessageId::PubLowBatteryWarning,
        MessageId::PubCriticalBatteryWarning,
        MessageId::PubLidClosed,
        MessageId::PubLidOpened,
        MessageId::PubUnsupportedHardware,
        MessageId::PubV3ButtonUpPressed,
        MessageId::PubV3ButtonUpReleased,
        MessageId::PubV3ButtonDownPressed,
        MessageId::PubV3ButtonDownReleased,
        MessageId::PubV3ButtonSelectPressed,
        MessageId::PubV3ButtonSelectReleased,
        MessageId::PubV3ButtonCancelPressed,
        MessageId::PubV3ButtonCancelReleased,
        MessageId::PubKeyboardDocked,
        MessageId::PubKeyboardUndocked,
        MessageId::PubKeyboardConnected,
        MessageId::PubFailedKeyboardConnect,
        MessageId::PubOledControlChanged,
        MessageId::PubNativeDisplayConnected,
        MessageId::PubNativeDisplayDisconnected,
        MessageId::PubExternalDisplayConnected,
        MessageId::PubExternalDisplayDisconnected,
    ];

    /// 线上编号
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn kind(self) -> MessageKind {
        match self.code() {
            0..=199 => MessageKind::Request,
            200..=299 => MessageKind::Response,
            _ => MessageKind::Publication,
        }
    }
}

impl TryFrom<u16> for MessageId {
    type Error = HubError;

    fn try_from(code: u16) -> Result<Self> {
        MessageId::ALL
            .iter()
            .copied()
            .find(|id| id.code() == code)
            .ok_or(HubError::UnknownMessage { code })
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// 从消息通道收到的一条通知
///
/// 负载对 Hub 不透明，只原样保存。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 原始消息编号，可能不在目录中
    pub code: u16,
    /// 负载参数
    pub payload: Vec<String>,
    /// 接收时间
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// 创建目录内消息
    pub fn new(id: MessageId) -> Self {
        Self::from_code(id.code())
    }

    /// 按原始编号创建消息
    pub fn from_code(code: u16) -> Self {
        Self {
            code,
            payload: Vec::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_payload<I, S>(mut self, payload: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payload = payload.into_iter().map(Into::into).collect();
        self
    }

    /// 解析消息标识，不在目录中时返回 `UnknownMessage`
    pub fn id(&self) -> Result<MessageId> {
        MessageId::try_from(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<u16> = MessageId::ALL.iter().map(|id| id.code()).collect();
        assert_eq!(codes.len(), MessageId::ALL.len());
    }

    #[test]
    fn test_try_from_known_and_unknown() {
        assert_eq!(MessageId::try_from(313).unwrap(), MessageId::PubV3ButtonUpPressed);
        assert_eq!(MessageId::try_from(201).unwrap(), MessageId::RspErrServer);
        assert!(matches!(
            MessageId::try_from(216),
            Err(HubError::UnknownMessage { code: 216 })
        ));
    }

    #[test]
    fn test_kind() {
        assert_eq!(MessageId::ReqSetOledControl.kind(), MessageKind::Request);
        assert_eq!(MessageId::RspErrMalformed.kind(), MessageKind::Response);
        assert_eq!(MessageId::PubLidClosed.kind(), MessageKind::Publication);
    }

    #[test]
    fn test_message_payload() {
        let message = Message::new(MessageId::RspGetBrightness).with_payload(["8"]);
        assert_eq!(message.code, 212);
        assert_eq!(message.payload, vec!["8".to_string()]);
        assert_eq!(message.id().unwrap(), MessageId::RspGetBrightness);
    }
}
