//! 物理按键
//!
//! 四个按键（上、下、确认、取消）的当前状态，只由消息分发器写入，
//! 任何线程都可以随时读取最后写入的值。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 按键角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonRole {
    Up,
    Down,
    Select,
    Cancel,
}

impl ButtonRole {
    pub const ALL: [ButtonRole; 4] = [
        ButtonRole::Up,
        ButtonRole::Down,
        ButtonRole::Select,
        ButtonRole::Cancel,
    ];
}

impl fmt::Display for ButtonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonRole::Up => "up",
            ButtonRole::Down => "down",
            ButtonRole::Select => "select",
            ButtonRole::Cancel => "cancel",
        };
        f.pad(name)
    }
}

/// 按键状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ButtonState {
    #[default]
    Released = 0,
    Pressed = 1,
}

impl ButtonState {
    fn from_raw(raw: u8) -> Self {
        if raw == ButtonState::Pressed as u8 {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }
}

/// 单个按键
#[derive(Debug)]
pub struct Button {
    role: ButtonRole,
    state: AtomicU8,
}

impl Button {
    pub fn new(role: ButtonRole) -> Self {
        Self {
            role,
            state: AtomicU8::new(ButtonState::Released as u8),
        }
    }

    pub fn role(&self) -> ButtonRole {
        self.role
    }

    /// 当前状态
    pub fn state(&self) -> ButtonState {
        ButtonState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_pressed(&self) -> bool {
        self.state() == ButtonState::Pressed
    }

    /// 写入新状态，返回旧状态
    pub(crate) fn set_state(&self, state: ButtonState) -> ButtonState {
        ButtonState::from_raw(self.state.swap(state as u8, Ordering::AcqRel))
    }
}

/// 四个按键的集合
#[derive(Debug)]
pub struct ButtonPanel {
    up: Button,
    down: Button,
    select: Button,
    cancel: Button,
}

impl ButtonPanel {
    pub fn new() -> Self {
        Self {
            up: Button::new(ButtonRole::Up),
            down: Button::new(ButtonRole::Down),
            select: Button::new(ButtonRole::Select),
            cancel: Button::new(ButtonRole::Cancel),
        }
    }

    pub fn button(&self, role: ButtonRole) -> &Button {
        match role {
            ButtonRole::Up => &self.up,
            ButtonRole::Down => &self.down,
            ButtonRole::Select => &self.select,
            ButtonRole::Cancel => &self.cancel,
        }
    }

    /// 所有按键状态快照
    pub fn snapshot(&self) -> [(ButtonRole, ButtonState); 4] {
        ButtonRole::ALL.map(|role| (role, self.button(role).state()))
    }
}

impl Default for ButtonPanel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_buttons_start_released() {
        let panel = ButtonPanel::new();
        for (role, state) in panel.snapshot() {
            assert_eq!(state, ButtonState::Released, "{role} should start released");
        }
    }

    #[test]
    fn test_set_state_returns_previous() {
        let button = Button::new(ButtonRole::Select);
        assert_eq!(button.set_state(ButtonState::Pressed), ButtonState::Released);
        assert!(button.is_pressed());
        assert_eq!(button.set_state(ButtonState::Released), ButtonState::Pressed);
        assert!(!button.is_pressed());
    }

    #[test]
    fn test_state_visible_across_threads() {
        let panel = Arc::new(ButtonPanel::new());
        let writer = panel.clone();

        std::thread::spawn(move || {
            writer.button(ButtonRole::Cancel).set_state(ButtonState::Pressed);
        })
        .join()
        .unwrap();

        assert!(panel.button(ButtonRole::Cancel).is_pressed());
        assert!(!panel.button(ButtonRole::Up).is_pressed());
    }
}
