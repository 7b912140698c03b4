//! 命令类型定义模块
//!
//! `Command` 是调度器的最小发送单元：一行设备指令文本及其元数据。

use crate::action::Action;
use crate::types::Position;
use std::fmt;

/// 待发送的设备指令
///
/// # 字段语义
///
/// - `sequence`：同一航点生成的多条命令共享同一个序号，调度时不会与其他序号交错
/// - `action`：命令发出后需要上报的动作（例如拍照）
/// - `instant`：即时命令，不受"机器仍在运动"的闸门约束（点动、急停）
/// - `response`：调用方需要原始回复，发送后会额外读取一行
/// - `position`：发送瞬间的位置快照，仅用于审计/日志，不参与反馈
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub text: String,
    pub sequence: Option<u32>,
    pub action: Option<Action>,
    pub instant: bool,
    pub response: bool,
    pub position: Option<Position>,
}

impl Command {
    /// 创建普通（受闸门约束的）命令
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sequence: None,
            action: None,
            instant: false,
            response: false,
            position: None,
        }
    }

    /// 创建即时命令
    pub fn instant(text: impl Into<String>) -> Self {
        Self {
            instant: true,
            ..Self::new(text)
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action.into_option();
        self
    }

    /// 标记为需要读取回复
    pub fn expect_response(mut self) -> Self {
        self.response = true;
        self
    }

    /// 记录发送时的位置快照
    pub fn stamp(&mut self, position: Position) {
        self.position = Some(position);
    }

    /// 写入传输层的字节（指令文本 + 换行）
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.text.len() + 1);
        bytes.extend_from_slice(self.text.as_bytes());
        if !self.text.ends_with('\n') {
            bytes.push(b'\n');
        }
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)?;
        if let Some(seq) = self.sequence {
            write!(f, " [#{}]", seq)?;
        }
        if let Some(action) = self.action {
            write!(f, " <{}>", action)?;
        }
        if self.instant {
            f.write_str(" (instant)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builders() {
        let cmd = Command::new("G0 X10")
            .with_sequence(3)
            .with_action(Action::CapturePhoto)
            .expect_response();
        assert_eq!(cmd.sequence, Some(3));
        assert_eq!(cmd.action, Some(Action::CapturePhoto));
        assert!(cmd.response);
        assert!(!cmd.instant);

        let stop = Command::instant("M112");
        assert!(stop.instant);
        assert_eq!(stop.sequence, None);
    }

    #[test]
    fn test_with_no_action_keeps_none() {
        let cmd = Command::new("G0 X1").with_action(Action::None);
        assert_eq!(cmd.action, None);
    }

    #[test]
    fn test_wire_bytes_newline() {
        assert_eq!(Command::new("M114").wire_bytes(), b"M114\n".to_vec());
        assert_eq!(Command::new("M114\n").wire_bytes(), b"M114\n".to_vec());
    }

    #[test]
    fn test_stamp() {
        let mut cmd = Command::new("G0 X1");
        cmd.stamp(Position::new(1.0, 2.0, 0.0));
        assert_eq!(cmd.position, Some(Position::new(1.0, 2.0, 0.0)));
    }
}
