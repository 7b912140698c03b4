//! 航点动作定义

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 到达航点后触发的动作
///
/// 数值编码（0..=3）与持久化文件中的旧格式保持一致。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// 无动作
    #[default]
    None = 0,
    /// 拍照
    CapturePhoto = 1,
    /// 开始录像
    StartRecording = 2,
    /// 停止录像
    StopRecording = 3,
}

impl Action {
    /// 面向用户的名称
    pub fn label(self) -> &'static str {
        match self {
            Action::None => "No Action",
            Action::CapturePhoto => "Take Photo",
            Action::StartRecording => "Start Recording",
            Action::StopRecording => "Stop Recording",
        }
    }

    pub fn is_none(self) -> bool {
        self == Action::None
    }

    /// 非 `None` 时返回 `Some(self)`，用于填充 `Command::action`
    pub fn into_option(self) -> Option<Action> {
        if self.is_none() { None } else { Some(self) }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_labels() {
        assert_eq!(Action::None.to_string(), "No Action");
        assert_eq!(Action::CapturePhoto.to_string(), "Take Photo");
        assert_eq!(Action::StartRecording.to_string(), "Start Recording");
        assert_eq!(Action::StopRecording.to_string(), "Stop Recording");
    }

    #[test]
    fn test_action_codes() {
        assert_eq!(u8::from(Action::CapturePhoto), 1);
        assert_eq!(Action::try_from(3u8).unwrap(), Action::StopRecording);
        assert!(Action::try_from(9u8).is_err());
    }

    #[test]
    fn test_into_option() {
        assert_eq!(Action::None.into_option(), None);
        assert_eq!(
            Action::CapturePhoto.into_option(),
            Some(Action::CapturePhoto)
        );
    }
}
