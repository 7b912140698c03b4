//! # Scanrig Transport Layer
//!
//! 面向行的设备传输抽象：写入指令、阻塞读取一行回复、清空收发缓冲。
//!
//! ## 后端
//!
//! - [`SerialTransport`]：真实串口（`serialport` feature，默认启用）
//! - [`SimulatedTransport`]：软件模拟的扫描平台，可模拟延迟与运动过程
//! - [`MockTransport`]：脚本化回复 + 写入记录，用于确定性测试
//!
//! 传输层只负责字节收发，不理解指令语义（模拟器除外）。

use std::time::Duration;
use thiserror::Error;

pub mod mock;
#[cfg(feature = "serialport")]
pub mod serial;
pub mod simulated;

pub use mock::{MockHandle, MockTransport};
#[cfg(feature = "serialport")]
pub use serial::{SerialTransport, available_ports};
pub use simulated::{SimulatedTransport, SimulatorHandle};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Device disconnected")]
    Disconnected,
    #[error("Device Error: {0}")]
    Device(String),
}

impl TransportError {
    /// 是否为致命错误
    ///
    /// 读超时只代表本轮没有回复，其余错误都意味着链路已不可用。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Timeout)
    }
}

/// 设备端点
///
/// 半双工、面向行：`write` 发送原始字节，`read_line` 阻塞直到读到换行
/// （或后端超时），返回不含行尾的字节。
pub trait Transport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError>;
    fn flush_input(&mut self) -> Result<(), TransportError>;
    fn flush_output(&mut self) -> Result<(), TransportError>;

    /// 设置读超时（不支持的后端忽略）
    fn set_read_timeout(&mut self, _timeout: Duration) {}

    /// 读取一行并按 UTF-8（有损）解码
    fn read_line_text(&mut self) -> Result<String, TransportError> {
        let bytes = self.read_line()?;
        Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).read_line()
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        (**self).flush_input()
    }

    fn flush_output(&mut self) -> Result<(), TransportError> {
        (**self).flush_output()
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        (**self).set_read_timeout(timeout)
    }
}

/// 去掉行尾的 `\r\n` / `\n`
pub(crate) fn strip_line_ending(mut line: Vec<u8>) -> Vec<u8> {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    line
}
