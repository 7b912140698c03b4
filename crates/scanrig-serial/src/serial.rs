//! 串口后端
//!
//! 基于 `serialport` crate。读操作受端口超时约束：超时返回
//! [`TransportError::Timeout`]，已读到的半行数据保留到下一次 `read_line`。

use crate::{Transport, TransportError, strip_line_ending};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

/// 默认读超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => TransportError::Disconnected,
            serialport::ErrorKind::Io(kind) => {
                TransportError::Io(std::io::Error::new(kind, err.description))
            },
            _ => TransportError::Device(err.description),
        }
    }
}

/// 枚举可用串口名称
pub fn available_ports() -> Result<Vec<String>, TransportError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// 真实串口传输
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    /// 未读完的半行
    pending: Vec<u8>,
    name: String,
}

impl SerialTransport {
    /// 打开串口
    ///
    /// # 参数
    /// - `path`: 端口名（如 `/dev/ttyACM0`、`COM3`）
    /// - `baud_rate`: 波特率
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .timeout(DEFAULT_READ_TIMEOUT)
            .open()?;
        debug!("Opened serial port {} @ {} baud", path, baud_rate);
        Ok(Self {
            port,
            pending: Vec::with_capacity(64),
            name: path.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        trace!("serial write {:?}", String::from_utf8_lossy(data));
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(_) => {
                    self.pending.push(byte[0]);
                    if byte[0] == b'\n' {
                        let line = std::mem::take(&mut self.pending);
                        return Ok(strip_line_ending(line));
                    }
                },
                Err(e) if e.kind() == ErrorKind::TimedOut => return Err(TransportError::Timeout),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Output)?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.port.set_timeout(timeout) {
            debug!("Failed to set serial timeout on {}: {}", self.name, e);
        }
    }
}
