//! 调度层错误类型定义

use scanrig_protocol::ProtocolError;
use scanrig_serial::TransportError;
use thiserror::Error;

/// 调度层错误类型
#[derive(Error, Debug)]
pub enum DispatchError {
    /// 传输层错误（致命，调度线程随之退出）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议/配置错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 调度线程已停止（被关闭或因故障退出）
    #[error("Dispatcher is not running")]
    NotRunning,

    /// 调度线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 等待超时
    #[error("Operation timeout")]
    Timeout,
}
