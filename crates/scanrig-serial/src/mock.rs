//! Mock 传输
//!
//! 回复按脚本顺序返回，写入内容被记录下来供断言使用。
//! `MockHandle` 与传输共享状态，传输被移交给调度线程后仍可检查。
//!
//! 与真实串口不同，`flush_input` 不会丢弃脚本回复，只计数。

use crate::{Transport, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<Result<String, MockFailure>>,
    writes: Vec<String>,
    input_flushes: usize,
    output_flushes: usize,
    fail_writes: bool,
}

#[derive(Debug, Clone, Copy)]
enum MockFailure {
    Timeout,
    Disconnected,
}

impl From<MockFailure> for TransportError {
    fn from(failure: MockFailure) -> Self {
        match failure {
            MockFailure::Timeout => TransportError::Timeout,
            MockFailure::Disconnected => TransportError::Disconnected,
        }
    }
}

/// 脚本化传输
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Mock 传输的共享句柄
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// 追加一行回复
    pub fn push_reply(&self, line: impl Into<String>) {
        self.state.lock().replies.push_back(Ok(line.into()));
    }

    pub fn push_replies<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        state.replies.extend(lines.into_iter().map(|l| Ok(l.into())));
    }

    /// 追加一次读超时
    pub fn push_timeout(&self) {
        self.state.lock().replies.push_back(Err(MockFailure::Timeout));
    }

    /// 追加一次读断开
    pub fn push_disconnect(&self) {
        self.state
            .lock()
            .replies
            .push_back(Err(MockFailure::Disconnected));
    }

    /// 之后所有写入都返回 `Disconnected`
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// 已写入的行（去掉行尾）
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    /// 除 `skip` 外的写入（常用于过滤位置查询指令）
    pub fn writes_except(&self, skip: &str) -> Vec<String> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|w| w.as_str() != skip)
            .cloned()
            .collect()
    }

    pub fn pending_replies(&self) -> usize {
        self.state.lock().replies.len()
    }

    pub fn input_flushes(&self) -> usize {
        self.state.lock().input_flushes
    }

    pub fn output_flushes(&self) -> usize {
        self.state.lock().output_flushes
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(TransportError::Disconnected);
        }
        let text = String::from_utf8_lossy(data);
        state
            .writes
            .extend(text.lines().filter(|l| !l.is_empty()).map(str::to_string));
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        match self.state.lock().replies.pop_front() {
            Some(Ok(line)) => Ok(line.into_bytes()),
            Some(Err(failure)) => Err(failure.into()),
            None => Err(TransportError::Timeout),
        }
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.state.lock().input_flushes += 1;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), TransportError> {
        self.state.lock().output_flushes += 1;
        Ok(())
    }
}
