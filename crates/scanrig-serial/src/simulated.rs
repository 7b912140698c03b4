//! 软件模拟平台
//!
//! 不连接硬件也能完整跑通调度流程：
//!
//! - 解析 G-code 风格的 `X/Y/Z` 字（`G90` 绝对 / `G91` 相对，`G92` 重设原点）
//! - 每收到一次位置查询，当前位置向目标前进 `step_per_ping`
//! - 位置查询回复格式：`X:<x> Y:<y> Z:<z> ok`
//! - 急停指令把目标重置为当前位置
//! - 其他指令回复 `ok`
//! - 每次写入前休眠 `latency`，模拟链路延迟
//!
//! 与真实串口一样，`flush_input` 会丢弃尚未读取的回复。

use crate::{Transport, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// 默认每次位置查询前进的距离
pub const DEFAULT_STEP_PER_PING: f64 = 25.0;

#[derive(Debug, Clone)]
struct SimState {
    position: [f64; 3],
    target: [f64; 3],
    relative: bool,
    replies: VecDeque<String>,
    received: Vec<String>,
}

impl SimState {
    fn new() -> Self {
        Self {
            position: [0.0; 3],
            target: [0.0; 3],
            relative: false,
            replies: VecDeque::new(),
            received: Vec::new(),
        }
    }

    fn advance(&mut self, step: f64) {
        let delta: Vec<f64> = (0..3).map(|i| self.target[i] - self.position[i]).collect();
        let distance = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
        if distance <= step || distance == 0.0 {
            self.position = self.target;
        } else {
            let ratio = step / distance;
            for (i, d) in delta.iter().enumerate() {
                self.position[i] += d * ratio;
            }
        }
    }

    fn apply_gcode(&mut self, line: &str) {
        let mut words: Vec<(char, f64)> = Vec::new();
        for token in line.split_whitespace() {
            let mut chars = token.chars();
            let Some(letter) = chars.next() else { continue };
            if let Ok(value) = chars.as_str().parse::<f64>() {
                words.push((letter.to_ascii_uppercase(), value));
            }
        }

        let mut set_origin = false;
        for (letter, value) in &words {
            match (letter, *value as i64) {
                ('G', 90) => self.relative = false,
                ('G', 91) => self.relative = true,
                ('G', 92) => set_origin = true,
                _ => {},
            }
        }

        for (letter, value) in words {
            let index = match letter {
                'X' => 0,
                'Y' => 1,
                'Z' => 2,
                _ => continue,
            };
            if set_origin {
                self.position[index] = value;
                self.target[index] = value;
            } else if self.relative {
                self.target[index] += value;
            } else {
                self.target[index] = value;
            }
        }
    }
}

/// 模拟平台传输
#[derive(Debug)]
pub struct SimulatedTransport {
    state: Arc<Mutex<SimState>>,
    info_command: String,
    stop_command: String,
    step_per_ping: f64,
    latency: Duration,
}

/// 模拟器共享句柄（用于观察模拟位置与收到的指令）
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedTransport {
    /// 创建模拟平台
    ///
    /// # 参数
    /// - `info_command`: 位置查询指令（如 `M114`）
    /// - `stop_command`: 急停指令（如 `M112`）
    pub fn new(info_command: impl Into<String>, stop_command: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
            info_command: info_command.into(),
            stop_command: stop_command.into(),
            step_per_ping: DEFAULT_STEP_PER_PING,
            latency: Duration::ZERO,
        }
    }

    pub fn with_step_per_ping(mut self, step: f64) -> Self {
        self.step_per_ping = step.max(f64::EPSILON);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn handle(&self) -> SimulatorHandle {
        SimulatorHandle {
            state: self.state.clone(),
        }
    }

    fn handle_line(&self, state: &mut SimState, line: &str) {
        state.received.push(line.to_string());
        if line == self.info_command {
            state.advance(self.step_per_ping);
            let [x, y, z] = state.position;
            state
                .replies
                .push_back(format!("X:{:.3} Y:{:.3} Z:{:.3} ok", x, y, z));
            return;
        }
        if line == self.stop_command {
            state.target = state.position;
        } else {
            state.apply_gcode(line);
        }
        state.replies.push_back("ok".to_string());
    }
}

impl SimulatorHandle {
    /// 当前模拟位置
    pub fn position(&self) -> [f64; 3] {
        self.state.lock().position
    }

    /// 当前运动目标
    pub fn target(&self) -> [f64; 3] {
        self.state.lock().target
    }

    pub fn is_moving(&self) -> bool {
        let state = self.state.lock();
        state.position != state.target
    }

    /// 收到的全部指令
    pub fn received(&self) -> Vec<String> {
        self.state.lock().received.clone()
    }
}

impl Transport for SimulatedTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let text = String::from_utf8_lossy(data);
        let mut state = self.state.lock();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            trace!("simulator received {:?}", line);
            self.handle_line(&mut state, line);
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        self.state
            .lock()
            .replies
            .pop_front()
            .map(String::into_bytes)
            .ok_or(TransportError::Timeout)
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.state.lock().replies.clear();
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
