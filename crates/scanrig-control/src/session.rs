//! 扫描会话
//!
//! 会话把用户操作映射到路径模型与调度器调用：
//!
//! - 编辑路径 → [`Session::path_mut`]
//! - 开始扫描 → 路径快照经编译器生成命令，交给调度器
//! - 停止 / 急停 / 点动 / 查询位置 → 调度器队列操作
//!
//! 会话本身不加锁，应由同一个任务串行调用。调度器从不访问路径状态。

use crate::config::SessionConfig;
use crate::scheduler::ScanScheduler;
use crate::SessionError;
use crossbeam_channel::Receiver;
use scanrig_driver::{DispatchEvent, Dispatcher, DispatcherConfig};
use scanrig_path::Path;
use scanrig_protocol::{
    Axis, AxisSet, DEFAULT_SETTLE_DURATION, InstructionCompiler, MachineProfile,
};
use scanrig_serial::{SimulatedTransport, SimulatorHandle, Transport};
use std::path::Path as FsPath;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 扫描会话
pub struct Session {
    profile: MachineProfile,
    path: Path,
    dispatcher_config: DispatcherConfig,
    settle: Duration,
    scheduler: Option<ScanScheduler>,
    dispatcher: Option<Dispatcher>,
}

impl Session {
    /// 以指定机器配置创建会话（路径只含原点）
    pub fn new(profile: MachineProfile) -> Self {
        let path = Path::for_profile(&profile);
        Self {
            profile,
            path,
            dispatcher_config: DispatcherConfig::default(),
            settle: DEFAULT_SETTLE_DURATION,
            scheduler: None,
            dispatcher: None,
        }
    }

    /// 按会话配置创建（未连接）
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let profile = match &config.profile {
            Some(file) => MachineProfile::load(file)?,
            None => MachineProfile::gcode_default(),
        };
        Ok(Self::new(profile)
            .with_dispatcher_config(config.dispatcher_config())
            .with_settle_duration(config.scan.settle_duration()))
    }

    /// 调度器配置（下次连接时生效）
    pub fn with_dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher_config = config;
        self
    }

    /// 动作点停留时间
    pub fn with_settle_duration(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn profile(&self) -> &MachineProfile {
        &self.profile
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_mut(&mut self) -> &mut Path {
        &mut self.path
    }

    pub fn compiler(&self) -> InstructionCompiler<'_> {
        InstructionCompiler::new(&self.profile).with_settle_duration(self.settle)
    }

    /// 切换机器配置
    ///
    /// 路径重置为只含原点；现有连接使用旧配置的位置查询，因此一并断开。
    pub fn select_profile(&mut self, profile: MachineProfile) {
        self.disconnect();
        info!("Selected machine profile {:?}", profile.name);
        self.path = Path::for_profile(&profile);
        self.profile = profile;
    }

    /// 连接传输层并启动调度器
    ///
    /// 已有连接会先被拆除（等待旧调度线程退出后才释放旧传输层）。
    /// 连接后依次入队握手指令（若配置）与设置原点指令。
    pub fn connect<T>(&mut self, transport: T) -> Result<(), SessionError>
    where
        T: Transport + Send + 'static,
    {
        self.disconnect();

        let dispatcher =
            Dispatcher::for_profile(transport, &self.profile, self.dispatcher_config.clone())?;
        let compiler = self.compiler();
        let handshake: Vec<_> = compiler
            .connect()
            .into_iter()
            .chain(std::iter::once(compiler.set_home()))
            .collect();
        dispatcher.enqueue(handshake)?;

        self.dispatcher = Some(dispatcher);
        info!("Session connected");
        Ok(())
    }

    /// 重建连接（调度器因传输故障退出后使用）
    pub fn reconnect<T>(&mut self, transport: T) -> Result<(), SessionError>
    where
        T: Transport + Send + 'static,
    {
        if let Some(err) = self.dispatcher.as_ref().and_then(|d| d.last_error()) {
            warn!("Reconnecting after dispatcher failure: {}", err);
        }
        self.connect(transport)
    }

    /// 打开串口并连接
    #[cfg(feature = "serialport")]
    pub fn connect_serial(&mut self, port: &str, baud_rate: u32) -> Result<(), SessionError> {
        let transport = scanrig_serial::SerialTransport::open(port, baud_rate)?;
        info!("Opened {} @ {} baud", port, baud_rate);
        self.connect(transport)
    }

    /// 连接软件模拟平台
    ///
    /// 模拟器理解 G-code 风格的 `X/Y/Z` 指令，位置回复格式为 `X:<x> Y:<y> Z:<z> ok`。
    pub fn connect_simulated(&mut self) -> Result<SimulatorHandle, SessionError> {
        let transport = SimulatedTransport::new(
            self.profile.instructions.info.command.clone(),
            self.profile.instructions.stop.clone(),
        );
        let handle = transport.handle();
        self.connect(transport)?;
        Ok(handle)
    }

    /// 停止定时扫描并关闭调度器
    pub fn disconnect(&mut self) {
        self.stop_periodic_scan();
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
            debug!("Session disconnected");
        }
    }

    /// 调度器存在且仍在运行
    pub fn is_connected(&self) -> bool {
        self.dispatcher.as_ref().is_some_and(|d| d.is_running())
    }

    /// 当前调度器
    pub fn dispatcher(&self) -> Result<&Dispatcher, SessionError> {
        self.dispatcher.as_ref().ok_or(SessionError::NotConnected)
    }

    /// 订阅调度事件
    pub fn subscribe(&self) -> Result<Receiver<DispatchEvent>, SessionError> {
        Ok(self.dispatcher()?.subscribe())
    }

    /// 编译当前路径并入队
    ///
    /// 返回入队的命令数。
    pub fn start_scan(&self, axes: AxisSet) -> Result<usize, SessionError> {
        let dispatcher = self.dispatcher()?;
        let commands = self
            .compiler()
            .compile_path(&self.path.to_sequence(), axes)?;
        let n = dispatcher.enqueue(commands)?;
        info!("Scan started: {} commands along {} waypoints", n, self.path.len());
        Ok(n)
    }

    /// 往返扫描一次
    pub fn start_sweep(&self, axis: Axis, distance: f64) -> Result<usize, SessionError> {
        let dispatcher = self.dispatcher()?;
        let commands = self.compiler().compile_sweep(axis, distance)?;
        Ok(dispatcher.enqueue(commands)?)
    }

    /// 定时往返扫描，直到 [`stop_scanning`](Self::stop_scanning)
    pub fn start_periodic_scan(
        &mut self,
        axis: Axis,
        distance: f64,
        interval: Duration,
    ) -> Result<(), SessionError> {
        self.stop_periodic_scan();
        let handle = self.dispatcher()?.handle();
        let commands = self.compiler().compile_sweep(axis, distance)?;
        self.scheduler = Some(ScanScheduler::start(handle, commands, interval)?);
        info!("Periodic scan every {:?}", interval);
        Ok(())
    }

    pub fn periodic_scan(&self) -> Option<&ScanScheduler> {
        self.scheduler.as_ref()
    }

    fn stop_periodic_scan(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
    }

    /// 停止扫描：结束定时扫描并清空队列
    ///
    /// 返回丢弃的命令数；未连接时为 0。
    pub fn stop_scanning(&mut self) -> usize {
        self.stop_periodic_scan();
        self.dispatcher.as_ref().map_or(0, |d| d.clear())
    }

    /// 请求调度线程在下一次出队前丢弃剩余命令
    pub fn cancel(&self) -> Result<(), SessionError> {
        self.dispatcher()?.stop();
        Ok(())
    }

    /// 急停：清空队列，立即发送停止指令
    pub fn emergency_stop(&mut self) -> Result<(), SessionError> {
        self.stop_periodic_scan();
        let stop = self.compiler().stop();
        self.dispatcher()?.emergency_stop(stop)?;
        Ok(())
    }

    /// 相对点动（即时命令）
    pub fn jog(&self, axis: Axis, delta: f64) -> Result<(), SessionError> {
        let command = self.compiler().relative_step(axis, delta)?;
        self.dispatcher()?.enqueue_one(command)?;
        Ok(())
    }

    /// 把当前位置设为原点
    pub fn set_home(&self) -> Result<(), SessionError> {
        let command = self.compiler().set_home();
        self.dispatcher()?.enqueue_one(command)?;
        Ok(())
    }

    /// 查询设备信息，回复以 `ResponseReceived` 事件返回
    pub fn query_info(&self) -> Result<(), SessionError> {
        let command = self.compiler().info_query();
        self.dispatcher()?.enqueue_one(command)?;
        Ok(())
    }

    pub fn save_path(&self, file: &FsPath) -> Result<(), SessionError> {
        self.path.save(file)?;
        Ok(())
    }

    /// 用文件内容替换当前路径
    pub fn load_path(&mut self, file: &FsPath) -> Result<(), SessionError> {
        self.path.load(file)?;
        info!("Loaded {} waypoints from {}", self.path.len(), file.display());
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_errors() {
        let mut session = Session::new(MachineProfile::gcode_default());
        assert!(!session.is_connected());
        assert!(matches!(session.start_scan(AxisSet::XY), Err(SessionError::NotConnected)));
        assert!(matches!(session.jog(Axis::X, 1.0), Err(SessionError::NotConnected)));
        assert!(matches!(session.emergency_stop(), Err(SessionError::NotConnected)));
        assert_eq!(session.stop_scanning(), 0);
    }

    #[test]
    fn test_select_profile_resets_path() {
        let mut session = Session::new(MachineProfile::gcode_default());
        session.path_mut().append(100.0, 100.0, None, None);
        assert_eq!(session.path().len(), 2);

        let grbl = MachineProfile::from_toml_str(include_str!(
            "../../scanrig-protocol/profiles/grbl_halfscale.toml"
        ))
        .unwrap();
        session.select_profile(grbl);
        assert_eq!(session.path().len(), 1);
        assert_eq!(session.path().grid_step(), session.profile().grid_step());
        assert_eq!(session.path().speed(), session.profile().default_speed);
    }
}
