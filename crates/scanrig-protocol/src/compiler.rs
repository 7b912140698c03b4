//! 指令编译器
//!
//! 给定 `MachineProfile`，把航点序列或单轴增量翻译为设备指令文本。
//! 编译器本身无状态，只借用配置。
//!
//! # 三种模式
//!
//! - **相对步进**：单轴增量 → 一条相对运动指令（即时命令，用于点动）
//! - **路径编译**：航点序列 → 每个航点一条绝对运动指令，带动作的航点追加一条等待指令
//! - **固定往返**：行程距离 → 去程、回程两条指令
//!
//! 单位缩放只作用于代入模板的轴数值，不作用于模板字面文本。

use crate::ProtocolError;
use crate::action::Action;
use crate::command::Command;
use crate::profile::MachineProfile;
use crate::template::{self, format_value};
use crate::types::{Axis, AxisSet, Position};
use crate::waypoint::Waypoint;
use smallvec::SmallVec;
use std::time::Duration;
use tracing::trace;

/// 动作航点的默认等待时长（填入 `wait` 模板的 `{duration}`，单位毫秒）
pub const DEFAULT_SETTLE_DURATION: Duration = Duration::from_millis(1000);

/// 单个航点生成的命令（运动 + 可选等待，最多 2 条）
pub type WaypointCommands = SmallVec<[Command; 2]>;

/// 指令编译器
#[derive(Debug, Clone, Copy)]
pub struct InstructionCompiler<'a> {
    profile: &'a MachineProfile,
    settle: Duration,
}

impl<'a> InstructionCompiler<'a> {
    pub fn new(profile: &'a MachineProfile) -> Self {
        Self {
            profile,
            settle: DEFAULT_SETTLE_DURATION,
        }
    }

    /// 设置动作航点的等待时长
    pub fn with_settle_duration(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn profile(&self) -> &MachineProfile {
        self.profile
    }

    /// 相对步进（点动）
    ///
    /// 增量乘以该轴缩放后代入 `relative` 模板；生成的命令为即时命令。
    pub fn relative_step(&self, axis: Axis, delta: f64) -> Result<Command, ProtocolError> {
        let template = self.profile.relative_template(AxisSet::from(axis))?;
        let mut offset = Position::ORIGIN;
        offset.set(axis, delta);
        let text = self.render_axes(template, &offset, self.profile.default_speed)?;
        trace!("relative step {axis} {delta} -> {text:?}");
        Ok(Command::instant(text))
    }

    /// 绝对移动指令文本
    pub fn absolute_move(
        &self,
        target: &Position,
        axes: AxisSet,
        speed: f64,
    ) -> Result<String, ProtocolError> {
        let template = self.profile.absolute_template(axes)?;
        self.render_axes(template, target, speed)
    }

    /// 编译单个航点
    ///
    /// 第一条为运动命令；若航点带动作，追加一条等待命令，两者共享 `sequence`。
    pub fn compile_waypoint(
        &self,
        sequence: u32,
        waypoint: &Waypoint,
        axes: AxisSet,
    ) -> Result<WaypointCommands, ProtocolError> {
        let mut commands = WaypointCommands::new();
        let text = self.absolute_move(&waypoint.position(), axes, waypoint.speed)?;
        commands.push(Command::new(text).with_sequence(sequence));

        if waypoint.has_action() {
            commands.push(self.wait(waypoint.action)?.with_sequence(sequence));
        }
        Ok(commands)
    }

    /// 编译完整路径
    ///
    /// `sequence` 是 `Path::to_sequence()` 的完整输出（含原点）。
    /// 原点只在自身带动作时才参与编译；序号为航点在序列中的下标。
    pub fn compile_path(
        &self,
        sequence: &[Waypoint],
        axes: AxisSet,
    ) -> Result<Vec<Command>, ProtocolError> {
        let mut commands = Vec::with_capacity(sequence.len() * 2);
        for (index, waypoint) in sequence.iter().enumerate() {
            if index == 0 && !waypoint.has_action() {
                continue;
            }
            commands.extend(self.compile_waypoint(index as u32, waypoint, axes)?);
        }
        trace!(
            "compiled {} waypoints into {} commands",
            sequence.len(),
            commands.len()
        );
        Ok(commands)
    }

    /// 固定往返扫描：移动到 `distance`，再回到 0
    pub fn compile_sweep(&self, axis: Axis, distance: f64) -> Result<Vec<Command>, ProtocolError> {
        let axes = AxisSet::from(axis);
        let speed = self.profile.default_speed;

        let mut far = Position::ORIGIN;
        far.set(axis, distance);
        let out = self.absolute_move(&far, axes, speed)?;
        let back = self.absolute_move(&Position::ORIGIN, axes, speed)?;

        Ok(vec![
            Command::new(out).with_sequence(0),
            Command::new(back).with_sequence(1),
        ])
    }

    /// 等待命令，携带需要上报的动作
    pub fn wait(&self, action: Action) -> Result<Command, ProtocolError> {
        let millis = self.settle.as_millis().to_string();
        let text = template::render(&self.profile.instructions.wait, |name| {
            (name == "duration").then(|| millis.clone())
        })?;
        Ok(Command::new(text).with_action(action))
    }

    /// 急停（即时命令）
    pub fn stop(&self) -> Command {
        Command::instant(self.profile.instructions.stop.clone())
    }

    /// 连接握手指令；配置为空时返回 `None`
    pub fn connect(&self) -> Option<Command> {
        let text = self.profile.instructions.connect.trim();
        (!text.is_empty()).then(|| Command::new(text))
    }

    /// 设置原点
    pub fn set_home(&self) -> Command {
        Command::new(self.profile.instructions.set_home.clone())
    }

    /// 位置查询（需要回复）
    pub fn info_query(&self) -> Command {
        Command::new(self.profile.instructions.info.command.clone()).expect_response()
    }

    fn render_axes(
        &self,
        template: &str,
        values: &Position,
        speed: f64,
    ) -> Result<String, ProtocolError> {
        template::render(template, |name| match name {
            "speed" => Some(format_value(speed)),
            _ => {
                let axis: Axis = name.parse().ok()?;
                Some(format_value(values.get(axis) * self.profile.scale(axis)))
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MachineProfile {
        MachineProfile::gcode_default()
    }

    fn wp(x: f64, y: f64, action: Action) -> Waypoint {
        Waypoint::new(x, y, 0.0, action, 1500.0)
    }

    #[test]
    fn test_relative_step_scaled() {
        let mut profile = profile();
        profile.scale_factor.x = 2.0;
        let compiler = InstructionCompiler::new(&profile);
        let cmd = compiler.relative_step(Axis::X, -5.0).unwrap();
        assert_eq!(cmd.text, "G91 G0 X-10 F1500");
        assert!(cmd.instant);
    }

    #[test]
    fn test_scale_does_not_touch_literal_text() {
        let mut profile = profile();
        profile.scale_factor.x = 3.0;
        profile.scale_factor.y = 3.0;
        let compiler = InstructionCompiler::new(&profile);
        let text = compiler
            .absolute_move(&Position::new(1.0, 2.0, 0.0), AxisSet::XY, 100.0)
            .unwrap();
        // G90 / G0 字面量不受缩放影响，F 速度也不缩放
        assert_eq!(text, "G90 G0 X3 Y6 F100");
    }

    #[test]
    fn test_compile_path_counts() {
        let profile = profile();
        let compiler = InstructionCompiler::new(&profile);
        let seq = vec![
            wp(0.0, 0.0, Action::None),
            wp(50.0, 0.0, Action::CapturePhoto),
            wp(100.0, 50.0, Action::None),
            wp(100.0, 100.0, Action::StopRecording),
        ];
        let commands = compiler.compile_path(&seq, AxisSet::XY).unwrap();
        // 原点无动作被跳过：n = 3, k = 2
        assert_eq!(commands.len(), 5);

        assert_eq!(commands[0].text, "G90 G0 X50 Y0 F1500");
        assert_eq!(commands[0].sequence, Some(1));
        assert_eq!(commands[1].text, "G4 P1000");
        assert_eq!(commands[1].sequence, Some(1));
        assert_eq!(commands[1].action, Some(Action::CapturePhoto));
        assert_eq!(commands[2].sequence, Some(2));
        assert_eq!(commands[2].action, None);
        assert_eq!(commands[4].action, Some(Action::StopRecording));
        assert_eq!(commands[4].sequence, commands[3].sequence);
    }

    #[test]
    fn test_compile_path_includes_origin_with_action() {
        let profile = profile();
        let compiler = InstructionCompiler::new(&profile);
        let seq = vec![wp(0.0, 0.0, Action::StartRecording), wp(50.0, 50.0, Action::None)];
        let commands = compiler.compile_path(&seq, AxisSet::XY).unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].sequence, Some(0));
        assert_eq!(commands[1].action, Some(Action::StartRecording));
    }

    #[test]
    fn test_compile_path_missing_template() {
        let profile = profile();
        let compiler = InstructionCompiler::new(&profile);
        let seq = vec![wp(0.0, 0.0, Action::None), wp(1.0, 1.0, Action::None)];
        assert!(compiler.compile_path(&seq, AxisSet::YZ).is_err());
    }

    #[test]
    fn test_compile_sweep() {
        let profile = profile();
        let compiler = InstructionCompiler::new(&profile);
        let commands = compiler.compile_sweep(Axis::Y, 250.0).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].text, "G90 G0 Y250 F1500");
        assert_eq!(commands[0].sequence, Some(0));
        assert_eq!(commands[1].text, "G90 G0 Y0 F1500");
        assert_eq!(commands[1].sequence, Some(1));
    }

    #[test]
    fn test_custom_settle_duration() {
        let profile = profile();
        let compiler =
            InstructionCompiler::new(&profile).with_settle_duration(Duration::from_millis(250));
        let cmd = compiler.wait(Action::CapturePhoto).unwrap();
        assert_eq!(cmd.text, "G4 P250");
    }

    #[test]
    fn test_fixed_instructions() {
        let mut profile = profile();
        let compiler = InstructionCompiler::new(&profile);
        assert!(compiler.stop().instant);
        assert_eq!(compiler.connect().unwrap().text, "G21");
        assert!(compiler.info_query().response);
        assert_eq!(compiler.set_home().text, "G92 X0 Y0 Z0");

        profile.instructions.connect = "  ".to_string();
        assert!(InstructionCompiler::new(&profile).connect().is_none());
    }
}
