//! # Scanrig CLI
//!
//! Command-line interface for serial scan gantries.
//!
//! 每个命令独立执行：读取配置 → 连接（串口或模拟平台）→ 执行 → 断开。
//!
//! ```bash
//! # 写入默认配置
//! scanrig-cli --port /dev/ttyACM0 config init
//!
//! # 编辑路径
//! scanrig-cli path new scan.json
//! scanrig-cli path add scan.json -x 100 -y 0
//! scanrig-cli path add scan.json -x 100 -y 100 --action photo
//!
//! # 执行路径（Ctrl-C 急停）
//! scanrig-cli run --path scan.json
//!
//! # 不接硬件，用模拟平台往返扫描
//! scanrig-cli --simulate sweep --distance 200 --axis x
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod connection;
mod monitor;

use commands::{ConfigCommand, JogCommand, PathCommand, RunCommand, SweepCommand};
use connection::ConnectArgs;

/// Scanrig CLI - 扫描平台命令行工具
#[derive(Parser, Debug)]
#[command(name = "scanrig-cli")]
#[command(about = "Command-line interface for serial scan gantries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 列出可用串口
    Ports,

    /// 路径文件编辑
    #[command(subcommand)]
    Path(PathCommand),

    /// 执行路径文件
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 单轴往返扫描（可定时重复）
    Sweep {
        #[command(flatten)]
        args: SweepCommand,
    },

    /// 相对点动
    Jog {
        #[command(flatten)]
        args: JogCommand,
    },

    /// 查询当前位置
    Position,

    /// 急停
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    scanrig_sdk::init_logger_with("scanrig=info");

    let cli = Cli::parse();
    let connect = &cli.connect;

    match cli.command {
        Commands::Config(cmd) => cmd.execute(connect).await,
        Commands::Ports => commands::ports::execute().await,
        Commands::Path(cmd) => cmd.execute(connect).await,
        Commands::Run { args } => args.execute(connect).await,
        Commands::Sweep { args } => args.execute(connect).await,
        Commands::Jog { args } => args.execute(connect).await,
        Commands::Position => commands::position::execute(connect).await,
        Commands::Stop => commands::stop::execute(connect).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "scanrig-cli",
            "jog",
            "--axis",
            "y",
            "--delta",
            "-5",
            "--simulate",
        ])
        .unwrap();
        assert!(cli.connect.simulate);
        match cli.command {
            Commands::Jog { args } => {
                assert_eq!(args.axis, scanrig_sdk::protocol::Axis::Y);
                assert_eq!(args.delta, -5.0);
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_axes() {
        let cli =
            Cli::try_parse_from(["scanrig-cli", "run", "--path", "scan.json", "--axes", "xz"])
                .unwrap();
        match cli.command {
            Commands::Run { args } => {
                assert_eq!(args.axes, Some(scanrig_sdk::protocol::AxisSet::XZ));
            },
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["scanrig-cli", "run", "--path", "a", "--axes", "q"]).is_err());
    }
}
