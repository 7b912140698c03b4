//! 命令定义和实现

pub mod config;
pub mod jog;
pub mod path;
pub mod ports;
pub mod position;
pub mod run;
pub mod stop;
pub mod sweep;

pub use config::ConfigCommand;
pub use jog::JogCommand;
pub use path::PathCommand;
pub use run::RunCommand;
pub use sweep::SweepCommand;
