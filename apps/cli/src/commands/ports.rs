//! 列出串口

use anyhow::{Context, Result};
use scanrig_sdk::serial::available_ports;

pub async fn execute() -> Result<()> {
    let ports = available_ports().context("枚举串口失败")?;
    if ports.is_empty() {
        println!("(未发现串口)");
        return Ok(());
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}
