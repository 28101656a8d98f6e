// apps/tf_cli/src/commands/config.rs

//! 配置命令
//!
//! 显示默认配置，或验证配置文件。

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tf_config::EngineConfig;
use tracing::{error, info};

use super::print_json;

/// 配置参数
#[derive(Args)]
pub struct ConfigArgs {
    /// 要验证的配置文件；省略时输出默认配置
    pub file: Option<PathBuf>,
}

/// 执行配置命令
pub fn execute(args: ConfigArgs) -> Result<()> {
    let Some(path) = args.file else {
        return print_json(&EngineConfig::default());
    };

    match EngineConfig::from_file(&path) {
        Ok(config) => {
            info!(path = %path.display(), "配置有效");
            print_json(&config)
        }
        Err(e) => {
            error!(path = %path.display(), "配置无效: {e}");
            Err(e.into())
        }
    }
}
