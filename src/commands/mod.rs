//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `phonon/`, `models/`, `utils/`
//! - 子模块: preprocess, check, postprocess

pub mod check;
pub mod postprocess;
pub mod preprocess;

use crate::cli::{Commands, GlobalArgs};
use crate::config::Workspace;
use crate::error::Result;
use crate::utils::command::{ToolCommand, Toolchain};

/// 执行命令
pub fn run(cmd: Commands, global: &GlobalArgs) -> Result<()> {
    match cmd {
        Commands::Pre(args) => preprocess::execute(args, global),
        Commands::Check => check::execute(global),
        Commands::Post(args) => postprocess::execute(args, global),
    }
}

/// 由全局选项组装外部工具
pub fn toolchain(global: &GlobalArgs) -> Result<Toolchain> {
    Ok(Toolchain {
        phonopy: ToolCommand::parse(&global.phonopy)?,
        bandplot: ToolCommand::parse(&global.bandplot)?,
        sbatch: ToolCommand::parse(&global.sbatch)?,
    })
}

/// 工作目录必须已存在
pub fn workspace(global: &GlobalArgs) -> Result<Workspace> {
    let ws = Workspace::new(&global.workdir);
    ws.ensure_exists()?;
    Ok(ws)
}
