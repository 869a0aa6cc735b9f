//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。原流程中的交互式提问全部换成选项，
//! 在任何控制器运行前组装为 `WorkflowConfig`。
//!
//! ## 命令结构
//! - `pre`: 预处理（对称化、生成位移、分发作业目录、写运行记录）
//! - `check`: 只运行收敛性闸门
//! - `post`: 后处理（闸门、清理、FORCE_SETS、band.conf、能带计算与导出）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: preprocess, postprocess

pub mod postprocess;
pub mod preprocess;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// phonoflow - 有限位移法声子计算流程
#[derive(Parser)]
#[command(name = "phonoflow")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Finite-displacement phonon workflow driver for phonopy and VASP", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 所有子命令共享的选项
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Working directory holding the run record, unit cell and job folders
    #[arg(long, global = true, default_value = ".")]
    pub workdir: PathBuf,

    /// phonopy command (may include leading arguments, e.g. 'python -m phonopy')
    #[arg(long, global = true, env = "PHONOFLOW_PHONOPY", default_value = "phonopy")]
    pub phonopy: String,

    /// phonopy-bandplot command used for the text export
    #[arg(long, global = true, env = "PHONOFLOW_BANDPLOT", default_value = "phonopy-bandplot")]
    pub bandplot: String,

    /// Batch submission command
    #[arg(long, global = true, env = "PHONOFLOW_SBATCH", default_value = "sbatch")]
    pub sbatch: String,

    /// Do not write a workflow_<timestamp>.log file
    #[arg(long, global = true, default_value_t = false)]
    pub no_log_file: bool,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Prepare displacement jobs and write the run record
    Pre(preprocess::PreArgs),

    /// Check convergence of every displacement job without modifying any job folder
    Check,

    /// Gate on convergence, build FORCE_SETS and compute the phonon band structure
    Post(postprocess::PostArgs),
}
