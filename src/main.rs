//! # phonoflow - 有限位移法声子计算流程
//!
//! 把 phonopy + VASP 的声子计算流程拆成两次独立调用，中间由运行记录衔接：
//! 外部作业可能要跑几天，两次调用之间进程不需要存活。
//!
//! ## 子命令
//! - `pre`   - 对称化、生成位移结构、分发作业目录、写运行记录
//! - `check` - 只检查各作业是否收敛
//! - `post`  - 收敛性闸门、FORCE_SETS、band.conf、能带计算与导出
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (预处理/检查/后处理控制器)
//!   │     ├── phonon/    (闸门、清理、聚合、路径、配置、计算)
//!   │     ├── parsers/   (POSCAR 头、OUTCAR 标记)
//!   │     └── models/    (运行记录、作业目录、晶格)
//!   ├── utils/      (外部调用、日志、输出、Slurm)
//!   ├── config.rs   (固定文件名与常量)
//!   └── error.rs    (错误处理)
//! ```

mod cli;
mod commands;
mod config;
mod error;
mod models;
mod parsers;
mod phonon;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    // 工作目录不存在时由各命令报告，这里只跳过日志文件
    if !cli.global.no_log_file && cli.global.workdir.is_dir() {
        match utils::logging::setup_run_log(&cli.global.workdir) {
            Ok(path) => utils::output::print_info(&format!("Logging to {}", path.display())),
            Err(e) => utils::output::print_warning(&format!("Run log disabled: {}", e)),
        }
    }

    if let Err(e) = commands::run(cli.command, &cli.global) {
        utils::output::print_error(&format!("{}", e));
        log::info!("=== workflow session ended with error ===");
        std::process::exit(1);
    }
    log::info!("=== workflow session finished ===");
}
