//! # 工具函数模块
//!
//! 提供美化输出、进度条、运行日志、外部工具调用、文件收集与 Slurm 脚本生成。
//!
//! ## 依赖关系
//! - 被 `commands/`, `phonon/` 模块使用
//! - 子模块: collector, command, logging, output, progress, slurm

pub mod collector;
pub mod command;
pub mod logging;
pub mod output;
pub mod progress;
pub mod slurm;
