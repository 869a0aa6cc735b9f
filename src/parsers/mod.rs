//! # 解析器模块
//!
//! 结构文件头与 DFT 输出日志的解析器。
//!
//! ## 依赖关系
//! - 被 `commands/`, `phonon/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, outcar

pub mod outcar;
pub mod poscar;
