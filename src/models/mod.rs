//! # 数据模型模块
//!
//! 定义运行记录、作业目录与晶胞头部信息。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `phonon/` 和 `commands/` 使用
//! - 子模块: job, run_record, structure

pub mod job;
pub mod run_record;
pub mod structure;

pub use job::JobDir;
pub use run_record::RunRecord;
pub use structure::{Lattice, LatticeFamily, UnitCell};
