//! # 声子后处理步骤
//!
//! 后处理控制器按顺序调用的各个步骤。
//!
//! ## 依赖关系
//! - 被 `commands/check.rs`, `commands/postprocess.rs` 使用
//! - 使用 `models/`, `parsers/`, `utils/`
//! - 子模块: gate, cleanup, force_sets, kpath, band_conf, bands

pub mod band_conf;
pub mod bands;
pub mod cleanup;
pub mod force_sets;
pub mod gate;
pub mod kpath;
