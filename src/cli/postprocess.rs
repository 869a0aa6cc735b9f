//! # post 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/postprocess.rs`

use clap::Args;

/// post 子命令参数
#[derive(Args, Debug)]
pub struct PostArgs {
    /// High-symmetry path overriding the recommended one (e.g., "G M K G")
    #[arg(long)]
    pub band_path: Option<String>,

    /// Skip lattice classification and use the built-in path G M K G
    #[arg(long, default_value_t = false)]
    pub builtin_path: bool,
}

impl PostArgs {
    /// 将路径字符串拆成点名列表
    pub fn band_path_tokens(&self) -> Option<Vec<String>> {
        self.band_path
            .as_ref()
            .map(|p| p.split_whitespace().map(str::to_string).collect())
    }
}
