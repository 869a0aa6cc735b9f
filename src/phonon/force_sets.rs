//! # 力集合聚合
//!
//! 从每个作业目录收集 `vasprun.xml`，一次性交给 `phonopy -f` 生成 `FORCE_SETS`。
//! 全有或全无：任何一个缺失或为空都直接报错，不存在部分聚合。
//!
//! ## 依赖关系
//! - 被 `commands/postprocess.rs` 使用
//! - 使用 `utils/command.rs`

use crate::config::{Workspace, FORCE_SETS_FILE};
use crate::error::{PhonoflowError, Result};
use crate::models::JobDir;
use crate::utils::command::{FailurePolicy, Invocation, Toolchain};

use std::fs;
use std::path::PathBuf;

/// 收集全部结果数据文件，顺序与作业序号一致
pub fn collect_result_data(jobs: &[JobDir]) -> Result<Vec<PathBuf>> {
    jobs.iter()
        .map(|job| {
            let path = job.result_data();
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(path),
                _ => Err(PhonoflowError::MissingResultData {
                    path: path.display().to_string(),
                }),
            }
        })
        .collect()
}

/// 运行 `phonopy -f` 并确认 FORCE_SETS 非空
pub fn build_force_sets(ws: &Workspace, tools: &Toolchain, jobs: &[JobDir]) -> Result<PathBuf> {
    let data = collect_result_data(jobs)?;

    let invocation = Invocation::new(&tools.phonopy, FailurePolicy::Fatal)
        .arg("-f")
        .args(&data)
        .current_dir(ws.root());
    let command = invocation.command_line();
    invocation.run()?;

    let force_sets = ws.join(FORCE_SETS_FILE);
    match fs::metadata(&force_sets) {
        Ok(meta) if meta.len() > 0 => {
            log::info!(
                "{} written ({:.1} kB)",
                FORCE_SETS_FILE,
                meta.len() as f64 / 1024.0
            );
            Ok(force_sets)
        }
        _ => Err(PhonoflowError::ToolOutputMissing {
            command,
            path: force_sets.display().to_string(),
        }),
    }
}
