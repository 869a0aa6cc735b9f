//! # Slurm 脚本生成工具
//!
//! 为每个位移作业生成 sbatch 提交脚本。提交本身是"发出即不管"的副作用，
//! 由 `commands/preprocess.rs` 以 Degraded 策略调用 `sbatch`。
//!
//! ## 依赖关系
//! - 被 `commands/preprocess.rs` 使用
//! - 无外部模块依赖

use std::path::Path;

/// Slurm 作业配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmConfig {
    pub job_name: String,
    pub partition: String,
    pub nodes: u32,
    pub ntasks: u32,
    pub cpus_per_task: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        SlurmConfig {
            job_name: "job".to_string(),
            partition: "cpu".to_string(),
            nodes: 1,
            ntasks: 32,
            cpus_per_task: 1,
            mem_per_cpu: "3G".to_string(),
            time_limit: "24:00:00".to_string(),
            modules: vec![],
        }
    }
}

impl SlurmConfig {
    /// 同一组资源设置，换一个作业名
    pub fn for_job(&self, job_name: &str) -> Self {
        SlurmConfig {
            job_name: job_name.to_string(),
            ..self.clone()
        }
    }
}

/// 解析逗号分隔的 module 列表
pub fn parse_modules(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 生成 sbatch 脚本内容
pub fn generate_sbatch_script(config: &SlurmConfig, workdir: &Path, exec_cmd: &str) -> String {
    let module_loads = config
        .modules
        .iter()
        .map(|m| format!("module load {}", m))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"#!/bin/bash
#SBATCH --partition {}
#SBATCH --nodes={}
#SBATCH --mem-per-cpu {}
#SBATCH --time {}
#SBATCH -c {}
#SBATCH -n {}
#SBATCH -J {}
#SBATCH -o slurm-%x.out
#SBATCH -e slurm-%x.err

set -euo pipefail

module purge 2>&1 || true
{}

cd "{}"
echo "Running: {}"
{}
"#,
        config.partition,
        config.nodes,
        config.mem_per_cpu,
        config.time_limit,
        config.cpus_per_task,
        config.ntasks,
        config.job_name,
        module_loads,
        workdir.display(),
        exec_cmd,
        exec_cmd,
    )
}
