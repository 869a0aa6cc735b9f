//! # pre 子命令 CLI 定义
//!
//! 对称化输入结构、生成位移结构并分发到作业目录
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/preprocess.rs`

use crate::config;
use clap::Args;
use std::path::PathBuf;

fn parse_prefix(s: &str) -> Result<String, String> {
    config::validate_job_prefix(s)
        .map(|_| s.to_string())
        .map_err(|e| e.to_string())
}

/// pre 子命令参数
#[derive(Args, Debug)]
pub struct PreArgs {
    /// Input structure (POSCAR format, relative to the working directory)
    #[arg(long, default_value = "POSCAR")]
    pub structure: PathBuf,

    /// Use the structure as-is instead of running 'phonopy --symmetry'
    #[arg(long, default_value_t = false)]
    pub no_symmetrize: bool,

    /// Supercell expansion along a, b and c
    #[arg(
        long,
        num_args = 3,
        value_names = ["A", "B", "C"],
        default_values_t = [2u32, 2, 2],
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub dim: Vec<u32>,

    /// Job folder prefix; folders are named <PREFIX>-001, <PREFIX>-002, ...
    #[arg(long, value_parser = parse_prefix)]
    pub prefix: String,

    /// Directory holding INCAR, KPOINTS and POTCAR (default: working directory)
    #[arg(long)]
    pub aux_dir: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // Slurm options
    // ─────────────────────────────────────────────────────────────
    /// Write a submit.sbatch script into every job folder
    #[arg(long, default_value_t = false)]
    pub slurm: bool,

    /// Slurm partition
    #[arg(long, default_value = "cpu")]
    pub partition: String,

    /// Number of nodes
    #[arg(long, default_value_t = 1)]
    pub nodes: u32,

    /// Number of tasks
    #[arg(long, default_value_t = 32)]
    pub ntasks: u32,

    /// CPUs per task
    #[arg(long, default_value_t = 1)]
    pub cpus_per_task: u32,

    /// Memory per CPU
    #[arg(long, default_value = "3G")]
    pub mem_per_cpu: String,

    /// Time limit (e.g., '24:00:00')
    #[arg(long, default_value = "24:00:00")]
    pub time: String,

    /// Module list (comma-separated)
    #[arg(long, default_value = "")]
    pub modules: String,

    /// VASP executable name
    #[arg(long, default_value = "vasp_std")]
    pub vasp_exec: String,

    /// Number of MPI processes for VASP
    #[arg(long, default_value_t = 32)]
    pub vasp_np: u32,

    // ─────────────────────────────────────────────────────────────
    // Execution control
    // ─────────────────────────────────────────────────────────────
    /// Submit every job after generation (implies --slurm)
    #[arg(long, default_value_t = false)]
    pub submit: bool,
}
