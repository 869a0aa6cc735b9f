//! # check 命令实现
//!
//! 只读取运行记录并运行收敛性闸门，不修改任何作业目录。
//! `post` 也通过 [`run_gate`] 执行同一个闸门。
//!
//! ## 依赖关系
//! - 使用 `phonon/gate.rs`, `models/run_record.rs`, `utils/output.rs`

use crate::cli::GlobalArgs;
use crate::config::{Workspace, CONVERGENCE_REPORT_FILE};
use crate::error::{PhonoflowError, Result};
use crate::models::{JobDir, RunRecord};
use crate::phonon::gate::{self, ConvergenceReport};
use crate::utils::output;

/// 执行 check 命令
pub fn execute(global: &GlobalArgs) -> Result<()> {
    output::print_header("Convergence Check");

    let ws = super::workspace(global)?;
    let record = RunRecord::load(&ws.run_record_path())?;
    let jobs = record.job_dirs(ws.root());

    run_gate(&ws, &jobs)?;
    output::print_done(&format!("All {} job(s) converged", jobs.len()));
    Ok(())
}

/// 判定全部作业并写出 CSV 报告；有任何失败即返回错误
pub fn run_gate(ws: &Workspace, jobs: &[JobDir]) -> Result<ConvergenceReport> {
    output::print_info(&format!("Checking {} job folder(s)", jobs.len()));
    let report = gate::check_jobs(jobs);

    let csv_path = ws.join(CONVERGENCE_REPORT_FILE);
    report.write_csv(&csv_path)?;
    log::info!("Convergence report written to {}", csv_path.display());

    if report.all_passed() {
        output::print_success(&format!("All {} job(s) passed the convergence gate", jobs.len()));
        return Ok(report);
    }

    let failed = report.failed_names();
    output::print_warning(&format!(
        "{} of {} job(s) did not converge:",
        failed.len(),
        jobs.len()
    ));
    println!("{}", report.failure_table());
    output::print_info(&format!("Details saved to {}", csv_path.display()));

    Err(PhonoflowError::ConvergenceFailed { jobs: failed })
}
