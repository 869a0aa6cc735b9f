//! # 收敛性闸门
//!
//! 对运行记录隐含的每个作业目录做二元判定：结果日志里
//! "达到目标精度" 与 "正常结束" 两个标记**都**出现才算通过。
//!
//! 与其他步骤不同，闸门不会在第一个失败处停下，而是收集全部失败作业，
//! 一次性报告，便于操作者批量处理。缺少日志（包括整个目录被删除）一律视为失败。
//!
//! ## 依赖关系
//! - 被 `commands/check.rs`, `commands/postprocess.rs` 使用
//! - 使用 `parsers/outcar.rs`, `models/job.rs`, `utils/progress.rs`

use crate::error::{PhonoflowError, Result};
use crate::models::JobDir;
use crate::parsers::outcar::{self, MarkerScan};
use crate::utils::progress;

use std::fmt;
use std::path::Path;
use tabled::{Table, Tabled};

/// 未通过的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    MissingLog,
    UnreadableLog(String),
    AccuracyNotReached,
    NotTerminated,
    NeitherMarker,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingLog => write!(f, "result log missing"),
            FailureReason::UnreadableLog(e) => write!(f, "result log unreadable: {}", e),
            FailureReason::AccuracyNotReached => write!(f, "target accuracy not reached"),
            FailureReason::NotTerminated => write!(f, "calculation did not terminate cleanly"),
            FailureReason::NeitherMarker => {
                write!(f, "target accuracy not reached / calculation did not terminate")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    Passed,
    Failed(FailureReason),
}

/// 单个作业的判定
#[derive(Debug, Clone)]
pub struct Verdict {
    pub job: JobDir,
    pub convergence: Convergence,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.convergence == Convergence::Passed
    }
}

/// 全部作业的判定，保持作业序号顺序
#[derive(Debug, Clone, Default)]
pub struct ConvergenceReport {
    pub verdicts: Vec<Verdict>,
}

impl ConvergenceReport {
    /// 全部通过才算通过；空报告不算失败
    pub fn all_passed(&self) -> bool {
        self.verdicts.iter().all(Verdict::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.passed())
    }

    /// 失败作业目录名，按序号升序
    pub fn failed_names(&self) -> Vec<String> {
        self.failures().map(|v| v.job.name.clone()).collect()
    }

    /// 写出 CSV 诊断报告：job, status, reason
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["job", "status", "reason"])?;
        for verdict in &self.verdicts {
            let (status, reason) = match &verdict.convergence {
                Convergence::Passed => ("converged", String::new()),
                Convergence::Failed(r) => ("failed", r.to_string()),
            };
            wtr.write_record([verdict.job.name.as_str(), status, reason.as_str()])?;
        }
        wtr.flush().map_err(|e| PhonoflowError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// 失败作业表格
    pub fn failure_table(&self) -> Table {
        #[derive(Tabled)]
        struct FailureRow {
            #[tabled(rename = "Job")]
            job: String,
            #[tabled(rename = "Reason")]
            reason: String,
        }

        let rows: Vec<FailureRow> = self
            .failures()
            .map(|v| FailureRow {
                job: v.job.name.clone(),
                reason: match &v.convergence {
                    Convergence::Failed(r) => r.to_string(),
                    Convergence::Passed => String::new(),
                },
            })
            .collect();
        Table::new(rows)
    }
}

/// 由标记扫描结果判定
pub fn classify(scan: &MarkerScan) -> Convergence {
    match (scan.accuracy_reached(), scan.terminated()) {
        (true, true) => Convergence::Passed,
        (false, true) => Convergence::Failed(FailureReason::AccuracyNotReached),
        (true, false) => Convergence::Failed(FailureReason::NotTerminated),
        (false, false) => Convergence::Failed(FailureReason::NeitherMarker),
    }
}

/// 判定单个作业
pub fn check_job(job: &JobDir) -> Convergence {
    let log_path = job.result_log();
    if !log_path.is_file() {
        return Convergence::Failed(FailureReason::MissingLog);
    }
    match outcar::scan_outcar(&log_path) {
        Ok(scan) => classify(&scan),
        Err(e) => Convergence::Failed(FailureReason::UnreadableLog(e.to_string())),
    }
}

/// 判定全部作业，不在第一个失败处停止
pub fn check_jobs(jobs: &[JobDir]) -> ConvergenceReport {
    let pb = progress::create_progress_bar(jobs.len() as u64, "Checking convergence");

    let verdicts = jobs
        .iter()
        .map(|job| {
            let convergence = check_job(job);
            match &convergence {
                Convergence::Passed => log::info!("converged: {}", job.name),
                Convergence::Failed(reason) => {
                    log::error!("not converged: {} ({})", job.name, reason)
                }
            }
            pb.inc(1);
            Verdict {
                job: job.clone(),
                convergence,
            }
        })
        .collect();

    pb.finish_and_clear();
    ConvergenceReport { verdicts }
}
