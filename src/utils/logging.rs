//! # 运行日志
//!
//! 每次启动时在工作目录下创建（追加写）`workflow_<时间戳>.log`，
//! 由 `fern` 接收 `log` 门面的全部记录。终端输出由 `utils/output.rs` 负责，
//! 这里只写文件。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `fern`, `log`, `time` crate

use crate::config::LOG_FILE_PREFIX;
use crate::error::{PhonoflowError, Result};

use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

/// 当前本地时间；无法确定本地时区时退回 UTC
fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// 日志文件名：`workflow_20240131_154500.log`
pub fn log_file_name(stamp: OffsetDateTime) -> Result<String> {
    let formatted = stamp
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .map_err(|e| PhonoflowError::LoggingError(e.to_string()))?;
    Ok(format!("{}{}.log", LOG_FILE_PREFIX, formatted))
}

/// 安装全局日志器，返回日志文件路径
pub fn setup_run_log(workdir: &Path) -> Result<PathBuf> {
    let path = workdir.join(log_file_name(now())?);

    let file = fern::log_file(&path).map_err(|e| PhonoflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let stamp = now()
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))
                .unwrap_or_default();
            out.finish(format_args!("{} [{}] {}", stamp, record.level(), message))
        })
        .level(log::LevelFilter::Info)
        .chain(file)
        .apply()
        .map_err(|e| PhonoflowError::LoggingError(e.to_string()))?;

    log::info!("=== workflow session started ===");
    log::info!("working directory: {}", workdir.display());
    Ok(path)
}
