//! # 统一错误处理模块
//!
//! 定义 phonoflow 的所有致命错误类型，使用 `thiserror` 派生。
//! 可降级的失败（导出步骤）不走这里，而是由 `utils/command.rs` 以返回值表示。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// phonoflow 统一错误类型
#[derive(Error, Debug)]
pub enum PhonoflowError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 运行记录（预处理 -> 后处理的唯一状态）
    // ─────────────────────────────────────────────────────────────
    #[error(
        "Run record not found: {path}\nRun the 'pre' stage first to generate the workflow state."
    )]
    RunRecordMissing { path: String },

    #[error("Run record is corrupt: {path}\nReason: {reason}\nRe-run the 'pre' stage.")]
    RunRecordCorrupt { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("External command timed out after {seconds}s: {command}")]
    CommandTimedOut { command: String, seconds: u64 },

    #[error("'{command}' finished but did not produce {path}")]
    ToolOutputMissing { command: String, path: String },

    // ─────────────────────────────────────────────────────────────
    // 工作流错误
    // ─────────────────────────────────────────────────────────────
    #[error("No displacement files ({pattern}) were produced by the displacement tool")]
    NoDisplacements { pattern: String },

    #[error(
        "{} job(s) did not converge, post-processing stopped: {}",
        .jobs.len(),
        .jobs.join(", ")
    )]
    ConvergenceFailed { jobs: Vec<String> },

    #[error("Missing result data in job directory: {path}")]
    MissingResultData { path: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to initialise logging: {0}")]
    LoggingError(String),

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, PhonoflowError>;
