//! # 外部工具调用
//!
//! 所有外部程序（phonopy、phonopy-bandplot、sbatch）都经由 [`Invocation`] 执行。
//! 每次调用携带一个 [`FailurePolicy`]：
//!
//! - `Fatal`: 找不到程序、非零退出、超时都转为 `PhonoflowError` 返回
//! - `Degraded`: 超时、非零退出、其他异常分别记为警告，以 [`Outcome::Degraded`] 返回
//!
//! 不做任何重试。命令行、stdout/stderr 与退出状态都会写入日志。
//!
//! ## 依赖关系
//! - 被 `commands/`, `phonon/` 使用
//! - 使用 `error.rs`

use crate::error::{PhonoflowError, Result};

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 外部工具命令：程序名加前置参数
///
/// `"python -m phonopy"` 会拆成程序 `python` 与参数 `-m phonopy`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            PhonoflowError::InvalidArgument("tool command must not be empty".to_string())
        })?;
        Ok(ToolCommand {
            program,
            leading_args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.leading_args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// 工作流用到的外部工具
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub phonopy: ToolCommand,
    pub bandplot: ToolCommand,
    pub sbatch: ToolCommand,
}

/// 失败处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 失败即中止整个流程
    Fatal,
    /// 失败只记警告，流程继续
    Degraded,
}

/// 可降级失败的分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedFailure {
    TimedOut(Duration),
    NonZeroExit(Option<i32>),
    Fault(String),
}

impl fmt::Display for DegradedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedFailure::TimedOut(limit) => {
                write!(f, "timed out after {}s", limit.as_secs_f64())
            }
            DegradedFailure::NonZeroExit(Some(code)) => write!(f, "exited with code {}", code),
            DegradedFailure::NonZeroExit(None) => write!(f, "terminated by signal"),
            DegradedFailure::Fault(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// 捕获的输出。stdout 被重定向到文件时为空。
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub enum Outcome {
    Completed(Captured),
    Degraded(DegradedFailure),
}

/// 调用内部的失败形态，随后按策略映射
enum Failure {
    NotFound,
    Io(io::Error),
    TimedOut(Duration),
    NonZero { code: Option<i32>, stderr: String },
}

/// 一次外部程序调用
pub struct Invocation<'a> {
    tool: &'a ToolCommand,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    stdout_file: Option<PathBuf>,
    policy: FailurePolicy,
}

impl<'a> Invocation<'a> {
    pub fn new(tool: &'a ToolCommand, policy: FailurePolicy) -> Self {
        Invocation {
            tool,
            args: Vec::new(),
            current_dir: None,
            timeout: None,
            stdout_file: None,
            policy,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// 超过该时长即放弃（杀掉进程），不重试
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// 将 stdout 写入文件，相当于 shell 的 `>`
    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout_file = Some(path.to_path_buf());
        self
    }

    /// 便于记录和提示的命令行文本
    pub fn command_line(&self) -> String {
        let mut line = self.tool.to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        if let Some(ref out) = self.stdout_file {
            let name = out
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| out.display().to_string());
            line.push_str(" > ");
            line.push_str(&name);
        }
        line
    }

    /// 执行并按策略解释结果
    pub fn run(self) -> Result<Outcome> {
        let line = self.command_line();
        log::info!("Running: {}", line);

        match self.execute() {
            Ok(captured) => {
                log::info!("Finished: {}", line);
                Ok(Outcome::Completed(captured))
            }
            Err(failure) => match self.policy {
                FailurePolicy::Fatal => Err(self.fatal_error(line, failure)),
                FailurePolicy::Degraded => {
                    let degraded = match failure {
                        Failure::TimedOut(limit) => DegradedFailure::TimedOut(limit),
                        Failure::NonZero { code, .. } => DegradedFailure::NonZeroExit(code),
                        Failure::NotFound => DegradedFailure::Fault(format!(
                            "'{}' not found in PATH",
                            self.tool.program()
                        )),
                        Failure::Io(e) => DegradedFailure::Fault(e.to_string()),
                    };
                    log::warn!("'{}' {}; continuing", line, degraded);
                    Ok(Outcome::Degraded(degraded))
                }
            },
        }
    }

    fn fatal_error(&self, line: String, failure: Failure) -> PhonoflowError {
        match failure {
            Failure::NotFound => PhonoflowError::CommandNotFound {
                command: self.tool.program().to_string(),
            },
            Failure::TimedOut(limit) => PhonoflowError::CommandTimedOut {
                command: line,
                seconds: limit.as_secs(),
            },
            Failure::NonZero { code, stderr } => {
                log::error!("'{}' exited with status {:?}", line, code);
                PhonoflowError::CommandFailed {
                    command: line,
                    stderr: stderr.trim().to_string(),
                }
            }
            Failure::Io(e) => PhonoflowError::CommandFailed {
                command: line,
                stderr: e.to_string(),
            },
        }
    }

    fn execute(&self) -> std::result::Result<Captured, Failure> {
        let mut cmd = Command::new(self.tool.program());
        cmd.args(&self.tool.leading_args)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped());

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        match self.stdout_file {
            Some(ref path) => {
                let file = File::create(path).map_err(Failure::Io)?;
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Failure::NotFound,
            _ => Failure::Io(e),
        })?;

        // 两个管道由后台线程排空，避免子进程在输出量大时阻塞
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let status = match self.timeout {
            None => child.wait().map_err(Failure::Io)?,
            Some(limit) => match wait_with_deadline(&mut child, limit).map_err(Failure::Io)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // 孙进程可能仍持有管道，读线程不再等待
                    log::warn!("Killed '{}' after {:?}", self.tool.program(), limit);
                    return Err(Failure::TimedOut(limit));
                }
            },
        };

        let captured = Captured {
            stdout: stdout_reader.map(collect).unwrap_or_default(),
            stderr: stderr_reader.map(collect).unwrap_or_default(),
        };
        log_captured(&captured);

        if status.success() {
            Ok(captured)
        } else {
            Err(Failure::NonZero {
                code: status.code(),
                stderr: captured.stderr,
            })
        }
    }
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn log_captured(captured: &Captured) {
    let stdout = captured.stdout.trim();
    if !stdout.is_empty() {
        log::info!("{}", stdout);
    }
    let stderr = captured.stderr.trim();
    if !stderr.is_empty() {
        log::info!("stderr: {}", stderr);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sh_script(dir: &Path, name: &str, body: &str) -> ToolCommand {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        ToolCommand::parse(&format!("sh {}", path.display())).unwrap()
    }

    #[test]
    fn test_parse_tool_command() {
        let tool = ToolCommand::parse("python -m phonopy").unwrap();
        assert_eq!(tool.program(), "python");
        assert_eq!(tool.to_string(), "python -m phonopy");
        assert!(ToolCommand::parse("   ").is_err());
    }

    #[test]
    fn test_command_line_with_redirect() {
        let tool = ToolCommand::parse("phonopy-bandplot").unwrap();
        let line = Invocation::new(&tool, FailurePolicy::Degraded)
            .arg("--gnuplot")
            .stdout_to(Path::new("/tmp/work/phononband.out"))
            .command_line();
        assert_eq!(line, "phonopy-bandplot --gnuplot > phononband.out");
    }

    #[test]
    fn test_fatal_success_captures_stdout() {
        let tmp = TempDir::new().unwrap();
        let tool = sh_script(tmp.path(), "ok.sh", "echo hello\necho oops >&2\n");
        let outcome = Invocation::new(&tool, FailurePolicy::Fatal).run().unwrap();
        match outcome {
            Outcome::Completed(c) => {
                assert_eq!(c.stdout.trim(), "hello");
                assert_eq!(c.stderr.trim(), "oops");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_fatal_nonzero_exit_is_error() {
        let tmp = TempDir::new().unwrap();
        let tool = sh_script(tmp.path(), "fail.sh", "echo broken >&2\nexit 3\n");
        let err = Invocation::new(&tool, FailurePolicy::Fatal)
            .run()
            .unwrap_err();
        match err {
            PhonoflowError::CommandFailed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fatal_missing_program() {
        let tool = ToolCommand::parse("definitely-not-a-real-phonopy-binary").unwrap();
        let err = Invocation::new(&tool, FailurePolicy::Fatal)
            .run()
            .unwrap_err();
        assert!(matches!(err, PhonoflowError::CommandNotFound { .. }));
    }

    #[test]
    fn test_degraded_nonzero_exit() {
        let tmp = TempDir::new().unwrap();
        let tool = sh_script(tmp.path(), "fail.sh", "exit 2\n");
        let outcome = Invocation::new(&tool, FailurePolicy::Degraded)
            .run()
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Degraded(DegradedFailure::NonZeroExit(Some(2)))
        ));
    }

    #[test]
    fn test_degraded_timeout() {
        let tmp = TempDir::new().unwrap();
        let tool = sh_script(tmp.path(), "slow.sh", "sleep 5\n");
        let started = Instant::now();
        let outcome = Invocation::new(&tool, FailurePolicy::Degraded)
            .timeout(Duration::from_millis(200))
            .run()
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Degraded(DegradedFailure::TimedOut(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_degraded_missing_program_is_fault() {
        let tool = ToolCommand::parse("definitely-not-a-real-bandplot").unwrap();
        let outcome = Invocation::new(&tool, FailurePolicy::Degraded)
            .run()
            .unwrap();
        assert!(matches!(outcome, Outcome::Degraded(DegradedFailure::Fault(_))));
    }

    #[test]
    fn test_stdout_redirect_and_cwd() {
        let tmp = TempDir::new().unwrap();
        let tool = sh_script(tmp.path(), "emit.sh", "pwd\n");
        let out = tmp.path().join("out.txt");
        let outcome = Invocation::new(&tool, FailurePolicy::Degraded)
            .current_dir(tmp.path())
            .stdout_to(&out)
            .timeout(Duration::from_secs(10))
            .run()
            .unwrap();
        assert!(matches!(outcome, Outcome::Completed(_)));
        let written = fs::read_to_string(&out).unwrap();
        let expected = fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(
            fs::canonicalize(written.trim()).unwrap(),
            expected
        );
    }
}
