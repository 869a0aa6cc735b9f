//! # 声子谱计算与导出
//!
//! 两次顺序调用，失败策略不同：
//! 1. `phonopy -c POSCAR-unitcell band.conf -p -s`：主产物，失败即中止；
//! 2. `phonopy-bandplot --gnuplot > phononband.out`：便利导出，30 秒超时，
//!    超时/非零退出/其他异常都只警告，并打印手动执行的命令。
//!
//! ## 依赖关系
//! - 被 `commands/postprocess.rs` 使用
//! - 使用 `utils/command.rs`, `utils/output.rs`, `utils/progress.rs`

use crate::config::{Workspace, BAND_CONF_FILE, BAND_YAML_FILE, EXPORT_OUTPUT_FILE};
use crate::error::{PhonoflowError, Result};
use crate::utils::command::{DegradedFailure, FailurePolicy, Invocation, Outcome, Toolchain};
use crate::utils::{output, progress};

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 导出步骤的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Written(PathBuf),
    Skipped(DegradedFailure),
}

/// 运行主计算，返回 band.yaml 路径
pub fn run_band_calculation(ws: &Workspace, tools: &Toolchain, unit: &Path) -> Result<PathBuf> {
    let invocation = Invocation::new(&tools.phonopy, FailurePolicy::Fatal)
        .arg("-c")
        .arg(unit)
        .arg(BAND_CONF_FILE)
        .args(["-p", "-s"])
        .current_dir(ws.root());
    let command = invocation.command_line();

    let spinner = progress::create_spinner("Computing phonon band structure");
    let result = invocation.run();
    spinner.finish_and_clear();
    result?;

    let band_yaml = ws.join(BAND_YAML_FILE);
    if !band_yaml.is_file() {
        return Err(PhonoflowError::ToolOutputMissing {
            command,
            path: band_yaml.display().to_string(),
        });
    }
    output::print_success(&format!("Band structure written to {}", band_yaml.display()));
    Ok(band_yaml)
}

fn export_invocation<'a>(ws: &Workspace, tools: &'a Toolchain) -> Invocation<'a> {
    Invocation::new(&tools.bandplot, FailurePolicy::Degraded)
        .arg("--gnuplot")
        .current_dir(ws.root())
        .stdout_to(&ws.join(EXPORT_OUTPUT_FILE))
}

fn is_current_dir(dir: &Path) -> bool {
    match (dir.canonicalize(), env::current_dir().and_then(|d| d.canonicalize())) {
        (Ok(dir), Ok(cwd)) => dir == cwd,
        _ => false,
    }
}

/// 导出失败时提示操作者手动执行的命令
///
/// 工作目录不是当前目录时带上 `cd <workdir> &&`。
pub fn manual_export_command(ws: &Workspace, tools: &Toolchain) -> String {
    let command = export_invocation(ws, tools).command_line();
    if is_current_dir(ws.root()) {
        command
    } else {
        format!("cd {} && {}", ws.root().display(), command)
    }
}

/// 导出降级时打印的提示
pub fn fallback_notice(program: &str, failure: &DegradedFailure, manual: &str) -> Vec<String> {
    vec![
        format!("[INFO] {} has been generated.", BAND_YAML_FILE),
        format!("{} {}.", program, failure),
        "Run the following command manually to obtain the plot data:".to_string(),
        format!("  {}", manual),
    ]
}

/// 导出文本数据；任何失败都不会中止流程
pub fn export_band_plot(ws: &Workspace, tools: &Toolchain, timeout: Duration) -> Result<ExportStatus> {
    let manual = manual_export_command(ws, tools);

    match export_invocation(ws, tools).timeout(timeout).run()? {
        Outcome::Completed(_) => {
            let out = ws.join(EXPORT_OUTPUT_FILE);
            output::print_success(&format!("Band plot data saved to {}", out.display()));
            Ok(ExportStatus::Written(out))
        }
        Outcome::Degraded(failure) => {
            output::print_notice(&fallback_notice(tools.bandplot.program(), &failure, &manual));
            Ok(ExportStatus::Skipped(failure))
        }
    }
}
