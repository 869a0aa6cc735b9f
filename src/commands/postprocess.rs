//! # post 命令实现
//!
//! 后处理控制器。读取运行记录后按固定顺序执行：
//! 收敛性闸门 → 空文件清理 → FORCE_SETS → band.conf → 能带计算 → 文本导出。
//! 闸门未通过时立即停止，后续步骤都不执行；只有最后的导出步骤允许降级。
//!
//! ## 依赖关系
//! - 使用 `cli/postprocess.rs` 定义的参数
//! - 使用 `commands/check.rs`, `phonon/`, `models/run_record.rs`

use crate::cli::postprocess::PostArgs;
use crate::cli::GlobalArgs;
use crate::config::{WorkflowConfig, Workspace, BAND_CONF_FILE, EXPORT_TIMEOUT};
use crate::error::{PhonoflowError, Result};
use crate::models::RunRecord;
use crate::phonon::bands::{self, ExportStatus};
use crate::phonon::kpath::{self, LatticeClassifier, SpecialPointSource};
use crate::phonon::{band_conf, cleanup, force_sets};
use crate::utils::command::Toolchain;
use crate::utils::output;

use std::path::PathBuf;
use std::time::Duration;

/// 一次成功后处理的产物
#[derive(Debug)]
pub struct PostprocessSummary {
    pub band_conf: PathBuf,
    pub band_yaml: PathBuf,
    pub export: ExportStatus,
}

/// 执行 post 命令
pub fn execute(args: PostArgs, global: &GlobalArgs) -> Result<()> {
    output::print_header("Phonon Postprocessing");

    let ws = super::workspace(global)?;
    let tools = super::toolchain(global)?;
    let band_override = args.band_path_tokens();

    let classifier = LatticeClassifier;
    let source: Option<&dyn SpecialPointSource> = if args.builtin_path {
        None
    } else {
        Some(&classifier)
    };

    let summary = run(&ws, &tools, band_override.as_deref(), source, EXPORT_TIMEOUT)?;

    output::print_separator();
    match summary.export {
        ExportStatus::Written(ref out) => output::print_done(&format!(
            "Workflow complete: {} -> {} and {}",
            summary.band_conf.display(),
            summary.band_yaml.display(),
            out.display()
        )),
        ExportStatus::Skipped(_) => output::print_done(&format!(
            "Workflow complete: {} -> {} (text export pending)",
            summary.band_conf.display(),
            summary.band_yaml.display()
        )),
    }
    Ok(())
}

/// 后处理主体
pub fn run(
    ws: &Workspace,
    tools: &Toolchain,
    band_override: Option<&[String]>,
    source: Option<&dyn SpecialPointSource>,
    export_timeout: Duration,
) -> Result<PostprocessSummary> {
    let record = RunRecord::load(&ws.run_record_path())?;
    output::print_info(&format!(
        "Run record: {} job(s) with prefix '{}', supercell {:?}",
        record.job_count, record.job_prefix, record.supercell_factors
    ));

    // post 不做对称化，扩胞与前缀沿用运行记录
    let config = WorkflowConfig {
        symmetrize: false,
        supercell_factors: record.supercell_factors,
        job_prefix: record.job_prefix.clone(),
        band_path_override: band_override.map(<[String]>::to_vec),
    };
    config.validate()?;

    let unit = ws.join(&record.unit_structure_path);
    if !unit.is_file() {
        return Err(PhonoflowError::FileNotFound {
            path: unit.display().to_string(),
        });
    }

    let jobs = record.job_dirs(ws.root());
    super::check::run_gate(ws, &jobs)?;

    let removed = cleanup::remove_empty_files(&jobs)?;
    output::print_info(&format!("Removed {} empty file(s) from job folders", removed));

    let forces = force_sets::build_force_sets(ws, tools, &jobs)?;
    output::print_success(&format!("Force sets written to {}", forces.display()));

    let band_path = kpath::determine_band_path(source, &unit, config.band_path_override.as_deref())?;
    let conf_path = ws.join(BAND_CONF_FILE);
    band_conf::write_band_conf(&conf_path, &record, &band_path)?;
    output::print_success(&format!(
        "{} written (path: {})",
        conf_path.display(),
        band_path.labels.join(" ")
    ));

    let band_yaml = bands::run_band_calculation(ws, tools, &record.unit_structure_path)?;
    let export = bands::export_band_plot(ws, tools, export_timeout)?;

    Ok(PostprocessSummary {
        band_conf: conf_path,
        band_yaml,
        export,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{CONVERGENCE_REPORT_FILE, FORCE_SETS_FILE};
    use crate::phonon::gate::tests::{make_jobs, CONVERGED_LOG, UNTERMINATED_LOG};
    use crate::utils::command::{DegradedFailure, ToolCommand};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const HEX_BO: &str = "\
B2O3 monolayer
1.0
4.5 0.0 0.0
-2.25 3.897114317 0.0
0.0 0.0 20.0
B O
2 3
Direct
0.333333 0.666667 0.5
";

    /// 模拟 phonopy：-f 写 FORCE_SETS，-c 写 band.yaml，并留下调用痕迹
    const FAKE_PHONOPY: &str = r#"
case "$1" in
  -f) touch aggregation_called; echo "forces" > FORCE_SETS ;;
  -c) echo "$@" > band_args.txt; echo "phonon: []" > band.yaml ;;
esac
"#;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        format!("sh {}", path.display())
    }

    fn tools(dir: &Path, bandplot_body: &str) -> Toolchain {
        Toolchain {
            phonopy: ToolCommand::parse(&script(dir, "fake_phonopy.sh", FAKE_PHONOPY)).unwrap(),
            bandplot: ToolCommand::parse(&script(dir, "fake_bandplot.sh", bandplot_body)).unwrap(),
            sbatch: ToolCommand::parse("sbatch").unwrap(),
        }
    }

    /// 8 个 B-O 作业，第 `unterminated` 个（从 1 开始）缺少结束标记
    fn setup(tmp: &TempDir, unterminated: Option<usize>) -> Workspace {
        let ws = Workspace::new(tmp.path());
        fs::write(ws.unit_structure_path(), HEX_BO).unwrap();

        let mut logs = [Some(CONVERGED_LOG); 8];
        if let Some(i) = unterminated {
            logs[i - 1] = Some(UNTERMINATED_LOG);
        }
        for job in make_jobs(tmp.path(), "BO-disp", &logs) {
            fs::write(job.result_data(), "<modeling/>").unwrap();
            fs::write(job.path.join("WAVECAR"), "").unwrap();
        }

        RunRecord::new(
            PathBuf::from("POSCAR-unitcell"),
            [2, 2, 2],
            "BO-disp",
            8,
            vec!["B".to_string(), "O".to_string()],
        )
        .unwrap()
        .save(&ws.run_record_path())
        .unwrap();
        ws
    }

    #[test]
    fn test_full_postprocess() {
        let tmp = TempDir::new().unwrap();
        let ws = setup(&tmp, None);
        let tools = tools(tmp.path(), "echo \"0.0 1.0\"\n");

        let summary = run(
            &ws,
            &tools,
            None,
            Some(&LatticeClassifier),
            Duration::from_secs(10),
        )
        .unwrap();

        let conf = fs::read_to_string(&summary.band_conf).unwrap();
        assert!(conf.contains("ATOM_NAME = BO\n"));
        assert!(conf.contains("DIM = 2 2 2\n"));
        assert!(conf.contains("BAND_LABELS = $\\Gamma$ M K $\\Gamma$\n"));

        assert!(ws.join(FORCE_SETS_FILE).is_file());
        assert!(summary.band_yaml.is_file());
        assert!(matches!(summary.export, ExportStatus::Written(_)));
        assert!(!ws.join("BO-disp-003").join("WAVECAR").exists());

        let band_args = fs::read_to_string(ws.join("band_args.txt")).unwrap();
        assert_eq!(band_args.trim(), "-c POSCAR-unitcell band.conf -p -s");
    }

    #[test]
    fn test_unconverged_job_halts_before_cleanup() {
        let tmp = TempDir::new().unwrap();
        let ws = setup(&tmp, Some(5));
        let tools = tools(tmp.path(), "exit 0\n");

        let err = run(&ws, &tools, None, None, Duration::from_secs(10)).unwrap_err();
        match err {
            PhonoflowError::ConvergenceFailed { jobs } => assert_eq!(jobs, vec!["BO-disp-005"]),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(ws.join(CONVERGENCE_REPORT_FILE).is_file());
        assert!(ws.join("BO-disp-001").join("WAVECAR").exists());
        assert!(!ws.join("aggregation_called").exists());
        assert!(!ws.join(FORCE_SETS_FILE).exists());
        assert!(!ws.join(BAND_CONF_FILE).exists());
    }

    #[test]
    fn test_missing_run_record() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(tmp.path());
        let tools = tools(tmp.path(), "exit 0\n");

        let err = run(&ws, &tools, None, None, Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, PhonoflowError::RunRecordMissing { .. }));
    }

    #[test]
    fn test_export_timeout_still_completes() {
        let tmp = TempDir::new().unwrap();
        let ws = setup(&tmp, None);
        let tools = tools(tmp.path(), "sleep 5\n");

        let summary = run(&ws, &tools, None, None, Duration::from_millis(200)).unwrap();

        assert!(matches!(
            summary.export,
            ExportStatus::Skipped(DegradedFailure::TimedOut(_))
        ));
        assert!(summary.band_yaml.is_file());
        assert!(ws.join(FORCE_SETS_FILE).is_file());
    }

    #[test]
    fn test_operator_path_override() {
        let tmp = TempDir::new().unwrap();
        let ws = setup(&tmp, None);
        let tools = tools(tmp.path(), "exit 0\n");
        let path: Vec<String> = ["G", "K", "M", "G"].iter().map(|s| s.to_string()).collect();

        let summary = run(
            &ws,
            &tools,
            Some(path.as_slice()),
            Some(&LatticeClassifier),
            Duration::from_secs(10),
        )
        .unwrap();

        let conf = fs::read_to_string(&summary.band_conf).unwrap();
        assert!(conf.contains("BAND_LABELS = $\\Gamma$ K M $\\Gamma$\n"));
        assert!(matches!(
            summary.export,
            ExportStatus::Written(_)
        ));
    }

    #[test]
    fn test_short_override_rejected_before_gate() {
        let tmp = TempDir::new().unwrap();
        let ws = setup(&tmp, None);
        let tools = tools(tmp.path(), "exit 0\n");
        let path = vec!["G".to_string()];

        let err = run(
            &ws,
            &tools,
            Some(path.as_slice()),
            Some(&LatticeClassifier),
            Duration::from_secs(10),
        )
        .unwrap_err();

        assert!(matches!(err, PhonoflowError::InvalidArgument(_)));
        assert!(!ws.join(CONVERGENCE_REPORT_FILE).exists());
        assert!(ws.join("BO-disp-001").join("WAVECAR").exists());
    }
}
