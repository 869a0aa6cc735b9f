//! # pre 命令实现
//!
//! 预处理控制器：从用户结构出发生成全部位移作业，最后写入运行记录。
//!
//! ## 流程
//! 1. 删除旧的运行记录，复制输入结构为工作副本 `POSCAR`
//! 2. `phonopy --symmetry` 对称化（或原样复制）得到 `POSCAR-unitcell`
//! 3. `phonopy -d` 生成 `POSCAR-NNN` 位移结构
//! 4. 每个位移结构分发到 `{prefix}-NNN` 目录，附带 INCAR/KPOINTS/POTCAR
//! 5. 可选生成 sbatch 脚本并提交
//! 6. 写入运行记录
//!
//! 运行记录只在全部作业目录就绪后写入；中途失败不会留下可用的记录，
//! 分发阶段失败时本次创建的目录全部删除。
//!
//! ## 依赖关系
//! - 使用 `cli/preprocess.rs` 定义的参数
//! - 使用 `utils/command.rs`, `utils/collector.rs`, `utils/slurm.rs`, `parsers/poscar.rs`

use crate::cli::preprocess::PreArgs;
use crate::cli::GlobalArgs;
use crate::config::{
    WorkflowConfig, Workspace, AUX_INPUT_FILES, DISPLACEMENT_PREFIX, JOB_STRUCTURE_FILE,
    SBATCH_FILE, SYMMETRIZED_FILE, UNIT_STRUCTURE_FILE, WORK_STRUCTURE_FILE,
};
use crate::error::{PhonoflowError, Result};
use crate::models::{JobDir, RunRecord};
use crate::parsers::poscar;
use crate::utils::collector::FileCollector;
use crate::utils::command::{FailurePolicy, Invocation, Outcome, Toolchain};
use crate::utils::slurm::{generate_sbatch_script, parse_modules, SlurmConfig};
use crate::utils::{output, progress};

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// 作业脚本的生成方式
#[derive(Debug, Clone)]
pub struct BatchScript {
    pub slurm: SlurmConfig,
    pub exec_cmd: String,
}

/// 与位移本身无关的预处理选项
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// 输入结构，相对路径以工作目录为基准
    pub structure: PathBuf,
    /// INCAR/KPOINTS/POTCAR 所在目录
    pub aux_dir: PathBuf,
    pub batch_script: Option<BatchScript>,
    pub submit: bool,
}

/// 执行 pre 命令
pub fn execute(args: PreArgs, global: &GlobalArgs) -> Result<()> {
    output::print_header("Phonon Preprocessing");

    let ws = super::workspace(global)?;
    let tools = super::toolchain(global)?;

    let supercell_factors = <[u32; 3]>::try_from(args.dim.as_slice()).map_err(|_| {
        PhonoflowError::InvalidArgument(format!(
            "--dim expects exactly three factors, got {}",
            args.dim.len()
        ))
    })?;

    let config = WorkflowConfig {
        symmetrize: !args.no_symmetrize,
        supercell_factors,
        job_prefix: args.prefix.clone(),
        band_path_override: None,
    };

    let batch_script = if args.slurm || args.submit {
        Some(BatchScript {
            slurm: SlurmConfig {
                job_name: args.prefix.clone(),
                partition: args.partition.clone(),
                nodes: args.nodes,
                ntasks: args.ntasks,
                cpus_per_task: args.cpus_per_task,
                mem_per_cpu: args.mem_per_cpu.clone(),
                time_limit: args.time.clone(),
                modules: parse_modules(&args.modules),
            },
            exec_cmd: format!("mpirun -np {} {}", args.vasp_np, args.vasp_exec),
        })
    } else {
        None
    };

    let opts = PreprocessOptions {
        structure: args.structure,
        aux_dir: args
            .aux_dir
            .map(|d| ws.join(d))
            .unwrap_or_else(|| ws.root().to_path_buf()),
        batch_script,
        submit: args.submit,
    };

    let record = run(&ws, &tools, &config, &opts)?;

    print_summary(&record);
    output::print_separator();
    output::print_done(&format!(
        "Prepared {} displacement job(s). Run 'phonoflow post' once they have finished.",
        record.job_count
    ));
    Ok(())
}

/// 预处理主体，返回已写入的运行记录
pub fn run(
    ws: &Workspace,
    tools: &Toolchain,
    config: &WorkflowConfig,
    opts: &PreprocessOptions,
) -> Result<RunRecord> {
    config.validate()?;

    let structure = ws.join(&opts.structure);
    if !structure.is_file() {
        return Err(PhonoflowError::FileNotFound {
            path: structure.display().to_string(),
        });
    }
    for name in AUX_INPUT_FILES {
        let aux = opts.aux_dir.join(name);
        if !aux.is_file() {
            return Err(PhonoflowError::FileNotFound {
                path: aux.display().to_string(),
            });
        }
    }

    if RunRecord::discard(&ws.run_record_path())? {
        output::print_info("Removed stale run record from a previous run");
    }

    prepare_working_copy(ws, &structure)?;
    let unit = prepare_unit_structure(ws, tools, config.symmetrize)?;

    let cell = poscar::parse_poscar_header(&unit)?;
    output::print_info(&format!("Species (in order): {}", cell.species.join(" ")));

    let displacements = generate_displacements(ws, tools, &config.supercell_factors)?;
    output::print_info(&format!(
        "Found {} displacement structure(s)",
        displacements.len()
    ));

    let jobs = fan_out(
        ws,
        &config.job_prefix,
        &displacements,
        &opts.aux_dir,
        opts.batch_script.as_ref(),
    )?;

    if opts.submit {
        submit_jobs(tools, &jobs)?;
    }

    let record = RunRecord::new(
        PathBuf::from(UNIT_STRUCTURE_FILE),
        config.supercell_factors,
        config.job_prefix.clone(),
        jobs.len(),
        cell.species,
    )?;
    record.save(&ws.run_record_path())?;
    output::print_success(&format!(
        "Run record written to {}",
        ws.run_record_path().display()
    ));

    Ok(record)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| PhonoflowError::FileWriteError {
            path: to.display().to_string(),
            source: e,
        })
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PhonoflowError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// 输入结构复制为工作目录下的 `POSCAR`
fn prepare_working_copy(ws: &Workspace, structure: &Path) -> Result<()> {
    let work = ws.join(WORK_STRUCTURE_FILE);
    if same_file(structure, &work) {
        output::print_skip(&format!("{} is already the working copy", work.display()));
        return Ok(());
    }
    copy_file(structure, &work)?;
    output::print_info(&format!(
        "Copied {} to {}",
        structure.display(),
        work.display()
    ));
    Ok(())
}

/// 得到位移基准结构 `POSCAR-unitcell`
fn prepare_unit_structure(ws: &Workspace, tools: &Toolchain, symmetrize: bool) -> Result<PathBuf> {
    let unit = ws.unit_structure_path();

    if symmetrize {
        let symmetrized = ws.join(SYMMETRIZED_FILE);
        remove_file_if_exists(&symmetrized)?;

        let invocation = Invocation::new(&tools.phonopy, FailurePolicy::Fatal)
            .args(["--symmetry", WORK_STRUCTURE_FILE])
            .current_dir(ws.root());
        let command = invocation.command_line();
        invocation.run()?;

        if !symmetrized.is_file() {
            return Err(PhonoflowError::ToolOutputMissing {
                command,
                path: symmetrized.display().to_string(),
            });
        }
        copy_file(&symmetrized, &unit)?;
        output::print_success(&format!(
            "Symmetrized structure saved as {}",
            UNIT_STRUCTURE_FILE
        ));
    } else {
        copy_file(&ws.join(WORK_STRUCTURE_FILE), &unit)?;
        output::print_skip(&format!(
            "Symmetrization, {} used as-is",
            WORK_STRUCTURE_FILE
        ));
    }

    Ok(unit)
}

/// 工作目录下的位移结构，按序号升序
pub fn discover_displacements(root: &Path) -> Result<Vec<PathBuf>> {
    let re = Regex::new(&format!(r"^{}(\d+)$", regex::escape(DISPLACEMENT_PREFIX)))
        .map_err(|e| PhonoflowError::Other(e.to_string()))?;

    let candidates = FileCollector::new(root)
        .with_pattern(&format!("{}*", DISPLACEMENT_PREFIX))?
        .collect()?;

    let mut numbered: Vec<(u64, PathBuf)> = candidates
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let index = re.captures(name)?.get(1)?.as_str().parse().ok()?;
            Some((index, path))
        })
        .collect();
    numbered.sort_by_key(|(index, _)| *index);

    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

/// 清掉旧的位移结构后调用 `phonopy -d`
fn generate_displacements(
    ws: &Workspace,
    tools: &Toolchain,
    factors: &[u32; 3],
) -> Result<Vec<PathBuf>> {
    let stale = discover_displacements(ws.root())?;
    for path in &stale {
        remove_file_if_exists(path)?;
    }
    if !stale.is_empty() {
        output::print_info(&format!(
            "Removed {} stale displacement file(s)",
            stale.len()
        ));
    }

    let invocation = Invocation::new(&tools.phonopy, FailurePolicy::Fatal)
        .args(["-d", "--dim"])
        .args(factors.iter().map(u32::to_string))
        .args(["--pa", "auto", "-c", UNIT_STRUCTURE_FILE])
        .current_dir(ws.root());

    let spinner = progress::create_spinner("Generating displaced supercells");
    let result = invocation.run();
    spinner.finish_and_clear();
    result?;

    let displacements = discover_displacements(ws.root())?;
    if displacements.is_empty() {
        return Err(PhonoflowError::NoDisplacements {
            pattern: format!("{}<digits>", DISPLACEMENT_PREFIX),
        });
    }
    Ok(displacements)
}

/// 分发到作业目录；任何一步失败都删除本次创建的全部目录
fn fan_out(
    ws: &Workspace,
    prefix: &str,
    displacements: &[PathBuf],
    aux_dir: &Path,
    batch_script: Option<&BatchScript>,
) -> Result<Vec<JobDir>> {
    let pb = progress::create_progress_bar(displacements.len() as u64, "Creating job folders");
    let mut jobs = Vec::with_capacity(displacements.len());

    for (i, source) in displacements.iter().enumerate() {
        let job = JobDir::new(ws.root(), prefix, i + 1);
        let created = job.path.clone();
        jobs.push(job);

        if let Err(e) = populate_job(&jobs[i], source, aux_dir, batch_script) {
            pb.abandon();
            output::print_warning(&format!("Failed to prepare {}, rolling back", created.display()));
            rollback(&jobs);
            return Err(e);
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    output::print_success(&format!(
        "Created {} job folder(s): {} .. {}",
        jobs.len(),
        jobs.first().map(|j| j.name.as_str()).unwrap_or(""),
        jobs.last().map(|j| j.name.as_str()).unwrap_or("")
    ));
    Ok(jobs)
}

fn populate_job(
    job: &JobDir,
    displacement: &Path,
    aux_dir: &Path,
    batch_script: Option<&BatchScript>,
) -> Result<()> {
    if job.path.exists() {
        log::warn!("Replacing existing job folder {}", job.path.display());
        fs::remove_dir_all(&job.path).map_err(|e| PhonoflowError::FileWriteError {
            path: job.path.display().to_string(),
            source: e,
        })?;
    }
    fs::create_dir_all(&job.path).map_err(|e| PhonoflowError::FileWriteError {
        path: job.path.display().to_string(),
        source: e,
    })?;

    let target = job.path.join(JOB_STRUCTURE_FILE);
    fs::rename(displacement, &target).map_err(|e| PhonoflowError::FileWriteError {
        path: target.display().to_string(),
        source: e,
    })?;

    for name in AUX_INPUT_FILES {
        copy_file(&aux_dir.join(name), &job.path.join(name))?;
    }

    if let Some(script) = batch_script {
        let content = generate_sbatch_script(
            &script.slurm.for_job(&job.name),
            &job.path,
            &script.exec_cmd,
        );
        let sbatch_path = job.path.join(SBATCH_FILE);
        fs::write(&sbatch_path, content).map_err(|e| PhonoflowError::FileWriteError {
            path: sbatch_path.display().to_string(),
            source: e,
        })?;
    }

    log::info!(
        "{} <- {}",
        job.name,
        displacement
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    );
    Ok(())
}

fn rollback(jobs: &[JobDir]) {
    for job in jobs.iter().rev() {
        if let Err(e) = fs::remove_dir_all(&job.path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Could not remove {}: {}", job.path.display(), e);
            }
        }
    }
}

/// 逐个提交作业；提交失败只警告
fn submit_jobs(tools: &Toolchain, jobs: &[JobDir]) -> Result<()> {
    let mut submitted = 0;
    for job in jobs {
        let outcome = Invocation::new(&tools.sbatch, FailurePolicy::Degraded)
            .arg(SBATCH_FILE)
            .current_dir(&job.path)
            .run()?;
        match outcome {
            Outcome::Completed(captured) => {
                submitted += 1;
                output::print_success(&format!(
                    "Submitted: {} - {}",
                    job.name,
                    captured.stdout.trim()
                ));
            }
            Outcome::Degraded(failure) => {
                output::print_warning(&format!("Submission of {} {}", job.name, failure));
            }
        }
    }
    output::print_info(&format!("Submitted {}/{} job(s)", submitted, jobs.len()));
    Ok(())
}

fn print_summary(record: &RunRecord) {
    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "Field")]
        field: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    let dim = record
        .supercell_factors
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ");

    let rows = vec![
        SummaryRow {
            field: "Unit cell",
            value: record.unit_structure_path.display().to_string(),
        },
        SummaryRow {
            field: "Supercell",
            value: dim,
        },
        SummaryRow {
            field: "Job prefix",
            value: record.job_prefix.clone(),
        },
        SummaryRow {
            field: "Jobs",
            value: record.job_count.to_string(),
        },
        SummaryRow {
            field: "Species",
            value: record.atom_symbols.join(" "),
        },
    ];

    println!("{}", Table::new(&rows));
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::utils::command::ToolCommand;
    use tempfile::TempDir;

    const BO_POSCAR: &str = "\
B2O3
1.0
  4.336  0.000  0.000
 -2.168  3.755  0.000
  0.000  0.000  8.340
B O
6 9
Direct
0.0 0.0 0.0
";

    /// 模拟 phonopy：--symmetry 写 PPOSCAR，-d 写三个位移结构
    const FAKE_PHONOPY: &str = r#"
case "$1" in
  --symmetry) cp "$2" PPOSCAR ;;
  -d)
    echo "$@" > displacement_args.txt
    cp POSCAR-unitcell SPOSCAR
    for i in 001 002 003; do cp POSCAR-unitcell POSCAR-$i; done
    ;;
esac
"#;

    struct Fixture {
        tmp: TempDir,
        ws: Workspace,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(tmp.path());
        fs::write(ws.join("POSCAR"), BO_POSCAR).unwrap();
        for name in AUX_INPUT_FILES {
            fs::write(ws.join(name), format!("{} contents\n", name)).unwrap();
        }
        Fixture { tmp, ws }
    }

    fn tools(dir: &Path, phonopy_body: &str) -> Toolchain {
        let script = dir.join("fake_phonopy.sh");
        fs::write(&script, phonopy_body).unwrap();
        Toolchain {
            phonopy: ToolCommand::parse(&format!("sh {}", script.display())).unwrap(),
            bandplot: ToolCommand::parse("phonopy-bandplot").unwrap(),
            sbatch: ToolCommand::parse("sbatch").unwrap(),
        }
    }

    fn config(symmetrize: bool) -> WorkflowConfig {
        WorkflowConfig {
            symmetrize,
            supercell_factors: [2, 2, 1],
            job_prefix: "BO-disp".to_string(),
            band_path_override: None,
        }
    }

    fn options(ws: &Workspace) -> PreprocessOptions {
        PreprocessOptions {
            structure: PathBuf::from("POSCAR"),
            aux_dir: ws.root().to_path_buf(),
            batch_script: None,
            submit: false,
        }
    }

    #[test]
    fn test_preprocess_creates_jobs_and_record() {
        let fx = fixture();
        let tools = tools(fx.tmp.path(), FAKE_PHONOPY);

        let record = run(&fx.ws, &tools, &config(true), &options(&fx.ws)).unwrap();

        assert_eq!(record.job_count, 3);
        assert_eq!(record.atom_symbols, vec!["B", "O"]);
        assert_eq!(record.supercell_factors, [2, 2, 1]);
        assert!(fx.ws.join("PPOSCAR").is_file());
        assert!(fx.ws.unit_structure_path().is_file());

        for job in record.job_dirs(fx.ws.root()) {
            assert!(job.path.join("POSCAR").is_file());
            for name in AUX_INPUT_FILES {
                assert!(job.path.join(name).is_file());
            }
            assert!(!job.path.join(SBATCH_FILE).exists());
        }
        assert!(!fx.ws.join("BO-disp-004").exists());
        assert!(!fx.ws.join("POSCAR-001").exists());

        let args = fs::read_to_string(fx.ws.join("displacement_args.txt")).unwrap();
        assert_eq!(args.trim(), "-d --dim 2 2 1 --pa auto -c POSCAR-unitcell");

        let loaded = RunRecord::load(&fx.ws.run_record_path()).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_without_symmetrization_copies_verbatim() {
        let fx = fixture();
        let tools = tools(fx.tmp.path(), FAKE_PHONOPY);

        run(&fx.ws, &tools, &config(false), &options(&fx.ws)).unwrap();

        assert!(!fx.ws.join("PPOSCAR").exists());
        assert_eq!(
            fs::read_to_string(fx.ws.unit_structure_path()).unwrap(),
            BO_POSCAR
        );
    }

    #[test]
    fn test_zero_displacements_is_fatal_and_leaves_no_record() {
        let fx = fixture();
        let tools = tools(
            fx.tmp.path(),
            "case \"$1\" in --symmetry) cp \"$2\" PPOSCAR ;; esac\n",
        );
        // 上一次运行留下的记录
        fs::write(fx.ws.run_record_path(), "{}").unwrap();

        let err = run(&fx.ws, &tools, &config(true), &options(&fx.ws)).unwrap_err();
        assert!(matches!(err, PhonoflowError::NoDisplacements { .. }));
        assert!(!fx.ws.run_record_path().exists());
    }

    #[test]
    fn test_symmetry_failure_is_fatal() {
        let fx = fixture();
        let tools = tools(fx.tmp.path(), "echo 'symmetry search failed' >&2\nexit 1\n");

        let err = run(&fx.ws, &tools, &config(true), &options(&fx.ws)).unwrap_err();
        assert!(matches!(err, PhonoflowError::CommandFailed { .. }));
        assert!(!fx.ws.join("BO-disp-001").exists());
        assert!(!fx.ws.run_record_path().exists());
    }

    #[test]
    fn test_missing_aux_input_checked_first() {
        let fx = fixture();
        fs::remove_file(fx.ws.join("POTCAR")).unwrap();
        let tools = tools(fx.tmp.path(), FAKE_PHONOPY);

        let err = run(&fx.ws, &tools, &config(true), &options(&fx.ws)).unwrap_err();
        assert!(matches!(err, PhonoflowError::FileNotFound { ref path } if path.ends_with("POTCAR")));
        assert!(!fx.ws.unit_structure_path().exists());
    }

    #[test]
    fn test_stale_displacements_not_counted() {
        let fx = fixture();
        fs::write(fx.ws.join("POSCAR-007"), "stale").unwrap();
        let tools = tools(fx.tmp.path(), FAKE_PHONOPY);

        let record = run(&fx.ws, &tools, &config(true), &options(&fx.ws)).unwrap();
        assert_eq!(record.job_count, 3);
    }

    #[test]
    fn test_batch_scripts_written() {
        let fx = fixture();
        let tools = tools(fx.tmp.path(), FAKE_PHONOPY);
        let mut opts = options(&fx.ws);
        opts.batch_script = Some(BatchScript {
            slurm: SlurmConfig::default(),
            exec_cmd: "mpirun -np 32 vasp_std".to_string(),
        });

        run(&fx.ws, &tools, &config(true), &opts).unwrap();

        let script = fs::read_to_string(fx.ws.join("BO-disp-002").join(SBATCH_FILE)).unwrap();
        assert!(script.contains("#SBATCH -J BO-disp-002\n"));
    }

    #[test]
    fn test_discover_sorts_numerically() {
        let tmp = TempDir::new().unwrap();
        for name in ["POSCAR-10", "POSCAR-2", "POSCAR-001", "POSCAR-unitcell", "SPOSCAR"] {
            fs::write(tmp.path().join(name), "x").unwrap();
        }
        let found: Vec<_> = discover_displacements(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(found, vec!["POSCAR-001", "POSCAR-2", "POSCAR-10"]);
    }

    #[test]
    fn test_fan_out_rolls_back_on_failure() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(tmp.path());
        for name in AUX_INPUT_FILES {
            fs::write(ws.join(name), "x").unwrap();
        }
        fs::write(ws.join("POSCAR-001"), "x").unwrap();
        // 第二个位移结构不存在
        let displacements = vec![ws.join("POSCAR-001"), ws.join("POSCAR-002")];

        let result = fan_out(&ws, "disp", &displacements, ws.root(), None);
        assert!(result.is_err());
        assert!(!ws.join("disp-001").exists());
        assert!(!ws.join("disp-002").exists());
    }
}
