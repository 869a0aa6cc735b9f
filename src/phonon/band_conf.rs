//! # band.conf 生成
//!
//! 由运行记录与已解析的能带路径确定性地生成 phonopy 配置文件。
//! 相同输入得到逐字节相同的输出；每次后处理都整体覆盖旧文件。
//!
//! ## 依赖关系
//! - 被 `commands/postprocess.rs` 使用
//! - 使用 `phonon/kpath.rs`, `models/run_record.rs`

use crate::config::BAND_POINTS;
use crate::error::{PhonoflowError, Result};
use crate::models::RunRecord;
use crate::phonon::kpath::{BandPath, GAMMA};

use std::fs;
use std::path::Path;

/// `G` 在图上显示为 Γ
fn display_label(label: &str) -> &str {
    if label == GAMMA {
        "$\\Gamma$"
    } else {
        label
    }
}

pub fn render_band_conf(record: &RunRecord, path: &BandPath) -> String {
    let dim = record
        .supercell_factors
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ");

    let band = path
        .coordinates
        .iter()
        .flat_map(|c| c.iter().map(|v| format!("{:.6}", v)))
        .collect::<Vec<_>>()
        .join(" ");

    let labels = path
        .labels
        .iter()
        .map(|l| display_label(l))
        .collect::<Vec<_>>()
        .join(" ");

    let lines = [
        format!("ATOM_NAME = {}", record.atom_name()),
        format!("DIM = {}", dim),
        format!("BAND = {}", band),
        format!("BAND_POINTS = {}", BAND_POINTS),
        format!("BAND_LABELS = {}", labels),
        "BAND_CONNECTION = .TRUE.".to_string(),
        "FORCE_CONSTANTS = WRITE".to_string(),
        "FC_SYMMETRY = .TRUE.".to_string(),
        "FC_FORMAT = HDF5".to_string(),
    ];

    lines.join("\n") + "\n"
}

/// 写出 band.conf，覆盖已有文件
pub fn write_band_conf(target: &Path, record: &RunRecord, path: &BandPath) -> Result<()> {
    let content = render_band_conf(record, path);
    fs::write(target, &content).map_err(|e| PhonoflowError::FileWriteError {
        path: target.display().to_string(),
        source: e,
    })?;

    log::info!("band path:");
    for (label, c) in path.labels.iter().zip(&path.coordinates) {
        log::info!("  {} -> ({:.6} {:.6} {:.6})", label, c[0], c[1], c[2]);
    }
    Ok(())
}
