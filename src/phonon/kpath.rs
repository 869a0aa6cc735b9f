//! # 高对称点与能带路径
//!
//! 路径的来源分两种：
//! - 晶系识别器（[`SpecialPointSource`]）可用时，使用其给出的高对称点与推荐路径，
//!   操作者可以用自己的路径覆盖；
//! - 不可用时（结构无法读取、晶系无法识别、或显式跳过），退回内置的六方路径
//!   `G M K G`，不报错。
//!
//! 识别器的失败原因只记录为警告，因此这一接缝使用 `anyhow`。
//!
//! ## 依赖关系
//! - 被 `phonon/band_conf.rs`, `commands/postprocess.rs` 使用
//! - 使用 `parsers/poscar.rs`, `models/structure.rs`

use crate::config;
use crate::error::{PhonoflowError, Result};
use crate::models::{Lattice, LatticeFamily};
use crate::parsers::poscar;
use crate::utils::output;

use anyhow::{anyhow, Context};
use std::collections::BTreeMap;
use std::path::Path;

/// Γ 点的内部记号
pub const GAMMA: &str = "G";

/// 高对称点集合与推荐路径
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialPoints {
    pub family: LatticeFamily,
    pub points: BTreeMap<String, [f64; 3]>,
    pub recommended: Vec<String>,
}

/// 已解析成坐标的路径
#[derive(Debug, Clone, PartialEq)]
pub struct BandPath {
    pub labels: Vec<String>,
    pub coordinates: Vec<[f64; 3]>,
}

/// 晶系识别接缝
pub trait SpecialPointSource {
    fn special_points(&self, structure: &Path) -> anyhow::Result<SpecialPoints>;
}

/// 内置识别器：按晶格参数判断晶系
pub struct LatticeClassifier;

impl SpecialPointSource for LatticeClassifier {
    fn special_points(&self, structure: &Path) -> anyhow::Result<SpecialPoints> {
        let cell = poscar::parse_poscar_header(structure)
            .with_context(|| format!("cannot read lattice from {}", structure.display()))?;
        points_for_lattice(&cell.lattice).ok_or_else(|| anyhow!("lattice family not recognised"))
    }
}

/// 按具体晶格给出高对称点
///
/// 六方晶胞取 gamma = 60° 时倒格矢夹角为 120°，布里渊区角点 K、H
/// 落在 (1/3, -1/3, kz)。
pub fn points_for_lattice(lattice: &Lattice) -> Option<SpecialPoints> {
    let family = lattice.family()?;
    let mut sp = points_for(family);

    let (_, _, _, _, _, gamma) = lattice.parameters();
    if family == LatticeFamily::Hexagonal && gamma < 90.0 {
        let third = 1.0 / 3.0;
        sp.points.insert("K".to_string(), [third, -third, 0.0]);
        sp.points.insert("H".to_string(), [third, -third, 0.5]);
    }
    Some(sp)
}

fn table(entries: &[(&str, [f64; 3])]) -> BTreeMap<String, [f64; 3]> {
    entries
        .iter()
        .map(|(label, coord)| (label.to_string(), *coord))
        .collect()
}

fn path(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

/// 各晶系的高对称点（分数坐标，倒格子基）。六方按 gamma = 120° 取点
pub fn points_for(family: LatticeFamily) -> SpecialPoints {
    let third = 1.0 / 3.0;
    let (points, recommended) = match family {
        LatticeFamily::Hexagonal => (
            table(&[
                (GAMMA, [0.0, 0.0, 0.0]),
                ("M", [0.5, 0.0, 0.0]),
                ("K", [third, third, 0.0]),
                ("A", [0.0, 0.0, 0.5]),
                ("L", [0.5, 0.0, 0.5]),
                ("H", [third, third, 0.5]),
            ]),
            path(&[GAMMA, "M", "K", GAMMA]),
        ),
        LatticeFamily::Cubic => (
            table(&[
                (GAMMA, [0.0, 0.0, 0.0]),
                ("X", [0.0, 0.5, 0.0]),
                ("M", [0.5, 0.5, 0.0]),
                ("R", [0.5, 0.5, 0.5]),
            ]),
            path(&[GAMMA, "X", "M", GAMMA, "R", "X"]),
        ),
        LatticeFamily::Tetragonal => (
            table(&[
                (GAMMA, [0.0, 0.0, 0.0]),
                ("X", [0.0, 0.5, 0.0]),
                ("M", [0.5, 0.5, 0.0]),
                ("Z", [0.0, 0.0, 0.5]),
                ("R", [0.0, 0.5, 0.5]),
                ("A", [0.5, 0.5, 0.5]),
            ]),
            path(&[GAMMA, "X", "M", GAMMA, "Z", "R", "A", "Z"]),
        ),
        LatticeFamily::Orthorhombic => (
            table(&[
                (GAMMA, [0.0, 0.0, 0.0]),
                ("X", [0.5, 0.0, 0.0]),
                ("Y", [0.0, 0.5, 0.0]),
                ("Z", [0.0, 0.0, 0.5]),
                ("S", [0.5, 0.5, 0.0]),
                ("U", [0.5, 0.0, 0.5]),
                ("T", [0.0, 0.5, 0.5]),
                ("R", [0.5, 0.5, 0.5]),
            ]),
            path(&[GAMMA, "X", "S", "Y", GAMMA, "Z"]),
        ),
    };

    SpecialPoints {
        family,
        points,
        recommended,
    }
}

/// 内置回退点表
pub fn builtin_points() -> BTreeMap<String, [f64; 3]> {
    table(&[
        (GAMMA, [0.0, 0.0, 0.0]),
        ("M", [0.5, 0.0, 0.0]),
        ("K", [1.0 / 3.0, -1.0 / 3.0, 0.0]),
    ])
}

/// 内置回退路径：适用于六方类晶格
pub fn builtin_path() -> BandPath {
    let points = builtin_points();
    let labels = path(&[GAMMA, "M", "K", GAMMA]);
    let coordinates = labels.iter().map(|l| points[l.as_str()]).collect();
    BandPath {
        labels,
        coordinates,
    }
}

/// 规范化操作者输入的点名：大写，`GAMMA`/`Γ` 归一为 `G`
pub fn canonical_label(token: &str) -> String {
    let upper = token.trim().to_uppercase();
    match upper.as_str() {
        "GAMMA" | "Γ" => GAMMA.to_string(),
        _ => upper,
    }
}

/// 用给定点表解析路径；点表中没有的点退回内置点表并警告
pub fn resolve_tokens(tokens: &[String], points: &BTreeMap<String, [f64; 3]>) -> Result<BandPath> {
    let labels: Vec<String> = tokens
        .iter()
        .map(|t| canonical_label(t))
        .filter(|t| !t.is_empty())
        .collect();

    config::validate_band_path(&labels)?;

    let fallback = builtin_points();
    let mut coordinates = Vec::with_capacity(labels.len());
    for label in &labels {
        if let Some(coord) = points.get(label) {
            coordinates.push(*coord);
        } else if let Some(coord) = fallback.get(label) {
            output::print_warning(&format!(
                "High-symmetry point {} not in detected set, using built-in coordinates",
                label
            ));
            coordinates.push(*coord);
        } else {
            return Err(PhonoflowError::InvalidArgument(format!(
                "unknown high-symmetry point '{}'",
                label
            )));
        }
    }

    Ok(BandPath {
        labels,
        coordinates,
    })
}

/// 决定本次后处理使用的路径
pub fn determine_band_path(
    source: Option<&dyn SpecialPointSource>,
    structure: &Path,
    override_path: Option<&[String]>,
) -> Result<BandPath> {
    let detected = match source {
        Some(source) => match source.special_points(structure) {
            Ok(points) => Some(points),
            Err(e) => {
                output::print_warning(&format!(
                    "Lattice classification unavailable ({:#}), using built-in path",
                    e
                ));
                None
            }
        },
        None => {
            output::print_info("Lattice classification skipped, using built-in path");
            None
        }
    };

    match (detected, override_path) {
        (Some(sp), override_path) => {
            output::print_info(&format!("Detected {} lattice, special points:", sp.family));
            for (label, c) in &sp.points {
                output::print_info(&format!(
                    "  {}: ({:.6}, {:.6}, {:.6})",
                    label, c[0], c[1], c[2]
                ));
            }
            output::print_info(&format!("Recommended path: {}", sp.recommended.join(" ")));

            match override_path {
                Some(tokens) => {
                    output::print_info(&format!("Operator path: {}", tokens.join(" ")));
                    resolve_tokens(tokens, &sp.points)
                }
                None => resolve_tokens(&sp.recommended, &sp.points),
            }
        }
        (None, Some(tokens)) => {
            output::print_info(&format!("Operator path: {}", tokens.join(" ")));
            resolve_tokens(tokens, &builtin_points())
        }
        (None, None) => Ok(builtin_path()),
    }
}
