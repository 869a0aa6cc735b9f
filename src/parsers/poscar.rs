//! # VASP POSCAR 头部解析器
//!
//! 只读取工作流需要的部分：缩放因子、晶格向量与元素行。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! ...
//! ```
//!
//! 元素行是 phonopy `ATOM_NAME` 的来源，必须原样保留顺序与重复项。
//! VASP 4 格式没有元素行，直接报错。
//!
//! ## 依赖关系
//! - 被 `commands/preprocess.rs`, `phonon/kpath.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{PhonoflowError, Result};
use crate::models::{Lattice, UnitCell};
use std::fs;
use std::path::Path;

/// 解析 POSCAR 文件头
pub fn parse_poscar_header(path: &Path) -> Result<UnitCell> {
    let content = fs::read_to_string(path).map_err(|e| PhonoflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_header_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 POSCAR 头
pub fn parse_poscar_header_content(content: &str, source_name: &str) -> Result<UnitCell> {
    let lines: Vec<&str> = content.lines().collect();
    let parse_error = |reason: String| PhonoflowError::ParseError {
        format: "poscar".to_string(),
        path: source_name.to_string(),
        reason,
    };

    if lines.len() < 7 {
        return Err(parse_error("File too short".to_string()));
    }

    // Line 1: Scaling factor（负值表示体积，这里只需要晶格形状，取绝对值不影响晶系判断）
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_error("Invalid scaling factor at line 2".to_string()))?;
    let scale = if scale < 0.0 { 1.0 } else { scale };

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .take(3)
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(format!(
                "Invalid lattice vector at line {}",
                3 + i
            )));
        }
        *row = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }

    // Line 5: Element symbols
    let species: Vec<String> = lines[5].split_whitespace().map(str::to_string).collect();
    if species.is_empty() {
        return Err(parse_error("Empty element line at line 6".to_string()));
    }
    if species.iter().any(|s| s.parse::<i64>().is_ok()) {
        return Err(parse_error(
            "Line 6 holds atom counts, not element symbols (VASP 4 format is not supported)"
                .to_string(),
        ));
    }

    Ok(UnitCell {
        lattice: Lattice::from_vectors(matrix),
        species,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatticeFamily;

    const HEX_BO: &str = r#"B2O3 monolayer
1.0
4.5 0.0 0.0
-2.25 3.897114317 0.0
0.0 0.0 20.0
B O
2 3
Direct
0.333333 0.666667 0.5
0.666667 0.333333 0.5
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.5 0.5
"#;

    #[test]
    fn test_parse_species_and_lattice() {
        let cell = parse_poscar_header_content(HEX_BO, "HEX_BO").unwrap();
        assert_eq!(cell.species, vec!["B", "O"]);
        assert_eq!(cell.lattice.family(), Some(LatticeFamily::Hexagonal));
    }

    #[test]
    fn test_species_order_and_repeats_preserved() {
        let content = HEX_BO.replace("B O\n2 3", "O B O\n1 2 2");
        let cell = parse_poscar_header_content(&content, "repeat").unwrap();
        assert_eq!(cell.species, vec!["O", "B", "O"]);
    }

    #[test]
    fn test_scale_applied() {
        let content = r#"Si
2.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Si
2
Direct
0.0 0.0 0.0
0.5 0.5 0.5
"#;
        let cell = parse_poscar_header_content(content, "Si").unwrap();
        let (a, _, _, _, _, _) = cell.lattice.parameters();
        assert!((a - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_vasp4_rejected() {
        let content = HEX_BO.replace("B O\n2 3", "2 3\nDirect");
        let err = parse_poscar_header_content(&content, "vasp4").unwrap_err();
        assert!(matches!(err, PhonoflowError::ParseError { .. }));
    }

    #[test]
    fn test_too_short() {
        assert!(parse_poscar_header_content("name\n1.0\n", "short").is_err());
    }
}
