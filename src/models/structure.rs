//! # 晶胞数据模型
//!
//! 工作流只关心位移基准结构的两部分信息：晶格（用于判断晶系、给出高对称点）
//! 与元素行（ATOM_NAME 字段，顺序必须与下游工具一致）。
//!
//! ## 依赖关系
//! - 被 `parsers/poscar.rs`, `phonon/kpath.rs` 使用
//! - 无外部模块依赖

use std::fmt;

/// 判断晶格参数相等时的容差（Å 与 度）
const LENGTH_TOLERANCE: f64 = 1e-3;
const ANGLE_TOLERANCE: f64 = 1e-2;

/// 晶格参数表示
#[derive(Debug, Clone)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    #[cfg(test)]
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [c1, c2, c3],
            ],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;

        let norm = |v: [f64; 3]| (v[0].powi(2) + v[1].powi(2) + v[2].powi(2)).sqrt();
        let dot = |u: [f64; 3], v: [f64; 3]| u[0] * v[0] + u[1] * v[1] + u[2] * v[2];

        let a = norm(a_vec);
        let b = norm(b_vec);
        let c = norm(c_vec);

        let alpha = (dot(b_vec, c_vec) / (b * c)).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 按晶格参数粗分晶系
    ///
    /// 只识别能直接给出高对称点的简单晶系，其余返回 `None`。
    /// 六方晶系的 gamma 可以是 120° 或 60°。
    pub fn family(&self) -> Option<LatticeFamily> {
        let (a, b, c, alpha, beta, gamma) = self.parameters();
        if !(a > 0.0 && b > 0.0 && c > 0.0) {
            return None;
        }

        let same_len = |x: f64, y: f64| (x - y).abs() < LENGTH_TOLERANCE * x.max(y).max(1.0);
        let angle_is = |x: f64, target: f64| (x - target).abs() < ANGLE_TOLERANCE;

        let right_alpha_beta = angle_is(alpha, 90.0) && angle_is(beta, 90.0);
        if !right_alpha_beta {
            return None;
        }

        if same_len(a, b) && (angle_is(gamma, 120.0) || angle_is(gamma, 60.0)) {
            return Some(LatticeFamily::Hexagonal);
        }
        if !angle_is(gamma, 90.0) {
            return None;
        }

        match (same_len(a, b), same_len(b, c), same_len(a, c)) {
            (true, true, _) => Some(LatticeFamily::Cubic),
            (true, false, _) => Some(LatticeFamily::Tetragonal),
            (false, false, false) => Some(LatticeFamily::Orthorhombic),
            // a == c 或 b == c 的四方晶胞没有按惯用取向给出，不做猜测
            _ => None,
        }
    }
}

/// 可识别的晶系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeFamily {
    Cubic,
    Tetragonal,
    Orthorhombic,
    Hexagonal,
}

impl fmt::Display for LatticeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatticeFamily::Cubic => write!(f, "cubic"),
            LatticeFamily::Tetragonal => write!(f, "tetragonal"),
            LatticeFamily::Orthorhombic => write!(f, "orthorhombic"),
            LatticeFamily::Hexagonal => write!(f, "hexagonal"),
        }
    }
}

/// POSCAR 头部信息
#[derive(Debug, Clone)]
pub struct UnitCell {
    pub lattice: Lattice,
    /// 第 6 行的元素符号，原样保留顺序与重复
    pub species: Vec<String>,
}
