//! # VASP OUTCAR 收敛标记扫描
//!
//! 扫描结果日志中两个独立的文本标记，记录各自**最后一次**出现的行号。
//! 前面被取代的中间步骤可能也包含同样的文本，只有最后一次出现有意义。
//!
//! 日志按字节逐行读取，非 UTF-8 内容按 lossy 处理，不会导致扫描失败。
//!
//! ## 依赖关系
//! - 被 `phonon/gate.rs` 使用
//! - 使用 `config.rs` 中的标记常量

use crate::config::{ACCURACY_MARKER, TERMINATION_MARKER};
use crate::error::{PhonoflowError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// 两个标记最后一次出现的行号（从 1 开始）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerScan {
    pub accuracy_line: Option<usize>,
    pub termination_line: Option<usize>,
}

impl MarkerScan {
    pub fn accuracy_reached(&self) -> bool {
        self.accuracy_line.is_some()
    }

    pub fn terminated(&self) -> bool {
        self.termination_line.is_some()
    }
}

/// 扫描 OUTCAR 文件
pub fn scan_outcar(path: &Path) -> Result<MarkerScan> {
    let file = File::open(path).map_err(|e| PhonoflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    scan_markers(BufReader::new(file)).map_err(|e| PhonoflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 从任意 reader 扫描标记
pub fn scan_markers<R: BufRead>(mut reader: R) -> std::io::Result<MarkerScan> {
    let mut scan = MarkerScan::default();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = String::from_utf8_lossy(&buf);
        if line.contains(ACCURACY_MARKER) {
            scan.accuracy_line = Some(line_no);
        }
        if line.contains(TERMINATION_MARKER) {
            scan.termination_line = Some(line_no);
        }
    }

    Ok(scan)
}
