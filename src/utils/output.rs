//! # 美化输出工具
//!
//! 提供统一的终端输出样式。每条面向用户的消息同时写入运行日志，
//! 因此日志文件能完整还原一次运行中的所有决定。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 与 `phonon/` 模块使用
//! - 使用 `colored` crate, `log` 门面

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    log::info!("{}", msg);
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    log::error!("{}", msg);
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    log::warn!("{}", msg);
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    log::info!("{}", msg);
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印跳过消息
pub fn print_skip(msg: &str) {
    log::info!("skipped: {}", msg);
    println!("{} {}", "[SKIP]".dimmed(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    log::info!("{}", msg);
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    log::info!("=== {} ===", title);
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// 打印需要操作者手动处理的提示框，逐行原样输出
pub fn print_notice(lines: &[String]) {
    let bar = "=".repeat(60);
    println!("\n{}", bar.yellow());
    for line in lines {
        log::info!("{}", line);
        println!("{}", line);
    }
    println!("{}", bar.yellow());
}
