//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-runtime`: 运行 stage-runtime 覆盖率
//! - `cov-workspace`: 运行 workspace 覆盖率
//! - `data-check`: 检查数据库文件（备注指令、阶段注册、重复登记）

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use stage_runtime::{DiagnosticLevel, DiagnosticResult, load_json};
use walkdir::WalkDir;

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn ensure_cargo_llvm_cov_available() -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["llvm-cov", "--version"]);
    let status = cmd.status();
    match status {
        Ok(s) if s.success() => Ok(()),
        _ => anyhow::bail!(
            "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
        ),
    }
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let sub = args.next().unwrap_or_else(|| "help".to_string());

    match sub.as_str() {
        "check-all" => {
            let mut fmt = Command::new("cargo");
            fmt.args(["fmt", "--all", "--", "--check"]);
            run("cargo fmt --all -- --check", &mut fmt)?;

            let mut clippy = Command::new("cargo");
            clippy.args(["clippy", "--workspace", "--all-targets"]);
            run("cargo clippy --workspace --all-targets", &mut clippy)?;

            let mut test = Command::new("cargo");
            test.args(["test", "--workspace"]);
            run("cargo test --workspace", &mut test)?;
        }
        "cov-runtime" => {
            ensure_cargo_llvm_cov_available()?;

            let mut cov = Command::new("cargo");
            cov.args(["llvm-cov", "-p", "stage-runtime", "--all-features", "--html"]);
            run(
                "cargo llvm-cov -p stage-runtime --all-features --html",
                &mut cov,
            )?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "cov-workspace" => {
            ensure_cargo_llvm_cov_available()?;

            // 排除 xtask，以免稀释信号
            let mut cov = Command::new("cargo");
            cov.args([
                "llvm-cov",
                "--workspace",
                "--exclude",
                "xtask",
                "--all-features",
                "--html",
            ]);
            run(
                "cargo llvm-cov --workspace --exclude xtask --all-features --html",
                &mut cov,
            )?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "data-check" => {
            let path = args.next();
            data_check(path.as_deref())?;
        }
        "help" | "-h" | "--help" => {
            print_help();
        }
        other => anyhow::bail!("unknown xtask subcommand: {other}"),
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        r#"xtask - 开发辅助工具

USAGE:
  cargo xtask <command>

COMMANDS:
  check-all       运行 fmt、clippy、test 门禁检查
  cov-runtime     运行 stage-runtime 覆盖率报告
  cov-workspace   运行 workspace 覆盖率报告
  data-check      检查数据库文件

DATA-CHECK:
  cargo xtask data-check [path]

  不带参数：检查 data/ 下所有数据库 JSON
  带路径参数：检查指定文件或目录

  检查内容：
    - JSON 格式与重复 ID
    - 无效或位置不对的备注指令
    - 阶段槽位覆盖、重复登记、空轨道

ALIASES (in .cargo/config.toml):
  cargo check-all     -> cargo xtask check-all
  cargo cov-runtime   -> cargo xtask cov-runtime
  cargo cov-workspace -> cargo xtask cov-workspace
  cargo data-check    -> cargo xtask data-check
"#
    );
}

//=============================================================================
// data-check 命令实现
//=============================================================================

/// 默认数据目录（相对于 workspace root）
const DEFAULT_DATA_DIR: &str = "data";

/// 数据检查结果
#[derive(Default)]
struct DataCheckResult {
    /// 检查的数据库数量
    files_checked: usize,
    /// 跳过的非数据库 JSON
    files_skipped: usize,
    /// 载入失败数量
    load_errors: usize,
    /// 诊断结果（来源前缀为文件路径）
    diagnostics: Vec<(String, DiagnosticResult)>,
}

impl DataCheckResult {
    fn error_count(&self) -> usize {
        self.load_errors
            + self
                .diagnostics
                .iter()
                .map(|(_, d)| d.error_count())
                .sum::<usize>()
    }

    fn warn_count(&self) -> usize {
        self.diagnostics.iter().map(|(_, d)| d.warn_count()).sum()
    }
}

/// 执行数据检查
fn data_check(path: Option<&str>) -> anyhow::Result<()> {
    let files = match path {
        Some(p) => {
            let path = PathBuf::from(p);
            if path.is_file() {
                vec![path]
            } else if path.is_dir() {
                collect_json_files(&path)
            } else {
                anyhow::bail!("路径不存在: {}", p);
            }
        }
        None => {
            let dir = Path::new(DEFAULT_DATA_DIR);
            if !dir.exists() {
                anyhow::bail!(
                    "默认数据目录不存在: {}\n请在 workspace 根目录运行，或指定数据路径",
                    dir.display()
                );
            }
            collect_json_files(dir)
        }
    };

    if files.is_empty() {
        eprintln!("未找到数据文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个 JSON 文件...\n", files.len());

    let mut result = DataCheckResult::default();
    for file in &files {
        check_data_file(file, &mut result);
    }

    print_check_result(&result);

    if result.error_count() > 0 {
        anyhow::bail!("数据检查发现错误");
    }

    Ok(())
}

/// 收集目录下的所有 JSON 文件（排序后返回）
fn collect_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// 顶层对象带有 `states` 键才视为数据库
fn looks_like_database(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .is_some_and(|value| value.get("states").is_some())
}

/// 检查单个数据文件
fn check_data_file(file: &Path, result: &mut DataCheckResult) {
    let file_id = file.display().to_string();

    let content = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ERROR] {}: 无法读取文件 - {}", file_id, e);
            result.load_errors += 1;
            return;
        }
    };

    if !looks_like_database(&content) {
        result.files_skipped += 1;
        return;
    }
    result.files_checked += 1;

    match load_json(&content) {
        Ok(data) => {
            eprintln!(
                "[INFO] {}: {} 个阶段, {} 个状态",
                file_id,
                data.registry.len(),
                data.database.states.len()
            );
            result.diagnostics.push((file_id, data.diagnostics));
        }
        Err(e) => {
            eprintln!("[ERROR] {}: {}", file_id, e);
            result.load_errors += 1;
        }
    }
}

/// 输出检查结果
fn print_check_result(result: &DataCheckResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!(
        "检查完成: {} 个数据库（跳过 {} 个其他 JSON）",
        result.files_checked, result.files_skipped
    );
    eprintln!();

    // Info 级别只在 RUST_LOG 中可见，这里只输出 Warn 以上
    for (file_id, diagnostics) in &result.diagnostics {
        for diag in diagnostics.filter_by_level(DiagnosticLevel::Warn) {
            eprintln!("{} {}", file_id, diag);
        }
    }

    let error_count = result.error_count();
    let warn_count = result.warn_count();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", error_count, warn_count);
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", warn_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_database() {
        assert!(looks_like_database(r#"{ "states": [] }"#));
        assert!(!looks_like_database(r#"{ "rounds": [] }"#));
        assert!(!looks_like_database("not json"));
    }

    #[test]
    fn test_result_counts() {
        let mut diagnostics = DiagnosticResult::new();
        diagnostics.push(stage_runtime::Diagnostic::warn("state 1", "w"));
        diagnostics.push(stage_runtime::Diagnostic::error("stages", "e"));

        let result = DataCheckResult {
            load_errors: 1,
            diagnostics: vec![("a.json".to_string(), diagnostics)],
            ..DataCheckResult::default()
        };
        assert_eq!(result.error_count(), 2);
        assert_eq!(result.warn_count(), 1);
    }
}
