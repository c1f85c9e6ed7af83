//! # Host CLI
//!
//! 无界面宿主：载入阶段数据，打印注册表，按场景文件模拟脚本战斗。
//!
//! ## 用法
//!
//! ```bash
//! cargo run -p host-cli -- init-config
//! cargo run -p host-cli -- check
//! cargo run -p host-cli -- dump --database data/database.json
//! cargo run -p host-cli -- simulate data/scenario.json --seed 7
//!
//! # 调整日志级别
//! RUST_LOG=stage_runtime=debug cargo run -p host-cli -- simulate data/scenario.json
//! ```

mod config;
mod scenario;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stage_runtime::{DiagnosticLevel, StageData, load_json};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::AppConfig;
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "stages")]
#[command(about = "阶段效果宿主 - 载入数据库、打印注册表、模拟脚本战斗")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件（默认：config.json）
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// 数据库 JSON（覆盖配置文件中的 database_path）
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// 写出默认配置文件
    InitConfig {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 载入数据库并输出诊断；有错误时返回 1
    Check {
        /// 同时输出 Info 级别的诊断
        #[arg(short, long)]
        verbose: bool,
    },

    /// 打印冻结后的注册表
    Dump {
        /// 以 JSON 输出改写后的数据库
        #[arg(long)]
        json: bool,
    },

    /// 执行场景文件
    Simulate {
        /// 场景 JSON 路径
        scenario: PathBuf,

        /// 随机种子（覆盖场景文件中的 seed）
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Commands::InitConfig { force } = cli.command {
        if cli.config.exists() && !force {
            anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", cli.config.display());
        }
        AppConfig::default().save(&cli.config)?;
        println!("已写出默认配置: {}", cli.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = AppConfig::load(&cli.config);
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    config.validate()?;

    let data = load_database(&config.database_path)?;
    if config.debug.print_registry {
        tracing::info!("registry:\n{}", data.registry.dump());
    }

    match cli.command {
        Commands::InitConfig { .. } => {}
        Commands::Check { verbose } => {
            let min_level = if verbose {
                DiagnosticLevel::Info
            } else {
                DiagnosticLevel::Warn
            };
            for diagnostic in data.diagnostics.filter_by_level(min_level) {
                println!("{}", diagnostic);
            }

            let errors = data.diagnostics.error_count();
            let warnings = data.diagnostics.warn_count();
            println!(
                "{} 个阶段, {} 个状态: {} 个错误, {} 个警告",
                data.registry.len(),
                data.database.states.len(),
                errors,
                warnings
            );
            if errors > 0 {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Dump { json } => {
            if json {
                let text = serde_json::to_string_pretty(&data.database)
                    .context("数据库序列化失败")?;
                println!("{}", text);
            } else {
                println!("{}", data.registry.dump());
            }
        }
        Commands::Simulate { scenario: path, seed } => {
            let mut scenario = Scenario::from_path(&path)?;
            data.diagnostics.emit();
            for line in scenario::simulate(&data, &mut scenario, &config.display, seed)? {
                println!("{}", line);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_database(path: &Path) -> anyhow::Result<StageData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取数据库 {}", path.display()))?;
    let data = load_json(&text).with_context(|| format!("数据库载入失败 {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        stages = data.registry.len(),
        states = data.database.states.len(),
        "database loaded"
    );
    Ok(data)
}
