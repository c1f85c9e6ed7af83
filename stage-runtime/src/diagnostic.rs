//! # 诊断模块
//!
//! 载入期的非致命问题统一记录为诊断条目，而不是中断载入。
//!
//! ## 设计原则
//!
//! - 纯数据 API，可在无 IO 环境下运行
//! - 诊断分级：Error（数据明显错误）、Warn（已跳过/已修正）、Info（信息提示）
//! - 诊断可以通过 `tracing` 输出，也可以由工具自行打印

use crate::registry::StageRegistry;

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// 信息提示
    Info,
    /// 警告（已跳过或已修正）
    Warn,
    /// 错误（数据需要修复）
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 诊断级别
    pub level: DiagnosticLevel,
    /// 来源（如 `state 20`、`skill 3`、`stages table`）
    pub source: String,
    /// 备注中的行号（如果可定位，从 1 开始）
    pub line: Option<usize>,
    /// 诊断消息
    pub message: String,
    /// 诊断详情（可选，如原始标签内容）
    pub detail: Option<String>,
}

impl Diagnostic {
    fn with_level(
        level: DiagnosticLevel,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            source: source.into(),
            line: None,
            message: message.into(),
            detail: None,
        }
    }

    /// 创建错误诊断
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Error, source, message)
    }

    /// 创建警告诊断
    pub fn warn(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Warn, source, message)
    }

    /// 创建信息诊断
    pub fn info(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Info, source, message)
    }

    /// 设置行号
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// 设置详情
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.source)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n  | {}", detail)?;
        }
        Ok(())
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticResult {
    /// 诊断条目列表
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    /// 创建空结果
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加诊断
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 合并另一个结果
    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// 获取错误数量
    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    /// 获取警告数量
    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    /// 是否有错误
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 按级别过滤
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level >= min_level)
            .collect()
    }

    /// 通过 tracing 输出全部诊断
    pub fn emit(&self) {
        for diag in &self.diagnostics {
            match diag.level {
                DiagnosticLevel::Info => tracing::debug!("{}", diag),
                DiagnosticLevel::Warn => tracing::warn!("{}", diag),
                DiagnosticLevel::Error => tracing::error!("{}", diag),
            }
        }
    }
}

/// 分析已冻结的注册表
///
/// 执行以下检查：
/// - 超出前两条的轨道（独立轨道，不参与相互抵消）
/// - 空轨道
/// - 只有一条轨道且只有一个效果的阶段（无法推进）
pub fn analyze_registry(registry: &StageRegistry) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();

    for stage in registry.stages() {
        let source = format!("stage {}", stage.name());

        for (index, track) in stage.tracks().iter().enumerate() {
            if track.is_empty() {
                result.push(Diagnostic::warn(
                    &source,
                    format!("轨道 '{}' 为空", track.label()),
                ));
            }
            if index >= 2 {
                result.push(
                    Diagnostic::info(
                        &source,
                        format!("轨道 '{}' 为独立轨道，不参与相互抵消", track.label()),
                    )
                    .with_detail(format!(
                        "相互作用的轨道为 '{}' 与 '{}'",
                        stage.tracks()[0].label(),
                        stage.tracks()[1].label()
                    )),
                );
            }
        }

        if let [only] = stage.tracks()
            && only.len() == 1
        {
            result.push(Diagnostic::info(
                &source,
                format!("轨道 '{}' 只有一个效果，重复附加不会推进", only.label()),
            ));
        }
    }

    result
}
