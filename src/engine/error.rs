// ==========================================
// 学生作业分派引擎 - 引擎层错误类型
// ==========================================
// 说明: 规则违反/结构冲突以 ValidationReport 结构化返回, 不走 Err
//       Err 只用于上游数据失败等必须中止整次运行的情况
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// 上游数据加载失败: 整次运行中止, 不做部分生成
    #[error("上游数据加载失败 ({provider}): {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    #[error("节目单不存在: {0}")]
    ProgramNotFound(String),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub(crate) fn upstream(provider: &'static str, err: impl std::fmt::Display) -> Self {
        EngineError::Upstream {
            provider,
            message: err.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
