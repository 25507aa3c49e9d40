// ==========================================
// 学生作业分派引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 周聚会学生作业的生成与安全校验 (人工最终确认)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分派规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AssignmentSetStatus, Gender, PartType, RelationshipKind, StudentRole};

// 领域实体
pub use domain::{
    ActionLog, ActionType, AssignmentRecord, AssignmentSetVersion, FamilyLink, HistoryRecord,
    PartDefinition, Program, Student,
};

// 引擎
pub use engine::{
    AssignmentGenerator, AssignmentOrchestrator, EligibilityEngine, EngineError, FairnessScorer,
    GenerationRequest, GenerationRunReport, PairingEngine, SafetyValidator, ValidationReport,
};

// API
pub use api::{ApiError, AssignmentApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "聚会学生作业分派引擎";
