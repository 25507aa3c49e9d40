// ==========================================
// 学生作业分派引擎 - API层
// ==========================================
// 职责: 面向调用方 (CLI / 上层服务) 的业务接口
// ==========================================

pub mod assignment_api;
pub mod error;

pub use assignment_api::AssignmentApi;
pub use error::{ApiError, ApiResult};
