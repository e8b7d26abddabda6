//! # Atlas Orchestrator
//!
//! 一个用于批量提交 traceroute 测量并回收结果的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 连接池与凭据），只暴露能力
//! - `HttpExecutor` - 唯一的 client owner，提供 send() 能力
//! - `clients/` - `AtlasApi` 平台操作与 `AtlasClient` 实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程顺序
//! - `DefinitionBuilder` - fan-out / fan-in 批次构建
//! - `QuotaGovernor` - 等待平台空位
//! - `ResultReconciler` - 一轮拉取并合并结果
//! - `ResultStore` - 运行目录读写
//! - `recovery` / `maintenance` - 恢复与账户维护
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个批次"的完整提交流程
//! - `BatchCtx` - 上下文封装（case + batch_index）
//! - `BatchFlow` - 流程编排（保存 → 配额 → 提交 → 登记）
//! - `LifecycleTracker` - 测量生命周期（active / stop_requested / finished）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/run_driver` - 运行驱动，管理资源、前置检查和轮询
//! - `orchestrator/case_processor` - 单个场景处理器，遍历批次列表
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{AtlasApi, AtlasClient};
pub use config::{Config, RunMode};
pub use error::{AppError, AppResult};
pub use infrastructure::HttpExecutor;
pub use models::{Case, MeasurementId, MeasurementSets};
pub use orchestrator::{App, CaseState, RunReport};
pub use services::ResultStore;
pub use workflow::{BatchCtx, BatchFlow, Bucket, LifecycleTracker};
