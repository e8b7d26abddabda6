//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责场景遍历和轮询调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `run_driver` - 运行驱动
//! - 管理一次运行的生命周期（前置检查、提交、轮询、恢复）
//! - 持有平台客户端和运行目录
//! - 输出全局统计信息
//!
//! ### `case_processor` - 单个场景处理器
//! - 遍历单个场景的所有批次（Vec<MeasurementBatch>）
//! - 复用同一个 BatchFlow
//! - 输出单个场景的统计信息
//!
//! ### `run_report` - 运行结果
//! - 各场景状态、未结束的测量、失败批次
//!
//! ## 层次关系
//!
//! ```text
//! run_driver (处理 4 个场景 + 轮询)
//!     ↓
//! case_processor (处理 Vec<MeasurementBatch>)
//!     ↓
//! workflow::BatchFlow (处理单个批次)
//!     ↓
//! services (能力层：构建 / 配额 / 对账 / 存储)
//!     ↓
//! clients + infrastructure (平台客户端：HttpExecutor)
//! ```

pub mod case_processor;
pub mod run_driver;
pub mod run_report;

// 重新导出主要类型
pub use case_processor::{process_case, CaseSubmission};
pub use run_driver::App;
pub use run_report::{CaseState, RunReport};
