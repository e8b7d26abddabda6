//! 基础设施层
//!
//! 持有稀缺资源（HTTP 连接池与凭据），只暴露能力

pub mod http_executor;

pub use http_executor::{HttpExecutor, HttpReply};
