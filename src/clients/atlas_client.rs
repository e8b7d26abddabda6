//! 测量平台 API 客户端
//!
//! 封装所有与测量平台 REST API 相关的调用逻辑

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{HttpExecutor, HttpReply};
use crate::models::{MeasurementBatch, MeasurementId, MeasurementStatus};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

/// 平台远程操作
///
/// 编排层只依赖这个 trait，测试中可以替换为内存实现
#[async_trait]
pub trait AtlasApi: Send + Sync {
    /// 提交一个批次，返回平台的原始应答
    ///
    /// 只检查 HTTP 状态；测量 ID 由调用方在保存应答后用 `parse_submission_ids` 取出
    async fn submit_batch(&self, batch: &MeasurementBatch) -> AppResult<Value>;

    /// 当前账户下运行中（状态 0/1/2）的测量数量
    async fn active_measurement_count(&self) -> AppResult<usize>;

    /// 当前账户下运行中的测量 ID
    async fn running_measurements(&self) -> AppResult<Vec<MeasurementId>>;

    /// 查询测量状态，`refresh` 为 true 时先请求平台刷新
    ///
    /// 测量不存在或刷新失败时返回 `None`
    async fn measurement_status(
        &self,
        id: MeasurementId,
        refresh: bool,
    ) -> AppResult<Option<MeasurementStatus>>;

    /// 获取测量结果（原样返回，结构由调用方判断）
    async fn measurement_result(&self, id: MeasurementId) -> AppResult<Value>;

    /// 请求停止测量
    ///
    /// 幂等：对已停止的测量再次调用返回 `Ok`
    async fn stop_measurement(&self, id: MeasurementId) -> AppResult<()>;

    /// 请求平台刷新测量状态
    async fn refresh_measurement(&self, id: MeasurementId) -> AppResult<()>;
}

/// 测量平台客户端
pub struct AtlasClient {
    executor: HttpExecutor,
}

impl AtlasClient {
    /// 创建新的平台客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self {
            executor: HttpExecutor::new(config)?,
        })
    }

    /// 非 2xx 应答转换为错误，并记录正文
    fn ensure_success(endpoint: &str, reply: HttpReply) -> AppResult<HttpReply> {
        if reply.is_success() {
            Ok(reply)
        } else {
            error!("❌ {} 返回 HTTP {}: {}", endpoint, reply.status, reply.body);
            Err(AppError::bad_response(endpoint, reply.status, reply.body))
        }
    }

    async fn running_page(&self) -> AppResult<Value> {
        let reply = self
            .executor
            .get("my", &[("status", MeasurementStatus::running_filter())], true)
            .await?;
        Self::ensure_success("my", reply)?.json()
    }
}

/// 从提交应答中取出 `measurements` 数组
pub fn parse_submission_ids(raw: &Value) -> AppResult<Vec<MeasurementId>> {
    let ids = raw
        .get("measurements")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::unexpected_shape("submit", format!("缺少 measurements 数组: {}", raw)))?;

    ids.iter()
        .map(|v| {
            v.as_u64()
                .map(MeasurementId)
                .ok_or_else(|| AppError::unexpected_shape("submit", format!("非法的测量 ID: {}", v)))
        })
        .collect()
}

/// 停止请求的应答
///
/// 4xx 表示测量已停止或无法再停止，停止操作是幂等的，不视为错误；
/// 5xx 作为错误返回，由调用方在下一轮重试
fn check_stop_reply(id: MeasurementId, reply: HttpReply) -> AppResult<()> {
    if reply.is_success() {
        debug!("测量 {} 已请求停止", id);
        Ok(())
    } else if (400..500).contains(&reply.status) {
        warn!("⚠️ 测量 {} 停止被拒绝 (HTTP {})，可能已停止: {}", id, reply.status, reply.body);
        Ok(())
    } else {
        Err(AppError::bad_response(id.to_string(), reply.status, reply.body))
    }
}

/// 从状态应答中取出 `status.id`
fn parse_status(endpoint: &str, raw: &Value) -> AppResult<MeasurementStatus> {
    let code = raw
        .get("status")
        .and_then(|s| s.get("id"))
        .and_then(Value::as_u64)
        .ok_or_else(|| AppError::unexpected_shape(endpoint, "缺少 status.id"))?;

    MeasurementStatus::from_code(code)
        .ok_or_else(|| AppError::unexpected_shape(endpoint, format!("未知的状态代码: {}", code)))
}

#[async_trait]
impl AtlasApi for AtlasClient {
    async fn submit_batch(&self, batch: &MeasurementBatch) -> AppResult<Value> {
        let body = serde_json::to_value(batch)?;
        debug!("提交 Payload: {}", body);

        let reply = self.executor.post("", &body).await?;
        Self::ensure_success("submit", reply)?.json()
    }

    async fn active_measurement_count(&self) -> AppResult<usize> {
        let page = self.running_page().await?;
        page.get("count")
            .and_then(Value::as_u64)
            .map(|c| c as usize)
            .ok_or_else(|| AppError::unexpected_shape("my", "缺少 count 字段"))
    }

    async fn running_measurements(&self) -> AppResult<Vec<MeasurementId>> {
        let page = self.running_page().await?;
        let results = page
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::unexpected_shape("my", "缺少 results 数组"))?;

        Ok(results
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_u64))
            .map(MeasurementId)
            .collect())
    }

    async fn measurement_status(
        &self,
        id: MeasurementId,
        refresh: bool,
    ) -> AppResult<Option<MeasurementStatus>> {
        let path = id.to_string();

        if refresh {
            let reply = self.executor.patch(&path, &json!({})).await?;
            if !reply.is_success() {
                debug!("测量 {} 刷新失败: HTTP {}", id, reply.status);
                return Ok(None);
            }
        }

        let reply = self.executor.get(&path, &[], false).await?;
        if reply.is_not_found() {
            return Ok(None);
        }
        let raw = Self::ensure_success(&path, reply)?.json()?;
        parse_status(&path, &raw).map(Some)
    }

    async fn measurement_result(&self, id: MeasurementId) -> AppResult<Value> {
        let path = format!("{}/results/", id);
        let reply = self.executor.get(&path, &[], false).await?;
        Self::ensure_success(&path, reply)?.json()
    }

    async fn stop_measurement(&self, id: MeasurementId) -> AppResult<()> {
        let reply = self.executor.delete(&id.to_string()).await?;
        check_stop_reply(id, reply)
    }

    async fn refresh_measurement(&self, id: MeasurementId) -> AppResult<()> {
        let path = id.to_string();
        let reply = self
            .executor
            .patch(&path, &json!({ "is_public": true }))
            .await?;
        Self::ensure_success(&path, reply)?;
        debug!("测量 {} 已刷新", id);
        Ok(())
    }
}
