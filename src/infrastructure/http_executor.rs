//! HTTP 执行器 - 基础设施层
//!
//! 持有唯一的 HTTP 连接池和平台凭据，只暴露"发请求"的能力

use crate::config::Config;
use crate::error::{AppError, AppResult};
use reqwest::{Client, Method};
use serde_json::Value as JsonValue;
use tracing::debug;

/// 一次 HTTP 请求的原始应答
#[derive(Debug, Clone)]
pub struct HttpReply {
    /// HTTP 状态码
    pub status: u16,
    /// 应答正文（原样保留）
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// 将正文解析为 JSON
    pub fn json(&self) -> AppResult<JsonValue> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP 执行器
///
/// 职责：
/// - 持有唯一的 reqwest Client
/// - 负责拼接地址和附加凭据
/// - 不认识测量、场景
/// - 不判断业务成败
pub struct HttpExecutor {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpExecutor {
    /// 根据配置创建执行器
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(&config.api_base_url),
            api_key: config.api_key.clone(),
        })
    }

    /// 平台基础地址（以 `/` 结尾）
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 拼接相对路径
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 执行请求并返回原始应答
    ///
    /// # 参数
    /// - `method`: HTTP 方法
    /// - `path`: 相对于基础地址的路径
    /// - `query`: 额外查询参数
    /// - `with_key`: 是否附加 `key` 参数
    /// - `body`: JSON 请求体
    ///
    /// # 返回
    /// 传输层成功时返回状态码和正文，非 2xx 不视为错误
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        with_key: bool,
        body: Option<&JsonValue>,
    ) -> AppResult<HttpReply> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if with_key {
            request = request.query(&[("key", self.api_key.as_str())]);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url.clone(), e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(url.clone(), e))?;

        debug!("{} -> {}", url, status);
        Ok(HttpReply { status, body })
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)], with_key: bool) -> AppResult<HttpReply> {
        self.send(Method::GET, path, query, with_key, None).await
    }

    pub async fn post(&self, path: &str, body: &JsonValue) -> AppResult<HttpReply> {
        self.send(Method::POST, path, &[], true, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &JsonValue) -> AppResult<HttpReply> {
        self.send(Method::PATCH, path, &[], true, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> AppResult<HttpReply> {
        self.send(Method::DELETE, path, &[], true, None).await
    }
}

fn normalize_base(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = Config {
            api_base_url: "https://atlas.example.net/api/v2/measurements".to_string(),
            api_key: "k".to_string(),
            ..Config::default()
        };
        let executor = HttpExecutor::new(&config).unwrap();
        assert_eq!(executor.base_url(), "https://atlas.example.net/api/v2/measurements/");
        assert_eq!(
            executor.url("/42/results/"),
            "https://atlas.example.net/api/v2/measurements/42/results/"
        );
        assert_eq!(executor.url("my"), "https://atlas.example.net/api/v2/measurements/my");
    }

    #[test]
    fn test_reply_classification() {
        let reply = HttpReply {
            status: 404,
            body: "{\"detail\":\"Not found.\"}".to_string(),
        };
        assert!(reply.is_not_found());
        assert!(!reply.is_success());
        assert_eq!(reply.json().unwrap()["detail"], "Not found.");
    }
}
