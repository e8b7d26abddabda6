//! 测试公共工具：内存中的平台实现和测试数据

#![allow(dead_code)]

use async_trait::async_trait;
use atlas_orchestrator::clients::AtlasApi;
use atlas_orchestrator::config::Config;
use atlas_orchestrator::error::{AppError, AppResult};
use atlas_orchestrator::models::{
    AsGroup, Asn, MeasurementBatch, MeasurementId, MeasurementStatus, Participant, ParticipantSet,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// 脚本化的平台状态
#[derive(Debug, Default)]
pub struct FakeState {
    pub next_id: u64,
    /// 依次返回的运行中数量，用完后返回 `default_active`
    pub active_counts: VecDeque<usize>,
    pub default_active: usize,
    /// 接下来若干次数量查询直接失败
    pub failing_count_queries: usize,
    pub count_queries: usize,
    /// 每个 ID 依次返回的结果，只剩一个时重复返回
    pub results: HashMap<MeasurementId, VecDeque<Value>>,
    /// 没有脚本的 ID 返回的结果
    pub default_result: Option<Value>,
    pub failing_results: HashSet<MeasurementId>,
    pub result_fetches: usize,
    pub statuses: HashMap<MeasurementId, MeasurementStatus>,
    /// 停止请求是否立即让测量进入 Stopped
    pub stop_completes: bool,
    pub failing_submissions: usize,
    /// 接下来若干次提交返回 2xx 但没有 measurements 数组
    pub malformed_submissions: usize,
    pub submitted: Vec<MeasurementBatch>,
    pub stops: Vec<MeasurementId>,
    pub refreshes: Vec<MeasurementId>,
    pub status_queries: Vec<MeasurementId>,
}

/// 内存中的平台实现
#[derive(Debug, Default)]
pub struct FakeAtlas {
    pub state: Mutex<FakeState>,
}

impl FakeAtlas {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.with(|s| {
            s.next_id = 1000;
            s.stop_completes = true;
        });
        fake
    }

    /// 修改脚本状态
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn script_results(&self, id: u64, results: Vec<Value>) {
        self.with(|s| {
            s.results.insert(MeasurementId(id), results.into_iter().collect());
        });
    }

    pub fn set_status(&self, id: u64, status: MeasurementStatus) {
        self.with(|s| {
            s.statuses.insert(MeasurementId(id), status);
        });
    }

    pub fn stops(&self) -> Vec<MeasurementId> {
        self.with(|s| s.stops.clone())
    }

    pub fn refreshes(&self) -> Vec<MeasurementId> {
        self.with(|s| s.refreshes.clone())
    }

    pub fn submitted(&self) -> Vec<MeasurementBatch> {
        self.with(|s| s.submitted.clone())
    }
}

#[async_trait]
impl AtlasApi for FakeAtlas {
    async fn submit_batch(&self, batch: &MeasurementBatch) -> AppResult<Value> {
        self.with(|s| {
            if s.failing_submissions > 0 {
                s.failing_submissions -= 1;
                return Err(AppError::bad_response("submit", 400, "{\"error\":\"quota\"}"));
            }
            if s.malformed_submissions > 0 {
                s.malformed_submissions -= 1;
                return Ok(json!({ "error": { "detail": "Your selection of probes contains at least one probe that is unavailable" } }));
            }
            let ids: Vec<MeasurementId> = (0..batch.job_count() as u64)
                .map(|i| MeasurementId(s.next_id + i))
                .collect();
            s.next_id += batch.job_count() as u64;
            for id in &ids {
                s.statuses.entry(*id).or_insert(MeasurementStatus::Ongoing);
            }
            s.submitted.push(batch.clone());
            Ok(json!({ "measurements": ids }))
        })
    }

    async fn active_measurement_count(&self) -> AppResult<usize> {
        self.with(|s| {
            s.count_queries += 1;
            if s.failing_count_queries > 0 {
                s.failing_count_queries -= 1;
                return Err(AppError::bad_response("my", 503, "unavailable"));
            }
            Ok(s.active_counts.pop_front().unwrap_or(s.default_active))
        })
    }

    async fn running_measurements(&self) -> AppResult<Vec<MeasurementId>> {
        self.with(|s| {
            let mut running: Vec<MeasurementId> = s
                .statuses
                .iter()
                .filter(|(_, status)| status.is_running())
                .map(|(id, _)| *id)
                .collect();
            running.sort();
            Ok(running)
        })
    }

    async fn measurement_status(
        &self,
        id: MeasurementId,
        _refresh: bool,
    ) -> AppResult<Option<MeasurementStatus>> {
        self.with(|s| {
            s.status_queries.push(id);
            Ok(s.statuses.get(&id).copied())
        })
    }

    async fn measurement_result(&self, id: MeasurementId) -> AppResult<Value> {
        self.with(|s| {
            s.result_fetches += 1;
            if s.failing_results.contains(&id) {
                return Err(AppError::bad_response(format!("{}/results/", id), 500, "boom"));
            }
            let result = match s.results.get_mut(&id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };
            Ok(result.or_else(|| s.default_result.clone()).unwrap_or_else(|| json!([])))
        })
    }

    async fn stop_measurement(&self, id: MeasurementId) -> AppResult<()> {
        self.with(|s| {
            s.stops.push(id);
            if s.stop_completes {
                s.statuses.insert(id, MeasurementStatus::Stopped);
            }
            Ok(())
        })
    }

    async fn refresh_measurement(&self, id: MeasurementId) -> AppResult<()> {
        self.with(|s| {
            s.refreshes.push(id);
            Ok(())
        })
    }
}

/// 所有等待时间为零的测试配置
pub fn test_config() -> Config {
    Config {
        api_key: "test-key".to_string(),
        quota_wait_secs: 0,
        poll_interval_secs: 0,
        submit_pause_secs: 0,
        max_poll_attempts: 5,
        ..Config::default()
    }
}

/// n 条 traceroute 记录
pub fn records(n: usize) -> Value {
    Value::Array((0..n).map(|i| json!({ "prb_id": i, "result": [] })).collect())
}

/// 单个 AS、带探针的客户端集合
pub fn client_set(probes: &[u64]) -> ParticipantSet {
    ParticipantSet::new(vec![AsGroup::new(
        Asn::UNKNOWN,
        probes
            .iter()
            .map(|p| Participant::new(p.to_string(), vec![format!("192.0.2.{}:0", p)]))
            .collect(),
        probes.to_vec(),
    )])
}

/// n 个 AS，每个 AS 一个中继
pub fn relay_set(n: u32) -> ParticipantSet {
    ParticipantSet::new(
        (1..=n)
            .map(|i| {
                AsGroup::new(
                    Asn(64500 + i),
                    vec![Participant::new(
                        format!("FP{}", i),
                        vec![format!("10.1.{}.{}:9001", i / 256, i % 256)],
                    )],
                    vec![u64::from(i)],
                )
            })
            .collect(),
    )
}
