//! 运行驱动 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次测量运行的完整生命周期。
//!
//! ## 核心功能
//!
//! 1. **前置检查**：平台上已有运行中的测量时直接终止
//! 2. **场景遍历**：按 case1..case4 构建批次，委托 `case_processor` 提交
//! 3. **有限轮询**：固定间隔对账，直到全部结束或次数用尽
//! 4. **恢复**：从运行目录重建跟踪器后继续轮询
//! 5. **全局统计**：汇总为 `RunReport`
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有平台客户端和运行目录的模块
//! - **单线程**：提交与拉取按顺序进行
//! - **向下委托**：不直接处理单个批次

use crate::clients::{AtlasApi, AtlasClient};
use crate::config::Config;
use crate::error::BusinessError;
use crate::models::{Case, MeasurementSets};
use crate::orchestrator::case_processor::process_case;
use crate::orchestrator::run_report::{CaseState, RunReport};
use crate::services::{recover_tracker, DefinitionBuilder, QuotaGovernor, ResultReconciler, ResultStore};
use crate::utils::logging::{log_poll_attempt, log_set_costs, log_startup, print_final_stats};
use crate::workflow::{BatchFlow, LifecycleTracker};
use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App<A: AtlasApi = AtlasClient> {
    config: Config,
    api: A,
    store: ResultStore,
}

impl App<AtlasClient> {
    /// 初始化应用：校验配置并创建平台客户端
    ///
    /// # 参数
    /// - `config`: 程序配置
    /// - `store`: 本次运行使用的运行目录
    pub fn initialize(config: Config, store: ResultStore) -> Result<Self> {
        config.validate()?;
        let api = AtlasClient::new(&config).context("无法创建平台客户端")?;
        Ok(Self::with_api(config, api, store))
    }
}

impl<A: AtlasApi> App<A> {
    /// 使用指定的平台实现创建应用
    pub fn with_api(config: Config, api: A, store: ResultStore) -> Self {
        Self { config, api, store }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// 执行一次完整运行
    ///
    /// # 参数
    /// - `sets`: 参与者集合
    ///
    /// # 返回
    /// 返回运行结果；轮询次数用尽不视为错误
    pub async fn run(&self, mut sets: MeasurementSets) -> Result<RunReport> {
        let run_name = self.store.run_name();
        log_startup(&self.config, &run_name);

        // ========== 前置检查 ==========
        let running = self
            .api
            .active_measurement_count()
            .await
            .context("无法查询运行中的测量")?;
        if running > 0 {
            error!("❌ 平台上已有 {} 个运行中的测量，终止本次运行", running);
            return Err(BusinessError::MeasurementsAlreadyRunning { count: running }.into());
        }

        sets.retain_reachable(self.config.ip_version);
        log_set_costs(&sets.theoretical_costs());

        // ========== 逐个场景提交 ==========
        let mut report = RunReport::new(&run_name);
        let mut tracker = LifecycleTracker::new();
        let builder = DefinitionBuilder::from_config(&self.config);
        let flow = self.batch_flow();

        for case in Case::ALL {
            let batches = builder.build_case(case, &sets, &run_name);
            if batches.is_empty() {
                info!("⏭️ {} 不适用（集合为空），跳过", case);
                report.set_state(case, CaseState::Done { complete: true });
                continue;
            }

            let stats = process_case(&flow, case, &batches, &mut tracker).await?;
            report.submitted += stats.submitted_jobs;
            report.failed_batches += stats.failed_batches;
            report.set_state(case, CaseState::BatchesSubmitted);
        }

        self.store.save_tracker(&tracker)?;

        // ========== 轮询结果 ==========
        self.poll_until_done(&mut tracker, &mut report).await;

        print_final_stats(&report, &self.store.log_path());
        Ok(report)
    }

    /// 从运行目录恢复并继续轮询
    pub async fn resume(&self) -> Result<RunReport> {
        let run_name = self.store.run_name();
        log_startup(&self.config, &run_name);
        info!("🔄 恢复运行目录: {}", self.store.root().display());

        let mut tracker = recover_tracker(&self.store, &self.api)
            .await
            .context("无法恢复生命周期")?;

        let mut report = RunReport::new(&run_name);
        report.submitted = tracker.total();
        let tracked = tracker.cases();
        for case in Case::ALL {
            let state = if tracked.contains(&case) {
                CaseState::BatchesSubmitted
            } else {
                CaseState::Done { complete: true }
            };
            report.set_state(case, state);
        }

        self.poll_until_done(&mut tracker, &mut report).await;

        print_final_stats(&report, &self.store.log_path());
        Ok(report)
    }

    /// 固定间隔对账，直到所有测量结束或次数用尽
    async fn poll_until_done(&self, tracker: &mut LifecycleTracker, report: &mut RunReport) {
        let polled: Vec<Case> = report
            .cases
            .iter()
            .filter(|(_, state)| **state == CaseState::BatchesSubmitted)
            .map(|(case, _)| *case)
            .collect();
        for case in &polled {
            report.set_state(*case, CaseState::Polling);
        }

        let reconciler = self.reconciler();
        let max_attempts = self.config.max_poll_attempts;
        for attempt in 1..=max_attempts {
            if tracker.all_finished() {
                break;
            }

            log_poll_attempt(attempt, max_attempts);
            reconciler.sweep_and_save(tracker).await;
            report.polls += 1;

            if tracker.all_finished() {
                info!("✓ 所有测量已结束");
                break;
            }
            if attempt < max_attempts {
                sleep(self.config.poll_interval()).await;
            }
        }

        for case in polled {
            report.set_state(
                case,
                CaseState::Done {
                    complete: tracker.is_case_finished(case),
                },
            );
        }

        report.outstanding = tracker.outstanding();
        if !report.outstanding.is_empty() {
            warn!(
                "⚠️ 轮询 {} 次后仍有 {} 个测量未结束，可稍后使用恢复模式继续",
                report.polls,
                report.outstanding_count()
            );
        }
    }

    fn reconciler(&self) -> ResultReconciler<'_, A> {
        ResultReconciler::new(&self.api, &self.store)
    }

    fn batch_flow(&self) -> BatchFlow<'_, A> {
        let governor = QuotaGovernor::new(
            &self.api,
            self.reconciler(),
            self.config.quota,
            self.config.quota_wait(),
        );
        BatchFlow::new(&self.api, &self.store, governor, self.config.submit_pause())
    }
}
