//! 运行目录存储服务 - 业务能力层
//!
//! 只负责"读写运行目录中的文件"，不关心流程
//!
//! ```text
//! <output_dir>/<run_name>/
//! ├── measurement-sets/<name>.json
//! ├── measurement-definitions/<case>_<idx>.json
//! ├── measurement-responses/<case>_<idx>_response.json
//! ├── measurement-results/<case>/<id>.json
//! ├── lifecycle.json
//! └── <run_name>.log
//! ```

use crate::error::{AppError, AppResult, FileError};
use crate::models::{Case, MeasurementBatch, MeasurementId};
use crate::workflow::LifecycleTracker;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SETS_DIR: &str = "measurement-sets";
pub const DEFINITIONS_DIR: &str = "measurement-definitions";
pub const RESPONSES_DIR: &str = "measurement-responses";
pub const RESULTS_DIR: &str = "measurement-results";
pub const LIFECYCLE_FILE: &str = "lifecycle.json";

/// 已落盘结果的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// 尚未落盘
    Absent,
    /// 文件存在但无法解析为数组
    Unreadable,
    /// 已落盘的记录条数
    Records(usize),
}

/// 一条落盘的提交应答
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub case: Case,
    pub batch_index: usize,
    pub raw: JsonValue,
}

/// 运行目录存储
///
/// 职责：
/// - 管理运行目录布局
/// - 按场景、批次、ID 读写文件
/// - 单写者，不加锁
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// 在输出目录下创建新的运行目录
    ///
    /// # 参数
    /// - `output_dir`: 输出根目录
    /// - `run_name`: 运行名称（时间戳）
    pub fn create(output_dir: impl AsRef<Path>, run_name: &str) -> AppResult<Self> {
        let store = Self {
            root: output_dir.as_ref().join(run_name),
        };
        for dir in [SETS_DIR, DEFINITIONS_DIR, RESPONSES_DIR, RESULTS_DIR] {
            let path = store.root.join(dir);
            fs::create_dir_all(&path)
                .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        }
        Ok(store)
    }

    /// 打开已存在的运行目录
    pub fn open(run_dir: impl AsRef<Path>) -> AppResult<Self> {
        let root = run_dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(FileError::DirectoryNotFound {
                path: root.display().to_string(),
            }
            .into());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 运行名称即目录名
    pub fn run_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(format!("{}.log", self.run_name()))
    }

    pub fn lifecycle_path(&self) -> PathBuf {
        self.root.join(LIFECYCLE_FILE)
    }

    pub fn definition_path(&self, case: Case, batch_index: usize) -> PathBuf {
        self.root
            .join(DEFINITIONS_DIR)
            .join(format!("{}_{}.json", case, batch_index))
    }

    pub fn response_path(&self, case: Case, batch_index: usize) -> PathBuf {
        self.root
            .join(RESPONSES_DIR)
            .join(format!("{}_{}_response.json", case, batch_index))
    }

    pub fn snapshot_path(&self, case: Case, id: MeasurementId) -> PathBuf {
        self.root
            .join(RESULTS_DIR)
            .join(case.name())
            .join(format!("{}.json", id))
    }

    /// 将输入集合复制到运行目录
    ///
    /// # 返回
    /// 返回复制的文件数
    pub fn archive_sets(&self, sets_dir: &Path) -> AppResult<usize> {
        let target_dir = self.root.join(SETS_DIR);
        let entries = fs::read_dir(sets_dir)
            .map_err(|e| AppError::file_read_failed(sets_dir.display().to_string(), e))?;

        let mut copied = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_name() {
                let target = target_dir.join(name);
                fs::copy(&path, &target)
                    .map_err(|e| AppError::file_write_failed(target.display().to_string(), e))?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    pub fn write_definition(&self, case: Case, batch_index: usize, batch: &MeasurementBatch) -> AppResult<()> {
        write_json(&self.definition_path(case, batch_index), batch, true)
    }

    /// 原样保存提交应答
    pub fn write_response(&self, case: Case, batch_index: usize, raw: &JsonValue) -> AppResult<()> {
        write_json(&self.response_path(case, batch_index), raw, true)
    }

    /// 读取所有提交应答，按场景和批次排序
    pub fn read_responses(&self) -> AppResult<Vec<StoredResponse>> {
        let dir = self.root.join(RESPONSES_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = Regex::new(r"^(case[1-4])_(\d+)_response\.json$")
            .map_err(|e| AppError::Other(e.to_string()))?;
        let mut responses = Vec::new();
        for entry in fs::read_dir(&dir)
            .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?
        {
            let path = entry?.path();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let Some(caps) = pattern.captures(&file_name) else {
                continue;
            };
            let (Some(case), Ok(batch_index)) = (Case::from_name(&caps[1]), caps[2].parse::<usize>()) else {
                continue;
            };

            match read_json(&path) {
                Ok(raw) => responses.push(StoredResponse {
                    case,
                    batch_index,
                    raw,
                }),
                Err(e) => warn!("⚠️ 无法解析提交应答 {}: {}", path.display(), e),
            }
        }

        responses.sort_by_key(|r| (r.case, r.batch_index));
        Ok(responses)
    }

    /// 查询已落盘结果的状态
    pub fn snapshot_state(&self, case: Case, id: MeasurementId) -> SnapshotState {
        let path = self.snapshot_path(case, id);
        if !path.is_file() {
            return SnapshotState::Absent;
        }
        match read_json(&path) {
            Ok(JsonValue::Array(records)) => SnapshotState::Records(records.len()),
            Ok(_) | Err(_) => SnapshotState::Unreadable,
        }
    }

    /// 写入（或覆盖）结果快照
    pub fn write_snapshot(&self, case: Case, id: MeasurementId, payload: &JsonValue) -> AppResult<()> {
        let path = self.snapshot_path(case, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
        }
        write_json(&path, payload, false)
    }

    /// 结果目录中已有快照的 (场景, ID)
    pub fn snapshot_ids(&self) -> AppResult<Vec<(Case, MeasurementId)>> {
        let mut found = Vec::new();
        for case in Case::ALL {
            let dir = self.root.join(RESULTS_DIR).join(case.name());
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)
                .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?
            {
                let path = entry?.path();
                if path.extension().and_then(|s| s.to_str()) != Some("json") {
                    continue;
                }
                let id = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<MeasurementId>().ok());
                if let Some(id) = id {
                    found.push((case, id));
                }
            }
        }
        found.sort();
        Ok(found)
    }

    pub fn save_tracker(&self, tracker: &LifecycleTracker) -> AppResult<()> {
        write_json(&self.lifecycle_path(), tracker, true)?;
        debug!("已保存 {}", LIFECYCLE_FILE);
        Ok(())
    }

    /// 读取上次保存的跟踪器，文件不存在时返回 None
    pub fn load_tracker(&self) -> AppResult<Option<LifecycleTracker>> {
        let path = self.lifecycle_path();
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

fn read_json(path: &Path) -> AppResult<JsonValue> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> AppResult<()> {
    let content = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    fs::write(path, content).map_err(|e| AppError::file_write_failed(path.display().to_string(), e))
}
