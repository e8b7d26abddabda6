use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::models::IpVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// 平台 API 密钥所在的环境变量
pub const API_KEY_ENV: &str = "RIPE_KEY";
/// 配置文件路径所在的环境变量
pub const CONFIG_PATH_ENV: &str = "ATLAS_CONFIG";
/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "atlas.toml";

/// 程序运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// 新建一次测量运行
    #[default]
    Run,
    /// 从已有运行目录恢复并继续轮询
    Resume,
    /// 只查询平台上正在运行的测量数量
    Check,
    /// 停止平台上所有正在运行的测量
    StopAll,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(RunMode::Run),
            "resume" => Ok(RunMode::Resume),
            "check" => Ok(RunMode::Check),
            "stop-all" | "kill" => Ok(RunMode::StopAll),
            other => Err(ConfigError::EnvVarParseFailed {
                var_name: "ATLAS_MODE".to_string(),
                value: other.to_string(),
                expected_type: "run | resume | check | stop-all".to_string(),
            }),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 测量平台 API 基础地址
    pub api_base_url: String,
    /// 平台凭据（必填）
    pub api_key: String,
    /// 账户允许同时运行的测量上限
    pub quota: usize,
    /// 配额不足时每次等待的秒数
    pub quota_wait_secs: u64,
    /// 轮询结果的间隔秒数
    pub poll_interval_secs: u64,
    /// 轮询结果的最大次数
    pub max_poll_attempts: usize,
    /// 每次提交后的暂停秒数
    pub submit_pause_secs: u64,
    /// 单个批次最多包含的测量数
    pub chunk_size: usize,
    /// 单个 fan-out 场景最多的目标数
    pub max_elements_per_case: usize,
    /// IP 版本
    pub ip_version: IpVersion,
    /// 运行输出根目录
    pub output_dir: String,
    /// 参与者集合所在目录
    pub sets_dir: String,
    /// 恢复模式使用的运行目录
    pub resume_dir: Option<String>,
    /// 运行模式
    pub mode: RunMode,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 单个 HTTP 请求超时秒数
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://atlas.ripe.net/api/v2/measurements/".to_string(),
            api_key: String::new(),
            quota: 100,
            quota_wait_secs: 40,
            poll_interval_secs: 60,
            max_poll_attempts: 10,
            submit_pause_secs: 15,
            chunk_size: 30, // 平台上限为 100，部分测量迟迟不结束，30 个一定有空位
            max_elements_per_case: 1000,
            ip_version: IpVersion::V4,
            output_dir: "run".to_string(),
            sets_dir: "measurement-sets".to_string(),
            resume_dir: None,
            mode: RunMode::Run,
            verbose_logging: false,
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    /// 加载完整配置：默认值 → TOML 文件（可选）→ 环境变量，并做启动校验
    pub fn load() -> AppResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).is_file() {
            Self::from_file(Path::new(&path))?
        } else {
            Self::default()
        };
        let config = base.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，缺失的字段使用默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })
    }

    /// 用环境变量覆盖当前配置
    pub fn apply_env(mut self) -> AppResult<Self> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.api_key = key;
        }
        if let Ok(url) = std::env::var("ATLAS_API_BASE_URL") {
            self.api_base_url = url;
        }
        self.quota = env_parse("ATLAS_QUOTA", self.quota)?;
        self.quota_wait_secs = env_parse("ATLAS_QUOTA_WAIT_SECS", self.quota_wait_secs)?;
        self.poll_interval_secs = env_parse("ATLAS_POLL_INTERVAL_SECS", self.poll_interval_secs)?;
        self.max_poll_attempts = env_parse("ATLAS_MAX_POLL_ATTEMPTS", self.max_poll_attempts)?;
        self.submit_pause_secs = env_parse("ATLAS_SUBMIT_PAUSE_SECS", self.submit_pause_secs)?;
        self.chunk_size = env_parse("ATLAS_CHUNK_SIZE", self.chunk_size)?;
        self.ip_version = env_parse("ATLAS_IP_VERSION", self.ip_version)?;
        self.verbose_logging = env_parse("VERBOSE_LOGGING", self.verbose_logging)?;
        self.mode = match std::env::var("ATLAS_MODE") {
            Ok(v) => v.parse()?,
            Err(_) => self.mode,
        };
        if let Ok(dir) = std::env::var("ATLAS_OUTPUT_DIR") {
            self.output_dir = dir;
        }
        if let Ok(dir) = std::env::var("ATLAS_SETS_DIR") {
            self.sets_dir = dir;
        }
        if let Ok(dir) = std::env::var("ATLAS_RESUME_DIR") {
            self.resume_dir = Some(dir);
        }
        Ok(self)
    }

    /// 启动校验：凭据缺失等结构性错误在这里暴露
    pub fn validate(&self) -> AppResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey {
                var_name: API_KEY_ENV.to_string(),
            }
            .into());
        }
        if self.quota == 0 {
            return Err(AppError::invalid_config("quota", "必须大于 0"));
        }
        if self.chunk_size == 0 {
            return Err(AppError::invalid_config("chunk_size", "必须大于 0"));
        }
        if self.chunk_size > self.quota {
            return Err(AppError::invalid_config(
                "chunk_size",
                format!("{} 超过配额 {}，批次永远无法提交", self.chunk_size, self.quota),
            ));
        }
        if self.mode == RunMode::Resume && self.resume_dir.is_none() {
            return Err(AppError::invalid_config("resume_dir", "恢复模式需要指定运行目录"));
        }
        Ok(())
    }

    pub fn quota_wait(&self) -> Duration {
        Duration::from_secs(self.quota_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn submit_pause(&self) -> Duration {
        Duration::from_secs(self.submit_pause_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sets_path(&self) -> PathBuf {
        PathBuf::from(&self.sets_dir)
    }
}

/// 读取并解析环境变量，不存在时返回默认值
fn env_parse<T: FromStr>(var_name: &str, default: T) -> AppResult<T> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse().map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }
            .into()
        }),
        Err(_) => Ok(default),
    }
}
