// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use num_cpus;
use serde_derive::Deserialize;

use log::{error, warn};
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::PathBuf;
use std::time::Duration;

/// 两个超时允许的最大值，更大的配置会被截断到这里
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: PathBuf,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    local: bool,
    #[serde(default = "default_backlog")]
    backlog: u32,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_request_buffer_size")]
    request_buffer_size: usize,
    #[serde(default = "default_initial_timeout_ms")]
    initial_timeout_ms: u64,
    #[serde(default = "default_keep_alive_timeout_ms")]
    keep_alive_timeout_ms: u64,
}

fn default_www_root() -> PathBuf {
    PathBuf::from("www")
}

fn default_port() -> u16 {
    9001
}

fn default_backlog() -> u32 {
    10
}

fn default_chunk_size() -> usize {
    4096
}

fn default_request_buffer_size() -> usize {
    1024
}

fn default_initial_timeout_ms() -> u64 {
    10000 // 10s
}

fn default_keep_alive_timeout_ms() -> u64 {
    200
}

fn max_timeout_ms() -> u64 {
    MAX_TIMEOUT.as_secs() * 1000
}

fn clamp_timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis())
        .unwrap_or(u64::MAX)
        .min(max_timeout_ms())
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: default_www_root(),
            port: default_port(),
            local: false,
            backlog: default_backlog(),
            worker_threads: num_cpus::get(),
            chunk_size: default_chunk_size(),
            request_buffer_size: default_request_buffer_size(),
            initial_timeout_ms: default_initial_timeout_ms(),
            keep_alive_timeout_ms: default_keep_alive_timeout_ms(),
        }
    }

    /// 从 TOML 文件读取配置。
    ///
    /// 文件不存在或无法读取时返回错误；内容无法解析时记录日志并使用默认配置。
    pub fn from_toml(filename: &str) -> io::Result<Self> {
        let mut file = File::open(filename)?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)?;

        let raw_config = match Self::from_toml_str(&str_val) {
            Ok(c) => c,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        Ok(raw_config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let raw_config: Config = toml::from_str(s)?;
        Ok(raw_config.sanitized())
    }

    /// 把不合法的零值替换为默认值
    fn sanitized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.chunk_size == 0 {
            warn!("chunk_size被设置为0，将改为默认值{}", default_chunk_size());
            self.chunk_size = default_chunk_size();
        }
        if self.request_buffer_size == 0 {
            warn!(
                "request_buffer_size被设置为0，将改为默认值{}",
                default_request_buffer_size()
            );
            self.request_buffer_size = default_request_buffer_size();
        }
        let max_ms = max_timeout_ms();
        if self.initial_timeout_ms > max_ms {
            warn!("initial_timeout_ms超过上限，将改为{}", max_ms);
            self.initial_timeout_ms = max_ms;
        }
        if self.keep_alive_timeout_ms > max_ms {
            warn!("keep_alive_timeout_ms超过上限，将改为{}", max_ms);
            self.keep_alive_timeout_ms = max_ms;
        }
        if self.backlog == 0 {
            warn!("backlog被设置为0，将改为默认值{}", default_backlog());
            self.backlog = default_backlog();
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// 主要供测试在代码中构造配置
impl Config {
    pub fn with_www_root(mut self, www_root: impl Into<PathBuf>) -> Self {
        self.www_root = www_root.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_request_buffer_size(mut self, request_buffer_size: usize) -> Self {
        self.request_buffer_size = request_buffer_size;
        self
    }

    /// 超过 [`MAX_TIMEOUT`] 的值被截断
    pub fn with_timeouts(mut self, initial: Duration, keep_alive: Duration) -> Self {
        self.initial_timeout_ms = clamp_timeout_ms(initial);
        self.keep_alive_timeout_ms = clamp_timeout_ms(keep_alive);
        self
    }
}

impl Config {
    pub fn www_root(&self) -> &PathBuf {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn request_buffer_size(&self) -> usize {
        self.request_buffer_size
    }

    /// 等待第一个请求的时间
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_timeout_ms)
    }

    /// HTTP/1.1 连接在两个请求之间允许空闲的时间
    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }
}
