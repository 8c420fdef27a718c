// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件服务器
//!
//! 程序入口：初始化日志、加载配置、构建 Tokio 运行时并启动接收循环。
//! 收到 Ctrl-C 后停止接收新连接，等待已有连接结束后退出。

use std::process;

use log::{error, info};
use tokio::runtime::Builder;

use minihttpd::{Config, Server};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const SERVER_CONFIG: &str = "config/development.toml";

fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        eprintln!("无法初始化日志系统（{}）：{}", LOG_CONFIG, e);
        process::exit(1);
    }

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = match Config::from_toml(SERVER_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!("无法读取配置文件{}：{}", SERVER_CONFIG, e);
            process::exit(1);
        }
    };
    info!("配置文件已载入");

    // 3. 根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        let server = Server::bind(config).await?;
        server
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("无法监听停机信号：{}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;
        Ok::<(), std::io::Error>(())
    });

    if let Err(e) = result {
        error!("服务器启动失败：{}", e);
        process::exit(1);
    }
}
