// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 接收循环
//!
//! 绑定监听 Socket，为每个被接受的连接派发一个独立的会话任务。
//! 单个连接上的任何失败都只影响该连接，不会终止接收循环。

use std::{
    future::Future,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
};

use log::{debug, error, info};
use tokio::{
    net::{TcpListener, TcpSocket},
    task::JoinSet,
};

use crate::{access::DocumentRoot, config::Config, session};

pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
    root: Arc<DocumentRoot>,
}

impl Server {
    /// 校验文档根目录并绑定监听端口。
    ///
    /// 任何一步失败都返回错误，由调用方决定如何退出。
    pub async fn bind(config: Config) -> io::Result<Self> {
        let root = DocumentRoot::new(config.www_root()).map_err(|e| {
            error!("无法使用文档根目录{}：{}", config.www_root().display(), e);
            e
        })?;
        info!("www root: {}", root.path().display());

        // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
        let address = match config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        let port = config.port();
        info!("服务端将在{}:{}上监听Socket连接", address, port);

        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        if let Err(e) = socket.bind(SocketAddrV4::new(address, port).into()) {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return Err(e);
        }
        let listener = socket.listen(config.backlog())?;
        info!("端口{}绑定完成", listener.local_addr()?.port());

        Ok(Self {
            listener,
            config: Arc::new(config),
            root: Arc::new(root),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 一直接收连接，直到 `shutdown` 完成；之后等待已有会话自然结束。
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut sessions = JoinSet::new();
        let mut id: u128 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("主循环接收到停机指令，正在退出...");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            // 例如文件描述符耗尽，下一轮继续接收
                            error!("接收连接失败：{}", e);
                            continue;
                        }
                    };
                    debug!("[ID{}]TCP连接已建立：{}", id, addr);

                    let config = Arc::clone(&self.config);
                    let root = Arc::clone(&self.root);
                    sessions.spawn(session::serve_connection(stream, id, config, root));
                    id += 1; // 增加连接唯一标识序列
                }
            }

            // 回收已经结束的会话
            while let Some(finished) = sessions.try_join_next() {
                if let Err(e) = finished {
                    error!("会话任务异常结束：{}", e);
                }
            }
        }

        drop(self.listener);
        debug!("等待{}个活跃连接结束", sessions.len());
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!("会话任务异常结束：{}", e);
            }
        }
        info!("服务器已停止");
    }

    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }
}
