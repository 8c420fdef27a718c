// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 集成测试共用的工具：在随机端口上启动真实的服务器，并按帧读取响应。

#![allow(dead_code)]

use std::{
    fs::Permissions,
    net::SocketAddr,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use minihttpd::{Config, Server};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
};

pub const INITIAL_TIMEOUT: Duration = Duration::from_millis(1000);
pub const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_millis(200);
/// 等待服务端动作的上限，远大于服务端自身的超时
pub const PATIENCE: Duration = Duration::from_secs(5);

pub fn write_file(dir: &Path, name: &str, content: &[u8], mode: u32) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    std::fs::set_permissions(&path, Permissions::from_mode(mode)).unwrap();
    path
}

/// 100 字节的确定内容
pub fn hundred_bytes() -> Vec<u8> {
    (0..100u8).collect()
}

pub struct TestServer {
    addr: SocketAddr,
    root: TempDir,
    outside: TempDir,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// 在本地回环的随机端口上启动服务器，文档根目录中预置一组文件
    pub async fn start() -> Self {
        Self::start_with(|config| config).await
    }

    pub async fn start_with(customize: impl FnOnce(Config) -> Config) -> Self {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        populate(root.path(), outside.path());

        let config = Config::new()
            .with_www_root(root.path())
            .with_port(0)
            .with_local(true)
            .with_timeouts(INITIAL_TIMEOUT, KEEP_ALIVE_TIMEOUT);
        let server = Server::bind(customize(config)).await.unwrap();
        let addr = server.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        Self {
            addr,
            root,
            outside,
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub async fn connect(&self) -> Connection {
        Connection {
            stream: TcpStream::connect(self.addr).await.unwrap(),
            pending: Vec::new(),
        }
    }

    /// 停止接收循环并等待已有连接结束
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(PATIENCE, handle)
                .await
                .expect("服务器没有在限定时间内停止")
                .unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn populate(root: &Path, outside: &Path) {
    write_file(root, "index.html", b"<html><body>index</body></html>", 0o644);
    write_file(root, "hundred.txt", &hundred_bytes(), 0o644);
    write_file(root, "empty.txt", b"", 0o644);
    write_file(root, "photo.jpg", &[0xFF, 0xD8, 0xFF, 0xE0, 0x00], 0o644);
    write_file(root, "photo.jpeg", &[0xFF, 0xD8, 0xFF, 0xE1], 0o644);
    write_file(root, "anim.gif", b"GIF89a", 0o644);
    write_file(root, "data.bin", b"\x00\x01\x02", 0o644);
    write_file(root, "private.txt", b"owner only", 0o600);
    write_file(root, "group.txt", b"group only", 0o640);
    write_file(root, "sub/page.html", b"<p>sub</p>", 0o644);

    let secret = write_file(outside, "secret.txt", b"top secret", 0o644);
    std::os::unix::fs::symlink(&secret, root.join("escape.txt")).unwrap();
    std::os::unix::fs::symlink(root.join("hundred.txt"), root.join("alias.txt")).unwrap();
}

#[derive(Debug)]
pub struct Response {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn status(&self) -> u16 {
        self.status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub struct Connection {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl Connection {
    pub async fn send(&mut self, raw: &[u8]) {
        self.stream.write_all(raw).await.unwrap();
    }

    /// 关闭写方向，读方向保持打开
    pub async fn finish_writing(&mut self) {
        self.stream.shutdown().await.unwrap();
    }

    /// 读取一次，返回读到的字节数；连接关闭时为 0
    async fn fill(&mut self) -> usize {
        let mut chunk = [0u8; 4096];
        let n = tokio::time::timeout(PATIENCE, self.stream.read(&mut chunk))
            .await
            .expect("服务端没有在限定时间内响应")
            .unwrap_or(0);
        self.pending.extend_from_slice(&chunk[..n]);
        n
    }

    /// 读取下一个完整的响应；连接在响应开始前关闭时返回 `None`
    pub async fn next_response(&mut self) -> Option<Response> {
        let head_end = loop {
            if let Some(pos) = self.pending.windows(2).position(|w| w == b"\n\n") {
                break pos + 2;
            }
            if self.fill().await == 0 {
                assert!(self.pending.is_empty(), "连接在响应头中途关闭");
                return None;
            }
        };

        let head = String::from_utf8(self.pending[..head_end].to_vec()).unwrap();
        let mut lines = head.lines();
        let status_line = lines.next().unwrap().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(": "))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let length: usize = headers
            .iter()
            .find(|(key, _)| key == "Content-Length")
            .map(|(_, value)| value.parse().unwrap())
            .unwrap();

        while self.pending.len() < head_end + length {
            assert!(self.fill().await > 0, "连接在响应体结束前关闭");
        }
        let raw: Vec<u8> = self.pending.drain(..head_end + length).collect();

        Some(Response {
            status_line,
            headers,
            body: raw[head_end..].to_vec(),
        })
    }

    /// 服务端是否已经（或在限定时间内）关闭连接，且没有多余的字节
    pub async fn is_closed(&mut self) -> bool {
        self.pending.is_empty() && self.fill().await == 0
    }

    pub async fn get(&mut self, raw: &[u8]) -> Response {
        self.send(raw).await;
        self.next_response().await.expect("没有收到响应")
    }
}
