// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接会话模块
//!
//! 每个被接受的连接对应一个 [`Session`]，它独占连接句柄、请求缓冲区和打开的文件，
//! 不与其他会话共享任何可变状态。会话是一个状态机：
//!
//! ```text
//! AwaitRequest ──收到完整请求头──▶ Parsing ──▶ Responding ──HTTP/1.1──▶ AwaitRequest
//!      │                                         │
//!      └──超时 / 对端关闭 / 读取失败──▶ Closing ◀──HTTP/1.0、400、写入失败
//! ```
//!
//! 请求缓冲区在多次读取之间保留：一次读取可能带来零个、一个或多个请求，
//! 解析后剩余的字节留给下一轮，而不会被丢弃。

use std::{io, sync::Arc, time::Duration};

use bytes::{Buf, BytesMut};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{self, error::Elapsed, Instant},
};

use crate::{
    access::{self, DocumentRoot},
    config::{Config, MAX_TIMEOUT},
    mime,
    param::{HttpVersion, StatusCode},
    request::{self, HeaderSkip, Request},
    response::ResponseHeaders,
    stream,
};

/// 服务一个连接直到会话结束。这是接收循环为每个连接派发的唯一入口。
pub async fn serve_connection<S>(stream: S, id: u128, config: Arc<Config>, root: Arc<DocumentRoot>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Session::new(stream, id, config, root).run().await
}

/// 从现在起经过 `wait` 的时刻；超出时钟范围时退回到最长超时
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait).unwrap_or_else(|| now + wait.min(MAX_TIMEOUT))
}

enum State {
    AwaitRequest,
    Parsing(BytesMut),
    Responding(Reply),
    Closing,
}

/// 一个已经决定好、尚未发送的响应
struct Reply {
    headers: ResponseHeaders,
    body: Option<File>,
    path: Option<String>,
    close: bool,
}

impl Reply {
    fn error(status_code: StatusCode, version: HttpVersion, date: DateTime<Utc>) -> Self {
        Self {
            headers: ResponseHeaders::error(status_code, version, date),
            body: None,
            path: None,
            close: false,
        }
    }

    fn for_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// 发送后关闭连接
    fn closing(mut self) -> Self {
        self.close = true;
        self
    }
}

pub struct Session<S> {
    stream: S,
    id: u128,
    config: Arc<Config>,
    root: Arc<DocumentRoot>,
    buffer: BytesMut,
    /// 当前这一轮等待请求的截止时间
    deadline: Instant,
    /// 最近一个请求协商的协议版本
    version: HttpVersion,
    served: u64,
    peer_closed: bool,
    /// 以 400 拒绝了请求，关闭前需要丢弃客户端剩余的输入
    rejected: bool,
    clock: fn() -> DateTime<Utc>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, id: u128, config: Arc<Config>, root: Arc<DocumentRoot>) -> Self {
        let buffer = BytesMut::with_capacity(config.request_buffer_size());
        let deadline = deadline_after(config.initial_timeout());
        Self {
            stream,
            id,
            config,
            root,
            buffer,
            deadline,
            version: HttpVersion::V1_0,
            served: 0,
            peer_closed: false,
            rejected: false,
            clock: Utc::now,
        }
    }

    /// 替换生成 `Date` 标头所用的时钟
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// 运行状态机，直到进入 Closing 并关闭连接
    pub async fn run(mut self) {
        let mut state = State::AwaitRequest;
        loop {
            state = match state {
                State::AwaitRequest => self.await_request().await,
                State::Parsing(head) => self.parse(head).await,
                State::Responding(reply) => self.respond(reply).await,
                State::Closing => break,
            };
        }
        self.close().await;
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// 等待一个完整的请求头。
    ///
    /// 第一个请求最多等待 `initial_timeout`，之后的请求最多等待 `keep_alive_timeout`；
    /// 同一个请求的多次读取共用一个截止时间。
    async fn await_request(&mut self) -> State {
        let wait = if self.served == 0 {
            self.config.initial_timeout()
        } else {
            self.config.keep_alive_timeout()
        };
        self.deadline = deadline_after(wait);

        loop {
            let blank = request::leading_blank_len(&self.buffer);
            self.buffer.advance(blank);

            if let Some(len) = request::head_len(&self.buffer) {
                debug!("[ID{}]收到完整的请求头，{}字节", self.id, len);
                return State::Parsing(self.buffer.split_to(len));
            }

            if self.peer_closed {
                // 对端已关闭写方向：只要请求行完整就按最后一个请求处理
                if request::has_request_line(&self.buffer) {
                    return State::Parsing(self.buffer.split());
                }
                if !self.buffer.is_empty() {
                    warn!("[ID{}]连接关闭时仍有不完整的请求，已丢弃", self.id);
                }
                return State::Closing;
            }

            let limit = self.config.request_buffer_size();
            if self.buffer.len() >= limit {
                // 标头只被忽略：请求行完整就取出请求行，丢弃其余标头
                if let Some(line_len) = request::request_line_len(&self.buffer) {
                    debug!("[ID{}]请求头超过{}字节，只保留请求行", self.id, limit);
                    let line = self.buffer.split_to(line_len);
                    return match self.skip_header_lines().await {
                        true => State::Parsing(line),
                        false => State::Closing,
                    };
                }
                warn!("[ID{}]请求行超过{}字节，返回400", self.id, limit);
                self.version = HttpVersion::V1_0;
                let reply = Reply::error(StatusCode::BadRequest, HttpVersion::V1_0, self.now());
                return State::Responding(reply.closing());
            }

            match self.fill_buffer().await {
                Err(_) => {
                    if self.buffer.is_empty() {
                        debug!("[ID{}]等待请求超时", self.id);
                    } else {
                        warn!("[ID{}]请求未完整到达即超时", self.id);
                    }
                    return State::Closing;
                }
                Ok(Ok(0)) => {
                    debug!("[ID{}]客户端关闭了写方向", self.id);
                    self.peer_closed = true;
                }
                Ok(Ok(n)) => {
                    debug!("[ID{}]读取到{}字节", self.id, n);
                }
                Ok(Err(e)) => {
                    error!("[ID{}]读取连接时遇到错误: {}", self.id, e);
                    return State::Closing;
                }
            }
        }
    }

    /// 在当前截止时间之前读取一次，缓冲区不会超过 `request_buffer_size`
    async fn fill_buffer(&mut self) -> Result<io::Result<usize>, Elapsed> {
        let room = self
            .config
            .request_buffer_size()
            .saturating_sub(self.buffer.len());
        self.buffer.reserve(room);
        let mut bounded = (&mut self.stream).take(room as u64);
        time::timeout_at(self.deadline, bounded.read_buf(&mut self.buffer)).await
    }

    /// 读取并丢弃请求行之后的标头，直到结尾的空行。
    ///
    /// 空行之后的字节留在缓冲区里，作为流水线中的下一个请求。
    /// 返回 `false` 表示请求没有完整到达，会话应当直接关闭。
    async fn skip_header_lines(&mut self) -> bool {
        let mut scan = HeaderSkip::new();
        let mut skipped = 0usize;
        loop {
            if let Some(end) = scan.scan(&self.buffer) {
                self.buffer.advance(end);
                debug!("[ID{}]丢弃了{}字节的标头", self.id, skipped + end);
                return true;
            }
            skipped += self.buffer.len();
            self.buffer.clear();

            match self.fill_buffer().await {
                Err(_) => {
                    warn!("[ID{}]请求头未完整到达即超时", self.id);
                    return false;
                }
                Ok(Ok(0)) => {
                    // 请求行已经完整，按最后一个请求处理
                    debug!("[ID{}]客户端在标头结束前关闭了写方向", self.id);
                    self.peer_closed = true;
                    return true;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!("[ID{}]读取连接时遇到错误: {}", self.id, e);
                    return false;
                }
            }
        }
    }

    async fn parse(&mut self, head: BytesMut) -> State {
        let request = match Request::try_from(&head, self.id) {
            Ok(req) => req,
            Err(e) => {
                // 无法信任请求声明的版本，按 HTTP/1.0 回复并关闭
                warn!("[ID{}]解析HTTP请求失败: {}", self.id, e);
                self.version = HttpVersion::V1_0;
                let reply = Reply::error(e.status_code(), HttpVersion::V1_0, self.now());
                return State::Responding(reply.closing());
            }
        };
        debug!(
            "[ID{}]成功解析HTTP请求：HTTP/{} {}",
            self.id,
            request.version(),
            request.path()
        );
        self.version = request.version();
        State::Responding(self.prepare(&request).await)
    }

    /// 根据访问检查的结果决定响应：200 并附带文件，或 403 / 404
    async fn prepare(&self, request: &Request) -> Reply {
        let version = request.version();
        let path = request.path();

        let file = match self.root.open(path, self.id).await {
            Ok(f) => f,
            Err(e) => {
                warn!("[ID{}]请求的路径：{} 无法提供：{}", self.id, path, e);
                return Reply::error(e.status_code(), version, self.now()).for_path(path);
            }
        };

        match access::check_access(&file, self.id).await {
            Ok(size) => Reply {
                headers: ResponseHeaders::ok(version, mime::resolve(path), size, self.now()),
                body: Some(file),
                path: Some(path.to_string()),
                close: false,
            },
            Err(e) => {
                warn!("[ID{}]请求的路径：{} 无法提供：{}", self.id, path, e);
                Reply::error(e.status_code(), version, self.now()).for_path(path)
            }
        }
    }

    /// 先发送响应头，再发送文件内容。头部一旦发出，任何失败都只能关闭连接。
    async fn respond(&mut self, reply: Reply) -> State {
        let Reply {
            headers,
            body,
            path,
            close,
        } = reply;

        info!(
            "[ID{}] HTTP/{}, {}, {}, {}, {}",
            self.id,
            headers.version(),
            path.as_deref().unwrap_or("-"),
            headers.status_code().as_u16(),
            headers.content_type(),
            headers.content_length(),
        );

        if let Err(e) = self.stream.write_all(&headers.as_bytes()).await {
            error!("[ID{}]发送响应头失败: {}", self.id, e);
            return State::Closing;
        }

        if let Some(file) = body {
            let expected = headers.content_length();
            let chunk_size = self.config.chunk_size();
            match stream::stream_file(file.take(expected), &mut self.stream, chunk_size, self.id)
                .await
            {
                Ok(sent) if sent == expected => {}
                Ok(sent) => {
                    // 文件在传输中被截断，后续请求的分帧已不可信
                    warn!(
                        "[ID{}]文件在传输过程中变短：应发送{}字节，实际{}字节",
                        self.id, expected, sent
                    );
                    return State::Closing;
                }
                Err(_) => return State::Closing,
            }
        }

        if let Err(e) = self.stream.flush().await {
            error!("[ID{}]刷新连接失败: {}", self.id, e);
            return State::Closing;
        }
        self.served += 1;

        if close {
            self.rejected = true;
            State::Closing
        } else if !self.version.keeps_alive() {
            State::Closing
        } else {
            State::AwaitRequest
        }
    }

    async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("[ID{}]关闭连接时出错: {}", self.id, e);
        }
        if self.rejected && !self.peer_closed {
            self.drain_input().await;
        }
        debug!("[ID{}]连接关闭，共处理{}个请求", self.id, self.served);
    }

    /// 带未读数据关闭 Socket 会触发 RST，客户端可能因此丢失已发送的响应。
    /// 在一个短超时内读完并丢弃剩余输入。
    async fn drain_input(&mut self) {
        let deadline = deadline_after(self.config.keep_alive_timeout());
        let mut sink = [0u8; 1024];
        let mut discarded = 0usize;
        while let Ok(Ok(n)) = time::timeout_at(deadline, self.stream.read(&mut sink)).await {
            if n == 0 {
                break;
            }
            discarded += n;
        }
        debug!("[ID{}]丢弃了{}字节未处理的输入", self.id, discarded);
    }
}
