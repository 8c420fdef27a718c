// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责把连接上读到的原始字节转换为强类型的 [`Request`]：
//! 1. 请求头分帧：在缓冲区中找到第一个完整的请求头（以空行结束），剩余字节留给下一次解析。
//! 2. 请求行解析：只识别 `GET /<path> HTTP/1.<0|1>`，其余标头一律忽略。

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::{
    exception::ParseError,
    param::{HttpVersion, INDEX_FILE},
    util::normalize_path,
};

lazy_static! {
    /// 唯一被接受的请求行格式。路径取到第一个空白字符为止，不做任何解码。
    static ref REQUEST_LINE: Regex = Regex::new(r"^GET /(\S*) HTTP/1\.([01])\r?$").unwrap();
}

/// 一个已解析的 GET 请求。
///
/// 创建后不可变；路径是相对路径（不含开头的 `/`），请求根目录时为 `index.html`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// 请求的资源路径，保持请求行中的原样
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
}

impl Request {
    /// 从缓冲区的第一行解析请求。
    ///
    /// 第一行之后的内容（标头，甚至流水线中的下一个请求）在这里都被忽略，
    /// 由调用者负责把它们留在缓冲区里。
    ///
    /// # 参数
    /// * `buffer` - 从连接读取的原始数据。
    /// * `id` - 连接 ID，仅用于日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, ParseError> {
        let first_line = match buffer.iter().position(|&b| b == b'\n') {
            Some(end) => &buffer[..end],
            None => buffer,
        };

        let first_line = match std::str::from_utf8(first_line) {
            Ok(line) => line,
            Err(_) => {
                warn!("[ID{}]请求行不是合法的UTF-8", id);
                return Err(ParseError::Malformed);
            }
        };

        let captures = match REQUEST_LINE.captures(first_line) {
            Some(c) => c,
            None => {
                warn!("[ID{}]无法识别的请求行：{:?}", id, first_line);
                return Err(ParseError::Malformed);
            }
        };

        let version = match captures[2].parse::<u8>().ok().and_then(HttpVersion::from_minor) {
            Some(v) => v,
            None => {
                warn!("[ID{}]不支持的HTTP协议版本：{:?}", id, &captures[2]);
                return Err(ParseError::Malformed);
            }
        };

        let path = match &captures[1] {
            "" => INDEX_FILE.to_string(),
            p => p.to_string(),
        };

        // 路径本身保持原样，只检查它在词法上不会越出文档根目录
        if normalize_path(&path).is_none() {
            warn!("[ID{}]请求路径试图越出文档根目录：{}", id, path);
            return Err(ParseError::Malformed);
        }

        Ok(Self { path, version })
    }
}

impl Request {
    /// 获取请求路径（相对于文档根目录）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取 HTTP 协议版本
    pub fn version(&self) -> HttpVersion {
        self.version
    }
}

/// 返回缓冲区中第一个完整请求头的长度（包括结尾的空行）。
///
/// 请求头以 `\r\n\r\n` 或 `\n\n` 结束；找不到时返回 `None`，表示还需要继续读取。
pub fn head_len(buffer: &[u8]) -> Option<usize> {
    for (i, byte) in buffer.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let rest = &buffer[i + 1..];
        if rest.starts_with(b"\n") {
            return Some(i + 2);
        }
        if rest.starts_with(b"\r\n") {
            return Some(i + 3);
        }
    }
    None
}

/// 缓冲区开头多余空行的字节数。
///
/// 某些客户端会在流水线请求之间多发送一个 CRLF，这些字节应当被跳过。
pub fn leading_blank_len(buffer: &[u8]) -> usize {
    let mut skipped = 0;
    loop {
        let rest = &buffer[skipped..];
        if rest.starts_with(b"\r\n") {
            skipped += 2;
        } else if rest.starts_with(b"\n") {
            skipped += 1;
        } else {
            return skipped;
        }
    }
}

/// 缓冲区是否至少包含一个完整的请求行
pub fn has_request_line(buffer: &[u8]) -> bool {
    request_line_len(buffer).is_some()
}

/// 请求行的长度（包括结尾的 `\n`）
pub fn request_line_len(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == b'\n').map(|end| end + 1)
}

/// 丢弃超长请求头时的扫描状态。
///
/// 请求头放不进缓冲区时，请求行先被取出，其余的标头行分多次读取并丢弃。
/// 状态在多次扫描之间保留，所以结尾的空行被拆在两次读取中也能被识别。
/// 判定规则与 [`head_len`] 相同：空行是 `\n` 或 `\r\n`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSkip {
    /// 刚读完一个 `\n`，处于新一行的开头
    LineStart,
    /// 新一行目前只有一个 `\r`
    AfterCr,
    /// 行内有其他内容
    InLine,
}

impl HeaderSkip {
    /// 从请求行之后开始扫描
    pub fn new() -> Self {
        HeaderSkip::LineStart
    }

    /// 扫描一段字节。找到结尾的空行时返回它之后的偏移，否则返回 `None`。
    pub fn scan(&mut self, bytes: &[u8]) -> Option<usize> {
        for (i, &byte) in bytes.iter().enumerate() {
            *self = match (*self, byte) {
                (HeaderSkip::LineStart, b'\n') | (HeaderSkip::AfterCr, b'\n') => {
                    return Some(i + 1)
                }
                (HeaderSkip::LineStart, b'\r') => HeaderSkip::AfterCr,
                (_, b'\n') => HeaderSkip::LineStart,
                _ => HeaderSkip::InLine,
            };
        }
        None
    }
}

impl Default for HeaderSkip {
    fn default() -> Self {
        Self::new()
    }
}
