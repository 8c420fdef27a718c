// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use chrono::prelude::*;

use crate::param::*;

/// 一次响应的状态行与标头。
///
/// 每个请求都构造一个新的实例；`content_length` 只有在 200 时才可能非零。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeaders {
    version: HttpVersion,
    status_code: StatusCode,
    content_type: ContentType,
    content_length: u64,
    date: DateTime<Utc>,
}

impl ResponseHeaders {
    /// 200 响应，长度为打开文件时 stat 得到的大小
    pub fn ok(
        version: HttpVersion,
        content_type: ContentType,
        content_length: u64,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            version,
            status_code: StatusCode::Ok,
            content_type,
            content_length,
            date,
        }
    }

    /// 错误响应：没有响应体，`Content-Length` 为 0
    pub fn error(status_code: StatusCode, version: HttpVersion, date: DateTime<Utc>) -> Self {
        debug_assert_ne!(status_code, StatusCode::Ok);
        Self {
            version,
            status_code,
            content_type: ContentType::TextPlain,
            content_length: 0,
            date,
        }
    }

    /// 序列化为要写入连接的字节：状态行、`Content-Type`、`Content-Length`、`Date`，最后是空行。
    ///
    /// 这里不执行任何 I/O。
    pub fn as_bytes(&self) -> Vec<u8> {
        let version = self.version.to_string();
        let status_code = self.status_code.as_u16().to_string();
        let content_length = self.content_length.to_string();
        let date = format_date(&self.date);

        [
            "HTTP/",
            &version,
            " ",
            &status_code,
            " ",
            self.status_code.reason_phrase(),
            LINE_END,
            "Content-Type: ",
            self.content_type.as_str(),
            LINE_END,
            "Content-Length: ",
            &content_length,
            LINE_END,
            "Date: ",
            &date,
            LINE_END,
            LINE_END,
        ]
        .concat()
        .into_bytes()
    }
}

impl ResponseHeaders {
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

/// IMF-fixdate，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
