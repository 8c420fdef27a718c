// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::io;

use log::{debug, error};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::util::format_file_size;

/// 把文件内容按固定大小的块写入连接，直到文件结束或出错。
///
/// 文件按值传入，任何返回路径上都会被释放。写入失败时直接中止：
/// 响应头已经发出，不会再发送第二个响应。返回实际写出的字节数。
pub async fn stream_file<R, W>(
    mut file: R,
    connection: &mut W,
    chunk_size: usize,
    id: u128,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut total_sent = 0u64;

    loop {
        let n = match file.read(&mut buffer).await {
            Ok(0) => break, // 文件读取完毕
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("[ID{}]读取文件失败: {}", id, e);
                return Err(e);
            }
        };
        if let Err(e) = connection.write_all(&buffer[..n]).await {
            error!("[ID{}]流式写入失败: {}", id, e);
            return Err(e);
        }
        total_sent += n as u64;
    }

    debug!(
        "[ID{}]流式传输完成，共发送 {}",
        id,
        format_file_size(total_sent)
    );
    Ok(total_sent)
}
