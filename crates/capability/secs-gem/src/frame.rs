//! 帧重组
//!
//! TCP 字节流按 4 字节大端长度前缀切分为完整报文。接收窗口容量在启动时
//! 按变量配置确定，超出容量的数据块整体丢弃。

use bytes::{Buf, Bytes, BytesMut};

/// 长度前缀字节数
pub const LENGTH_PREFIX_LEN: usize = 4;

/// 接收累积缓冲
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 追加收到的数据；追加后超出容量时整块丢弃并返回 `false`
    pub fn push(&mut self, data: &[u8]) -> bool {
        if self.buf.len() + data.len() > self.capacity {
            return false;
        }
        self.buf.extend_from_slice(data);
        true
    }

    /// 切出下一条完整报文（含长度前缀）
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.buf.len() <= LENGTH_PREFIX_LEN {
            return None;
        }
        let length = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        let total = usize::try_from(length).ok()?.checked_add(LENGTH_PREFIX_LEN)?;
        if self.buf.len() < total {
            return None;
        }
        Some(self.buf.split_to(total).freeze())
    }

    /// 清空残留数据，返回丢弃的字节数
    pub fn clear(&mut self) -> usize {
        let discarded = self.buf.len();
        self.buf.advance(discarded);
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body_len: usize, fill: u8) -> Vec<u8> {
        let mut bytes = (body_len as u32).to_be_bytes().to_vec();
        bytes.extend(std::iter::repeat_n(fill, body_len));
        bytes
    }

    #[test]
    fn test_chunked_stream_yields_identical_frames() {
        let frames = vec![frame(10, 1), frame(14, 2), frame(40, 3)];
        let stream: Vec<u8> = frames.concat();

        for chunk_size in 1..=stream.len() {
            let mut buffer = FrameBuffer::with_capacity(1024);
            let mut out = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                assert!(buffer.push(chunk));
                while let Some(next) = buffer.next_frame() {
                    out.push(next.to_vec());
                }
            }
            assert_eq!(out, frames, "chunk size {chunk_size}");
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_partial_frame_waits_for_rest() {
        let mut buffer = FrameBuffer::with_capacity(100);
        let full = frame(10, 9);
        assert!(buffer.push(&full[..8]));
        assert!(buffer.next_frame().is_none());
        assert!(buffer.push(&full[8..]));
        assert_eq!(buffer.next_frame().expect("frame").to_vec(), full);
    }

    #[test]
    fn test_overflowing_chunk_is_dropped() {
        let mut buffer = FrameBuffer::with_capacity(20);
        assert!(buffer.push(&[0, 0, 0, 10]));
        assert!(!buffer.push(&[0u8; 17]));
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.clear(), 4);
        assert!(buffer.is_empty());
    }
}
