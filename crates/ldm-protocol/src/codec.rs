//! 帧编解码器
//!
//! [`FrameCodec`] 是可插拔的编解码接口，[`MeskernelCodec`] 实现 LDJ100-755 串口协议：
//!
//! ```text
//! 读请求:  AA 80 <reg_hi> <reg_lo> <chk>
//! 写请求:  AA 00 <reg_hi> <reg_lo> <cnt_hi> <cnt_lo> <payload: cnt*2> <chk>
//! 响应:    AA <addr> <reg_hi> <reg_lo> <cnt_hi> <cnt_lo> <payload: cnt*2> <chk>
//! 退出连续测量: 58 ('X')
//! ```
//!
//! `chk` 为帧头之后所有字节之和的低 8 位。
//!
//! 解码器跨调用缓存半帧；遇到校验和错误或异常长度时丢弃当前帧头字节并重新扫描，
//! 因此损坏帧不会吞掉后续的有效帧。解码从不阻塞。

use crate::constants::*;
use crate::{Command, Opcode, ProtocolError, ResponseFrame};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// 帧头之后所有字节之和（mod 256）
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 可插拔编解码接口
pub trait FrameCodec: Send {
    /// 命令编码为线上字节
    fn encode(&self, command: &Command) -> Bytes;

    /// 响应帧编码为线上字节（模拟设备和测试使用）
    fn encode_response(&self, frame: &ResponseFrame) -> Bytes;

    /// 追加接收到的字节
    fn push_bytes(&mut self, data: &[u8]);

    /// 取出下一个完整帧
    ///
    /// - `None`：缓冲区内没有完整帧（半帧保留到下次调用）
    /// - `Some(Err(_))`：检测到损坏帧，已丢弃
    fn next_frame(&mut self) -> Option<Result<ResponseFrame, ProtocolError>>;

    /// 当前缓存的字节数
    fn buffered_len(&self) -> usize;

    /// 清空缓存（新会话开始时调用）
    fn reset(&mut self);

    /// 追加字节并返回帧迭代器
    fn decode(&mut self, data: &[u8]) -> Frames<'_, Self>
    where
        Self: Sized,
    {
        self.push_bytes(data);
        Frames::new(self)
    }
}

/// 惰性帧迭代器，迭代到缓冲区没有完整帧为止
pub struct Frames<'a, C: FrameCodec + ?Sized> {
    codec: &'a mut C,
}

impl<'a, C: FrameCodec + ?Sized> Frames<'a, C> {
    pub fn new(codec: &'a mut C) -> Self {
        Self { codec }
    }
}

impl<C: FrameCodec + ?Sized> Iterator for Frames<'_, C> {
    type Item = Result<ResponseFrame, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.codec.next_frame()
    }
}

/// 编解码配置
#[derive(Debug, Clone, Copy)]
pub struct CodecConfig {
    /// 单帧允许的最大负载字数
    pub max_payload_words: u16,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_words: DEFAULT_MAX_PAYLOAD_WORDS,
        }
    }
}

/// Meskernel LDJ100-755 编解码器
#[derive(Debug, Default)]
pub struct MeskernelCodec {
    buf: BytesMut,
    config: CodecConfig,
    discarded_bytes: u64,
}

impl MeskernelCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// 重同步过程中丢弃的字节总数
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// 识别一条由 [`FrameCodec::encode`] 生成的请求
    pub fn parse_request(&self, bytes: &[u8]) -> Option<Opcode> {
        Opcode::ALL
            .into_iter()
            .find(|op| self.encode(&Command::new(*op)).as_ref() == bytes)
    }

    fn drop_bytes(&mut self, n: usize) {
        self.buf.advance(n);
        self.discarded_bytes += n as u64;
    }
}

impl FrameCodec for MeskernelCodec {
    fn encode(&self, command: &Command) -> Bytes {
        let opcode = command.opcode;
        let Some(register) = opcode.register() else {
            return Bytes::from_static(&[EXIT_CONTINUOUS_BYTE]);
        };

        let mut out = BytesMut::with_capacity(FRAME_OVERHEAD + WORD_SIZE);
        out.put_u8(FRAME_HEADER);
        match opcode.payload() {
            Some(word) => {
                out.put_u8(ADDR_WRITE);
                out.put_u16(register.addr());
                out.put_u16(1);
                out.put_u16(word);
            },
            None => {
                out.put_u8(ADDR_READ);
                out.put_u16(register.addr());
            },
        }
        let chk = checksum(&out[1..]);
        out.put_u8(chk);
        out.freeze()
    }

    fn encode_response(&self, frame: &ResponseFrame) -> Bytes {
        let mut out = BytesMut::with_capacity(FRAME_OVERHEAD + frame.payload.len());
        out.put_u8(FRAME_HEADER);
        out.put_u8(frame.address);
        out.put_u16(frame.register);
        out.put_u16((frame.payload.len() / WORD_SIZE) as u16);
        out.put_slice(&frame.payload);
        let chk = checksum(&out[1..]);
        out.put_u8(chk);
        out.freeze()
    }

    fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn next_frame(&mut self) -> Option<Result<ResponseFrame, ProtocolError>> {
        // 1. 对齐到帧头
        match self.buf.iter().position(|b| *b == FRAME_HEADER) {
            Some(0) => {},
            Some(offset) => self.drop_bytes(offset),
            None => {
                let len = self.buf.len();
                self.drop_bytes(len);
                return None;
            },
        }

        if self.buf.len() < FRAME_PREFIX_LEN {
            return None;
        }

        // 2. 长度检查
        let count = u16::from_be_bytes([self.buf[4], self.buf[5]]);
        if count > self.config.max_payload_words {
            self.drop_bytes(1);
            return Some(Err(ProtocolError::PayloadTooLong {
                count,
                max: self.config.max_payload_words,
            }));
        }

        let total = FRAME_OVERHEAD + usize::from(count) * WORD_SIZE;
        if self.buf.len() < total {
            return None;
        }

        // 3. 校验和
        let expected = checksum(&self.buf[1..total - 1]);
        let actual = self.buf[total - 1];
        let register = u16::from_be_bytes([self.buf[2], self.buf[3]]);
        if expected != actual {
            self.drop_bytes(1);
            return Some(Err(ProtocolError::ChecksumMismatch {
                register,
                expected,
                actual,
            }));
        }

        // 4. 完整帧出队并解析
        let mut frame = self.buf.split_to(total).freeze();
        let address = frame[1];
        frame.advance(FRAME_PREFIX_LEN);
        frame.truncate(total - FRAME_OVERHEAD);
        Some(ResponseFrame::parse(address, register, frame))
    }

    fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MeasureSpeed, ResponseBody, VersionKind};

    #[test]
    fn test_encode_read_commands() {
        let codec = MeskernelCodec::new();
        assert_eq!(
            codec.encode(&Command::read_status()).as_ref(),
            &[0xAA, 0x80, 0x00, 0x00, 0x80]
        );
        assert_eq!(
            codec.encode(&Command::read_version(VersionKind::Hardware)).as_ref(),
            &[0xAA, 0x80, 0x00, 0x0A, 0x8A]
        );
        assert_eq!(
            codec.encode(&Command::read_last_measurement()).as_ref(),
            &[0xAA, 0x80, 0x00, 0x22, 0xA2]
        );
    }

    #[test]
    fn test_encode_write_commands() {
        let codec = MeskernelCodec::new();
        assert_eq!(
            codec.encode(&Command::single_measure(MeasureSpeed::Auto)).as_ref(),
            &[0xAA, 0x00, 0x00, 0x20, 0x00, 0x01, 0x00, 0x00, 0x21]
        );
        assert_eq!(
            codec.encode(&Command::continuous_start(MeasureSpeed::Fast)).as_ref(),
            &[0xAA, 0x00, 0x00, 0x20, 0x00, 0x01, 0x00, 0x06, 0x27]
        );
        assert_eq!(
            codec.encode(&Command::laser_on()).as_ref(),
            &[0xAA, 0x00, 0x01, 0xBE, 0x00, 0x01, 0x00, 0x01, 0xC1]
        );
        assert_eq!(
            codec.encode(&Command::laser_off()).as_ref(),
            &[0xAA, 0x00, 0x01, 0xBE, 0x00, 0x01, 0x00, 0x00, 0xC0]
        );
        assert_eq!(codec.encode(&Command::continuous_stop()).as_ref(), b"X");
    }

    #[test]
    fn test_decode_measurement_frame() {
        // 1500 mm，质量 80
        let bytes = [
            0xAA, 0x00, 0x00, 0x22, 0x00, 0x03, 0x00, 0x00, 0x05, 0xDC, 0x00, 0x50, 0x00,
        ];
        let mut raw = bytes;
        raw[12] = checksum(&raw[1..12]);

        let mut codec = MeskernelCodec::new();
        let frames: Vec<_> = codec.decode(&raw).collect();
        assert_eq!(frames.len(), 1);
        let frame = frames[0].as_ref().unwrap();
        let m = frame.measurement().unwrap();
        assert_eq!(m.distance_mm, 1500);
        assert_eq!(m.quality, 80);
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_partial_frame_held_across_calls() {
        let codec_tx = MeskernelCodec::new();
        let wire = codec_tx.encode_response(&ResponseFrame::new_measurement(1234, 90));

        let mut codec = MeskernelCodec::new();
        assert_eq!(codec.decode(&wire[..5]).count(), 0);
        assert_eq!(codec.buffered_len(), 5);
        let frames: Vec<_> = codec.decode(&wire[5..]).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().measurement().unwrap().distance_mm, 1234);
    }

    #[test]
    fn test_resync_after_corrupt_frame() {
        let codec = MeskernelCodec::new();
        let good = codec.encode_response(&ResponseFrame::new_measurement(1000, 50));
        let mut bad = codec.encode_response(&ResponseFrame::new_measurement(2000, 50)).to_vec();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut stream = vec![0x01, 0x02];
        stream.extend_from_slice(&bad);
        stream.extend_from_slice(&good);

        let mut decoder = MeskernelCodec::new();
        let results: Vec<_> = decoder.decode(&stream).collect();
        let frames: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].measurement().unwrap().distance_mm, 1000);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(ProtocolError::ChecksumMismatch { .. })))
        );
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_oversized_count_triggers_resync() {
        let codec = MeskernelCodec::new();
        let good = codec.encode_response(&ResponseFrame::new_status(crate::DeviceStatus::Ok));
        let mut stream = vec![0xAA, 0x00, 0x00, 0x22, 0x7F, 0xFF];
        stream.extend_from_slice(&good);

        let mut decoder = MeskernelCodec::new();
        let results: Vec<_> = decoder.decode(&stream).collect();
        assert!(matches!(results[0], Err(ProtocolError::PayloadTooLong { .. })));
        let last = results.last().unwrap().as_ref().unwrap();
        assert_eq!(last.body, ResponseBody::Status(crate::DeviceStatus::Ok));
    }

    #[test]
    fn test_garbage_without_header_is_dropped() {
        let mut decoder = MeskernelCodec::new();
        assert_eq!(decoder.decode(&[0x58, 0x01, 0x02]).count(), 0);
        assert_eq!(decoder.buffered_len(), 0);
        assert_eq!(decoder.discarded_bytes(), 3);
    }

    #[test]
    fn test_parse_request() {
        let codec = MeskernelCodec::new();
        for op in Opcode::ALL {
            let bytes = codec.encode(&Command::new(op));
            assert_eq!(codec.parse_request(&bytes), Some(op));
        }
        assert_eq!(codec.parse_request(&[0xAA, 0x80]), None);
    }
}
