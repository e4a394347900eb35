//! 编解码器属性测试
//!
//! 使用 proptest 验证：
//! - 所有帧类型编码后解码字段完全一致
//! - 任意分片接收不影响解码结果
//! - 帧间噪声不会导致有效帧丢失

use ldm_protocol::{
    DeviceStatus, FrameCodec, MeskernelCodec, Register, ResponseFrame, SerialNumber, VersionKind,
};
use proptest::prelude::*;

fn decode_all(codec: &mut MeskernelCodec, bytes: &[u8]) -> Vec<ResponseFrame> {
    codec.decode(bytes).filter_map(Result::ok).collect()
}

fn round_trip(frame: &ResponseFrame) -> ResponseFrame {
    let mut codec = MeskernelCodec::new();
    let wire = codec.encode_response(frame);
    let mut frames = decode_all(&mut codec, &wire);
    assert_eq!(frames.len(), 1, "exactly one frame expected");
    frames.remove(0)
}

proptest! {
    /// 测量帧往返
    #[test]
    fn measurement_round_trip(distance in any::<u32>(), raw_quality in any::<u16>()) {
        let frame = ResponseFrame::new_measurement(distance, raw_quality);
        let decoded = round_trip(&frame);
        prop_assert_eq!(&decoded, &frame);
        let m = decoded.measurement().unwrap();
        prop_assert_eq!(m.distance_mm, distance);
        prop_assert_eq!(m.raw_quality, raw_quality);
        prop_assert!(m.quality <= 100);
    }

    /// 状态帧往返
    #[test]
    fn status_round_trip(code in any::<u16>()) {
        let frame = ResponseFrame::new_status(DeviceStatus::from_code(code));
        let decoded = round_trip(&frame);
        prop_assert_eq!(decoded.status().map(|s| s.code()), Some(code));
    }

    /// 版本帧往返
    #[test]
    fn version_round_trip(value in any::<u16>(), hardware in any::<bool>()) {
        let kind = if hardware { VersionKind::Hardware } else { VersionKind::Software };
        let frame = ResponseFrame::new_version(kind, value);
        prop_assert_eq!(round_trip(&frame), frame);
    }

    /// 序列号帧往返
    #[test]
    fn serial_round_trip(raw in any::<[u8; 4]>()) {
        let frame = ResponseFrame::new_serial(SerialNumber(raw));
        prop_assert_eq!(round_trip(&frame), frame);
    }

    /// 电压帧往返（BCD 编码，0-9999 mV）
    #[test]
    fn voltage_round_trip(mv in 0u32..=9999) {
        let frame = ResponseFrame::new_voltage(mv);
        prop_assert_eq!(round_trip(&frame), frame);
    }

    /// 激光应答帧往返
    #[test]
    fn laser_ack_round_trip(on in any::<bool>()) {
        let frame = ResponseFrame::new_ack(Register::Laser, u16::from(on));
        prop_assert_eq!(round_trip(&frame), frame);
    }

    /// 任意分片接收得到相同的帧序列
    #[test]
    fn chunking_does_not_change_frames(
        samples in prop::collection::vec((any::<u32>(), 0u16..=100), 1..20),
        chunk in 1usize..17,
    ) {
        let encoder = MeskernelCodec::new();
        let expected: Vec<_> = samples
            .iter()
            .map(|(d, q)| ResponseFrame::new_measurement(*d, *q))
            .collect();
        let wire: Vec<u8> = expected
            .iter()
            .flat_map(|f| encoder.encode_response(f).to_vec())
            .collect();

        let mut decoder = MeskernelCodec::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            decoded.extend(decode_all(&mut decoder, piece));
        }
        prop_assert_eq!(decoded, expected);
        prop_assert_eq!(decoder.buffered_len(), 0);
    }

    /// 帧间噪声（不含帧头字节）被丢弃，有效帧全部保留
    #[test]
    fn noise_between_frames_is_skipped(
        noise in prop::collection::vec(0u8..0xAA, 0..32),
        distances in prop::collection::vec(any::<u32>(), 1..8),
    ) {
        let encoder = MeskernelCodec::new();
        let mut wire = Vec::new();
        for d in &distances {
            wire.extend_from_slice(&noise);
            wire.extend_from_slice(&encoder.encode_response(&ResponseFrame::new_measurement(*d, 50)));
        }

        let mut decoder = MeskernelCodec::new();
        let decoded: Vec<u32> = decode_all(&mut decoder, &wire)
            .iter()
            .filter_map(|f| f.measurement().map(|m| m.distance_mm))
            .collect();
        prop_assert_eq!(decoded, distances);
    }
}
