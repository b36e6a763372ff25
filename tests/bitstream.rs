//! Frame layout: tags, start codes, partition sizes and error reporting.

mod common;

use common::{gradient, parse_tag, textured};
use zenvp8::{
    ConfigError, EncodeError, EncoderConfig, FrameOptions, FrameType, InputError, Partitions,
    PlaneView, Vp8Encoder, YuvFrame,
};

/// Bytes before the first partition.
fn prefix_len(keyframe: bool) -> usize {
    if keyframe {
        10
    } else {
        3
    }
}

fn check_layout(encoded: &zenvp8::EncodedFrame) {
    let data = &encoded.data;
    let tag = parse_tag(data);
    assert_eq!(tag.keyframe, encoded.is_keyframe());
    assert_eq!(tag.show, encoded.shown);
    assert_eq!(tag.version, 0);
    assert_eq!(tag.first_partition_size, encoded.first_partition_size);

    let count = encoded.partition_sizes.len();
    let sizes_at = prefix_len(tag.keyframe) + encoded.first_partition_size;
    for (i, &size) in encoded.partition_sizes[..count - 1].iter().enumerate() {
        let at = sizes_at + 3 * i;
        let stored = usize::from(data[at])
            | usize::from(data[at + 1]) << 8
            | usize::from(data[at + 2]) << 16;
        assert_eq!(stored, size, "partition {i}");
    }
    let total = sizes_at + 3 * (count - 1) + encoded.partition_sizes.iter().sum::<usize>();
    assert_eq!(total, encoded.len());
}

#[test]
fn keyframe_header_fields() {
    let picture = gradient(200, 100, 0);
    let mut encoder = Vp8Encoder::new(EncoderConfig::new(200, 100)).unwrap();
    let encoded = encoder
        .encode(&picture.frame(), &FrameOptions::default())
        .unwrap();
    assert_eq!(encoded.frame_type, FrameType::Key);
    assert_eq!(&encoded.data[3..6], &[0x9d, 0x01, 0x2a]);
    assert_eq!(u16::from_le_bytes([encoded.data[6], encoded.data[7]]), 200);
    assert_eq!(u16::from_le_bytes([encoded.data[8], encoded.data[9]]), 100);
    assert_eq!(encoded.quantizer, 40);
    assert_eq!(encoded.partition_sizes.len(), 1);
    check_layout(&encoded);
}

#[test]
fn inter_frames_have_a_short_prefix() {
    let mut encoder = Vp8Encoder::new(
        EncoderConfig::new(64, 64).with_partitions(Partitions::Four),
    )
    .unwrap();
    for shift in 0..4 {
        let picture = textured(64, 64, shift, 0);
        let encoded = encoder
            .encode(&picture.frame(), &FrameOptions::default())
            .unwrap();
        assert_eq!(encoded.is_keyframe(), shift == 0);
        assert_eq!(encoded.partition_sizes.len(), 4);
        check_layout(&encoded);
    }
    assert_eq!(encoder.frame_count(), 4);
}

#[test]
fn hidden_frames_clear_the_show_flag() {
    let picture = gradient(32, 32, 0);
    let mut encoder = Vp8Encoder::new(EncoderConfig::new(32, 32)).unwrap();
    encoder
        .encode(&picture.frame(), &FrameOptions::default())
        .unwrap();
    let hidden = encoder
        .encode(
            &picture.frame(),
            &FrameOptions::default().with_show_frame(false),
        )
        .unwrap();
    assert!(!hidden.shown);
    assert!(!parse_tag(&hidden.data).show);
    check_layout(&hidden);
}

#[test]
fn per_frame_quantizer_override() {
    let picture = textured(48, 48, 0, 0);
    let mut encoder = Vp8Encoder::new(EncoderConfig::new(48, 48)).unwrap();
    let coarse = encoder
        .encode(&picture.frame(), &FrameOptions::keyframe().with_quantizer(120))
        .unwrap();
    let fine = encoder
        .encode(&picture.frame(), &FrameOptions::keyframe().with_quantizer(5))
        .unwrap();
    assert_eq!((coarse.quantizer, fine.quantizer), (120, 5));
    assert!(coarse.len() < fine.len());
    assert!(coarse.stats.psnr_y < fine.stats.psnr_y);

    let err = encoder
        .encode(&picture.frame(), &FrameOptions::default().with_quantizer(128))
        .unwrap_err();
    assert!(matches!(
        err,
        EncodeError::Config(ConfigError::QuantizerOutOfRange(128))
    ));
}

#[test]
fn stats_count_every_macroblock() {
    let picture = textured(80, 48, 0, 0);
    let mut encoder = Vp8Encoder::new(EncoderConfig::new(80, 48)).unwrap();
    for _ in 0..2 {
        let encoded = encoder
            .encode(&picture.frame(), &FrameOptions::default())
            .unwrap();
        let stats = &encoded.stats;
        assert_eq!(stats.intra_mbs + stats.inter_mbs, 15);
        assert!(stats.skipped_mbs <= 15);
        assert!(stats.psnr_y > 25.0);
        if encoded.is_keyframe() {
            assert_eq!(stats.inter_mbs, 0);
        }
    }
}

#[test]
fn invalid_configurations_are_rejected() {
    let cases = [
        (
            EncoderConfig::new(0, 16),
            ConfigError::InvalidDimensions {
                width: 0,
                height: 16,
            },
        ),
        (
            EncoderConfig::new(16, 16).with_quantizer(200),
            ConfigError::QuantizerOutOfRange(200),
        ),
        (
            EncoderConfig::new(16, 16).with_segments(5),
            ConfigError::InvalidSegmentCount(5),
        ),
        (
            EncoderConfig::new(16, 16).with_sharpness(8),
            ConfigError::InvalidSharpness(8),
        ),
    ];
    for (config, expected) in cases {
        match Vp8Encoder::new(config) {
            Err(EncodeError::Config(err)) => assert_eq!(err, expected),
            other => panic!("expected {expected:?}, got {other:?}"),
        }
    }
    assert_eq!(
        Partitions::from_count(3),
        Err(ConfigError::InvalidPartitionCount(3))
    );
    assert_eq!(Partitions::from_count(8), Ok(Partitions::Eight));
}

#[test]
fn mismatched_input_is_rejected_without_advancing() {
    let mut encoder = Vp8Encoder::new(EncoderConfig::new(32, 32)).unwrap();
    let small = gradient(16, 32, 0);
    let err = encoder
        .encode(&small.frame(), &FrameOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        EncodeError::InvalidInput(InputError::DimensionMismatch { plane: "Y", .. })
    ));

    let luma = vec![0u8; 32 * 32];
    let chroma = vec![0u8; 16 * 16];
    let narrow = YuvFrame::new(
        PlaneView::new(&luma, 8, 32, 32),
        PlaneView::new(&chroma, 16, 16, 16),
        PlaneView::new(&chroma, 16, 16, 16),
    );
    let err = encoder
        .encode(&narrow, &FrameOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        EncodeError::InvalidInput(InputError::StrideTooSmall { .. })
    ));
    assert_eq!(encoder.frame_count(), 0);

    // Nothing was committed, so the next frame is still a keyframe.
    let picture = gradient(32, 32, 0);
    let encoded = encoder
        .encode(&picture.frame(), &FrameOptions::default())
        .unwrap();
    assert!(encoded.is_keyframe());
}

#[test]
fn strided_planes_encode_like_packed_ones() {
    let picture = gradient(40, 24, 2);
    let packed = Vp8Encoder::new(EncoderConfig::new(40, 24))
        .unwrap()
        .encode(&picture.frame(), &FrameOptions::default())
        .unwrap();

    let stride = 64;
    let mut luma = vec![0xaa; stride * 24];
    for y in 0..24 {
        luma[y * stride..][..40].copy_from_slice(&picture.data[y * 40..][..40]);
    }
    let frame = picture.frame();
    let strided = YuvFrame::new(PlaneView::new(&luma, stride, 40, 24), frame.u, frame.v);
    let encoded = Vp8Encoder::new(EncoderConfig::new(40, 24))
        .unwrap()
        .encode(&strided, &FrameOptions::default())
        .unwrap();
    assert_eq!(encoded.data, packed.data);
}

#[test]
fn encoding_is_deterministic() {
    let config = EncoderConfig::new(80, 48).with_segments(3);
    let run = || {
        let mut encoder = Vp8Encoder::new(config.clone()).unwrap();
        (0..3)
            .map(|shift| {
                let picture = textured(80, 48, shift, shift / 2);
                encoder
                    .encode(&picture.frame(), &FrameOptions::default())
                    .unwrap()
                    .data
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn coarser_quantizers_compress_harder() {
    let picture = textured(96, 96, 0, 0);
    let size = |q: u8| {
        Vp8Encoder::new(EncoderConfig::new(96, 96).with_quantizer(q))
            .unwrap()
            .encode(&picture.frame(), &FrameOptions::default())
            .unwrap()
            .len()
    };
    assert!(size(50) <= size(5));
    assert!(size(127) <= size(50));
}

#[test]
fn flat_frame_is_all_skipped() {
    let data = vec![128u8; 32 * 32 * 3 / 2];
    let frame = YuvFrame::from_i420(&data, 32, 32).unwrap();
    let mut encoder = Vp8Encoder::new(EncoderConfig::new(32, 32).with_quantizer(60)).unwrap();
    let encoded = encoder.encode(&frame, &FrameOptions::default()).unwrap();
    assert_eq!(encoded.stats.intra_mbs, 4);
    assert_eq!(encoded.stats.skipped_mbs, 4);
    assert!(encoded.len() < 64, "{} bytes", encoded.len());
    check_layout(&encoded);
}

#[test]
fn qcif_dimensions_survive_the_decoder() {
    let picture = gradient(176, 144, 0);
    let encoded = Vp8Encoder::new(EncoderConfig::new(176, 144))
        .unwrap()
        .encode(&picture.frame(), &FrameOptions::default())
        .unwrap();
    let width = u16::from_le_bytes([encoded.data[6], encoded.data[7]]);
    let height = u16::from_le_bytes([encoded.data[8], encoded.data[9]]);
    assert_eq!((width & 0x3fff, width >> 14), (176, 0));
    assert_eq!((height & 0x3fff, height >> 14), (144, 0));
    let (w, h, _) = common::decode_keyframe(&encoded.data);
    assert_eq!((w, h), (176, 144));
}
