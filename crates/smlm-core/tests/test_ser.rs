mod common;

use smlm_core::error::SmlmError;
use smlm_core::io::image_seq::ImageSequence;
use smlm_core::io::ser::{SerHeader, SerReader};
use smlm_core::io::ser_writer::SerWriter;
use smlm_core::io::FrameProvider;
use smlm_core::pipeline::{analyze_stack, NoOpReporter};

use common::{build_ser_header, build_ser_u16, single_spot_frame, test_config, to_u16, write_test_ser};

#[test]
fn test_read_16bit_raw_counts() {
    let frames = vec![vec![0u16, 1000, 4095, 65535], vec![7, 8, 9, 10]];
    let file = write_test_ser(&build_ser_u16(2, 2, &frames));
    let mut reader = SerReader::open(file.path()).unwrap();

    assert_eq!(FrameProvider::frame_count(&reader), 2);
    assert_eq!(reader.width(), 2);
    assert_eq!(reader.height(), 2);

    let pixels = reader.get_pixels(0).unwrap();
    assert_eq!(pixels.get(0, 0), 0.0);
    assert_eq!(pixels.get(1, 0), 1000.0);
    assert_eq!(pixels.get(0, 1), 4095.0);
    assert_eq!(pixels.get(1, 1), 65535.0);
    assert_eq!(reader.get_pixels(1).unwrap().get(1, 1), 10.0);
}

#[test]
fn test_read_8bit() {
    let mut data = build_ser_header(3, 1, 8, 1);
    data.extend_from_slice(&[5, 200, 255]);
    let file = write_test_ser(&data);
    let reader = SerReader::open(file.path()).unwrap();
    let pixels = reader.read_pixels(0).unwrap();
    assert_eq!(pixels.get(1, 0), 200.0);
    assert_eq!(pixels.get(2, 0), 255.0);
}

#[test]
fn test_source_info() {
    let file = write_test_ser(&build_ser_u16(4, 3, &[vec![0; 12]]));
    let reader = SerReader::open(file.path()).unwrap();
    let info = reader.source_info(file.path());
    assert_eq!(info.total_frames, 1);
    assert_eq!((info.width, info.height), (4, 3));
    assert_eq!(info.bit_depth, 16);
    assert!(info.description.contains("TIRF1"));
}

#[test]
fn test_frame_out_of_range() {
    let file = write_test_ser(&build_ser_u16(2, 2, &[vec![1, 2, 3, 4]]));
    let mut reader = SerReader::open(file.path()).unwrap();
    assert!(matches!(
        reader.get_pixels(1),
        Err(SmlmError::FrameIndexOutOfRange { index: 1, total: 1 })
    ));
}

#[test]
fn test_rejects_bad_files() {
    let mut data = build_ser_u16(2, 2, &[vec![1, 2, 3, 4]]);
    data[0] = b'X';
    let file = write_test_ser(&data);
    assert!(matches!(SerReader::open(file.path()), Err(SmlmError::InvalidSer(_))));

    // Header promises two frames, only one present.
    let mut data = build_ser_header(2, 2, 16, 2);
    data.extend_from_slice(&[0u8; 8]);
    let file = write_test_ser(&data);
    assert!(matches!(SerReader::open(file.path()), Err(SmlmError::InvalidSer(_))));

    let file = write_test_ser(b"LUCAM");
    assert!(SerReader::open(file.path()).is_err());
}

#[test]
fn test_writer_roundtrip_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.ser");
    let samples = to_u16(&single_spot_frame());

    let header = SerHeader::mono(16, 16, 16, 2);
    let mut writer = SerWriter::create(&path, &header).unwrap();
    writer.write_frame(&samples).unwrap();
    writer.write_frame(&samples).unwrap();
    assert!(writer.write_frame(&samples).is_err());
    writer.finalize().unwrap();

    let mut reader = SerReader::open(&path).unwrap();
    assert_eq!(reader.get_pixels(1).unwrap().get(8, 8), samples[8 * 16 + 8] as f32);

    let params = test_config().validate().unwrap();
    let output = analyze_stack(&mut reader, &params, None, &NoOpReporter).unwrap();
    assert_eq!(output.total_localizations(), 2);
    assert_eq!(
        output.dataset.column("frame").unwrap().to_vec(),
        vec![1.0, 2.0]
    );
}

#[test]
fn test_writer_rejects_wrong_frame_size() {
    let dir = tempfile::tempdir().unwrap();
    let header = SerHeader::mono(4, 4, 16, 1);
    let mut writer = SerWriter::create(&dir.path().join("bad.ser"), &header).unwrap();
    assert!(matches!(
        writer.write_frame(&[0u16; 15]),
        Err(SmlmError::InvalidDimensions { .. })
    ));
}

#[test]
fn test_writer_finalize_rejects_missing_frames() {
    let dir = tempfile::tempdir().unwrap();
    let header = SerHeader::mono(4, 4, 16, 3);
    let mut writer = SerWriter::create(&dir.path().join("short.ser"), &header).unwrap();
    writer.write_frame(&[5u16; 16]).unwrap();
    match writer.finalize() {
        Err(SmlmError::InvalidSer(msg)) => assert!(msg.contains("1 of 3"), "{msg}"),
        other => panic!("expected InvalidSer, got {other:?}"),
    }
}

#[test]
fn test_image_sequence_8bit_raw_values() {
    let dir = tempfile::tempdir().unwrap();
    image::ImageBuffer::<image::Luma<u8>, Vec<u8>>::from_pixel(8, 8, image::Luma([7u8]))
        .save(dir.path().join("frame.png"))
        .unwrap();

    let mut seq = ImageSequence::from_dir(dir.path()).unwrap();
    let pixels = seq.get_pixels(0).unwrap();
    assert_eq!(pixels.get(0, 0), 7.0);
    assert_eq!(pixels.get(7, 7), 7.0);
    assert_eq!(seq.source_info(dir.path()).bit_depth, 8);
}

#[test]
fn test_image_sequence_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    let samples = to_u16(&single_spot_frame());
    for name in ["frame_002.png", "frame_001.png"] {
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(16, 16, samples.clone())
            .unwrap();
        img.save(dir.path().join(name)).unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

    let mut seq = ImageSequence::from_dir(dir.path()).unwrap();
    assert_eq!(seq.frame_count(), 2);
    assert!(seq.paths()[0].ends_with("frame_001.png"));
    assert_eq!((seq.width(), seq.height()), (16, 16));
    let pixels = seq.get_pixels(0).unwrap();
    assert_eq!(pixels.get(8, 8), samples[8 * 16 + 8] as f32);
    assert_eq!(seq.source_info(dir.path()).bit_depth, 16);
    assert!(seq.get_pixels(2).is_err());
}

#[test]
fn test_image_sequence_size_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::new(8, 8)
        .save(dir.path().join("a.png"))
        .unwrap();
    image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::new(6, 8)
        .save(dir.path().join("b.png"))
        .unwrap();
    let mut seq = ImageSequence::from_dir(dir.path()).unwrap();
    assert!(seq.get_pixels(0).is_ok());
    assert!(matches!(
        seq.get_pixels(1),
        Err(SmlmError::FrameAccess { index: 1, .. })
    ));
}
