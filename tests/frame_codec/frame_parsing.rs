//! Tests for HTTP/2 frame header and frame parsing

use h2_stream_server::{flags, frame_type, Error, Frame, FrameHeader};

#[test]
fn test_header_fields_are_big_endian() {
    // length 0x012345, HEADERS, END_HEADERS | END_STREAM, stream 0x00ABCDEF
    let bytes = [0x01, 0x23, 0x45, 0x01, 0x05, 0x00, 0xAB, 0xCD, 0xEF];
    let header = FrameHeader::parse(&bytes).unwrap();

    assert_eq!(header.length, 0x012345);
    assert_eq!(header.frame_type, frame_type::HEADERS);
    assert_eq!(header.flags, flags::END_HEADERS | flags::END_STREAM);
    assert_eq!(header.stream_id, 0x00AB_CDEF);
    assert_eq!(header.encode(), bytes);
}

#[test]
fn test_reserved_bit_is_masked() {
    let header = FrameHeader::parse(&[0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
    assert_eq!(header.stream_id, 0x7FFF_FFFF);

    let encoded = FrameHeader::new(frame_type::DATA, 0, 0, 0xFFFF_FFFF).encode();
    assert_eq!(&encoded[5..], &[0x7F, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_parse_rejects_short_header() {
    assert!(matches!(FrameHeader::parse(&[0; 8]), Err(Error::Frame(_))));
}

#[test]
fn test_decode_data_frame() {
    let frame = [0, 0, 5, 0, 1, 0, 0, 0, 1, b'h', b'e', b'l', b'l', b'o'];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::Data {
            stream_id: 1,
            end_stream: true,
            payload: b"hello".to_vec(),
        }
    );
}

#[test]
fn test_decode_padded_data_frame() {
    // PADDED, pad length 2, "hi", two pad bytes
    let frame = [0, 0, 5, 0, flags::PADDED, 0, 0, 0, 3, 2, b'h', b'i', 0, 0];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::Data {
            stream_id: 3,
            end_stream: false,
            payload: b"hi".to_vec(),
        }
    );
}

#[test]
fn test_decode_empty_data_frame() {
    let frame = [0, 0, 0, 0, 1, 0, 0, 0, 1];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::Data {
            stream_id: 1,
            end_stream: true,
            payload: vec![],
        }
    );
}

#[test]
fn test_decode_headers_frame() {
    let frame = [0, 0, 3, 1, 0x05, 0, 0, 0, 1, 0x82, 0x86, 0x84];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::Headers {
            stream_id: 1,
            end_stream: true,
            header_block: vec![0x82, 0x86, 0x84],
        }
    );
}

#[test]
fn test_decode_ping() {
    let frame = [0, 0, 8, 6, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::Ping {
            ack: false,
            stream_id: 0,
            payload: [1, 2, 3, 4, 5, 6, 7, 8],
        }
    );
}

#[test]
fn test_ping_with_wrong_length_is_rejected() {
    let frame = [0, 0, 4, 6, 0, 0, 0, 0, 0, 1, 2, 3, 4];
    assert!(matches!(Frame::decode(&frame), Err(Error::Frame(_))));
}

#[test]
fn test_decode_window_update_masks_reserved_bit() {
    let frame = [0, 0, 4, 8, 0, 0, 0, 0, 0, 0x80, 0x00, 0x10, 0x00];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::WindowUpdate {
            stream_id: 0,
            increment: 4096,
        }
    );
}

#[test]
fn test_window_update_too_short() {
    let frame = [0, 0, 2, 8, 0, 0, 0, 0, 0, 0, 1];
    assert!(matches!(Frame::decode(&frame), Err(Error::Frame(_))));
}

#[test]
fn test_decode_rst_stream() {
    let frame = [0, 0, 4, 3, 0, 0, 0, 0, 5, 0, 0, 0, 8];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::RstStream {
            stream_id: 5,
            error_code: 8,
        }
    );
}

#[test]
fn test_goaway_is_unsupported() {
    let frame = [0, 0, 8, 7, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0];
    assert_eq!(
        Frame::decode(&frame).unwrap(),
        Frame::Unsupported {
            frame_type: frame_type::GOAWAY,
            stream_id: 0,
        }
    );
}

#[test]
fn test_unknown_frame_type_is_unsupported() {
    let frame = [0, 0, 1, 0xEE, 0, 0, 0, 0, 1, 0];
    assert_eq!(Frame::decode(&frame).unwrap().stream_id(), 1);
}
