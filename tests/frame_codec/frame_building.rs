//! Tests for HTTP/2 frame building

use h2_stream_server::frame::{self, FRAME_HEADER_SIZE};
use h2_stream_server::{error_code, flags, frame_type, Frame, FrameHeader};

#[test]
fn test_headers_frame_sets_end_headers() {
    let mut out = Vec::new();
    frame::write_headers_frame(&mut out, 3, &[0x88], false).unwrap();

    let header = FrameHeader::parse(&out).unwrap();
    assert_eq!(header.length, 1);
    assert_eq!(header.frame_type, frame_type::HEADERS);
    assert_eq!(header.flags, flags::END_HEADERS);
    assert_eq!(header.stream_id, 3);
    assert_eq!(out[FRAME_HEADER_SIZE], 0x88);
}

#[test]
fn test_data_frame_end_stream() {
    let mut out = Vec::new();
    frame::write_data_frame(&mut out, 1, b"body", true).unwrap();

    assert_eq!(
        Frame::decode(&out).unwrap(),
        Frame::Data {
            stream_id: 1,
            end_stream: true,
            payload: b"body".to_vec(),
        }
    );
}

#[test]
fn test_frames_append_to_buffer() {
    let mut out = Vec::new();
    frame::write_headers_frame(&mut out, 1, &[0x88], false).unwrap();
    frame::write_data_frame(&mut out, 1, b"", true).unwrap();
    assert_eq!(out.len(), 2 * FRAME_HEADER_SIZE + 1);
}

#[test]
fn test_ping_ack_echoes_payload_and_stream() {
    let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
    let out = frame::ping_ack(0, data);
    assert_eq!(out.len(), 17);
    assert_eq!(out[3], frame_type::PING);
    assert_eq!(out[4], flags::ACK);
    assert_eq!(&out[9..], &data);
}

#[test]
fn test_window_update() {
    let out = frame::window_update(7, 32_768);
    assert_eq!(
        Frame::decode(&out).unwrap(),
        Frame::WindowUpdate {
            stream_id: 7,
            increment: 32_768,
        }
    );
}

#[test]
fn test_rst_stream() {
    let out = frame::rst_stream(1, error_code::REFUSED_STREAM);
    assert_eq!(out.len(), 13);
    assert_eq!(out[3], frame_type::RST_STREAM);
    assert_eq!(&out[9..], &[0, 0, 0, 7]);
}

#[test]
fn test_goaway() {
    let out = frame::goaway(5, error_code::PROTOCOL_ERROR);
    assert_eq!(out.len(), 17);
    assert_eq!(out[3], frame_type::GOAWAY);
    assert_eq!(&out[9..13], &[0, 0, 0, 5]);
    assert_eq!(&out[13..], &[0, 0, 0, 1]);
}

#[test]
fn test_settings_and_ack() {
    let out = frame::settings(&[(0x4, 1_048_576)]);
    assert_eq!(out.len(), 15);
    assert_eq!(&out[9..11], &[0, 4]);

    let ack = frame::settings_ack();
    assert_eq!(ack, vec![0, 0, 0, frame_type::SETTINGS, flags::ACK, 0, 0, 0, 0]);
}
