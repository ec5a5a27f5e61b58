//! Outbound side: response descriptors to frames

use h2_stream_server::{
    frame_type, ContentEncoding, Error, FrameHeader, Request, Response, ServerConfig,
};

use crate::support::{connection, connection_with, decode_headers, get, headers, is_end_stream, split_frames, Collector};

fn take_response(app: &mut Collector) -> (Request, Response) {
    app.delivered.remove(0)
}

fn names(headers: &[(String, String)]) -> Vec<&str> {
    headers.iter().map(|(n, _)| n.as_str()).collect()
}

fn value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

fn body_of(frames: &[(FrameHeader, Vec<u8>)]) -> Vec<u8> {
    frames
        .iter()
        .filter(|(h, _)| h.frame_type == frame_type::DATA)
        .flat_map(|(_, payload)| payload.iter().copied())
        .collect()
}

#[test]
fn test_default_headers() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&get(1, "/"), &mut app).unwrap();
    let (_, mut response) = take_response(&mut app);
    response.set_body("<h1>hi</h1>");
    conn.send_response(&mut response).unwrap();

    let writes = &conn.transport().writes;
    assert_eq!(writes.len(), 1, "HEADERS and DATA go out in one write");
    let frames = split_frames(&writes[0]);
    assert_eq!(frames.len(), 2);

    let (headers_frame, block) = &frames[0];
    assert_eq!(headers_frame.frame_type, frame_type::HEADERS);
    assert_eq!(headers_frame.stream_id, 1);
    assert!(!is_end_stream(headers_frame));

    let mut client = fluke_hpack::Decoder::new();
    let fields = decode_headers(&mut client, block);
    assert_eq!(names(&fields), vec![":status", "server", "content-type", "date", "content-length"]);
    assert_eq!(value(&fields, ":status"), Some("200"));
    assert_eq!(value(&fields, "server"), Some("h2-stream-server"));
    assert_eq!(value(&fields, "content-length"), Some("11"));
    assert!(value(&fields, "date").is_some_and(|d| d.ends_with(" GMT")));

    let (data_frame, payload) = &frames[1];
    assert_eq!(data_frame.frame_type, frame_type::DATA);
    assert!(is_end_stream(data_frame));
    assert_eq!(payload, b"<h1>hi</h1>");
}

#[test]
fn test_options_response_carries_allow() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&headers(1, true, &[(":method", "OPTIONS"), (":path", "*")]), &mut app)
        .unwrap();
    let (_, mut response) = take_response(&mut app);
    conn.send_response(&mut response).unwrap();

    let frames = split_frames(&conn.transport().writes[0]);
    let fields = decode_headers(&mut fluke_hpack::Decoder::new(), &frames[0].1);
    assert_eq!(value(&fields, "allow"), Some("GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS"));
    assert!(value(&fields, "content-length").is_none());
}

#[test]
fn test_empty_body_sends_single_empty_data_frame() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&get(1, "/"), &mut app).unwrap();
    let (_, mut response) = take_response(&mut app);
    response.set_status(204);
    conn.send_response(&mut response).unwrap();

    let frames = split_frames(&conn.transport().writes[0]);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].0.length, 0);
    assert!(is_end_stream(&frames[1].0));
}

#[test]
fn test_large_body_split_at_max_frame_size() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&get(1, "/big"), &mut app).unwrap();
    let (_, mut response) = take_response(&mut app);
    let body: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    response.set_body(body.clone());
    conn.send_response(&mut response).unwrap();

    let frames = split_frames(&conn.transport().writes[0]);
    let data: Vec<&(FrameHeader, Vec<u8>)> = frames.iter().filter(|(h, _)| h.frame_type == frame_type::DATA).collect();
    assert_eq!(data.len(), 3);
    assert!(data.iter().all(|(h, _)| h.length as usize <= 16_384));
    assert!(!is_end_stream(&data[0].0));
    assert!(!is_end_stream(&data[1].0));
    assert!(is_end_stream(&data[2].0));
    assert_eq!(body_of(&frames), body);
}

#[test]
fn test_custom_headers_cookies_and_encoding() {
    let mut conn = connection_with(ServerConfig::default().with_server_software("edge/9"));
    let mut app = Collector::default();
    conn.feed(&get(1, "/"), &mut app).unwrap();
    let (_, mut response) = take_response(&mut app);
    response
        .set_status(201)
        .header("content-type", "application/json")
        .header("x-request-id", "abc")
        .cookie("sid=42; HttpOnly");
    response.set_body("{\"uncompressed\":true}");
    response.set_compressed(ContentEncoding::Gzip, vec![0x1f, 0x8b, 0x08]);
    conn.send_response(&mut response).unwrap();

    let frames = split_frames(&conn.transport().writes[0]);
    let fields = decode_headers(&mut fluke_hpack::Decoder::new(), &frames[0].1);
    assert_eq!(
        names(&fields),
        vec![
            ":status",
            "content-type",
            "x-request-id",
            "server",
            "content-length",
            "date",
            "set-cookie",
            "content-encoding",
        ]
    );
    assert_eq!(value(&fields, ":status"), Some("201"));
    assert_eq!(value(&fields, "server"), Some("edge/9"));
    assert_eq!(value(&fields, "content-length"), Some("3"));
    assert_eq!(value(&fields, "content-encoding"), Some("gzip"));
    assert_eq!(body_of(&frames), vec![0x1f, 0x8b, 0x08]);
}

#[test]
fn test_second_send_is_rejected() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&get(1, "/"), &mut app).unwrap();
    let (_, mut response) = take_response(&mut app);
    conn.send_response(&mut response).unwrap();

    assert!(matches!(conn.send_response(&mut response), Err(Error::HeadersAlreadySent(1))));
    assert_eq!(conn.transport().writes.len(), 1);
}

#[test]
fn test_write_failure_then_retry() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&get(1, "/"), &mut app).unwrap();
    let (_, mut response) = take_response(&mut app);
    response.set_body("retry me");

    conn.transport_mut().fail_next = true;
    assert!(matches!(conn.send_response(&mut response), Err(Error::Write { stream_id: 1, .. })));
    assert!(!response.is_header_sent());

    conn.send_response(&mut response).unwrap();
    assert!(response.is_header_sent());
    assert_eq!(body_of(&split_frames(&conn.transport().writes[0])), b"retry me");
}

#[test]
fn test_responses_share_one_client_decoder() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&get(1, "/a"), &mut app).unwrap();
    conn.feed(&get(3, "/b"), &mut app).unwrap();

    for (request, mut response) in std::mem::take(&mut app.delivered) {
        response.header("x-path", request.path());
        conn.send_response(&mut response).unwrap();
    }

    let mut client = fluke_hpack::Decoder::new();
    let paths: Vec<String> = conn
        .transport()
        .writes
        .iter()
        .map(|w| {
            let frames = split_frames(w);
            let fields = decode_headers(&mut client, &frames[0].1);
            value(&fields, "x-path").unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(paths, vec!["/a", "/b"]);
}

#[test]
fn test_response_after_later_requests() {
    // responses may be emitted in any order once requests complete
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&get(1, "/slow"), &mut app).unwrap();
    conn.feed(&get(3, "/fast"), &mut app).unwrap();
    let (_, mut slow) = take_response(&mut app);
    let (_, mut fast) = take_response(&mut app);

    conn.send_response(&mut fast).unwrap();
    conn.send_response(&mut slow).unwrap();

    let ids: Vec<u32> = conn
        .transport()
        .writes
        .iter()
        .map(|w| split_frames(w)[0].0.stream_id)
        .collect();
    assert_eq!(ids, vec![3, 1]);
}

#[test]
fn test_reset_and_go_away() {
    let mut conn = connection();
    let mut app = Collector::default();
    conn.feed(&headers(1, false, &[(":method", "POST"), (":path", "/")]), &mut app)
        .unwrap();
    conn.feed(&get(3, "/"), &mut app).unwrap();

    conn.reset_stream(1, h2_stream_server::error_code::REFUSED_STREAM).unwrap();
    assert!(conn.streams().is_empty());
    conn.go_away(h2_stream_server::error_code::NO_ERROR).unwrap();

    let writes = &conn.transport().writes;
    let rst = split_frames(&writes[0]);
    assert_eq!(rst[0].0.frame_type, frame_type::RST_STREAM);
    assert_eq!(rst[0].0.stream_id, 1);
    let goaway = split_frames(&writes[1]);
    assert_eq!(goaway[0].0.frame_type, frame_type::GOAWAY);
    assert_eq!(&goaway[0].1[..4], &3u32.to_be_bytes());
}

#[test]
fn test_start_sends_server_settings() {
    let mut conn = connection();
    conn.start().unwrap();
    let frames = split_frames(&conn.transport().writes[0]);
    assert_eq!(frames[0].0.frame_type, frame_type::SETTINGS);
    assert_eq!(frames[0].0.length, 12);
}
