//! Per-connection dispatch and response emission.
//!
//! A [`Connection`] owns everything one peer needs: the frame splitter, the
//! HPACK decoder (whose dynamic table spans the whole connection), the open
//! streams and the flow-control counters. The event loop feeds it raw bytes
//! and supplies a [`Transport`] for outbound writes; completed requests go to
//! a [`RequestHandler`].
//!
//! Errors are scoped: stream-level problems are logged and the offending
//! frame is dropped, connection-level problems are returned to the caller,
//! which decides whether to send GOAWAY and close.

use std::collections::VecDeque;
use std::io;

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::config::{ConnectionInfo, ServerConfig, DEFAULT_MAX_FRAME_SIZE, DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE};
use crate::error::{Error, Result};
use crate::frame::{self, settings_id, Frame, FrameDecoder};
use crate::headers;
use crate::hpack::{DecodedField, HeaderField, HpackDecoder, HpackEncoder};
use crate::request::{Request, RequestContext};
use crate::response::Response;
use crate::stream::StreamTable;

/// Outbound byte sink, usually the event loop's socket writer.
pub trait Transport {
    /// Write `data` to the connection identified by `connection_id`.
    fn send(&mut self, connection_id: u64, data: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, connection_id: u64, data: &[u8]) -> io::Result<()> {
        (**self).send(connection_id, data)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, connection_id: u64, data: &[u8]) -> io::Result<()> {
        (**self).send(connection_id, data)
    }
}

/// Error type returned by application handlers. Logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Application callback receiving each completed request.
///
/// The handler gets the response descriptor by value and may emit it right
/// away through [`Connection::send_response`] or keep it and emit later.
pub trait RequestHandler {
    fn on_request(&mut self, request: Request, response: Response) -> Result<(), HandlerError>;
}

impl<F> RequestHandler for F
where
    F: FnMut(Request, Response) -> Result<(), HandlerError>,
{
    fn on_request(&mut self, request: Request, response: Response) -> Result<(), HandlerError> {
        self(request, response)
    }
}

/// Server side of one HTTP/2 connection.
pub struct Connection<T: Transport> {
    info: ConnectionInfo,
    config: ServerConfig,
    transport: T,
    decoder: FrameDecoder,
    /// Frames split off the input but not yet dispatched. Survives an error
    /// in `feed` so later frames (and their header blocks) are not lost.
    pending: VecDeque<Frame>,
    hpack: HpackDecoder,
    streams: StreamTable,
    /// Connection-level send window granted by the peer.
    window_size: u32,
    /// SETTINGS_MAX_FRAME_SIZE announced by the peer; bounds outbound frames.
    peer_max_frame_size: usize,
    last_stream_id: u32,
}

impl<T: Transport> Connection<T> {
    pub fn new(info: ConnectionInfo, config: ServerConfig, transport: T) -> Self {
        debug!(connection_id = info.id, remote = %info.remote_addr, "connection opened");
        Self {
            decoder: FrameDecoder::new(config.max_frame_size),
            pending: VecDeque::new(),
            hpack: HpackDecoder::new(config.header_table_size),
            streams: StreamTable::new(),
            window_size: DEFAULT_WINDOW_SIZE,
            peer_max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            last_stream_id: 0,
            info,
            config,
            transport,
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Connection-level send window.
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn peer_max_frame_size(&self) -> usize {
        self.peer_max_frame_size
    }

    /// Highest client stream id accepted so far.
    pub fn last_stream_id(&self) -> u32 {
        self.last_stream_id
    }

    /// Streams whose request has not completed yet.
    pub fn streams(&self) -> &StreamTable {
        &self.streams
    }

    /// Send the server connection preface (our SETTINGS frame).
    pub fn start(&mut self) -> Result<()> {
        let settings = frame::settings(&[
            (settings_id::HEADER_TABLE_SIZE, self.config.header_table_size as u32),
            (settings_id::MAX_FRAME_SIZE, self.config.max_frame_size as u32),
        ]);
        self.write(0, &settings)
    }

    /// Feed raw bytes as they arrive from the socket. Any complete frames are
    /// dispatched; a trailing partial frame is kept for the next call.
    ///
    /// Stream-scoped errors are logged and the frame dropped. On a
    /// connection-level error the frames after the failing one stay queued
    /// and run first on the next call (an empty `data` just drains them).
    pub fn feed<H: RequestHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<()> {
        self.drain_pending(handler)?;
        let frames = self.decoder.decode(data)?;
        self.pending.extend(frames);
        self.drain_pending(handler)
    }

    /// Handle exactly one complete frame (header plus payload). Unlike
    /// [`Connection::feed`], stream-scoped errors are returned to the caller.
    /// Frames still queued from a failed `feed` run first.
    pub fn on_frame<H: RequestHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<()> {
        let frame = Frame::decode(data)?;
        let length = data.len() - frame::FRAME_HEADER_SIZE;
        if length > self.config.max_frame_size {
            return Err(Error::FrameSize {
                length,
                max: self.config.max_frame_size,
            });
        }
        self.drain_pending(handler)?;
        self.handle_frame(frame, handler)
    }

    /// Frames waiting to be dispatched after an earlier error.
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    fn drain_pending<H: RequestHandler>(&mut self, handler: &mut H) -> Result<()> {
        while let Some(frame) = self.pending.pop_front() {
            self.dispatch(frame, handler)?;
        }
        Ok(())
    }

    /// Run one frame and absorb stream-scoped failures.
    fn dispatch<H: RequestHandler>(&mut self, frame: Frame, handler: &mut H) -> Result<()> {
        let stream_id = frame.stream_id();
        match self.handle_frame(frame, handler) {
            Err(e) if e.is_stream_scoped() => {
                warn!(connection_id = self.info.id, stream_id, error = %e, "dropping frame");
                Ok(())
            }
            other => other,
        }
    }

    /// Route a decoded frame. Returns stream-scoped errors as-is, as does
    /// [`Connection::on_frame`]; [`Connection::feed`] swallows them.
    pub fn handle_frame<H: RequestHandler>(&mut self, frame: Frame, handler: &mut H) -> Result<()> {
        match frame {
            Frame::Headers {
                stream_id,
                end_stream,
                header_block,
            } => self.on_headers(stream_id, end_stream, &header_block, handler),
            Frame::Data {
                stream_id,
                end_stream,
                payload,
            } => self.on_data(stream_id, end_stream, &payload, handler),
            Frame::Ping { ack, stream_id, payload } => {
                if ack {
                    trace!(connection_id = self.info.id, "PING ACK received");
                    return Ok(());
                }
                self.write(stream_id, &frame::ping_ack(stream_id, payload))
            }
            Frame::WindowUpdate { stream_id, increment } => {
                self.on_window_update(stream_id, increment);
                Ok(())
            }
            Frame::RstStream { stream_id, error_code } => {
                if self.streams.remove(stream_id).is_some() {
                    debug!(connection_id = self.info.id, stream_id, error_code, "stream reset by peer");
                }
                Ok(())
            }
            Frame::Settings { ack, settings } => {
                if ack {
                    return Ok(());
                }
                self.apply_settings(&settings);
                self.write(0, &frame::settings_ack())
            }
            Frame::Unsupported { frame_type, stream_id } => {
                trace!(
                    connection_id = self.info.id,
                    stream_id,
                    frame_type = frame::frame_type_name(frame_type),
                    "ignoring frame"
                );
                Ok(())
            }
        }
    }

    fn on_headers<H: RequestHandler>(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        block: &[u8],
        handler: &mut H,
    ) -> Result<()> {
        if stream_id == 0 {
            return Err(Error::Frame("HEADERS frame on stream 0".to_string()));
        }

        // Trailers: a second header block on an open stream. The block is
        // always decoded so the dynamic table stays in step with the peer.
        if let Some(ctx) = self.streams.get_mut(stream_id) {
            self.hpack.decode(stream_id, block, |field| {
                if let DecodedField::Regular(field) = field {
                    ctx.append_trailer(field);
                }
            })?;
            if !end_stream {
                return Err(Error::DuplicateStream(stream_id));
            }
            if let Some(ctx) = self.streams.remove(stream_id) {
                self.complete(ctx, handler);
            }
            return Ok(());
        }

        let mut ctx = RequestContext::new(
            stream_id,
            self.info.remote_addr,
            self.info.server_port,
            Utc::now().timestamp(),
            &self.config,
        );
        self.hpack.decode(stream_id, block, |field| ctx.apply_field(field))?;
        ctx.headers_done();

        if stream_id % 2 == 0 {
            return Err(Error::StreamProtocol {
                stream_id,
                reason: "client opened an even-numbered stream".to_string(),
            });
        }
        if stream_id <= self.last_stream_id {
            return Err(Error::StreamProtocol {
                stream_id,
                reason: format!("stream id not above last opened stream {}", self.last_stream_id),
            });
        }
        self.last_stream_id = stream_id;

        trace!(
            connection_id = self.info.id,
            stream_id,
            end_stream,
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            "request headers"
        );

        if end_stream {
            self.complete(ctx, handler);
            Ok(())
        } else {
            self.streams.insert(ctx)
        }
    }

    fn on_data<H: RequestHandler>(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        payload: &[u8],
        handler: &mut H,
    ) -> Result<()> {
        if stream_id == 0 {
            return Err(Error::Frame("DATA frame on stream 0".to_string()));
        }
        let ctx = self.streams.get_mut(stream_id).ok_or(Error::UnknownStream(stream_id))?;
        ctx.push_data(payload);

        if end_stream {
            if let Some(ctx) = self.streams.remove(stream_id) {
                self.complete(ctx, handler);
            }
        }

        // runs after delivery so a failed write cannot strand the request
        if self.config.replenish_window && !payload.is_empty() {
            let increment = payload.len() as u32;
            let mut updates = frame::window_update(0, increment);
            if !end_stream {
                updates.extend_from_slice(&frame::window_update(stream_id, increment));
            }
            self.write(stream_id, &updates)?;
        }
        Ok(())
    }

    fn on_window_update(&mut self, stream_id: u32, increment: u32) {
        if stream_id == 0 {
            self.window_size = grow_window(self.window_size, increment);
            trace!(connection_id = self.info.id, increment, window = self.window_size, "connection window");
            return;
        }
        match self.streams.get_mut(stream_id) {
            Some(ctx) => ctx.send_window = grow_window(ctx.send_window, increment),
            None => trace!(connection_id = self.info.id, stream_id, "WINDOW_UPDATE for closed stream"),
        }
    }

    fn apply_settings(&mut self, settings: &[(u16, u32)]) {
        for &(id, value) in settings {
            match id {
                settings_id::MAX_FRAME_SIZE => {
                    // RFC 7540 Section 6.5.2: 2^14 ..= 2^24 - 1
                    let size = value as usize;
                    if (DEFAULT_MAX_FRAME_SIZE..=frame::MAX_FRAME_LENGTH).contains(&size) {
                        self.peer_max_frame_size = size;
                    } else {
                        warn!(connection_id = self.info.id, value, "ignoring invalid SETTINGS_MAX_FRAME_SIZE");
                    }
                }
                _ => trace!(connection_id = self.info.id, id, value, "setting not tracked"),
            }
        }
    }

    /// Finish a request and hand it to the application.
    fn complete<H: RequestHandler>(&mut self, ctx: RequestContext, handler: &mut H) {
        let request = ctx.finish(&self.config);
        let stream_id = request.stream_id;
        let response = Response::new(stream_id, request.method());
        if let Err(e) = handler.on_request(request, response) {
            warn!(connection_id = self.info.id, stream_id, error = %e, "request handler failed");
        }
    }

    /// Emit a response: one HEADERS frame followed by DATA frames, written in
    /// a single transport call.
    ///
    /// A response can only be sent once. If encoding or the write fails the
    /// response is left unsent so the caller may retry.
    pub fn send_response(&mut self, response: &mut Response) -> Result<()> {
        let fields = headers::assemble(response, &self.config, Utc::now())?;
        let result = self.write_response(response, &fields);
        if result.is_err() {
            response.mark_header_sent(false);
        }
        result
    }

    fn write_response(&mut self, response: &Response, fields: &[HeaderField]) -> Result<()> {
        let stream_id = response.stream_id();
        let block = HpackEncoder::new(self.config.header_table_size, self.config.max_header_fields).encode(fields)?;
        if block.len() > self.peer_max_frame_size {
            return Err(Error::HeaderBlockTooLarge {
                length: block.len(),
                max: self.peer_max_frame_size,
            });
        }

        let payload = response.payload();
        let chunk_count = payload.len().div_ceil(self.peer_max_frame_size).max(1);
        let mut out = Vec::with_capacity(frame::FRAME_HEADER_SIZE * (1 + chunk_count) + block.len() + payload.len());

        frame::write_headers_frame(&mut out, stream_id, &block, false)?;
        if payload.is_empty() {
            frame::write_data_frame(&mut out, stream_id, &[], true)?;
        } else {
            let mut chunks = payload.chunks(self.peer_max_frame_size).peekable();
            while let Some(chunk) = chunks.next() {
                frame::write_data_frame(&mut out, stream_id, chunk, chunks.peek().is_none())?;
            }
        }

        self.write(stream_id, &out)?;
        debug!(
            connection_id = self.info.id,
            stream_id,
            status = response.status,
            body_len = payload.len(),
            "response sent"
        );
        Ok(())
    }

    /// Abort a stream with RST_STREAM and forget its request state.
    pub fn reset_stream(&mut self, stream_id: u32, error_code: u32) -> Result<()> {
        self.streams.remove(stream_id);
        debug!(connection_id = self.info.id, stream_id, error_code, "resetting stream");
        self.write(stream_id, &frame::rst_stream(stream_id, error_code))
    }

    /// Send GOAWAY naming the last stream we accepted. Open streams are
    /// dropped; the caller closes the socket.
    pub fn go_away(&mut self, error_code: u32) -> Result<()> {
        debug!(
            connection_id = self.info.id,
            last_stream_id = self.last_stream_id,
            error_code,
            open_streams = self.streams.len(),
            "going away"
        );
        self.streams.clear();
        self.write(0, &frame::goaway(self.last_stream_id, error_code))
    }

    fn write(&mut self, stream_id: u32, data: &[u8]) -> Result<()> {
        self.transport
            .send(self.info.id, data)
            .map_err(|source| Error::Write { stream_id, source })
    }
}

fn grow_window(window: u32, increment: u32) -> u32 {
    window.saturating_add(increment).min(MAX_WINDOW_SIZE)
}
