//! Per-connection stream table.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::request::RequestContext;

/// Lifecycle of one request stream.
///
/// HEADERS with END_STREAM goes straight from `Idle` to `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Context created, header block not yet applied.
    Idle,
    HeadersReceived,
    DataAccumulating,
    Complete,
}

/// Open streams of one connection, keyed by stream id.
///
/// Contexts are owned by the table; looking up a removed id simply returns
/// `None`.
#[derive(Debug, Default)]
pub struct StreamTable {
    streams: HashMap<u32, RequestContext>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a context; fails if the id is already in use.
    pub fn insert(&mut self, ctx: RequestContext) -> Result<()> {
        let stream_id = ctx.stream_id();
        if self.streams.contains_key(&stream_id) {
            return Err(Error::DuplicateStream(stream_id));
        }
        self.streams.insert(stream_id, ctx);
        Ok(())
    }

    pub fn get(&self, stream_id: u32) -> Option<&RequestContext> {
        self.streams.get(&stream_id)
    }

    pub fn get_mut(&mut self, stream_id: u32) -> Option<&mut RequestContext> {
        self.streams.get_mut(&stream_id)
    }

    pub fn remove(&mut self, stream_id: u32) -> Option<RequestContext> {
        self.streams.remove(&stream_id)
    }

    pub fn contains(&self, stream_id: u32) -> bool {
        self.streams.contains_key(&stream_id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn clear(&mut self) {
        self.streams.clear();
    }
}
