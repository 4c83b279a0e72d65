use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::config::StreamConfig;
use crate::protocol::canonical::CanonicalFrame;
use crate::stream::dispatcher::{DispatcherState, StreamDispatcher};
use crate::stream::encoder::encode_frame_bytes;
use crate::stream::hooks::StreamHooks;

pin_project! {
    /// Lazily normalizes a stream of raw chunks into canonical frames.
    ///
    /// A chunk is only pulled from `inner` once every frame of the previous
    /// chunk has been yielded. Dropping this stream drops the upstream.
    pub struct NormalizedStream<S> {
        #[pin]
        inner: S,
        dispatcher: StreamDispatcher,
        pending: VecDeque<CanonicalFrame>,
    }
}

impl<S> NormalizedStream<S> {
    #[must_use]
    pub fn new(inner: S, config: StreamConfig, hooks: StreamHooks) -> Self {
        Self {
            inner,
            dispatcher: StreamDispatcher::new(config, hooks),
            pending: VecDeque::with_capacity(4),
        }
    }

    #[must_use]
    pub fn state(&self) -> DispatcherState {
        self.dispatcher.state()
    }

    /// Encode every frame into its wire block.
    pub fn encoded(self) -> impl Stream<Item = Bytes>
    where
        S: Stream<Item = Value>,
    {
        self.map(|frame| encode_frame_bytes(&frame))
    }
}

impl<S> Stream for NormalizedStream<S>
where
    S: Stream<Item = Value>,
{
    type Item = CanonicalFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(frame));
            }
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(chunk) => this.dispatcher.process_chunk_into(chunk, &mut *this.pending),
                None => return Poll::Ready(None),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), None)
    }
}

/// Normalize an async chunk stream.
pub fn normalize_stream<S>(
    chunks: S,
    config: StreamConfig,
    hooks: StreamHooks,
) -> NormalizedStream<S>
where
    S: Stream<Item = Value>,
{
    NormalizedStream::new(chunks, config, hooks)
}

/// Normalize an in-memory chunk sequence synchronously.
pub fn normalize_chunks<I>(
    chunks: I,
    config: StreamConfig,
    hooks: StreamHooks,
) -> Vec<CanonicalFrame>
where
    I: IntoIterator<Item = Value>,
{
    let mut dispatcher = StreamDispatcher::new(config, hooks);
    let mut frames = Vec::new();
    for chunk in chunks {
        dispatcher.process_chunk_into(chunk, &mut frames);
    }
    frames
}
