use std::{
  future::Future,
  pin::Pin,
  task::{Context, Poll},
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

use super::MediaStream;
use crate::{Error, Result};

/// The response body of a download. Once this is handed to the server the
/// response head is already on its way, so any error it yields (upstream
/// failure or an expired deadline) can only abort the connection.
pub struct ByteStream<T> {
  stream: T,
  label: String,
  deadline: Option<Pin<Box<Sleep>>>,
  sent: u64,
  finished: bool,
}

impl<T> ByteStream<T> {
  pub fn new(stream: T, label: impl Into<String>) -> Self {
    ByteStream {
      stream,
      label: label.into(),
      deadline: None,
      sent: 0,
      finished: false,
    }
  }

  pub fn deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(Box::pin(tokio::time::sleep_until(deadline)));
    self
  }

  fn abort(&mut self, err: Error) -> Poll<Option<Result<Bytes>>> {
    self.finished = true;
    warn!(
      "aborting {} after {} bytes: {}",
      self.label, self.sent, err
    );
    Poll::Ready(Some(Err(err)))
  }
}

impl<T> Stream for ByteStream<T>
where
  T: Stream<Item = Result<Bytes>> + Unpin,
{
  type Item = Result<Bytes>;

  fn poll_next(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    let this = &mut *self;
    if this.finished {
      return Poll::Ready(None);
    }

    if let Some(deadline) = this.deadline.as_mut() {
      if deadline.as_mut().poll(cx).is_ready() {
        return this.abort(Error::Timeout);
      }
    }

    match Pin::new(&mut this.stream).poll_next(cx) {
      Poll::Ready(Some(Ok(bytes))) => {
        this.sent += bytes.len() as u64;
        Poll::Ready(Some(Ok(bytes)))
      }
      Poll::Ready(Some(Err(err))) => this.abort(err),
      Poll::Ready(None) => {
        this.finished = true;
        info!("completed {} ({} bytes)", this.label, this.sent);
        Poll::Ready(None)
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> Drop for ByteStream<T> {
  fn drop(&mut self) {
    if !self.finished {
      debug!(
        "{} dropped after {} bytes, client went away",
        self.label, self.sent
      );
    }
  }
}

/// Waits for the first non-empty chunk of `stream`.
///
/// Errors surfacing here happen before any response byte is committed and
/// can still be reported as a structured error. The returned stream yields
/// the full content, first chunk included.
pub async fn prime(mut stream: MediaStream) -> Result<MediaStream> {
  loop {
    match stream.next().await {
      Some(Ok(bytes)) if bytes.is_empty() => continue,
      Some(Ok(bytes)) => {
        let first = futures::stream::once(async move { Ok(bytes) });
        return Ok(first.chain(stream).boxed());
      }
      Some(Err(err)) => return Err(err),
      None => return Err(Error::EmptyStream),
    }
  }
}
