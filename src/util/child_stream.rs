use std::{collections::VecDeque, io, process::Stdio, time::Duration};

use bytes::Bytes;
use futures::StreamExt;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
  process::{Child, ChildStderr, ChildStdin, Command},
  sync::OwnedSemaphorePermit,
  task::JoinHandle,
  time::timeout,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::MediaStream;
use crate::{Error, Result};

const READ_CAPACITY: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 8;
// how long a failed child waits for its feeder to report
const FEEDER_GRACE: Duration = Duration::from_millis(200);

/// A running child process whose stdout is the payload.
///
/// The process is killed when the value (or the stream made from it) is
/// dropped. A non-zero exit status is reported as an error at the end of
/// the stream, built with `on_failure` from the tail of stderr.
pub struct ChildStream {
  program: &'static str,
  child: Child,
  stderr: JoinHandle<String>,
  feeder: Option<Feeder>,
  permit: Option<OwnedSemaphorePermit>,
  on_failure: fn(String) -> Error,
}

impl ChildStream {
  pub fn spawn(
    program: &'static str,
    mut cmd: Command,
    on_failure: fn(String) -> Error,
  ) -> Result<Self> {
    cmd
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| Error::Spawn(program, e))?;
    let stderr = child.stderr.take().ok_or_else(|| {
      Error::Spawn(program, io::Error::other("stderr not captured"))
    })?;
    let stderr = tokio::spawn(drain_stderr(program, stderr));
    debug!("spawned {} (pid {:?})", program, child.id());

    Ok(Self {
      program,
      child,
      stderr,
      feeder: None,
      permit: None,
      on_failure,
    })
  }

  /// Keeps `permit` until the process has exited.
  pub fn hold(mut self, permit: OwnedSemaphorePermit) -> Self {
    self.permit = Some(permit);
    self
  }

  /// Copies `input` into the child's stdin from a background task. The
  /// command must have been built with a piped stdin.
  pub fn feed(mut self, input: MediaStream) -> Result<Self> {
    let stdin = self.child.stdin.take().ok_or_else(|| {
      Error::Spawn(self.program, io::Error::other("stdin not piped"))
    })?;
    self.feeder = Some(Feeder(tokio::spawn(pump(input, stdin))));
    Ok(self)
  }

  #[cfg(test)]
  pub fn id(&self) -> Option<u32> {
    self.child.id()
  }

  pub fn into_stream(mut self) -> Result<MediaStream> {
    let stdout = self.child.stdout.take().ok_or_else(|| {
      Error::Spawn(self.program, io::Error::other("stdout not captured"))
    })?;

    let output = ReaderStream::with_capacity(stdout, READ_CAPACITY)
      .map(|res| res.map_err(Error::from));
    // yields nothing on a clean exit, or the failure as the last item
    let exit = futures::stream::once(self.finish())
      .filter_map(|res| async move { res.err().map(Err::<Bytes, Error>) });

    Ok(output.chain(exit).boxed())
  }

  async fn finish(mut self) -> Result<()> {
    let status = self.child.wait().await?;
    let stderr = (&mut self.stderr).await.unwrap_or_default();
    drop(self.permit.take());

    if !status.success() {
      // a failed input closes stdin early, and the child then fails on
      // the truncated stream; report the input's error, not the child's
      if let Some(feeder) = self.feeder.as_mut() {
        if let Ok(Err(err)) = timeout(FEEDER_GRACE, feeder.join()).await {
          return Err(err);
        }
      }
      // dropping self aborts the feeder, which may still be waiting
      // on its input
      return Err((self.on_failure)(format!(
        "{} exited with {}: {}",
        self.program, status, stderr
      )));
    }

    // an upstream failure only closes our stdin, so the child may well
    // have exited cleanly on a truncated input
    if let Some(feeder) = self.feeder.as_mut() {
      feeder.join().await?;
    }

    debug!("{} exited cleanly", self.program);
    Ok(())
  }
}

struct Feeder(JoinHandle<Result<()>>);

impl Feeder {
  async fn join(&mut self) -> Result<()> {
    (&mut self.0).await?
  }
}

impl Drop for Feeder {
  fn drop(&mut self) {
    self.0.abort();
  }
}

async fn pump(mut input: MediaStream, mut stdin: ChildStdin) -> Result<()> {
  while let Some(chunk) = input.next().await {
    let chunk = chunk?;
    match stdin.write_all(&chunk).await {
      Ok(()) => {}
      // the child stopped reading; its exit status tells why
      Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
      Err(e) => return Err(e.into()),
    }
  }

  stdin.shutdown().await.or_else(|e| match e.kind() {
    io::ErrorKind::BrokenPipe => Ok(()),
    _ => Err(e),
  })?;
  Ok(())
}

async fn drain_stderr(program: &'static str, stderr: ChildStderr) -> String {
  let mut reader = BufReader::new(stderr);
  let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
  let mut buf = Vec::new();

  loop {
    buf.clear();
    match reader.read_until(b'\n', &mut buf).await {
      Ok(0) | Err(_) => break,
      Ok(_) => {}
    }

    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
    if line.is_empty() {
      continue;
    }
    if line.contains("ERROR") {
      warn!("{}: {}", program, line);
    } else {
      debug!("{}: {}", program, line);
    }

    if tail.len() == STDERR_TAIL_LINES {
      tail.pop_front();
    }
    tail.push_back(line);
  }

  Vec::from(tail).join("\n")
}
