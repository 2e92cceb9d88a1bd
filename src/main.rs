use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod app;
mod attachment;
mod config;
mod error;
mod extractor;
mod fetch;
mod request;
mod transcoder;
mod util;
mod video_url;

pub use error::{Error, Result};

use crate::{
  app::{router, AppState},
  config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let env_filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(env_filter).init();

  let config = Config::from_env()?;
  // in-flight downloads get as long as a request may take
  let grace = config.request_timeout;

  Toplevel::new(move |s: SubsystemHandle| async move {
    s.start(SubsystemBuilder::new("http", move |subsys| {
      serve(subsys, config)
    }));
  })
  .catch_signals()
  .handle_shutdown_requests(grace)
  .await
  .map_err(Into::into)
}

async fn serve(subsys: SubsystemHandle, config: Config) -> anyhow::Result<()> {
  let app = router(AppState::from_config(&config));

  info!("listening on {}", config.bind_addr);
  info!(
    "yt-dlp: {}, ffmpeg: {}",
    config.ytdlp_path.display(),
    config.ffmpeg_path.display()
  );

  axum::Server::try_bind(&config.bind_addr)?
    .serve(app.into_make_service())
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await?;

  Ok(())
}
