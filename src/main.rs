//! Tag thumbnailer
//!
//! Sets the image of every Stash tag that has scene markers to the preview stream
//! of one of its markers, picked at random.

mod config;
mod jobs;
mod services;

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::Config;
use crate::jobs::TagThumbnailJob;
use crate::services::{HttpTransport, StashClient, create_progress_log, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing();
    tracing::debug!(endpoint = %config.graphql_url, log_mode = ?config.log_mode, "Configuration loaded");

    let log = create_progress_log(config.log_mode);
    log.info("Starting script...");

    let transport = HttpTransport::new(&config.graphql_url, config.http_timeout)?;
    let client = StashClient::new(Arc::new(transport), log.clone());
    let job = TagThumbnailJob::new(client, log, config.update_delay);

    let mut rng = StdRng::from_entropy();
    job.run(&mut rng).await;

    Ok(())
}
