//! Keeps a session open for one user and logs every badge change.
use std::str::FromStr;

use dotenv::dotenv;
use jobtradesasa::{
    client::{Session, SessionEnd},
    config::ClientConfig,
};
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = ClientConfig::init()?;

    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!(
        "Watching unread counts for {} ({}) at {}",
        config.user_id,
        config.user_role.to_str(),
        config.api_url
    );

    let session = Session::new(&config);
    let mut badge = session.cache().subscribe_unread();

    let watch_badge = async {
        while badge.changed().await.is_ok() {
            match *badge.borrow_and_update() {
                Some(counts) => tracing::info!(
                    "Unread: {} messages, {} notifications ({} total)",
                    counts.messages,
                    counts.notifications,
                    counts.total
                ),
                None => tracing::info!("Unread counts cleared"),
            }
        }
    };

    let end = tokio::select! {
        end = session.run() => end,
        _ = watch_badge => return Ok(()),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            return Ok(());
        }
    };

    match end {
        SessionEnd::Unauthorized => anyhow::bail!("The server refused the token; sign in again"),
        SessionEnd::Rejected(reason) => anyhow::bail!("Realtime channel rejected: {}", reason),
    }
}
