use crate::api::{HttpCollector, RemoteCollector};
use crate::db::records::ActivityRecords;
use crate::libs::agent::AgentBuilder;
use crate::libs::batcher::LocalStore;
use crate::libs::config::Config;
use crate::libs::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::libs::platform::{ActiveWindowResolver, FocusPoller, RdevInputSource};
use crate::libs::source::CompositeSource;
use crate::{msg_debug, msg_error_anyhow, msg_info, msg_print, msg_warning};
use anyhow::Result;
use std::sync::Arc;

/// Runs the agent in the foreground until Ctrl+C.
pub async fn cmd() -> Result<()> {
    let config = Config::read()?;
    config
        .pipeline
        .validate()
        .map_err(|e| msg_error_anyhow!(Message::ConfigInvalid(e.to_string())))?;

    let storage = DataStorage::new();
    msg_debug!(Message::DataDirectory(storage.base_path().display().to_string()));

    let store: Arc<dyn LocalStore> =
        Arc::new(ActivityRecords::new().map_err(|e| msg_error_anyhow!(Message::DatabaseOpenFailed(e.to_string())))?);
    let source = CompositeSource::new()
        .with(RdevInputSource::new())
        .with(FocusPoller::new(config.pipeline.focus_poll_interval()));

    let builder = AgentBuilder::new(config.pipeline.clone(), source, ActiveWindowResolver::new(), store)
        .user_identity(config.user_identity())
        .publish_status(storage);

    match &config.server {
        Some(server) => {
            let collector = HttpCollector::new(server).map_err(|e| msg_error_anyhow!(Message::CollectorInitFailed(e.to_string())))?;
            msg_info!(Message::WatchRemoteEnabled(collector.endpoint().to_string()));
            run(builder.collector(collector)).await
        }
        None => {
            msg_info!(Message::WatchLocalOnly);
            run(builder).await
        }
    }
}

async fn run<C: RemoteCollector>(builder: AgentBuilder<C>) -> Result<()> {
    let agent = builder
        .start()
        .map_err(|e| msg_error_anyhow!(Message::AgentStartFailed(e.to_string())))?;
    msg_print!(Message::WatchPressCtrlC);

    if let Err(e) = tokio::signal::ctrl_c().await {
        msg_warning!(Message::SignalListenFailed(e.to_string()));
    }

    msg_info!(Message::AgentStopping);
    let report = agent.stop().await;
    tracing::debug!(?report, "agent shut down");
    Ok(())
}
