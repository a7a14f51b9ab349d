//! The `watch` command: join a collaboration session and print what
//! happens in it.

use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use vellum_collab::{
    session_url, ChannelConfig, ChannelEvent, CollaborationSession, EventChannel,
    ReconnectPolicy, SessionConfig,
};

/// Options for one `watch` run.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub base: String,
    pub session: String,
    pub user: String,
    pub policy: ReconnectPolicy,
    pub history: usize,
}

impl WatchOptions {
    pub fn channel_config(&self) -> anyhow::Result<ChannelConfig> {
        let url = session_url(&self.base, &self.session, &self.user)
            .with_context(|| format!("cannot build session address from '{}'", self.base))?;
        Ok(ChannelConfig::new(url).with_policy(self.policy))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            history_capacity: self.history,
            ..SessionConfig::default()
        }
    }
}

/// How often idle participants are swept: half the idle timeout, at least
/// once a second.
pub fn prune_interval(config: &SessionConfig) -> Duration {
    (config.idle_timeout / 2).max(Duration::from_secs(1))
}

/// Drop participants that have gone quiet and report them.
fn prune_participants(session: &mut CollaborationSession) -> Vec<String> {
    let pruned = session.prune_idle();
    for id in &pruned {
        info!("Participant '{id}' went idle");
        eprintln!("{id} went idle");
    }
    pruned
}

/// Run until Ctrl-C or until the channel gives up reconnecting.
pub async fn run(options: WatchOptions) -> anyhow::Result<()> {
    let config = options.channel_config()?;
    info!("Watching session '{}' as '{}'", options.session, options.user);

    let session_config = options.session_config();
    let mut prune = tokio::time::interval(prune_interval(&session_config));
    prune.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut session = CollaborationSession::with_config(options.user.clone(), session_config);
    let (tx, mut events) = mpsc::unbounded_channel();
    let channel = EventChannel::open(config, tx);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ChannelEvent::Opened) => {
                    if let Err(e) = channel.send(&session.join_message()) {
                        warn!("Could not announce join: {e}");
                    }
                }
                Some(ChannelEvent::Closed) => session.clear(),
                Some(ChannelEvent::Error(e)) => eprintln!("channel error: {e}"),
                Some(ChannelEvent::GaveUp) | None => {
                    eprintln!("connection lost, giving up");
                    break;
                }
                Some(ChannelEvent::Message(envelope)) => {
                    println!("{}", envelope.encode()?);
                    if let Err(e) = session.apply_envelope(&envelope) {
                        debug!("Not a presence event: {e}");
                    }
                }
            },
            _ = prune.tick() => {
                prune_participants(&mut session);
            }
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                info!("Interrupted, leaving session");
                let _ = channel.send(&session.leave_message());
                break;
            }
        }
    }

    channel.shutdown().await;
    let participants: Vec<_> = session.participants().iter().map(|p| p.user_id.as_str()).collect();
    eprintln!(
        "{} events seen, participants at exit: [{}]",
        session.history().len(),
        participants.join(", ")
    );
    Ok(())
}
