//! The drone drops out of SDK mode when it does not hear a command for about
//! 15 seconds. A background task checks the idle time periodically and sends
//! `alive` through the regular command channel when needed.

use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::{
    channel::CommandChannel,
    command::{Command, Response},
    signal::{StopListener, StopSignal},
    LinkConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePolicy {
    pub period: Duration,
    pub idle_threshold: Duration,
    pub timeout: Duration,
}

impl From<&LinkConfig> for KeepAlivePolicy {
    fn from(config: &LinkConfig) -> Self {
        Self {
            period: config.keep_alive_period(),
            idle_threshold: config.idle_threshold(),
            timeout: config.keep_alive_timeout(),
        }
    }
}

impl KeepAlivePolicy {
    /// a link that never sent anything is always due
    pub fn is_due(&self, idle: Option<Duration>) -> bool {
        idle.map_or(true, |idle| idle > self.idle_threshold)
    }

    /// Send `alive` if the channel was idle for longer than the threshold.
    pub async fn send_if_idle(&self, channel: &CommandChannel) -> Option<Response> {
        if !self.is_due(channel.last_sent().idle_for(Instant::now())) {
            return None;
        }
        let response = channel.send(&Command::keep_alive(self.timeout)).await;
        if response.succeeded {
            debug!("sent keep-alive");
        } else {
            warn!("keep-alive failed: {:?}", response.failure);
        }
        Some(response)
    }
}

#[derive(Debug)]
pub struct KeepAliveScheduler {
    stop: StopSignal,
    handle: JoinHandle<()>,
}

impl KeepAliveScheduler {
    pub fn spawn(channel: Arc<CommandChannel>, policy: KeepAlivePolicy) -> Self {
        let stop = StopSignal::new();
        let handle = tokio::spawn(run(channel, policy, stop.listener()));
        Self { stop, handle }
    }

    /// Cancel the timer. A keep-alive already on the wire finishes normally.
    pub fn stop(&self) {
        self.stop.trigger();
    }

    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.stop.trigger();
        self.handle.await
    }
}

async fn run(channel: Arc<CommandChannel>, policy: KeepAlivePolicy, mut stop: StopListener) {
    let mut ticks = interval_at(Instant::now() + policy.period, policy.period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            _ = ticks.tick() => {}
        }
        policy.send_if_idle(&channel).await;
    }
    debug!("keep-alive stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::{Command, Expectation},
        testing::{FakeTransport, Reply},
    };
    use tokio::time::sleep;

    fn policy() -> KeepAlivePolicy {
        KeepAlivePolicy::from(&LinkConfig::default())
    }

    fn speed_command() -> Command {
        Command::new("speed 10", Expectation::ok(), Duration::from_secs(5))
    }

    #[test]
    fn due_only_after_threshold() {
        let policy = policy();
        assert!(policy.is_due(None));
        assert!(!policy.is_due(Some(Duration::from_secs(5))));
        assert!(!policy.is_due(Some(Duration::from_secs(13))));
        assert!(policy.is_due(Some(Duration::from_secs(14))));
    }

    #[tokio::test(start_paused = true)]
    async fn recent_command_suppresses_tick() {
        let fake = FakeTransport::replying(Reply::Text("ok"));
        let channel = Arc::new(CommandChannel::new(fake.clone()));
        let scheduler = KeepAliveScheduler::spawn(channel.clone(), policy());

        sleep(Duration::from_secs(5)).await;
        assert!(channel.send(&speed_command()).await.succeeded);
        sleep(Duration::from_millis(5_500)).await;

        assert_eq!(fake.sent(), vec!["speed 10"]);
        scheduler.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_link_gets_exactly_one_alive() {
        let fake = FakeTransport::replying(Reply::Text("ok"));
        let channel = Arc::new(CommandChannel::new(fake.clone()));
        let scheduler = KeepAliveScheduler::spawn(channel.clone(), policy());

        sleep(Duration::from_secs(6)).await;
        assert!(channel.send(&speed_command()).await.succeeded);
        // ticks at 10s (idle 4s) and 20s (idle 14s)
        sleep(Duration::from_millis(14_500)).await;
        assert_eq!(fake.sent(), vec!["speed 10", "alive"]);

        // the alive itself resets the idle time, the tick at 30s stays quiet
        sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.sent(), vec!["speed 10", "alive"]);
        scheduler.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_timer() {
        let fake = FakeTransport::replying(Reply::Text("ok"));
        let channel = Arc::new(CommandChannel::new(fake.clone()));
        let scheduler = KeepAliveScheduler::spawn(channel.clone(), policy());

        scheduler.stop();
        sleep(Duration::from_secs(60)).await;

        assert!(fake.sent().is_empty());
        scheduler.join().await.unwrap();
    }

    #[tokio::test]
    async fn operation_check_sends_when_idle() {
        let fake = FakeTransport::replying(Reply::Text("ok"));
        let channel = CommandChannel::new(fake.clone());
        let policy = policy();

        assert!(policy.send_if_idle(&channel).await.is_some());
        assert!(policy.send_if_idle(&channel).await.is_none());
        assert_eq!(fake.sent(), vec!["alive"]);
    }
}
