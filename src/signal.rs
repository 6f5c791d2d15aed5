use tokio::sync::watch;

/// One-shot stop flag shared between an owner and its background tasks.
///
/// Dropping the signal counts as triggering it, a task never outlives its owner.
#[derive(Debug)]
pub(crate) struct StopSignal {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub(crate) struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopListener {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// resolves once the signal was triggered or dropped
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn trigger_wakes_listener() {
        let signal = StopSignal::new();
        let mut listener = signal.listener();
        assert!(!listener.is_stopped());
        signal.trigger();
        timeout(Duration::from_secs(1), listener.stopped()).await.unwrap();
        assert!(listener.is_stopped());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn dropping_the_signal_stops_listeners() {
        let signal = StopSignal::new();
        let mut listener = signal.listener();
        drop(signal);
        timeout(Duration::from_secs(1), listener.stopped()).await.unwrap();
        assert!(listener.is_stopped());
    }
}
