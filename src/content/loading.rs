use std::sync::Arc;

use tokio::{
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};

use crate::models::Mood;

use super::copy::LoadingCopyProvider;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_info;

/// Rotating status messages for an outstanding request.
///
/// One message is produced synchronously by [`LoadingMessageCycle::start`],
/// then one per `period`. The ticker is owned by this value: stopping or
/// dropping it releases the timer, after which `sink` is never called again.
pub struct LoadingMessageCycle {
    mood: Mood,
    ticker: Option<JoinHandle<()>>,
}

impl LoadingMessageCycle {
    /// Must be called inside a Tokio runtime.
    pub fn start<F>(
        mood: Mood,
        copy: Arc<dyn LoadingCopyProvider>,
        period: Duration,
        sink: F,
    ) -> Self
    where
        F: Fn(String) + Send + 'static,
    {
        sink(copy.pick_message(mood));

        let ticker = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                sink(copy.pick_message(mood));
            }
        });

        log_info!("loading cycle started for {mood} every {}ms", period.as_millis());

        Self {
            mood,
            ticker: Some(ticker),
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
            log_info!("loading cycle stopped for {}", self.mood);
        }
    }
}

impl Drop for LoadingMessageCycle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl LoadingCopyProvider for Counting {
        fn pick_message(&self, mood: Mood) -> String {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            format!("{mood}-{n}")
        }
    }

    fn counting() -> (Arc<dyn LoadingCopyProvider>, Arc<AtomicUsize>) {
        let picks = Arc::new(AtomicUsize::new(0));
        (Arc::new(Counting(picks.clone())), picks)
    }

    #[tokio::test(start_paused = true)]
    async fn emits_immediately_then_every_period() {
        let (copy, _) = counting();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();

        let cycle = LoadingMessageCycle::start(
            Mood::Sad,
            copy,
            Duration::from_millis(2500),
            move |message| sink.lock().unwrap().push(message),
        );
        assert_eq!(seen.lock().unwrap().len(), 1);

        time::sleep(Duration::from_millis(6000)).await;
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert!(cycle.is_running());

        cycle.stop();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_releases_the_timer() {
        let (copy, picks) = counting();
        {
            let _cycle = LoadingMessageCycle::start(
                Mood::Tired,
                copy,
                Duration::from_millis(2500),
                |_| {},
            );
            time::sleep(Duration::from_millis(2600)).await;
        }
        let at_drop = picks.load(Ordering::SeqCst);
        assert_eq!(at_drop, 2);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(picks.load(Ordering::SeqCst), at_drop);
    }
}
