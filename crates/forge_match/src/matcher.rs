use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::trace;

use crate::error::Error;
use crate::processor::MatchProcessor;

struct QueueState {
    queue: VecDeque<String>,
    index: HashSet<String>,
}

/// Global FIFO matchmaking queue keyed by player id, with O(1) duplicate
/// rejection and a `start_matching` poll loop that assembles N-player
/// groups under a predicate, timeout, and cancellation.
pub struct Matcher {
    state: Mutex<QueueState>,
    active_matches: Mutex<HashSet<String>>,
    done_tx: broadcast::Sender<String>,
    default_queue_size: usize,
    processor: Option<Arc<dyn MatchProcessor>>,
}

impl Matcher {
    pub fn new(default_queue_size: usize, processor: Option<Arc<dyn MatchProcessor>>) -> Self {
        let (done_tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(QueueState { queue: VecDeque::new(), index: HashSet::new() }),
            active_matches: Mutex::new(HashSet::new()),
            done_tx,
            default_queue_size,
            processor,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `player_id` to the back of the queue. Fails
    /// [`Error::PlayerInQueue`] if already present. When at capacity,
    /// overflow is delegated to the configured [`MatchProcessor`] if any,
    /// else fails [`Error::MaxQueuePlayer`].
    pub async fn enqueue(&self, player_id: impl Into<String>) -> Result<(), Error> {
        let player_id = player_id.into();
        let overflow = {
            let mut state = self.state.lock();
            if state.index.contains(&player_id) {
                return Err(Error::PlayerInQueue);
            }
            if state.queue.len() >= self.default_queue_size {
                true
            } else {
                state.index.insert(player_id.clone());
                state.queue.push_back(player_id.clone());
                false
            }
        };

        if overflow {
            match &self.processor {
                Some(processor) => {
                    processor.enqueue(&player_id).await;
                    Ok(())
                }
                None => Err(Error::MaxQueuePlayer),
            }
        } else {
            Ok(())
        }
    }

    fn try_dequeue_front(&self) -> Option<String> {
        let mut state = self.state.lock();
        let player_id = state.queue.pop_front()?;
        state.index.remove(&player_id);
        Some(player_id)
    }

    fn requeue_front(&self, player_id: String) {
        let mut state = self.state.lock();
        state.index.insert(player_id.clone());
        state.queue.push_front(player_id);
    }

    fn requeue_back(&self, player_id: String) {
        let mut state = self.state.lock();
        state.index.insert(player_id.clone());
        state.queue.push_back(player_id);
    }

    /// Sends `match_id` on the cancellation signal; any in-flight
    /// `start_matching` call for that id observes it on its next poll.
    pub fn cancel_match(&self, match_id: &str) {
        let _ = self.done_tx.send(match_id.to_string());
    }

    /// Assembles `num` players for `match_id`, seeded with `owner_ids`,
    /// polling the queue until full, timed out, or cancelled via
    /// [`Matcher::cancel_match`].
    pub async fn start_matching(
        &self,
        match_id: &str,
        num: usize,
        pred: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
        timeout: Duration,
        owner_ids: Vec<String>,
    ) -> Result<Vec<String>, Error> {
        if self.active_matches.lock().contains(match_id) {
            return Err(Error::AlreadyMatching);
        }
        if owner_ids.len() > num {
            return Err(Error::GtMatchNum);
        }
        self.active_matches.lock().insert(match_id.to_string());

        let owner_set: HashSet<String> = owner_ids.iter().cloned().collect();
        let mut result = owner_ids;
        let mut done_rx = self.done_tx.subscribe();
        let deadline = Instant::now() + timeout;
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        let mut poll = tokio::time::interval(Duration::from_millis(5));

        let outcome = loop {
            if result.len() >= num {
                break Ok(result.clone());
            }

            tokio::select! {
                biased;
                recv = done_rx.recv() => {
                    match recv {
                        Ok(id) if id == match_id => break Err(MatchExit::Cancelled),
                        _ => continue,
                    }
                }
                () = &mut sleep => break Err(MatchExit::TimedOut),
                _ = poll.tick() => {
                    let Some(candidate) = self.try_dequeue_front() else {
                        if let Some(processor) = &self.processor {
                            if let Some(candidate) = processor.dequeue().await {
                                if pred.as_ref().is_some_and(|p| !p(&candidate)) {
                                    self.requeue_back(candidate);
                                } else {
                                    result.push(candidate);
                                }
                            }
                        }
                        continue;
                    };
                    if pred.as_ref().is_some_and(|p| !p(&candidate)) {
                        self.requeue_back(candidate);
                    } else {
                        result.push(candidate);
                    }
                }
            }
        };

        self.active_matches.lock().remove(match_id);

        match outcome {
            Ok(players) => {
                if let Some(processor) = &self.processor {
                    processor.on_matched(match_id, &players).await;
                }
                Ok(players)
            }
            Err(exit) => {
                for player_id in result.into_iter().rev() {
                    if !owner_set.contains(&player_id) {
                        self.requeue_front(player_id);
                    }
                }
                match exit {
                    MatchExit::TimedOut => {
                        if let Some(processor) = &self.processor {
                            processor.on_deadline(match_id).await;
                        }
                        trace!(match_id, "match timed out");
                        Err(Error::MatchTimeout)
                    }
                    MatchExit::Cancelled => {
                        trace!(match_id, "match cancelled");
                        Ok(Vec::new())
                    }
                }
            }
        }
    }
}

enum MatchExit {
    TimedOut,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let matcher = Matcher::new(10, None);
        matcher.enqueue("p1").await.unwrap();
        assert_eq!(matcher.enqueue("p1").await.unwrap_err(), Error::PlayerInQueue);
    }

    #[tokio::test]
    async fn start_matching_returns_immediately_when_owners_fill_num() {
        let matcher = Matcher::new(10, None);
        let result = matcher
            .start_matching("m0", 2, None, Duration::from_millis(50), vec!["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(result, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn assembles_group_from_queue_in_fifo_order() {
        let matcher = Matcher::new(10, None);
        matcher.enqueue("a").await.unwrap();
        matcher.enqueue("b").await.unwrap();
        matcher.enqueue("c").await.unwrap();
        let result = matcher
            .start_matching("m1", 3, None, Duration::from_millis(200), vec![])
            .await
            .unwrap();
        assert_eq!(result, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn match_timeout_restores_queue_order() {
        let matcher = Matcher::new(10, None);
        matcher.enqueue("A").await.unwrap();
        matcher.enqueue("B").await.unwrap();

        let err = matcher
            .start_matching("m1", 3, None, Duration::from_millis(50), vec![])
            .await
            .unwrap_err();
        assert_eq!(err, Error::MatchTimeout);

        let state = matcher.state.lock();
        assert_eq!(
            state.queue.iter().cloned().collect::<Vec<_>>(),
            vec!["A".to_string(), "B".to_string()]
        );
    }

    #[tokio::test]
    async fn same_match_id_twice_is_rejected() {
        let matcher = Arc::new(Matcher::new(10, None));
        let m2 = matcher.clone();
        let handle = tokio::spawn(async move {
            m2.start_matching("dup", 5, None, Duration::from_millis(100), vec![]).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            matcher
                .start_matching("dup", 5, None, Duration::from_millis(10), vec![])
                .await
                .unwrap_err(),
            Error::AlreadyMatching
        );
        matcher.cancel_match("dup");
        let _ = handle.await;
    }

    #[tokio::test]
    async fn predicate_skips_and_requeues_nonmatching_players() {
        let matcher = Matcher::new(10, None);
        matcher.enqueue("bad").await.unwrap();
        matcher.enqueue("good").await.unwrap();
        let pred: Arc<dyn Fn(&str) -> bool + Send + Sync> = Arc::new(|p: &str| p == "good");
        let result = matcher
            .start_matching("m2", 1, Some(pred), Duration::from_millis(200), vec![])
            .await
            .unwrap();
        assert_eq!(result, vec!["good".to_string()]);
    }

    #[tokio::test]
    async fn owners_exceeding_num_is_rejected() {
        let matcher = Matcher::new(10, None);
        assert_eq!(
            matcher
                .start_matching("m3", 1, None, Duration::from_millis(10), vec!["a".into(), "b".into()])
                .await
                .unwrap_err(),
            Error::GtMatchNum
        );
    }
}
