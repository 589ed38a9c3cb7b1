//! Batch acquisition: collect N base images from a generator that may return
//! fewer than asked for.
//!
//! ## State machine
//!
//! ```text
//! Requesting(accumulated, remaining, attempts)
//!     │  one generator call asking for exactly `remaining`
//!     ▼
//! advance ──▶ remaining == 0            ──▶ Done
//!         ──▶ attempts == cap           ──▶ Exhausted
//!         ──▶ otherwise                 ──▶ Requesting
//! ```
//!
//! `(accumulated, remaining, attempts)` is the only state, `attempts` grows by
//! one per transition and the cap is finite, so the loop always terminates.
//! [`BatchAcquisition::advance`] is pure; only [`BatchAcquisition::run`]
//! touches the network and the clock.
//!
//! Providers that return nothing are often rate limited, so an attempt that
//! yielded zero images is followed by a fixed backoff before the next one.

use crate::error::PrintfitError;
use crate::progress::PipelineObserver;
use crate::providers::{ImageGenerator, SizeHint};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Acquisition state. See the module docs for transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionState {
    Requesting {
        accumulated: Vec<Vec<u8>>,
        remaining: usize,
        attempts: u32,
    },
    Done {
        images: Vec<Vec<u8>>,
        attempts: u32,
    },
    Exhausted {
        accumulated: Vec<Vec<u8>>,
        attempts: u32,
    },
}

/// Images collected by a successful acquisition.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub images: Vec<Vec<u8>>,
    pub attempts: u32,
}

/// Retry policy for one batch.
#[derive(Debug, Clone)]
pub struct BatchAcquisition {
    target: usize,
    attempt_cap: u32,
    backoff: Duration,
}

impl BatchAcquisition {
    pub fn new(target: usize, attempt_cap: u32, backoff: Duration) -> Self {
        Self {
            target,
            attempt_cap: attempt_cap.max(1),
            backoff,
        }
    }

    pub fn initial(&self) -> AcquisitionState {
        if self.target == 0 {
            return AcquisitionState::Done {
                images: Vec::new(),
                attempts: 0,
            };
        }
        AcquisitionState::Requesting {
            accumulated: Vec::with_capacity(self.target),
            remaining: self.target,
            attempts: 0,
        }
    }

    /// Apply the images returned by one attempt.
    ///
    /// Extra images beyond `remaining` are discarded so the accumulator never
    /// exceeds the target. Terminal states are returned unchanged.
    pub fn advance(&self, state: AcquisitionState, received: Vec<Vec<u8>>) -> AcquisitionState {
        let AcquisitionState::Requesting {
            mut accumulated,
            remaining,
            attempts,
        } = state
        else {
            return state;
        };

        accumulated.extend(received.into_iter().take(remaining));
        let attempts = attempts + 1;
        let remaining = self.target - accumulated.len();

        if remaining == 0 {
            AcquisitionState::Done {
                images: accumulated,
                attempts,
            }
        } else if attempts >= self.attempt_cap {
            AcquisitionState::Exhausted {
                accumulated,
                attempts,
            }
        } else {
            AcquisitionState::Requesting {
                accumulated,
                remaining,
                attempts,
            }
        }
    }

    /// Drive the state machine against `generator` until it terminates.
    ///
    /// # Errors
    /// - [`PrintfitError::NoCandidates`] — nothing was collected
    /// - [`PrintfitError::InsufficientCandidates`] — some, but fewer than the target
    pub async fn run(
        &self,
        generator: &dyn ImageGenerator,
        prompt: &str,
        size: SizeHint,
        observer: &dyn PipelineObserver,
    ) -> Result<Acquired, PrintfitError> {
        let mut state = self.initial();
        loop {
            let (remaining, attempts) = match state {
                AcquisitionState::Requesting {
                    remaining,
                    attempts,
                    ..
                } => (remaining, attempts),
                AcquisitionState::Done { images, attempts } => {
                    info!("Acquired {} images in {} attempts", images.len(), attempts);
                    return Ok(Acquired { images, attempts });
                }
                AcquisitionState::Exhausted {
                    accumulated,
                    attempts,
                } => {
                    return Err(if accumulated.is_empty() {
                        PrintfitError::NoCandidates { attempts }
                    } else {
                        PrintfitError::InsufficientCandidates {
                            collected: accumulated.len(),
                            target: self.target,
                            attempts,
                        }
                    });
                }
            };

            let attempt = attempts + 1;
            debug!(
                "Acquisition attempt {}/{}: requesting {}",
                attempt, self.attempt_cap, remaining
            );
            let received = match generator.generate(prompt, remaining, size).await {
                Ok(images) => images,
                Err(e) => {
                    warn!("Acquisition attempt {} failed — {}", attempt, e);
                    Vec::new()
                }
            };
            let got = received.len();
            observer.on_acquisition_attempt(attempt, remaining, got);

            state = self.advance(state, received);

            if got == 0 && matches!(state, AcquisitionState::Requesting { .. }) {
                warn!(
                    "Attempt {} returned no images; backing off {}ms",
                    attempt,
                    self.backoff.as_millis()
                );
                sleep(self.backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::progress::NoopObserver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns `per_call[i]` images on call i (last value repeats).
    struct Scripted {
        per_call: Vec<usize>,
        calls: AtomicUsize,
        requested: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(per_call: Vec<usize>) -> Self {
            Self {
                per_call,
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for Scripted {
        async fn generate(
            &self,
            _prompt: &str,
            count: usize,
            _size: SizeHint,
        ) -> Result<Vec<Vec<u8>>, ProviderError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(count);
            let n = *self.per_call.get(i).or(self.per_call.last()).unwrap_or(&0);
            Ok((0..n).map(|k| vec![i as u8, k as u8]).collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl ImageGenerator for Failing {
        async fn generate(
            &self,
            _prompt: &str,
            _count: usize,
            _size: SizeHint,
        ) -> Result<Vec<Vec<u8>>, ProviderError> {
            Err(ProviderError::new("failing", "quota exceeded"))
        }
    }

    fn policy(target: usize) -> BatchAcquisition {
        BatchAcquisition::new(target, 6, Duration::ZERO)
    }

    #[tokio::test]
    async fn one_per_call_takes_three_attempts() {
        let generator = Scripted::new(vec![1]);
        let acquired = policy(3)
            .run(&generator, "p", SizeHint::Square, &NoopObserver)
            .await
            .unwrap();
        assert_eq!(acquired.images.len(), 3);
        assert_eq!(acquired.attempts, 3);
        assert_eq!(*generator.requested.lock().unwrap(), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn empty_generator_exhausts_with_no_candidates() {
        let generator = Scripted::new(vec![0]);
        let err = policy(2)
            .run(&generator, "p", SizeHint::Square, &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, PrintfitError::NoCandidates { attempts: 6 }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn partial_batch_is_insufficient() {
        let generator = Scripted::new(vec![1, 0]);
        let err = policy(3)
            .run(&generator, "p", SizeHint::Square, &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PrintfitError::InsufficientCandidates {
                collected: 1,
                target: 3,
                attempts: 6
            }
        ));
    }

    #[tokio::test]
    async fn generator_errors_count_as_empty_attempts() {
        let err = policy(1)
            .run(&Failing, "p", SizeHint::Square, &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, PrintfitError::NoCandidates { attempts: 6 }));
    }

    #[tokio::test]
    async fn surplus_images_are_discarded() {
        let generator = Scripted::new(vec![5]);
        let acquired = policy(2)
            .run(&generator, "p", SizeHint::Square, &NoopObserver)
            .await
            .unwrap();
        assert_eq!(acquired.images.len(), 2);
        assert_eq!(acquired.attempts, 1);
    }

    #[test]
    fn advance_recomputes_remaining() {
        let p = policy(4);
        let s = p.advance(p.initial(), vec![vec![1]]);
        assert_eq!(
            s,
            AcquisitionState::Requesting {
                accumulated: vec![vec![1]],
                remaining: 3,
                attempts: 1
            }
        );
        let s = p.advance(s, vec![vec![2], vec![3], vec![4]]);
        assert!(matches!(s, AcquisitionState::Done { attempts: 2, .. }));
    }

    #[test]
    fn terminal_states_are_fixed_points() {
        let p = policy(1);
        let done = AcquisitionState::Done {
            images: vec![vec![0]],
            attempts: 1,
        };
        assert_eq!(p.advance(done.clone(), vec![vec![9]]), done);
    }

    #[test]
    fn zero_target_is_immediately_done() {
        assert!(matches!(
            policy(0).initial(),
            AcquisitionState::Done { attempts: 0, .. }
        ));
    }

    const BACKOFF: Duration = Duration::from_millis(250);

    async fn timed_run(
        target: usize,
        generator: &dyn ImageGenerator,
    ) -> (Result<Acquired, PrintfitError>, Duration) {
        let start = tokio::time::Instant::now();
        let result = BatchAcquisition::new(target, 6, BACKOFF)
            .run(generator, "p", SizeHint::Square, &NoopObserver)
            .await;
        (result, start.elapsed())
    }

    /// Number of whole backoff periods that fit into `elapsed`.
    fn sleeps(elapsed: Duration) -> u32 {
        (elapsed.as_millis() / BACKOFF.as_millis()) as u32
    }

    #[tokio::test(start_paused = true)]
    async fn empty_attempt_backs_off_once() {
        let generator = Scripted::new(vec![0, 1]);
        let (result, elapsed) = timed_run(1, &generator).await;
        assert_eq!(result.unwrap().attempts, 2);
        assert_eq!(sleeps(elapsed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn productive_attempts_do_not_back_off() {
        let generator = Scripted::new(vec![1]);
        let (result, elapsed) = timed_run(3, &generator).await;
        assert_eq!(result.unwrap().attempts, 3);
        assert_eq!(sleeps(elapsed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn last_attempt_does_not_back_off() {
        let generator = Scripted::new(vec![0]);
        let (result, elapsed) = timed_run(2, &generator).await;
        assert!(matches!(result, Err(PrintfitError::NoCandidates { attempts: 6 })));
        assert_eq!(sleeps(elapsed), 5);
    }
}
