//! Live channel connection state.
//!
//! The channel feeding ticket and chat traffic is modelled as an explicit
//! state machine. Every stream lifetime carries an epoch; results arriving
//! with a stale epoch are discarded, which is what makes reconnects and
//! teardown race-free without any shell cooperation.
//!
//! Reconnects follow bounded exponential backoff. After the attempt budget
//! is exhausted the machine parks in [`ChannelPhase::GaveUp`] and only a
//! manual reconnect leaves that state.

use tracing::{debug, info, warn};

use crate::{BASE_RETRY_DELAY_MS, JITTER_MAX_MS, MAX_CONNECT_ATTEMPTS, MAX_RETRY_DELAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Idle,
    /// Attempt is 1-based. The first connect of a session is attempt 1.
    Connecting { attempt: u32 },
    Connected,
    /// `failures` counts consecutive failed attempts behind this wait.
    RetryScheduled { failures: u32, delay_ms: u64 },
    GaveUp,
}

impl ChannelPhase {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub const fn can_reconnect_manually(self) -> bool {
        matches!(self, Self::GaveUp)
    }
}

/// Backoff schedule for reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_max_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_CONNECT_ATTEMPTS,
            base_delay_ms: BASE_RETRY_DELAY_MS,
            max_delay_ms: MAX_RETRY_DELAY_MS,
            jitter_max_ms: JITTER_MAX_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt given `failures` consecutive failures.
    /// Doubles from the base, is capped at `max_delay_ms`, then the supplied
    /// jitter (clamped to `jitter_max_ms`) is added on top. Jitter is passed
    /// in by the caller so tests can pin it to zero.
    #[must_use]
    pub fn delay_ms(&self, failures: u32, jitter_ms: u64) -> u64 {
        let exp = failures.saturating_sub(1).min(32);
        let backoff = self
            .base_delay_ms
            .saturating_mul(1_u64 << exp)
            .min(self.max_delay_ms);
        backoff.saturating_add(jitter_ms.min(self.jitter_max_ms))
    }
}

/// What the app should do after a connection loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossOutcome {
    /// Schedule a retry timer for `delay_ms`, keyed by the new epoch.
    Retry { failures: u32, delay_ms: u64 },
    /// Attempt budget exhausted. Wait for a manual reconnect.
    GaveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    phase: ChannelPhase,
    epoch: u64,
    policy: ReconnectPolicy,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            phase: ChannelPhase::Idle,
            epoch: 0,
            policy: ReconnectPolicy::default(),
        }
    }
}

impl ChannelState {
    #[must_use]
    pub fn with_policy(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn phase(&self) -> ChannelPhase {
        self.phase
    }

    /// Epoch of the current stream or wait. Results tagged with any other
    /// value are stale.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Starts a fresh connection cycle (attempt 1) from any phase and
    /// returns the epoch the new stream must carry. Used for the initial
    /// connect and for manual reconnects.
    pub fn begin_connect(&mut self) -> u64 {
        self.epoch += 1;
        self.phase = ChannelPhase::Connecting { attempt: 1 };
        debug!(epoch = self.epoch, "channel connect started");
        self.epoch
    }

    /// Marks the stream with `epoch` as established. Returns false for a
    /// stale epoch or when no connect is in flight.
    pub fn mark_connected(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || !matches!(self.phase, ChannelPhase::Connecting { .. }) {
            debug!(epoch, current = self.epoch, "ignoring stale channel open");
            return false;
        }
        self.phase = ChannelPhase::Connected;
        info!(epoch, "channel connected");
        true
    }

    /// Records the loss of the stream with `epoch`. Returns `None` when the
    /// loss is stale, otherwise the retry-or-give-up decision. The epoch is
    /// advanced either way so duplicate loss reports are single-shot.
    pub fn connection_lost(&mut self, epoch: u64, jitter_ms: u64) -> Option<LossOutcome> {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "ignoring stale channel loss");
            return None;
        }
        let failures = match self.phase {
            ChannelPhase::Connecting { attempt } => attempt,
            ChannelPhase::Connected => 0,
            ChannelPhase::Idle | ChannelPhase::RetryScheduled { .. } | ChannelPhase::GaveUp => {
                return None
            }
        };
        self.epoch += 1;
        if failures >= self.policy.max_attempts {
            self.phase = ChannelPhase::GaveUp;
            warn!(failures, "channel gave up after exhausting retries");
            return Some(LossOutcome::GaveUp);
        }
        let delay_ms = self.policy.delay_ms(failures, jitter_ms);
        self.phase = ChannelPhase::RetryScheduled { failures, delay_ms };
        info!(failures, delay_ms, "channel retry scheduled");
        Some(LossOutcome::Retry { failures, delay_ms })
    }

    /// Fires a scheduled retry. Returns the epoch for the new stream, or
    /// `None` when the timer is stale or no retry is pending.
    pub fn retry_now(&mut self, epoch: u64) -> Option<u64> {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "ignoring stale retry timer");
            return None;
        }
        let ChannelPhase::RetryScheduled { failures, .. } = self.phase else {
            return None;
        };
        self.epoch += 1;
        self.phase = ChannelPhase::Connecting {
            attempt: failures + 1,
        };
        debug!(epoch = self.epoch, attempt = failures + 1, "channel retrying");
        Some(self.epoch)
    }

    /// Tears the machine down to `Idle`, invalidating all in-flight work.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.phase = ChannelPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::default()
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_delay_doubles_from_base() {
            let p = policy();
            assert_eq!(p.delay_ms(1, 0), 1_000);
            assert_eq!(p.delay_ms(2, 0), 2_000);
            assert_eq!(p.delay_ms(3, 0), 4_000);
            assert_eq!(p.delay_ms(4, 0), 8_000);
        }

        #[test]
        fn test_delay_is_capped() {
            let p = policy();
            assert_eq!(p.delay_ms(10, 0), MAX_RETRY_DELAY_MS);
            assert_eq!(p.delay_ms(u32::MAX, 0), MAX_RETRY_DELAY_MS);
        }

        #[test]
        fn test_zero_failures_uses_base_delay() {
            assert_eq!(policy().delay_ms(0, 0), 1_000);
        }

        #[test]
        fn test_jitter_added_and_clamped() {
            let p = policy();
            assert_eq!(p.delay_ms(1, 250), 1_250);
            assert_eq!(p.delay_ms(1, 50_000), 1_000 + JITTER_MAX_MS);
        }
    }

    mod machine_tests {
        use super::*;

        #[test]
        fn test_begin_connect_bumps_epoch_and_starts_attempt_one() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            assert_eq!(epoch, 1);
            assert_eq!(state.phase(), ChannelPhase::Connecting { attempt: 1 });
        }

        #[test]
        fn test_mark_connected_requires_matching_epoch() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            assert!(!state.mark_connected(epoch + 1));
            assert_eq!(state.phase(), ChannelPhase::Connecting { attempt: 1 });

            assert!(state.mark_connected(epoch));
            assert!(state.phase().is_connected());
        }

        #[test]
        fn test_loss_while_connecting_schedules_retry() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            let outcome = state.connection_lost(epoch, 0).unwrap();
            assert_eq!(
                outcome,
                LossOutcome::Retry {
                    failures: 1,
                    delay_ms: 1_000
                }
            );
            assert_eq!(
                state.phase(),
                ChannelPhase::RetryScheduled {
                    failures: 1,
                    delay_ms: 1_000
                }
            );
            assert_eq!(state.epoch(), epoch + 1);
        }

        #[test]
        fn test_stale_loss_is_ignored() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            assert!(state.mark_connected(epoch));
            assert!(state.connection_lost(epoch + 5, 0).is_none());
            assert!(state.phase().is_connected());
        }

        #[test]
        fn test_duplicate_loss_is_single_shot() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            assert!(state.connection_lost(epoch, 0).is_some());
            assert!(state.connection_lost(epoch, 0).is_none());
        }

        #[test]
        fn test_retry_cycle_increments_attempts_until_give_up() {
            let mut state = ChannelState::default();
            let mut epoch = state.begin_connect();
            for expected_failures in 1..MAX_CONNECT_ATTEMPTS {
                let outcome = state.connection_lost(epoch, 0).unwrap();
                assert!(matches!(
                    outcome,
                    LossOutcome::Retry { failures, .. } if failures == expected_failures
                ));
                epoch = state.retry_now(state.epoch()).unwrap();
                assert_eq!(
                    state.phase(),
                    ChannelPhase::Connecting {
                        attempt: expected_failures + 1
                    }
                );
            }
            let outcome = state.connection_lost(epoch, 0).unwrap();
            assert_eq!(outcome, LossOutcome::GaveUp);
            assert_eq!(state.phase(), ChannelPhase::GaveUp);
            assert!(state.phase().can_reconnect_manually());
        }

        #[test]
        fn test_retry_delays_follow_backoff_schedule() {
            let mut state = ChannelState::default();
            let mut delays = Vec::new();
            let mut epoch = state.begin_connect();
            while let Some(outcome) = state.connection_lost(epoch, 0) {
                match outcome {
                    LossOutcome::Retry { delay_ms, .. } => {
                        delays.push(delay_ms);
                        epoch = state.retry_now(state.epoch()).unwrap();
                    }
                    LossOutcome::GaveUp => break,
                }
            }
            assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000]);
        }

        #[test]
        fn test_stale_retry_timer_is_ignored() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            state.connection_lost(epoch, 0).unwrap();
            assert!(state.retry_now(epoch).is_none());
            assert!(matches!(
                state.phase(),
                ChannelPhase::RetryScheduled { .. }
            ));
        }

        #[test]
        fn test_manual_reconnect_restarts_from_gave_up() {
            let mut state = ChannelState::with_policy(ReconnectPolicy {
                max_attempts: 1,
                ..ReconnectPolicy::default()
            });
            let epoch = state.begin_connect();
            assert_eq!(state.connection_lost(epoch, 0), Some(LossOutcome::GaveUp));

            let next = state.begin_connect();
            assert_eq!(state.phase(), ChannelPhase::Connecting { attempt: 1 });
            assert!(next > epoch);
        }

        #[test]
        fn test_drop_after_connect_retries_with_base_delay() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            assert!(state.mark_connected(epoch));
            let outcome = state.connection_lost(epoch, 0).unwrap();
            assert_eq!(
                outcome,
                LossOutcome::Retry {
                    failures: 0,
                    delay_ms: 1_000
                }
            );
        }

        #[test]
        fn test_reset_returns_to_idle_and_invalidates_epoch() {
            let mut state = ChannelState::default();
            let epoch = state.begin_connect();
            state.reset();
            assert_eq!(state.phase(), ChannelPhase::Idle);
            assert!(state.connection_lost(epoch, 0).is_none());
        }
    }
}
