//! The attack loop: candidates in, one terminal outcome out.
//!
//! ```text
//! Idle -> Running -> Found | Exhausted | Cancelled | Errored
//! ```
//!
//! The loop is single-threaded. Cancellation is cooperative and observed before every
//! candidate, so at most the derivation already in flight completes after a cancel request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::candidates::CandidatePlan;
use crate::progress::{ProgressSnapshot, ThroughputMeter};
use crate::verifier::Verifier;
use crate::EncryptionParams;

/// Tuning knobs for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOptions {
    /// Emit a progress snapshot every N tested candidates. The matching candidate and the last
    /// candidate of the run always produce a snapshot. `0` behaves like `1`.
    pub progress_interval: u64,
}

impl Default for AttackOptions {
    fn default() -> Self {
        Self {
            progress_interval: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackState {
    Idle,
    Running,
    Found,
    Exhausted,
    Cancelled,
    Errored,
}

impl AttackState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttackState::Idle | AttackState::Running)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Found(String),
    /// Every candidate was tested without a match.
    NotFound,
    Cancelled,
    Failed(String),
}

impl RunOutcome {
    pub fn password(&self) -> Option<&str> {
        match self {
            RunOutcome::Found(password) => Some(password),
            _ => None,
        }
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One attack over one candidate plan.
#[derive(Debug)]
pub struct Attack {
    plan: CandidatePlan,
    verifier: Verifier,
    options: AttackOptions,
    state: AttackState,
}

impl Attack {
    pub fn new(plan: CandidatePlan, params: EncryptionParams, options: AttackOptions) -> Self {
        Self {
            plan,
            verifier: Verifier::new(params),
            options,
            state: AttackState::Idle,
        }
    }

    pub fn state(&self) -> AttackState {
        self.state
    }

    pub fn total(&self) -> u64 {
        self.plan.len()
    }

    /// Test candidates in order until one matches, the plan runs out, or `cancel` is set.
    ///
    /// An `Attack` runs once; calling `run` again reports [`RunOutcome::Failed`].
    pub fn run<F>(&mut self, cancel: &CancelToken, mut on_progress: F) -> RunOutcome
    where
        F: FnMut(ProgressSnapshot),
    {
        if self.state != AttackState::Idle {
            self.state = AttackState::Errored;
            return RunOutcome::Failed("attack has already run".to_string());
        }
        self.state = AttackState::Running;

        let total = self.plan.len();
        let interval = self.options.progress_interval.max(1);
        let params = self.verifier.params();
        log::info!(
            "starting {} attack over {total} candidates (spinCount={}, hashAlgorithm={})",
            self.plan.strategy(),
            params.spin_count,
            params.hash_algorithm
        );

        let meter = ThroughputMeter::start(total);
        let mut tested = 0u64;
        let mut outcome = RunOutcome::NotFound;

        for candidate in self.plan.iter() {
            if cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }

            let matched = self.verifier.verify(&candidate);
            tested += 1;

            if matched || tested % interval == 0 || tested == total {
                on_progress(meter.snapshot(&candidate, tested));
            }
            if matched {
                outcome = RunOutcome::Found(candidate);
                break;
            }
        }

        self.state = match outcome {
            RunOutcome::Found(_) => AttackState::Found,
            RunOutcome::NotFound => AttackState::Exhausted,
            RunOutcome::Cancelled => AttackState::Cancelled,
            RunOutcome::Failed(_) => AttackState::Errored,
        };

        let elapsed = meter.elapsed();
        log::info!("attack finished: {:?} after {tested} of {total} candidates", self.state);
        log::debug!(
            "tested {tested} candidates in {:.3}s ({:.1}/s)",
            elapsed.as_secs_f64(),
            meter.snapshot("", tested).speed
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::{AttackStrategy, NumericSpace, Wordlist};
    use crate::verifier::{derive_key, HashAlgorithm};

    fn params_for(password: &str) -> EncryptionParams {
        let salt = vec![0x5Au8; 16];
        let fingerprint = derive_key(password, &salt, 1, HashAlgorithm::Sha256)
            .unwrap()
            .to_vec();
        EncryptionParams {
            spin_count: 1,
            salt,
            fingerprint,
            hash_algorithm: "SHA256".to_string(),
        }
    }

    fn numeric_plan(width: u8) -> CandidatePlan {
        CandidatePlan::new(AttackStrategy::BruteForce)
            .with_numeric_space(NumericSpace::new(width).unwrap())
    }

    #[test]
    fn found_stops_immediately_and_reports_the_match() {
        let mut attack = Attack::new(numeric_plan(3), params_for("042"), AttackOptions::default());
        let mut snapshots = Vec::new();
        let outcome = attack.run(&CancelToken::new(), |snap| snapshots.push(snap));

        assert_eq!(outcome, RunOutcome::Found("042".to_string()));
        assert_eq!(attack.state(), AttackState::Found);
        assert_eq!(snapshots.len(), 43);
        let last = snapshots.last().unwrap();
        assert_eq!(last.current, "042");
        assert_eq!(last.tested, 43);
        assert_eq!(last.total, 1_000);
    }

    #[test]
    fn exhausted_plan_is_not_found() {
        let plan = CandidatePlan::new(AttackStrategy::Dictionary)
            .with_wordlist(Wordlist::new(["a", "b", "c"]));
        let mut attack = Attack::new(plan, params_for("zzz"), AttackOptions::default());
        let mut tested = Vec::new();
        let outcome = attack.run(&CancelToken::new(), |snap| tested.push(snap.tested));

        assert_eq!(outcome, RunOutcome::NotFound);
        assert_eq!(attack.state(), AttackState::Exhausted);
        assert_eq!(tested, vec![1, 2, 3]);
    }

    #[test]
    fn cancel_is_observed_before_the_next_candidate() {
        let cancel = CancelToken::new();
        let mut attack = Attack::new(numeric_plan(3), params_for("999"), AttackOptions::default());
        let mut last_tested = 0;
        let outcome = attack.run(&cancel, |snap| {
            last_tested = snap.tested;
            if snap.tested == 10 {
                cancel.cancel();
            }
        });

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(attack.state(), AttackState::Cancelled);
        assert_eq!(last_tested, 10);
    }

    #[test]
    fn cancelled_before_start_tests_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut attack = Attack::new(numeric_plan(2), params_for("00"), AttackOptions::default());
        let mut calls = 0;
        assert_eq!(attack.run(&cancel, |_| calls += 1), RunOutcome::Cancelled);
        assert_eq!(calls, 0);
    }

    #[test]
    fn progress_interval_throttles_but_keeps_match_and_last() {
        let options = AttackOptions {
            progress_interval: 25,
        };
        let mut attack = Attack::new(numeric_plan(2), params_for("nope"), options);
        let mut tested = Vec::new();
        attack.run(&CancelToken::new(), |snap| tested.push(snap.tested));
        assert_eq!(tested, vec![25, 50, 75, 100]);

        let mut attack = Attack::new(numeric_plan(2), params_for("07"), options);
        let mut tested = Vec::new();
        let outcome = attack.run(&CancelToken::new(), |snap| tested.push(snap.tested));
        assert_eq!(outcome.password(), Some("07"));
        assert_eq!(tested, vec![8]);
    }

    #[test]
    fn state_is_running_while_candidates_are_tested() {
        let mut attack = Attack::new(numeric_plan(2), params_for("nope"), AttackOptions::default());
        let interrupted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            attack.run(&CancelToken::new(), |snap| {
                if snap.tested == 5 {
                    panic!("stop mid-run");
                }
            })
        }));
        assert!(interrupted.is_err());
        assert_eq!(attack.state(), AttackState::Running);
        assert!(!attack.state().is_terminal());
    }

    #[test]
    fn second_run_fails() {
        let mut attack = Attack::new(numeric_plan(1), params_for("3"), AttackOptions::default());
        assert!(matches!(attack.run(&CancelToken::new(), |_| {}), RunOutcome::Found(_)));
        assert!(matches!(attack.run(&CancelToken::new(), |_| {}), RunOutcome::Failed(_)));
        assert_eq!(attack.state(), AttackState::Errored);
        assert!(attack.state().is_terminal());
    }
}
