//! Per-office debounce state machine: rejects single-cycle blips while
//! staying responsive to sustained change.

use super::types::{RawSample, State};

/// Outcome of feeding one instantaneous classification through the
/// debouncer.
#[derive(Debug, Clone, PartialEq)]
pub enum DebounceOutcome {
    /// No transition committed; streaks updated only.
    NoChange,
    /// A transition committed at this sample.
    Committed { from: State, to: State },
}

/// Pure debounce logic operating on streak counters owned by the caller
/// (typically embedded in `OfficeRuntime`). Kept free of I/O so it is
/// directly unit-testable.
pub struct Debouncer {
    pub retries_down: u32,
    pub retries_up: u32,
}

impl Debouncer {
    pub fn new(retries_down: u32, retries_up: u32) -> Self {
        Self {
            retries_down,
            retries_up,
        }
    }

    /// Feeds one new sample against the current confirmed state and streak
    /// counters, mutating them in place and returning whether a transition
    /// committed.
    pub fn feed(
        &self,
        confirmed: &mut State,
        fail_streak: &mut u32,
        ok_streak: &mut u32,
        sample: &RawSample,
    ) -> DebounceOutcome {
        let observed = sample.instant_state();

        if observed == *confirmed {
            *ok_streak += 1;
            *fail_streak = 0;
            return DebounceOutcome::NoChange;
        }

        let deteriorating = matches!(observed, State::Down | State::Degraded)
            && matches!(*confirmed, State::Up | State::Unknown);

        if deteriorating {
            *fail_streak += 1;
            if *fail_streak >= self.retries_down.max(1) {
                let from = *confirmed;
                *confirmed = observed;
                *fail_streak = 0;
                *ok_streak = 0;
                return DebounceOutcome::Committed {
                    from,
                    to: observed,
                };
            }
            DebounceOutcome::NoChange
        } else {
            *ok_streak += 1;
            if *ok_streak >= self.retries_up.max(1) {
                let from = *confirmed;
                *confirmed = observed;
                *fail_streak = 0;
                *ok_streak = 0;
                return DebounceOutcome::Committed {
                    from,
                    to: observed,
                };
            }
            DebounceOutcome::NoChange
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(state: State) -> RawSample {
        match state {
            State::Up => RawSample {
                ts: 0,
                gateway: true,
                mx: true,
                ipsec: true,
            },
            State::Degraded => RawSample {
                ts: 0,
                gateway: true,
                mx: false,
                ipsec: false,
            },
            State::Down => RawSample {
                ts: 0,
                gateway: false,
                mx: false,
                ipsec: true,
            },
            State::Unknown => unreachable!("no raw sample classifies as unknown"),
        }
    }

    /// Scenario 4 from the testable properties: with retries_down=2,
    /// retries_up=1, the sequence up,down,up,down,down,up starting from
    /// confirmed up commits exactly one up->down transition (5th sample)
    /// then one down->up transition (6th sample).
    #[test]
    fn scenario_four_debounce_sequence() {
        let debouncer = Debouncer::new(2, 1);
        let mut confirmed = State::Up;
        let mut fail_streak = 0;
        let mut ok_streak = 0;

        let sequence = [
            State::Up,
            State::Down,
            State::Up,
            State::Down,
            State::Down,
            State::Up,
        ];

        let mut commits = Vec::new();
        for s in sequence {
            let outcome = debouncer.feed(&mut confirmed, &mut fail_streak, &mut ok_streak, &sample(s));
            if let DebounceOutcome::Committed { from, to } = outcome {
                commits.push((from, to));
            }
        }

        assert_eq!(commits, vec![(State::Up, State::Down), (State::Down, State::Up)]);
        assert_eq!(confirmed, State::Up);
    }

    #[test]
    fn single_blip_does_not_commit() {
        let debouncer = Debouncer::new(2, 1);
        let mut confirmed = State::Up;
        let mut fail_streak = 0;
        let mut ok_streak = 0;

        let outcome = debouncer.feed(&mut confirmed, &mut fail_streak, &mut ok_streak, &sample(State::Down));
        assert_eq!(outcome, DebounceOutcome::NoChange);
        assert_eq!(confirmed, State::Up);
        assert_eq!(fail_streak, 1);

        let outcome = debouncer.feed(&mut confirmed, &mut fail_streak, &mut ok_streak, &sample(State::Up));
        assert_eq!(outcome, DebounceOutcome::NoChange);
        assert_eq!(fail_streak, 0);
        assert_eq!(ok_streak, 1);
    }

    #[test]
    fn lateral_recovery_counts_as_ok_streak() {
        let debouncer = Debouncer::new(3, 1);
        let mut confirmed = State::Down;
        let mut fail_streak = 0;
        let mut ok_streak = 0;

        let outcome = debouncer.feed(&mut confirmed, &mut fail_streak, &mut ok_streak, &sample(State::Degraded));
        assert_eq!(
            outcome,
            DebounceOutcome::Committed {
                from: State::Down,
                to: State::Degraded
            }
        );
    }
}
