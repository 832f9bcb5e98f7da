use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error};

use super::ApprovalCoordinator;
use crate::flow::prompts;

/// One countdown step: wait `wait`, then `remaining` is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub wait: Duration,
    pub remaining: Duration,
}

/// Split `total` into ticks of at most `tick`, ending at zero.
///
/// A zero tick means a single step.
pub fn schedule(total: Duration, tick: Duration) -> Vec<Tick> {
    let step = if tick.is_zero() { total } else { tick };
    let mut ticks = Vec::new();
    let mut remaining = total;

    loop {
        let wait = step.min(remaining);
        remaining -= wait;
        ticks.push(Tick { wait, remaining });
        if remaining.is_zero() {
            break;
        }
    }

    ticks
}

#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub user_id: i64,
    pub chat_id: i64,
    /// Status message refreshed on every tick, if it was delivered
    pub status_message_id: Option<i32>,
}

pub(super) fn spawn(
    coordinator: ApprovalCoordinator,
    session: Session,
    total: Duration,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for Tick { wait, remaining } in schedule(total, tick) {
            sleep(wait).await;

            if remaining.is_zero() {
                if let Err(e) = coordinator.expire(session.user_id).await {
                    error!(
                        "Failed to release request of user {} after countdown: {:#}",
                        session.user_id, e
                    );
                }
                break;
            }

            let Some(status_message_id) = session.status_message_id else {
                continue;
            };
            let text = prompts::verification_status(Some(remaining.as_secs()));
            if let Err(e) = coordinator
                .transport()
                .edit_text(session.chat_id, status_message_id, &text, None)
                .await
            {
                // "message is not modified" and friends
                debug!("Countdown edit failed for user {}: {:#}", session.user_id, e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_schedule_even_split() {
        let remaining: Vec<u64> = schedule(secs(90), secs(30))
            .iter()
            .map(|t| t.remaining.as_secs())
            .collect();

        assert_eq!(remaining, vec![60, 30, 0]);
    }

    #[test]
    fn test_schedule_partial_last_tick() {
        let ticks = schedule(secs(100), secs(30));

        assert_eq!(ticks.len(), 4);
        assert_eq!(ticks[3], Tick { wait: secs(10), remaining: secs(0) });
    }

    #[test]
    fn test_schedule_tick_longer_than_total() {
        assert_eq!(
            schedule(secs(10), secs(30)),
            vec![Tick { wait: secs(10), remaining: secs(0) }]
        );
        assert_eq!(
            schedule(secs(10), Duration::ZERO),
            vec![Tick { wait: secs(10), remaining: secs(0) }]
        );
    }

    #[test]
    fn test_fifteen_minute_variant() {
        let ticks = schedule(secs(15 * 60), secs(30));

        assert_eq!(ticks.len(), 30);
        assert_eq!(ticks[0].remaining, secs(870));
    }
}
