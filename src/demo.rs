//! Synthetic message stream replayed against a limiter.
//!
//! Messages are numbered consecutively across rounds and assigned to users
//! round-robin (`message_id % users + 1`). Each message is one admission
//! attempt; a denial reports how long the user must wait.

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::config::DemoConfig;
use crate::error::Result;
use crate::ratelimit::{Admission, Clock, SlidingWindowLimiter};

/// One replayed message and the limiter's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoEvent {
    /// Round the message belongs to, starting at 1
    pub round: u32,
    /// Message number, starting at 1 and continuing across rounds
    pub message_id: u32,
    /// User the message was sent as
    pub user: String,
    /// The limiter's decision
    pub admission: Admission,
}

/// Replay the configured message stream through `limiter`.
///
/// Sleeps a random delay between messages and a fixed pause between rounds.
/// Fails only if `config` is invalid.
pub async fn run<C: Clock>(
    limiter: &SlidingWindowLimiter<String, C>,
    config: &DemoConfig,
) -> Result<Vec<DemoEvent>> {
    config.validate()?;
    let pause = config.pause()?;
    let total = config.rounds.saturating_mul(config.messages_per_round);
    let mut events = Vec::with_capacity(total as usize);

    for round in 1..=config.rounds {
        if round > 1 {
            info!(pause = ?pause, "Waiting for windows to slide");
            tokio::time::sleep(pause).await;
        }
        info!(round = round, "Starting message round");

        let first = (round - 1) * config.messages_per_round + 1;
        for message_id in first..first + config.messages_per_round {
            let user = (message_id % config.users + 1).to_string();
            let admission = limiter.admit(user.as_str());

            if admission.allowed {
                info!(
                    message = message_id,
                    user = %user,
                    remaining = admission.remaining,
                    "Message accepted"
                );
            } else {
                warn!(
                    message = message_id,
                    user = %user,
                    wait = %format!("{:.1}s", admission.retry_after.as_secs_f64()),
                    "Message rejected"
                );
            }

            events.push(DemoEvent {
                round,
                message_id,
                user,
                admission,
            });

            tokio::time::sleep(random_delay(config)).await;
        }
    }

    Ok(events)
}

fn random_delay(config: &DemoConfig) -> Duration {
    let millis = rand::thread_rng().gen_range(config.min_delay_ms..=config.max_delay_ms);
    Duration::from_millis(millis)
}
