//! Event driver
//!
//! Reads newline-delimited [`ActivityEvent`]s, applies each to the engine and
//! writes one JSON [`DriverReply`] per event. Bad lines and failed events are
//! logged and answered with an error reply; neither stops the loop.

use crate::events::{parse_line, ActivityEvent, DriverReply};
use levelup_engine::LevelingEngine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DriverStats {
    pub handled: usize,
    pub malformed: usize,
    pub failed: usize,
}

/// Apply a single event.
pub async fn apply(engine: &LevelingEngine, event: ActivityEvent) -> DriverReply {
    let result = match event {
        ActivityEvent::VoiceJoin { user, guild } => {
            let stale = engine.voice.on_join(&user, &guild);
            Ok(DriverReply::Joined { user, replaced_stale: stale.is_some() })
        }
        ActivityEvent::VoiceLeave { user } => {
            let seconds = engine.voice.on_leave(&user).await;
            Ok(DriverReply::Left { user, seconds })
        }
        ActivityEvent::Message { user, guild, text } => {
            engine.messages.on_message(&user, &guild, &text).await.map(|outcome| match outcome {
                Some(outcome) => DriverReply::Granted(outcome),
                None => DriverReply::Cooldown { user, guild },
            })
        }
        ActivityEvent::SetBoost { guild, multiplier, hours } => engine
            .boosts
            .set_boost(&guild, multiplier, hours)
            .await
            .map(DriverReply::Boost),
        ActivityEvent::ClearBoost { guild } => engine
            .boosts
            .clear(&guild)
            .await
            .map(|removed| DriverReply::BoostCleared { guild, removed }),
        ActivityEvent::Rank { user, guild } => {
            engine.grants.rank(&user, &guild).await.map(DriverReply::Rank)
        }
        ActivityEvent::Leaderboard { guild, limit } => engine
            .grants
            .leaderboard(&guild, limit)
            .await
            .map(|entries| DriverReply::Leaderboard { guild, entries }),
    };

    result.unwrap_or_else(|e| {
        warn!("Event failed ({:?}): {}", e.class(), e);
        DriverReply::Error { message: e.to_string() }
    })
}

/// Drive the engine from `reader` until EOF or cancellation.
pub async fn run<R, W>(
    engine: &LevelingEngine,
    reader: R,
    mut writer: W,
    cancel: CancellationToken,
) -> anyhow::Result<DriverStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = DriverStats::default();
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Driver cancelled");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("Input closed");
            break;
        };

        let reply = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(event)) => {
                let reply = apply(engine, event).await;
                if matches!(reply, DriverReply::Error { .. }) {
                    stats.failed += 1;
                }
                stats.handled += 1;
                reply
            }
            Err(e) => {
                warn!("Skipping malformed event: {} ({})", e, line.trim());
                stats.malformed += 1;
                DriverReply::Error { message: format!("malformed event: {}", e) }
            }
        };

        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    Ok(stats)
}
