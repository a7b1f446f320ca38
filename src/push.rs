//! Push Channel
//!
//! Turns a session's filter into a stream of [`PushEvent`]s: the current
//! results straight away, fresh results after every filter change, and a
//! `Ping` every keep-alive period. Each ping also extends the session's
//! life, so an open tab keeps its session alive.
//!
//! The stream ends when the session is evicted or another channel attaches
//! to the same session. Dropping it (client disconnect) detaches the channel
//! and stops the keep-alive timer.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::jobs::JobStore;
use crate::models::{Filter, ResultsPayload};
use crate::render;
use crate::sessions::{SessionError, SessionStore};

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Results(ResultsPayload),
    Ping,
}

impl PushEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::Results(_) => "results",
            PushEvent::Ping => "ping",
        }
    }
}

fn results_for(jobs: &JobStore, filter: &Filter) -> PushEvent {
    PushEvent::Results(render::render_results(&jobs.filter(filter)))
}

/// Detaches the channel when the stream is dropped.
struct DetachOnDrop {
    store: SessionStore,
    session_id: String,
    channel_id: Uuid,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        let store = self.store.clone();
        let session_id = std::mem::take(&mut self.session_id);
        let channel_id = self.channel_id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                store.detach_channel(&session_id, channel_id).await;
            });
        }
    }
}

enum Step {
    Emit(PushEvent),
    Stop,
}

/// Attach a push channel to `session_id` and return its event stream.
pub async fn subscribe(
    store: SessionStore,
    jobs: Arc<JobStore>,
    session_id: &str,
    keep_alive: Duration,
) -> Result<impl Stream<Item = PushEvent>, SessionError> {
    let attachment = store.attach_channel(session_id).await?;
    let guard = DetachOnDrop {
        store: store.clone(),
        session_id: session_id.to_string(),
        channel_id: attachment.channel_id,
    };
    let session_id = session_id.to_string();
    debug!(session_id = %session_id, channel_id = %attachment.channel_id, "Push channel attached");

    Ok(async_stream::stream! {
        let _guard = guard;
        let mut filter = attachment.filter;
        let mut closed = attachment.closed;

        let current = filter.borrow_and_update().clone();
        yield results_for(&jobs, &current);

        let mut keep_alive = interval_at(Instant::now() + keep_alive, keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                changed = filter.changed() => match changed {
                    Ok(()) => {
                        let current = filter.borrow_and_update().clone();
                        Step::Emit(results_for(&jobs, &current))
                    }
                    Err(_) => Step::Stop,
                },
                _ = keep_alive.tick() => {
                    store.touch(&session_id).await;
                    Step::Emit(PushEvent::Ping)
                }
                _ = &mut closed => Step::Stop,
            };

            match step {
                Step::Emit(event) => {
                    yield event;
                }
                Step::Stop => {
                    debug!(session_id = %session_id, "Push channel closed");
                    break;
                }
            }
        }
    })
}
