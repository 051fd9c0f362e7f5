//! Follow a run to a resting point
//!
//! Pumps the run's events into a [`ProgressNotifier`] while it executes and,
//! when it pauses for clarification, asks the [`ClarificationResponder`] and
//! carries on. Returns once the run is terminal, left paused, or stopped
//! without a terminal event (in which case it stays resumable).

use council_application::{SessionError, SessionManager};
use council_domain::{Run, RunId, RunStatus};
use thiserror::Error;
use tracing::{debug, info};

use crate::interaction::ClarificationResponder;
use crate::progress::ProgressNotifier;

/// Errors while following a run
#[derive(Error, Debug)]
pub enum FollowError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Could not read clarification answer: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Drives a followed run on behalf of an interactive client
pub struct RunFollower<'a> {
    session: &'a SessionManager,
    notifier: &'a dyn ProgressNotifier,
    responder: &'a dyn ClarificationResponder,
}

impl<'a> RunFollower<'a> {
    pub fn new(
        session: &'a SessionManager,
        notifier: &'a dyn ProgressNotifier,
        responder: &'a dyn ClarificationResponder,
    ) -> Self {
        Self {
            session,
            notifier,
            responder,
        }
    }

    /// Follow `run_id`, printing events from sequence `from` onwards.
    pub async fn follow(&self, run_id: RunId, from: u64) -> Result<Run, FollowError> {
        let mut subscription = self.session.subscribe(run_id, from).await?;
        loop {
            let run = {
                let waiting = self.session.wait(run_id);
                tokio::pin!(waiting);
                loop {
                    tokio::select! {
                        biased;
                        Some(event) = subscription.recv() => self.notifier.on_event(&event),
                        run = &mut waiting => break run?,
                    }
                }
            };
            for event in subscription.drain_ready() {
                self.notifier.on_event(&event);
            }

            if run.status != RunStatus::AwaitingClarification {
                debug!(%run_id, status = %run.status, "Stopped following");
                self.notifier.finish();
                return Ok(run);
            }
            let Some(request) = run.pending_clarification.clone() else {
                self.notifier.finish();
                return Ok(run);
            };
            match self.responder.respond(&request).await? {
                Some(text) => {
                    info!(%run_id, request = %request.id, "Answering clarification");
                    self.session
                        .answer_clarification(run_id, &request.id, &text)
                        .await?;
                }
                None => {
                    self.notifier.finish();
                    return Ok(run);
                }
            }
        }
    }
}
