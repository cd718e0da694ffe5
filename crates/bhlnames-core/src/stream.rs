//! Concurrent processing of a stream of queries.
//!
//! A fixed number of workers pull queries from a shared input channel and push
//! outcomes to a shared output channel. Workers share only the read-only
//! [`Engine`]. Cancellation is checked before taking a new query and before
//! sending an outcome, so a query in flight is finished but never reported
//! after cancellation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{CoreError, Engine, Input, RefsByName};

/// Result of one query, tagged with the query ID. Outcomes arrive in no
/// particular order.
#[derive(Debug)]
pub struct StreamOutcome {
    pub id: String,
    pub result: Result<RefsByName, CoreError>,
}

/// Run `jobs_num` workers until `inputs` is closed and drained, or until
/// `cancel` fires. `outputs` is closed after every worker has exited.
pub async fn name_refs_stream(
    engine: Arc<Engine>,
    inputs: async_channel::Receiver<Input>,
    outputs: async_channel::Sender<StreamOutcome>,
    cancel: CancellationToken,
    jobs_num: usize,
) {
    let mut handles = Vec::with_capacity(jobs_num.max(1));
    for _ in 0..jobs_num.max(1) {
        handles.push(tokio::spawn(worker_loop(
            engine.clone(),
            inputs.clone(),
            outputs.clone(),
            cancel.clone(),
        )));
    }
    // workers are the last holders of the input channel
    drop(inputs);

    for h in handles {
        if let Err(e) = h.await {
            tracing::error!(error = %e, "stream worker panicked");
        }
    }
    outputs.close();
}

async fn worker_loop(
    engine: Arc<Engine>,
    inputs: async_channel::Receiver<Input>,
    outputs: async_channel::Sender<StreamOutcome>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let input = tokio::select! {
            _ = cancel.cancelled() => break,
            next = inputs.recv() => match next {
                Ok(input) => input,
                Err(_) => break,
            },
        };

        let id = input.id.clone();
        let worker_engine = engine.clone();
        // storage calls block, keep them off the async workers
        let result = tokio::task::spawn_blocking(move || worker_engine.name_refs(&input))
            .await
            .unwrap_or_else(|e| Err(CoreError::Task(e.to_string())));

        if let Err(e) = &result {
            tracing::warn!(id = %id, error = %e, "query failed");
        }

        if cancel.is_cancelled() {
            tracing::debug!(id = %id, "dropping result: cancelled");
            break;
        }
        if outputs.send(StreamOutcome { id, result }).await.is_err() {
            break;
        }
    }
}
