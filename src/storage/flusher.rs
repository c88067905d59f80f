//! AsyncFlusher: a bounded multi-worker write-behind queue. Each
//! worker owns a private datastore connection; ingesters hand off
//! completed batches and never touch the datastore directly.
//!
//! Bounded queue with blocking enqueue for backpressure, one transaction
//! per batch in a fixed table order, and a retry loop on deadlock with
//! exponential backoff jittered by worker identity so concurrently
//! retrying workers don't resynchronize on the same delay.

use crate::config::FlusherConfig;
use crate::error::{Result, SubstrateError};
use crate::storage::datastore::Datastore;
use crate::substrate::{
    Composition, CompositionSequence, Physicality, Relation, RelationEvidence, RelationRating,
    RelationSequence,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{error, warn};

/// One unit of work handed from an ingester to the flusher: everything
/// computed for a chunk of input, ready to write in a single transaction.
#[derive(Debug, Clone, Default)]
pub struct SubstrateBatch {
    pub physicalities: Vec<Physicality>,
    pub compositions: Vec<Composition>,
    pub composition_sequences: Vec<CompositionSequence>,
    pub relations: Vec<Relation>,
    pub relation_sequences: Vec<RelationSequence>,
    pub ratings: Vec<RelationRating>,
    pub evidence: Vec<RelationEvidence>,
}

impl SubstrateBatch {
    pub fn is_empty(&self) -> bool {
        self.physicalities.is_empty()
            && self.compositions.is_empty()
            && self.relations.is_empty()
    }
}

pub struct AsyncFlusher {
    sender: mpsc::Sender<SubstrateBatch>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl AsyncFlusher {
    pub fn spawn(datastore: Arc<dyn Datastore>, config: FlusherConfig) -> Self {
        let (sender, receiver) = mpsc::channel::<SubstrateBatch>(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let receiver = receiver.clone();
            let datastore = datastore.clone();
            let pending = pending.clone();
            let idle = idle.clone();
            let max_retries = config.max_retries;
            let retry_base_ms = config.retry_base_ms;

            workers.push(tokio::spawn(async move {
                loop {
                    let batch = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    let Some(batch) = batch else { break };

                    if !batch.is_empty() {
                        flush_with_retry(
                            datastore.as_ref(),
                            &batch,
                            worker_id,
                            max_retries,
                            retry_base_ms,
                        )
                        .await;
                    }

                    if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                        idle.notify_waiters();
                    }
                }
            }));
        }

        Self {
            sender,
            pending,
            idle,
            workers,
        }
    }

    /// Enqueue a batch, blocking the caller while the queue is full. This
    /// is the pipeline's only backpressure mechanism: ingesters stall here
    /// rather than growing an unbounded in-memory queue.
    pub async fn enqueue(&self, batch: SubstrateBatch) -> Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.sender
            .send(batch)
            .await
            .map_err(|_| SubstrateError::Invariant("flusher workers have shut down".into()))
    }

    /// Block until every enqueued batch has been flushed (successfully or
    /// dropped after exhausting retries).
    pub async fn wait_all(&self) {
        loop {
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            self.idle.notified().await;
        }
    }

    /// Stop accepting new batches and join every worker, waiting for
    /// in-flight batches to finish first.
    pub async fn shutdown(self) {
        self.wait_all().await;
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn flush_with_retry(
    datastore: &dyn Datastore,
    batch: &SubstrateBatch,
    worker_id: usize,
    max_retries: u32,
    retry_base_ms: u64,
) {
    for attempt in 0..=max_retries {
        match flush_once(datastore, batch).await {
            Ok(()) => return,
            Err(e) if e.is_transient() && attempt < max_retries => {
                let base = retry_base_ms * (1u64 << attempt);
                let jitter = (worker_id as u64).wrapping_mul(2654435761) % (base * 2).max(1);
                let delay = std::time::Duration::from_millis(base + jitter);
                warn!(attempt, ?delay, "transient flush error, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(error = %e, "async flush failed, dropping batch");
                return;
            }
        }
    }
}

/// Single-transaction write protocol, in dependency order so foreign keys
/// always resolve within the same transaction: physicality before anything
/// that references it, compositions before their sequences, relations
/// before their sequences/rating/evidence.
async fn flush_once(datastore: &dyn Datastore, batch: &SubstrateBatch) -> Result<()> {
    let mut txn = datastore.begin().await?;

    let result = write_batch(txn.as_mut(), batch).await;
    match result {
        Ok(()) => txn.commit().await,
        Err(e) => {
            let _ = txn.rollback().await;
            Err(e)
        }
    }
}

async fn write_batch(
    txn: &mut (dyn crate::storage::datastore::Transaction),
    batch: &SubstrateBatch,
) -> Result<()> {
    for phys in &batch.physicalities {
        txn.upsert_physicality(phys).await?;
    }
    for comp in &batch.compositions {
        txn.upsert_composition(comp).await?;
    }
    txn.upsert_composition_sequence(&batch.composition_sequences).await?;
    for rel in &batch.relations {
        txn.upsert_relation(rel).await?;
    }
    txn.upsert_relation_sequence(&batch.relation_sequences).await?;
    for rating in &batch.ratings {
        txn.upsert_relation_rating(rating).await?;
    }
    for evidence in &batch.evidence {
        txn.upsert_relation_evidence(evidence).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_reports_empty() {
        assert!(SubstrateBatch::default().is_empty());
    }

    #[test]
    fn batch_with_physicality_is_not_empty() {
        let mut batch = SubstrateBatch::default();
        batch.physicalities.push(Physicality {
            phys_id: 1,
            hilbert_index: 1,
            centroid: nalgebra::Vector4::new(1.0, 0.0, 0.0, 0.0),
            trajectory: vec![],
        });
        assert!(!batch.is_empty());
    }
}
