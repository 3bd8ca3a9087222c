use {
    crate::{
        error::ErrorKind,
        pipeline::{CompletionActorRef, CompletionMsg},
        types::job::{PendingJobResult, VerifierBatch},
        ActorResult, BatchVerifier,
    },
    ractor::{async_trait, Actor, ActorRef, MessagingErr},
    std::{collections::HashSet, sync::Arc},
    tracing::warn,
};

pub type WorkerMsg = Msg;
pub type WorkerActorRef = ActorRef<Msg>;

pub enum Msg {
    Verify(VerifierBatch),
}

/// Round-robin dispatcher over a fixed pool of verifier workers.
///
/// The broker holds the completion queue's address as its only way out;
/// results never travel back through the submit path.
pub struct WorkerBroker {
    workers: Vec<WorkerActorRef>,
    next: usize,
}

impl WorkerBroker {
    pub async fn spawn(
        count: usize,
        verifier: Arc<dyn BatchVerifier>,
        completion: CompletionActorRef,
    ) -> Result<Self, ractor::SpawnErr> {
        let mut workers = Vec::with_capacity(count.max(1));
        for _ in 0..count.max(1) {
            let worker = VerifierWorker {
                verifier: verifier.clone(),
                completion: completion.clone(),
            };
            let (actor_ref, _) = Actor::spawn(None, worker, ()).await?;
            workers.push(actor_ref);
        }

        Ok(Self { workers, next: 0 })
    }

    /// Hands a batch to the next worker. Exactly one completion per batch
    /// will reach the queue, whatever the verifier does.
    pub fn submit(&mut self, batch: VerifierBatch) -> Result<(), MessagingErr<Msg>> {
        let worker = &self.workers[self.next % self.workers.len()];
        self.next = self.next.wrapping_add(1);
        worker.cast(Msg::Verify(batch))
    }

    pub fn stop(&self) {
        for worker in &self.workers {
            worker.stop(None);
        }
    }
}

struct VerifierWorker {
    verifier: Arc<dyn BatchVerifier>,
    completion: CompletionActorRef,
}

#[async_trait]
impl Actor for VerifierWorker {
    type Arguments = ();
    type Msg = Msg;
    type State = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> ActorResult<Self::State> {
        Ok(())
    }

    #[tracing::instrument("verify_batch", skip_all)]
    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        msg: Msg,
        _state: &mut Self::State,
    ) -> ActorResult<()> {
        let Msg::Verify(batch) = msg;
        let mut job = PendingJobResult::new(batch.ticket_id);

        match self.verifier.verify_batch(&batch).await {
            Ok(outcome) => {
                // Submission order is preserved; repeated ids are dropped.
                let mut seen = HashSet::new();
                job.valid_transactions = outcome
                    .valid
                    .into_iter()
                    .filter(|v| seen.insert(v.id.clone()))
                    .collect();
                job.invalid = outcome.invalid;
                job.excess = outcome.excess;
                job.errors = outcome.errors;
            }
            Err(err) => {
                // A verifier that fails as a whole must not swallow the
                // ticket; reject every transaction and deliver anyway.
                warn!(ticket_id = %batch.ticket_id, error = %err, "verifier failed, rejecting batch");
                for tx in &batch.transactions {
                    job.push_error(&tx.id, ErrorKind::Unknown, err.to_string());
                }
            }
        }

        self.completion.cast(CompletionMsg::Completed(Box::new(job)))?;
        Ok(())
    }
}
