use {
    crate::{
        error::ErrorKind,
        processor::{ProcessorActorRef, ProcessorMsg},
        types::job::PendingJobResult,
        ActorResult, AppResult, Collaborators,
    },
    ractor::{async_trait, rpc::CallResult, Actor, ActorRef},
    std::collections::BTreeSet,
    tracing::{debug, error, Span},
};

pub type CompletionMsg = Msg;
pub type CompletionActorRef = ActorRef<Msg>;

pub enum Msg {
    /// A verifier worker finished a batch.
    Completed(Box<PendingJobResult>),
}

/// Single-consumer serialisation point for verifier results.
///
/// The mailbox is the queue: items are handled strictly one at a time and in
/// arrival order, which is what makes the wallet-apply and pool-insert calls
/// below safe. The queue is unbounded and applies no backpressure; verifier
/// parallelism is the broker's concern.
pub struct CompletionQueue {
    processor: ProcessorActorRef,
    collaborators: Collaborators,
    span: Span,
}

impl CompletionQueue {
    pub async fn spawn(
        processor: ProcessorActorRef,
        collaborators: Collaborators,
        span: Span,
    ) -> Result<CompletionActorRef, ractor::SpawnErr> {
        let queue = Self {
            processor,
            collaborators,
            span,
        };

        let (actor_ref, _) = Actor::spawn(None, queue, ()).await?;
        Ok(actor_ref)
    }

    /// Post-verification pipeline, run once per ticket.
    ///
    /// Collaborator failures that concern a single transaction become error
    /// records and the pipeline continues; a failure of a whole call is
    /// returned and the ticket is abandoned by the caller.
    async fn process(&self, job: &mut PendingJobResult) -> AppResult<()> {
        // Whatever the verifier speculated, only this pipeline decides the
        // final accept and broadcast sets.
        job.accept.clear();
        job.broadcast.clear();

        let mut accepted = Vec::new();

        let valid_list = job.valid_transactions.clone();
        for valid in &valid_list {
            let tx = match self.collaborators.codec.decode_unchecked(&valid.raw) {
                Ok(tx) => tx,
                Err(err) => {
                    job.push_error(&valid.id, ErrorKind::Unknown, err.to_string());
                    continue;
                }
            };

            if let Err(err) = self
                .collaborators
                .wallets
                .throw_if_cannot_be_applied(&tx)
                .await
            {
                job.push_error(&tx.id, ErrorKind::Apply, err.to_string());
                continue;
            }

            let fee = self.collaborators.fees.match_fee(&tx);
            if !fee.enter_pool && !fee.broadcast {
                job.push_error(
                    &tx.id,
                    ErrorKind::LowFee,
                    "The fee is too low to broadcast and accept the transaction",
                );
                continue;
            }
            if fee.enter_pool {
                job.accept.insert(tx.id.clone(), tx.clone());
            }
            if fee.broadcast {
                job.broadcast.insert(tx.id.clone(), tx.clone());
            }

            accepted.push(tx);
        }

        let candidates: BTreeSet<_> = job
            .accept
            .keys()
            .chain(job.broadcast.keys())
            .cloned()
            .collect();
        if !candidates.is_empty() {
            let forged = self
                .collaborators
                .database
                .get_forged_transaction_ids(candidates.into_iter().collect())
                .await?;
            for id in forged {
                job.push_error(&id, ErrorKind::Forged, "Already forged.");
                job.accept.remove(&id);
                job.broadcast.remove(&id);
                let index = job
                    .valid_transactions
                    .iter()
                    .position(|v| v.id == id)
                    .ok_or_else(|| format!("forged id {id} missing from verified batch"))?;
                job.valid_transactions.remove(index);
            }
        }

        let to_add: Vec<_> = accepted
            .iter()
            .filter(|tx| job.accept.contains_key(&tx.id))
            .cloned()
            .collect();
        if !to_add.is_empty() {
            let outcome = self.collaborators.mempool.add_transactions(to_add).await?;
            for rejection in outcome.not_added {
                job.accept.remove(&rejection.id);
                // A full pool is transient; the transaction is still worth
                // gossiping. Every other pool refusal is terminal for it.
                if rejection.kind != ErrorKind::PoolFull {
                    job.broadcast.remove(&rejection.id);
                }
                job.push_error(&rejection.id, rejection.kind, rejection.message);
            }
        }

        if !job.broadcast.is_empty() {
            let txs: Vec<_> = job.broadcast.values().cloned().collect();
            debug!(ticket_id = %job.ticket_id, count = txs.len(), "handing transactions to peer monitor");
            self.collaborators.peers.broadcast_transactions(txs).await;
        }

        Ok(())
    }
}

#[async_trait]
impl Actor for CompletionQueue {
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

    #[tracing::instrument("completion", parent = &self.span, skip_all)]
    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        msg: Msg,
        _state: &mut Self::State,
    ) -> ActorResult<()> {
        let Msg::Completed(mut job) = msg;

        // Give the submit path a turn before each item so a burst of
        // completions cannot starve it.
        tokio::task::yield_now().await;

        let ticket_id = job.ticket_id;
        match self.process(&mut job).await {
            Ok(()) => {
                let result = self
                    .processor
                    .call(|reply| ProcessorMsg::Finalize { job, reply }, None)
                    .await?;
                if !matches!(result, CallResult::Success(())) {
                    error!(%ticket_id, "processor did not acknowledge finalisation");
                }
            }
            Err(err) => {
                error!(%ticket_id, error = %err, "post-verification pipeline failed, abandoning ticket");
                let tx_ids = job.tx_ids();
                self.processor
                    .cast(ProcessorMsg::Abandon { ticket_id, tx_ids })?;
            }
        }

        Ok(())
    }
}
