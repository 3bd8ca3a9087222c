use {
    crate::{
        error::{ErrorKind, ProcessorError},
        pipeline::{CompletionActorRef, CompletionQueue},
        types::job::{FinishedJobResult, PendingJobResult, VerifierBatch},
        types::tx::{ParsedTx, TxId},
        worker::WorkerBroker,
        ActorResult, Collaborators,
    },
    ractor::{async_trait, rpc::CallResult, Actor, ActorRef, RpcReplyPort},
    serde::{Deserialize, Serialize},
    std::collections::{BTreeSet, HashMap, HashSet},
    tracing::{debug, error, info, Span},
    uuid::Uuid,
};

pub type ProcessorMsg = Msg;
pub type ProcessorActorRef = ActorRef<Msg>;

/// Runtime configuration for the admission processor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Number of verifier worker actors behind the broker.
    pub verifier_workers: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            verifier_workers: 2,
        }
    }
}

pub enum Msg {
    /// Submit a batch; replies with the ticket id before anything completes.
    CreateJob {
        transactions: Vec<ParsedTx>,
        reply: RpcReplyPort<Uuid>,
    },
    HasPending {
        ticket_id: Uuid,
        reply: RpcReplyPort<bool>,
    },
    PendingTickets {
        reply: RpcReplyPort<Vec<Uuid>>,
    },
    ProcessedTicket {
        ticket_id: Uuid,
        reply: RpcReplyPort<Option<FinishedJobResult>>,
    },
    ProcessedTickets {
        reply: RpcReplyPort<Vec<FinishedJobResult>>,
    },
    /// The post-verification pipeline finished for a ticket; merge and publish.
    Finalize {
        job: Box<PendingJobResult>,
        reply: RpcReplyPort<()>,
    },
    /// The pipeline faulted; release the ticket's entries without publishing.
    Abandon { ticket_id: Uuid, tx_ids: Vec<TxId> },
}

pub struct State {
    /// Tickets whose verifier result is still owed.
    pending: HashSet<Uuid>,
    /// Pre-verifier accumulators that must survive until completion.
    partial: HashMap<Uuid, PendingJobResult>,
    /// Terminal results; never evicted.
    processed: HashMap<Uuid, FinishedJobResult>,
    /// Transaction ids currently referenced by any non-processed ticket.
    cached_ids: HashSet<TxId>,
    broker: WorkerBroker,
    completion: CompletionActorRef,
}

pub struct Processor {
    collaborators: Collaborators,
    config: ProcessorConfig,
    span: Span,
}

impl Processor {
    pub async fn spawn(
        collaborators: Collaborators,
        config: ProcessorConfig,
        span: Span,
    ) -> Result<ProcessorActorRef, ractor::SpawnErr> {
        let node = Self {
            collaborators,
            config,
            span,
        };

        let (actor_ref, _) = Actor::spawn(None, node, ()).await?;
        Ok(actor_ref)
    }

    async fn handle_msg(
        &self,
        _myself: &ProcessorActorRef,
        msg: Msg,
        state: &mut State,
    ) -> ActorResult<()> {
        match msg {
            Msg::CreateJob {
                transactions,
                reply,
            } => self.create_job(transactions, reply, state).await?,
            Msg::HasPending { ticket_id, reply } => {
                reply.send(state.pending.contains(&ticket_id))?
            }
            Msg::PendingTickets { reply } => {
                reply.send(state.pending.iter().copied().collect())?
            }
            Msg::ProcessedTicket { ticket_id, reply } => {
                reply.send(state.processed.get(&ticket_id).cloned())?
            }
            Msg::ProcessedTickets { reply } => {
                reply.send(state.processed.values().cloned().collect())?
            }
            Msg::Finalize { job, reply } => {
                self.finalize(*job, state);
                reply.send(())?;
            }
            Msg::Abandon { ticket_id, tx_ids } => self.abandon(ticket_id, tx_ids, state),
        }

        Ok(())
    }

    #[tracing::instrument("create_job", skip_all)]
    async fn create_job(
        &self,
        transactions: Vec<ParsedTx>,
        reply: RpcReplyPort<Uuid>,
        state: &mut State,
    ) -> ActorResult<()> {
        let ticket_id = Uuid::new_v4();
        let mut job = PendingJobResult::new(ticket_id);
        let mut eligible = Vec::new();
        let mut sender_wallets = HashMap::new();

        for tx in transactions {
            if state.cached_ids.contains(&tx.id) {
                debug!(tx_id = %tx.id, "transaction already in flight, skipping");
                continue;
            }
            state.cached_ids.insert(tx.id.clone());

            if self.pre_check(&tx, &mut job).await {
                let wallet = self
                    .collaborators
                    .wallets
                    .find_by_public_key(&tx.sender_public_key);
                sender_wallets.insert(tx.sender_public_key.clone(), wallet);
                eligible.push(tx);
            }
        }

        if eligible.is_empty() {
            // Nothing left for the verifier; the ticket terminates right here.
            self.finalize(job, state);
        } else {
            debug!(%ticket_id, eligible = eligible.len(), "submitting batch to verifier pool");
            state.broker.submit(VerifierBatch {
                ticket_id,
                transactions: eligible,
                sender_wallets,
            })?;
            state.pending.insert(ticket_id);
            if !job.errors.is_empty() || !job.excess.is_empty() {
                state.partial.insert(ticket_id, job);
            }
        }

        reply.send(ticket_id)?;
        Ok(())
    }

    /// Synchronous checks a transaction must pass before it is worth a trip
    /// through the verifier. Returns whether to keep the transaction.
    async fn pre_check(&self, tx: &ParsedTx, job: &mut PendingJobResult) -> bool {
        match self.collaborators.mempool.has(&tx.id).await {
            Ok(true) => {
                job.push_error(
                    &tx.id,
                    ErrorKind::Duplicate,
                    format!("Duplicate transaction {}", tx.id),
                );
                return false;
            }
            Ok(false) => {}
            Err(err) => {
                job.push_error(&tx.id, ErrorKind::Unknown, err.to_string());
                return false;
            }
        }

        let handler = match self.collaborators.handlers.get(tx.type_id, tx.type_group) {
            Ok(handler) => handler,
            Err(err) => {
                job.push_error(&tx.id, ErrorKind::Unknown, err.to_string());
                return false;
            }
        };

        match handler
            .can_enter_pool(tx, self.collaborators.mempool.as_ref())
            .await
        {
            // A declining handler classifies silently; record nothing.
            Ok(admitted) => admitted,
            Err(err) => {
                job.push_error(&tx.id, ErrorKind::Unknown, err.to_string());
                false
            }
        }
    }

    /// Builds and stores the terminal result for a ticket: merges any
    /// pre-verifier partial accumulator, releases dedup-cache entries and
    /// emits the summary line.
    fn finalize(&self, job: PendingJobResult, state: &mut State) {
        let ticket_id = job.ticket_id;
        state.pending.remove(&ticket_id);
        let partial = state.partial.remove(&ticket_id);

        let accept: BTreeSet<TxId> = job.accept.keys().cloned().collect();
        let broadcast: BTreeSet<TxId> = job.broadcast.keys().cloned().collect();
        let mut invalid: BTreeSet<TxId> = job.invalid.keys().cloned().collect();
        let mut excess: BTreeSet<TxId> = job.excess.keys().cloned().collect();

        if let Some(partial) = partial {
            invalid.extend(partial.invalid.keys().cloned());
            // The pre-verifier keys replace the verifier-reported set.
            excess = partial.excess.keys().cloned().collect();
            // TODO: carry partial.errors into the finished errors map.
        }

        let finished = FinishedJobResult {
            ticket_id,
            accept: accept.into_iter().collect(),
            broadcast: broadcast.into_iter().collect(),
            invalid: invalid.into_iter().collect(),
            excess: excess.into_iter().collect(),
            errors: if job.errors.is_empty() {
                None
            } else {
                Some(job.errors.clone())
            },
        };

        // Only ids that reached a terminal id-list bucket release their
        // in-flight entry; ids that ended up solely in `errors` stay cached.
        for id in finished
            .accept
            .iter()
            .chain(finished.broadcast.iter())
            .chain(finished.invalid.iter())
            .chain(finished.excess.iter())
        {
            state.cached_ids.remove(id);
        }

        let received =
            job.valid_transactions.len() + finished.excess.len() + finished.invalid.len();
        info!(
            "Received {} transaction{} (accept: {} broadcast: {} excess: {} invalid: {}).",
            received,
            plural(received),
            finished.accept.len(),
            finished.broadcast.len(),
            finished.excess.len(),
            finished.invalid.len(),
        );

        state.processed.insert(ticket_id, finished);
    }

    /// Cleanup after a faulted pipeline: the ticket gets no processed entry,
    /// but its map and cache entries are released so the ids can come back.
    fn abandon(&self, ticket_id: Uuid, tx_ids: Vec<TxId>, state: &mut State) {
        state.pending.remove(&ticket_id);
        state.partial.remove(&ticket_id);
        for id in &tx_ids {
            state.cached_ids.remove(id);
        }
        error!(%ticket_id, "ticket abandoned after pipeline fault");
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[async_trait]
impl Actor for Processor {
    type Arguments = ();
    type Msg = Msg;
    type State = State;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> ActorResult<Self::State> {
        let completion =
            CompletionQueue::spawn(myself.clone(), self.collaborators.clone(), self.span.clone())
                .await?;
        completion.link(myself.get_cell());

        // The broker only ever sees the completion queue's address, never ours.
        let broker = WorkerBroker::spawn(
            self.config.verifier_workers,
            self.collaborators.verifier.clone(),
            completion.clone(),
        )
        .await?;

        Ok(State {
            pending: HashSet::new(),
            partial: HashMap::new(),
            processed: HashMap::new(),
            cached_ids: HashSet::new(),
            broker,
            completion,
        })
    }

    #[tracing::instrument("processor", parent = &self.span, skip_all)]
    async fn handle(
        &self,
        myself: ProcessorActorRef,
        msg: Msg,
        state: &mut State,
    ) -> ActorResult<()> {
        if let Err(e) = self.handle_msg(&myself, msg, state).await {
            error!("Error handling message: {:?}", e);
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut State,
    ) -> ActorResult<()> {
        state.broker.stop();
        state.completion.stop(None);
        Ok(())
    }
}

/// Cloneable async facade over the processor actor; the public surface
/// callers poll for job outcomes.
#[derive(Clone)]
pub struct ProcessorHandle {
    actor: ProcessorActorRef,
}

impl ProcessorHandle {
    pub fn new(actor: ProcessorActorRef) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &ProcessorActorRef {
        &self.actor
    }

    /// Submits a batch for admission. Always returns a ticket id, even when
    /// every transaction is rejected; outcomes are polled separately.
    pub async fn create_job(&self, transactions: Vec<ParsedTx>) -> Result<Uuid, ProcessorError> {
        let result = self
            .actor
            .call(
                |reply| Msg::CreateJob {
                    transactions,
                    reply,
                },
                None,
            )
            .await?;
        unwrap_reply(result)
    }

    pub async fn has_pending(&self, ticket_id: Uuid) -> Result<bool, ProcessorError> {
        let result = self
            .actor
            .call(|reply| Msg::HasPending { ticket_id, reply }, None)
            .await?;
        unwrap_reply(result)
    }

    pub async fn pending_tickets(&self) -> Result<Vec<Uuid>, ProcessorError> {
        let result = self
            .actor
            .call(|reply| Msg::PendingTickets { reply }, None)
            .await?;
        unwrap_reply(result)
    }

    pub async fn processed_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<FinishedJobResult>, ProcessorError> {
        let result = self
            .actor
            .call(|reply| Msg::ProcessedTicket { ticket_id, reply }, None)
            .await?;
        unwrap_reply(result)
    }

    pub async fn processed_tickets(&self) -> Result<Vec<FinishedJobResult>, ProcessorError> {
        let result = self
            .actor
            .call(|reply| Msg::ProcessedTickets { reply }, None)
            .await?;
        unwrap_reply(result)
    }

    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

fn unwrap_reply<T>(result: CallResult<T>) -> Result<T, ProcessorError> {
    match result {
        CallResult::Success(value) => Ok(value),
        CallResult::Timeout => Err(ProcessorError::actor("request timed out")),
        CallResult::SenderError => Err(ProcessorError::actor("reply channel closed")),
    }
}

pub async fn spawn_processor(
    collaborators: Collaborators,
    config: ProcessorConfig,
    span: Span,
) -> Result<ProcessorHandle, ractor::SpawnErr> {
    let actor = Processor::spawn(collaborators, config, span).await?;
    Ok(ProcessorHandle::new(actor))
}
