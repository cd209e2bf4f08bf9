//! The consensus engine service.
//!
//! [`ConsensusEngine`] owns all state behind a single async lock and wires
//! the ports together: proposals are created and broadcast, votes mutate the
//! tally and trigger evaluation, timers force resolution when voting stalls,
//! and approved proposals drain through the single-flight execution queue.
//!
//! Every mutation of one proposal (vote casting, timeout firing,
//! finalization, cancellation) is serialized through the store lock, because
//! a vote and a timeout can race.

mod queue;
mod timeout;

use crate::config::EngineConfig;
use crate::ports::broadcaster::{NullBroadcaster, ProposalBroadcaster};
use crate::ports::event_sink::EventSink;
use crate::ports::executor::{ExecutorError, ExecutorRegistry, StepExecutor};
use crate::ports::signer::VoteSigner;
use crate::snapshot::ConsensusSnapshot;
use crate::stats::{ConsensusStats, build_stats};
use crate::store::{ProposalFilter, Store};
use chrono::Utc;
use concord_domain::{
    AgentId, ConsensusOutcome, ConsensusResult, DomainError, Evaluation, Event, EventKind,
    ExecutionPlan, Participant, ParticipantStatus, Proposal, ProposalId, ProposalPayload,
    ProposalStatus, Protocol, ProtocolCatalog, Vote, VoteDecision, evaluate, select_protocol,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use timeout::TimerRegistry;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Quorum fraction applied when the caller does not set one explicitly.
const DEFAULT_QUORUM_FRACTION: f64 = 0.67;

/// Decision flips one agent may make on one proposal before the byzantine
/// guard rejects further flips.
const MAX_DECISION_FLIPS: u32 = 2;

/// Errors surfaced by engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(AgentId),

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Protocol is disabled: {0}")]
    ProtocolDisabled(String),

    #[error("Proposal {id} is not accepting votes (status: {status})")]
    NotAcceptingVotes { id: ProposalId, status: ProposalStatus },

    #[error("Agent {agent} is not a target of proposal {id}")]
    NotATarget { id: ProposalId, agent: AgentId },

    #[error("Only the proposer may cancel proposal {id}")]
    NotProposer { id: ProposalId, caller: AgentId },

    #[error("Proposal {id} cannot be cancelled (status: {status})")]
    NotCancellable { id: ProposalId, status: ProposalStatus },

    #[error("Agent {agent} already has {count} open proposals (limit: {limit})")]
    TooManyOpenProposals {
        agent: AgentId,
        count: usize,
        limit: usize,
    },

    #[error("Proposal has no targets")]
    NoTargets,

    #[error("Signature verification failed for {agent}")]
    SignatureRejected { agent: AgentId },

    #[error("Participant verification is enabled but no signer is configured")]
    SignerUnavailable,

    #[error("Votes from {status} participant {agent} are rejected")]
    ParticipantNotActive {
        agent: AgentId,
        status: ParticipantStatus,
    },

    #[error("Vote rejected: {agent} changed decision too often on proposal {id}")]
    Equivocation { id: ProposalId, agent: AgentId },

    #[error("Proposal {id} is not executable (status: {status})")]
    NotExecutable { id: ProposalId, status: ProposalStatus },

    #[error("Proposal {id} has no execution plan")]
    MissingPlan { id: ProposalId },

    #[error(transparent)]
    Execution(#[from] ExecutorError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Input for proposal creation
///
/// Only proposer, title, and payload are required; targets, protocol,
/// quorum, and timeout all have resolution rules when left unset.
#[derive(Debug, Clone)]
pub struct ProposalSpec {
    proposer: AgentId,
    title: String,
    description: String,
    payload: ProposalPayload,
    targets: Option<Vec<AgentId>>,
    protocol: Option<String>,
    required_participants: Option<usize>,
    timeout: Option<Duration>,
}

impl ProposalSpec {
    pub fn new(
        proposer: impl Into<AgentId>,
        title: impl Into<String>,
        payload: ProposalPayload,
    ) -> Self {
        Self {
            proposer: proposer.into(),
            title: title.into(),
            description: String::new(),
            payload,
            targets: None,
            protocol: None,
            required_participants: None,
            timeout: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Explicit target list. When unset, all registered agents except the
    /// proposer are targeted.
    pub fn with_targets(mut self, targets: Vec<AgentId>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Explicit protocol override. When unset, the protocol is selected
    /// from the proposal kind and target count.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_required_participants(mut self, required: usize) -> Self {
        self.required_participants = Some(required);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One agent's vote submission
#[derive(Debug, Clone)]
pub struct Ballot {
    agent: AgentId,
    decision: VoteDecision,
    confidence: f64,
    reasoning: Option<String>,
    signature: Option<String>,
}

impl Ballot {
    pub fn new(agent: impl Into<AgentId>, decision: VoteDecision, confidence: f64) -> Self {
        Self {
            agent: agent.into(),
            decision,
            confidence,
            reasoning: None,
            signature: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

/// What happened to a cast vote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastOutcome {
    /// Whether this vote replaced an earlier one from the same agent
    pub replaced: bool,
    /// Set when this vote pushed the proposal over its threshold
    pub finalized: Option<ConsensusOutcome>,
}

/// Output of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub output: Value,
}

/// Result of running a proposal's execution plan to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub proposal: ProposalId,
    pub steps: Vec<StepOutcome>,
}

/// Builder wiring config, protocols, and port adapters into an engine
pub struct EngineBuilder {
    config: EngineConfig,
    broadcaster: Arc<dyn ProposalBroadcaster>,
    executors: ExecutorRegistry,
    signer: Option<Arc<dyn VoteSigner>>,
    sinks: Vec<Arc<dyn EventSink>>,
    protocols: Vec<Protocol>,
}

impl EngineBuilder {
    fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            broadcaster: Arc::new(NullBroadcaster),
            executors: ExecutorRegistry::new(),
            signer: None,
            sinks: Vec::new(),
            protocols: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn ProposalBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Register a step executor for one action name.
    pub fn executor(mut self, action: impl Into<String>, executor: Arc<dyn StepExecutor>) -> Self {
        self.executors.register(action, executor);
        self
    }

    /// Executor used for actions without a dedicated registration.
    pub fn fallback_executor(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.executors.set_fallback(executor);
        self
    }

    pub fn signer(mut self, signer: Arc<dyn VoteSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register a protocol beyond the built-ins.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocols.push(protocol);
        self
    }

    /// Build the engine and spawn its queue worker.
    pub fn build(self) -> Result<ConsensusEngine, EngineError> {
        let mut catalog = ProtocolCatalog::with_builtins();
        for protocol in self.protocols {
            catalog.register(protocol)?;
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(EngineInner {
            config: self.config,
            store: Mutex::new(Store::new(catalog)),
            broadcaster: self.broadcaster,
            executors: self.executors,
            signer: self.signer,
            sinks: self.sinks,
            timers: TimerRegistry::new(),
            queue_tx,
        });

        queue::spawn_worker(queue_rx, Arc::downgrade(&inner));

        Ok(ConsensusEngine { inner })
    }
}

/// Coordinates agreement among a set of autonomous agents
///
/// Cloning the engine is cheap and shares state; the engine is the single
/// logical owner of every proposal it creates.
#[derive(Clone)]
pub struct ConsensusEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) store: Mutex<Store>,
    pub(crate) broadcaster: Arc<dyn ProposalBroadcaster>,
    pub(crate) executors: ExecutorRegistry,
    pub(crate) signer: Option<Arc<dyn VoteSigner>>,
    pub(crate) sinks: Vec<Arc<dyn EventSink>>,
    pub(crate) timers: TimerRegistry,
    pub(crate) queue_tx: mpsc::UnboundedSender<ProposalId>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.timers.cancel_all();
    }
}

impl ConsensusEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ==================== Participants ====================

    /// Register an agent as eligible to vote. Re-registering refreshes
    /// weight and expertise but keeps history and reliability.
    pub async fn register_participant(
        &self,
        agent: impl Into<AgentId>,
        weight: f64,
        expertise: Vec<String>,
    ) {
        let agent = agent.into();
        let mut store = self.inner.store.lock().await;
        match store.participant_mut(&agent) {
            Some(existing) => {
                existing.weight = weight.clamp(concord_domain::MIN_WEIGHT, concord_domain::MAX_WEIGHT);
                existing.expertise = expertise;
                existing.last_seen = Utc::now();
            }
            None => {
                store.upsert_participant(Participant::new(agent.clone(), weight, expertise));
                self.inner.emit(
                    &mut store,
                    Event::new(EventKind::ParticipantRegistered).by_agent(&agent),
                );
                info!("Registered participant {}", agent);
            }
        }
    }

    /// Change a participant's availability status.
    pub async fn set_participant_status(
        &self,
        agent: &AgentId,
        status: ParticipantStatus,
    ) -> Result<(), EngineError> {
        let mut store = self.inner.store.lock().await;
        let participant = store
            .participant_mut(agent)
            .ok_or_else(|| EngineError::UnknownParticipant(agent.clone()))?;
        participant.set_status(status);
        self.inner.emit(
            &mut store,
            Event::new(EventKind::ParticipantStatusChanged)
                .by_agent(agent)
                .with_payload(json!({ "status": status.as_str() })),
        );
        Ok(())
    }

    pub async fn participant(&self, agent: &AgentId) -> Option<Participant> {
        self.inner.store.lock().await.participant(agent).cloned()
    }

    // ==================== Proposals ====================

    /// Create a proposal, broadcast it, and open voting.
    ///
    /// Targets default to every registered agent except the proposer; the
    /// protocol is selected from kind and group size unless overridden; the
    /// quorum defaults to two thirds of the targets. One expiry timer is
    /// armed for the resolved voting window.
    pub async fn create_proposal(&self, spec: ProposalSpec) -> Result<ProposalId, EngineError> {
        let inner = &self.inner;
        let id = ProposalId::generate();

        let (broadcast_copy, targets, window) = {
            let mut store = inner.store.lock().await;

            let open = store.open_proposals_by(&spec.proposer);
            if open >= inner.config.max_proposals_per_agent {
                return Err(EngineError::TooManyOpenProposals {
                    agent: spec.proposer,
                    count: open,
                    limit: inner.config.max_proposals_per_agent,
                });
            }

            let targets = match spec.targets {
                Some(targets) if !targets.is_empty() => targets,
                _ => store.agents_except(&spec.proposer),
            };
            if targets.is_empty() {
                return Err(EngineError::NoTargets);
            }

            let kind = spec.payload.kind();
            let protocol_name = spec.protocol.clone().unwrap_or_else(|| {
                select_protocol(kind, targets.len(), &inner.config.default_protocol)
            });
            let protocol = store
                .catalog
                .get(&protocol_name)
                .ok_or_else(|| EngineError::UnknownProtocol(protocol_name.clone()))?;
            if !protocol.enabled {
                return Err(EngineError::ProtocolDisabled(protocol_name));
            }
            let threshold = protocol.threshold;
            let window = spec
                .timeout
                .or(protocol.timeout)
                .unwrap_or(inner.config.default_timeout);
            let required = spec.required_participants.unwrap_or_else(|| {
                (DEFAULT_QUORUM_FRACTION * targets.len() as f64).ceil() as usize
            });

            let proposal = Proposal::new(
                id.clone(),
                spec.proposer.clone(),
                spec.title,
                spec.description,
                spec.payload,
                targets.clone(),
            )
            .with_protocol(protocol_name.clone(), threshold, window)
            .with_required_participants(required);

            store.metrics.record_created(&protocol_name);
            inner.emit(
                &mut store,
                Event::new(EventKind::ProposalCreated)
                    .for_proposal(&id)
                    .by_agent(&spec.proposer)
                    .with_payload(json!({
                        "kind": kind.as_str(),
                        "protocol": protocol_name,
                        "targets": targets.len(),
                        "required": required,
                    })),
            );
            info!(
                "Created proposal {} ({}, protocol {}, {} targets)",
                id,
                kind,
                proposal.protocol,
                targets.len()
            );

            let copy = proposal.clone();
            store.insert_proposal(proposal);
            (copy, targets, window)
        };

        // Fire-and-forget broadcast, outside the lock. Undelivered targets
        // only show up as lower participation.
        if let Err(e) = inner.broadcaster.broadcast(&broadcast_copy, &targets).await {
            warn!("Broadcast of proposal {} failed: {}", id, e);
        }

        {
            let mut store = inner.store.lock().await;
            let still_pending = store
                .proposal(&id)
                .map(|p| p.status == ProposalStatus::Pending)
                .unwrap_or(false);
            if still_pending {
                if let Some(proposal) = store.proposal_mut(&id) {
                    proposal.transition(ProposalStatus::Voting)?;
                }
                inner.emit(
                    &mut store,
                    Event::new(EventKind::VotingStarted).for_proposal(&id),
                );
                timeout::arm(inner, id.clone(), window);
            }
        }

        Ok(id)
    }

    pub async fn proposal(&self, id: &ProposalId) -> Result<Proposal, EngineError> {
        self.inner
            .store
            .lock()
            .await
            .proposal(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownProposal(id.clone()))
    }

    /// Proposals matching the filter, newest first.
    pub async fn proposals(&self, filter: &ProposalFilter) -> Vec<Proposal> {
        self.inner
            .store
            .lock()
            .await
            .query(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Withdraw a proposal. Only the proposer may cancel, and only while
    /// the proposal is still open.
    pub async fn cancel_proposal(
        &self,
        id: &ProposalId,
        caller: &AgentId,
    ) -> Result<(), EngineError> {
        let inner = &self.inner;
        let mut store = inner.store.lock().await;

        {
            let proposal = store
                .proposal(id)
                .ok_or_else(|| EngineError::UnknownProposal(id.clone()))?;
            if &proposal.proposer != caller {
                return Err(EngineError::NotProposer {
                    id: id.clone(),
                    caller: caller.clone(),
                });
            }
            if !proposal.status.is_open() {
                return Err(EngineError::NotCancellable {
                    id: id.clone(),
                    status: proposal.status,
                });
            }
        }

        if let Some(proposal) = store.proposal_mut(id) {
            proposal.transition(ProposalStatus::Cancelled)?;
        }
        inner.emit(
            &mut store,
            Event::new(EventKind::ProposalCancelled)
                .for_proposal(id)
                .by_agent(caller),
        );
        inner.timers.cancel(id);
        info!("Proposal {} cancelled by {}", id, caller);
        Ok(())
    }

    // ==================== Voting ====================

    /// Cast (or revise) a vote. A revision replaces the agent's earlier
    /// vote; it never appends. When the vote satisfies the protocol
    /// threshold, the proposal is finalized before this call returns.
    pub async fn cast_vote(
        &self,
        id: &ProposalId,
        ballot: Ballot,
    ) -> Result<CastOutcome, EngineError> {
        let inner = &self.inner;
        let mut store = inner.store.lock().await;

        {
            let proposal = store
                .proposal(id)
                .ok_or_else(|| EngineError::UnknownProposal(id.clone()))?;
            if proposal.status != ProposalStatus::Voting {
                return Err(EngineError::NotAcceptingVotes {
                    id: id.clone(),
                    status: proposal.status,
                });
            }
            if !proposal.is_target(&ballot.agent) {
                return Err(EngineError::NotATarget {
                    id: id.clone(),
                    agent: ballot.agent,
                });
            }
        }

        // Weight is inherited from the participant record at cast time
        let weight = {
            let participant = store
                .participant(&ballot.agent)
                .ok_or_else(|| EngineError::UnknownParticipant(ballot.agent.clone()))?;
            if inner.config.byzantine_protection && !participant.is_active() {
                return Err(EngineError::ParticipantNotActive {
                    agent: ballot.agent,
                    status: participant.status,
                });
            }
            participant.weight
        };

        if inner.config.byzantine_protection
            && let Some(proposal) = store.proposal(id)
            && let Some(prior) = proposal.vote_of(&ballot.agent)
            && prior.decision != ballot.decision
            && proposal.decision_changes(&ballot.agent) >= MAX_DECISION_FLIPS
        {
            return Err(EngineError::Equivocation {
                id: id.clone(),
                agent: ballot.agent,
            });
        }

        let signature = if inner.config.participant_verification {
            let signer = inner
                .signer
                .as_deref()
                .ok_or(EngineError::SignerUnavailable)?;
            match &ballot.signature {
                Some(signature) => {
                    if !signer.verify(id, &ballot.agent, ballot.decision, signature) {
                        return Err(EngineError::SignatureRejected {
                            agent: ballot.agent,
                        });
                    }
                    Some(signature.clone())
                }
                None => Some(signer.sign(id, &ballot.agent, ballot.decision)),
            }
        } else {
            ballot.signature.clone()
        };

        let mut vote = Vote::new(ballot.agent.clone(), ballot.decision, weight, ballot.confidence);
        if let Some(reasoning) = ballot.reasoning {
            vote = vote.with_reasoning(reasoning);
        }
        if let Some(signature) = signature {
            vote = vote.with_signature(signature);
        }
        let confidence = vote.confidence;

        let replaced = match store.proposal_mut(id) {
            Some(proposal) => proposal.record_vote(vote).is_some(),
            None => return Err(EngineError::UnknownProposal(id.clone())),
        };

        if let Some(participant) = store.participant_mut(&ballot.agent) {
            participant.record_vote(confidence);
        }

        inner.emit(
            &mut store,
            Event::new(EventKind::VoteCast)
                .for_proposal(id)
                .by_agent(&ballot.agent)
                .with_payload(json!({
                    "decision": ballot.decision.as_str(),
                    "replaced": replaced,
                })),
        );
        debug!("{} voted {} on proposal {}", ballot.agent, ballot.decision, id);

        let evaluation = inner.evaluate_proposal(&store, id);
        let finalized = match evaluation {
            Evaluation::Reached(outcome) => {
                inner.finalize(&mut store, id, outcome)?;
                Some(outcome)
            }
            Evaluation::Pending => None,
        };

        Ok(CastOutcome { replaced, finalized })
    }

    // ==================== Execution ====================

    /// Run an approved proposal's plan immediately.
    ///
    /// The queue worker uses the same path; callers only need this when
    /// `auto_execute` is off.
    pub async fn execute_proposal(&self, id: &ProposalId) -> Result<ExecutionReport, EngineError> {
        self.inner.execute(id).await
    }

    // ==================== Read API ====================

    /// Aggregated overview, recent proposals, top participants, and
    /// per-protocol effectiveness.
    pub async fn stats(&self) -> ConsensusStats {
        build_stats(&*self.inner.store.lock().await)
    }

    /// Audit events for one proposal, newest first.
    pub async fn events_for(&self, id: &ProposalId, limit: usize) -> Vec<Event> {
        self.inner.store.lock().await.events.for_proposal(id, limit)
    }

    // ==================== Snapshots ====================

    /// Serialize proposals, participants, protocols, and events.
    pub async fn export(&self) -> ConsensusSnapshot {
        ConsensusSnapshot::from_store(&*self.inner.store.lock().await)
    }

    /// Replace the engine state with a snapshot. Timers for proposals that
    /// are still `voting` are re-armed for their remaining window; an
    /// already-elapsed window expires through the normal path.
    pub async fn import(&self, snapshot: ConsensusSnapshot) -> Result<(), EngineError> {
        let store = snapshot.into_store()?;
        self.inner.timers.cancel_all();

        let to_arm: Vec<(ProposalId, Duration)> = store
            .proposals()
            .filter(|p| p.status == ProposalStatus::Voting)
            .map(|p| {
                let remaining = (p.deadline() - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                (p.id.clone(), remaining)
            })
            .collect();

        *self.inner.store.lock().await = store;

        for (id, remaining) in to_arm {
            timeout::arm(&self.inner, id, remaining);
        }
        Ok(())
    }
}

impl EngineInner {
    /// Record an audit event and hand it to every sink. A disabled event
    /// log drops both.
    fn emit(&self, store: &mut Store, event: Event) {
        if !self.config.event_logging {
            return;
        }
        for sink in &self.sinks {
            sink.publish(&event);
        }
        store.record_event(event);
    }

    /// Run the evaluator against a proposal's current tally.
    fn evaluate_proposal(&self, store: &Store, id: &ProposalId) -> Evaluation {
        let Some(proposal) = store.proposal(id) else {
            return Evaluation::Pending;
        };
        match store.catalog.get(&proposal.protocol) {
            Some(protocol) => evaluate(protocol, &proposal.tally(), proposal.required_participants),
            // Unknown protocol never resolves on its own
            None => Evaluation::Pending,
        }
    }

    /// Resolve a proposal that reached consensus: flip the status, record
    /// the result exactly once, update metrics and participation, cancel
    /// the timer, and enqueue execution for approved proposals.
    fn finalize(
        &self,
        store: &mut Store,
        id: &ProposalId,
        outcome: ConsensusOutcome,
    ) -> Result<(), EngineError> {
        let (result, elapsed, targets, voted) = {
            let proposal = store
                .proposal(id)
                .ok_or_else(|| EngineError::UnknownProposal(id.clone()))?;
            let mut result =
                ConsensusResult::new(outcome, proposal.votes(), proposal.targets.len());
            if outcome.is_approved() {
                let retry_budget = store
                    .catalog
                    .get(&proposal.protocol)
                    .map(|p| p.max_retries)
                    .unwrap_or(0);
                result = result.with_plan(ExecutionPlan::for_proposal(proposal, retry_budget));
            }
            let elapsed = (result.decided_at - proposal.created_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            let voted: Vec<AgentId> = proposal.votes().iter().map(|v| v.agent.clone()).collect();
            (result, elapsed, proposal.targets.clone(), voted)
        };

        let quality = result.quality;
        let next = if outcome.is_approved() {
            ProposalStatus::Passed
        } else {
            ProposalStatus::Rejected
        };

        {
            let proposal = store
                .proposal_mut(id)
                .ok_or_else(|| EngineError::UnknownProposal(id.clone()))?;
            proposal.transition(next)?;
            proposal.set_result(result)?;
        }

        store.metrics.record_consensus(elapsed, quality);
        for target in &targets {
            if let Some(participant) = store.participant_mut(target) {
                participant.record_participation(voted.contains(target));
            }
        }

        self.emit(
            store,
            Event::new(EventKind::ConsensusReached)
                .for_proposal(id)
                .with_payload(json!({
                    "outcome": outcome.as_str(),
                    "quality": quality,
                })),
        );
        info!("Proposal {} reached consensus: {}", id, outcome);

        self.timers.cancel(id);

        if outcome.is_approved() && self.config.auto_execute {
            // Worker gone means the engine is shutting down; nothing to do
            let _ = self.queue_tx.send(id.clone());
        }
        Ok(())
    }

    /// Timer callback: re-evaluate once, then expire.
    pub(crate) async fn handle_expiry(&self, id: &ProposalId) {
        let mut store = self.store.lock().await;

        let status = match store.proposal(id) {
            Some(proposal) => proposal.status,
            None => return,
        };
        // A timer that lost the race to a vote or a cancellation is a no-op
        if status != ProposalStatus::Voting {
            return;
        }

        match self.evaluate_proposal(&store, id) {
            Evaluation::Reached(outcome) => {
                if let Err(e) = self.finalize(&mut store, id, outcome) {
                    warn!("Finalizing proposal {} at timeout failed: {}", id, e);
                }
            }
            Evaluation::Pending => {
                let (targets, voted, cast, required) = match store.proposal(id) {
                    Some(proposal) => (
                        proposal.targets.clone(),
                        proposal
                            .votes()
                            .iter()
                            .map(|v| v.agent.clone())
                            .collect::<Vec<_>>(),
                        proposal.votes().len(),
                        proposal.required_participants,
                    ),
                    None => return,
                };

                if let Some(proposal) = store.proposal_mut(id) {
                    if let Err(e) = proposal.transition(ProposalStatus::Expired) {
                        warn!("Expiring proposal {} failed: {}", id, e);
                        return;
                    }
                }

                for target in &targets {
                    let voted_here = voted.contains(target);
                    if let Some(participant) = store.participant_mut(target) {
                        if !voted_here {
                            participant.apply_expiry_penalty();
                        }
                        participant.record_participation(voted_here);
                    }
                }

                self.emit(
                    &mut store,
                    Event::new(EventKind::ProposalExpired)
                        .for_proposal(id)
                        .with_payload(json!({
                            "votes": cast,
                            "required": required,
                        })),
                );
                info!(
                    "Proposal {} expired with {} of {} required votes",
                    id, cast, required
                );
            }
        }
    }

    /// Execute an approved proposal's plan, strictly in step order.
    ///
    /// The first failing step aborts the remainder; no rollback is invoked.
    pub(crate) async fn execute(&self, id: &ProposalId) -> Result<ExecutionReport, EngineError> {
        let plan = {
            let mut store = self.store.lock().await;

            let plan = {
                let proposal = store
                    .proposal(id)
                    .ok_or_else(|| EngineError::UnknownProposal(id.clone()))?;
                if proposal.status != ProposalStatus::Passed {
                    return Err(EngineError::NotExecutable {
                        id: id.clone(),
                        status: proposal.status,
                    });
                }
                proposal
                    .result()
                    .and_then(|r| r.plan.clone())
                    .ok_or_else(|| EngineError::MissingPlan { id: id.clone() })?
            };

            if let Some(proposal) = store.proposal_mut(id) {
                proposal.transition(ProposalStatus::Executing)?;
            }
            self.emit(
                &mut store,
                Event::new(EventKind::ExecutionStarted)
                    .for_proposal(id)
                    .with_payload(json!({ "steps": plan.steps.len() })),
            );
            plan
        };

        let mut outputs = Vec::new();
        for step in &plan.steps {
            match self.run_step(step).await {
                Ok(output) => outputs.push(StepOutcome {
                    step: step.id.clone(),
                    output,
                }),
                Err(error) => {
                    let mut store = self.store.lock().await;
                    self.emit(
                        &mut store,
                        Event::new(EventKind::ExecutionFailed)
                            .for_proposal(id)
                            .with_payload(json!({
                                "step": step.id,
                                "error": error.to_string(),
                            })),
                    );
                    return Err(error.into());
                }
            }
        }

        let mut store = self.store.lock().await;
        if let Some(proposal) = store.proposal_mut(id) {
            proposal.transition(ProposalStatus::Completed)?;
        }
        self.emit(
            &mut store,
            Event::new(EventKind::ExecutionCompleted)
                .for_proposal(id)
                .with_payload(json!({ "steps": outputs.len() })),
        );

        Ok(ExecutionReport {
            proposal: id.clone(),
            steps: outputs,
        })
    }

    /// Run one step with its timeout and retry budget.
    async fn run_step(&self, step: &concord_domain::ExecutionStep) -> Result<Value, ExecutorError> {
        let executor = self.executors.resolve(&step.action)?;
        let mut last_error = None;

        for attempt in 0..=step.retry_budget {
            match tokio::time::timeout(step.timeout, executor.execute(step)).await {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(e)) => {
                    debug!("Step {} attempt {} failed: {}", step.id, attempt + 1, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    debug!("Step {} attempt {} timed out", step.id, attempt + 1);
                    last_error = Some(ExecutorError::Timeout(step.id.clone()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ExecutorError::StepFailed {
            step: step.id.clone(),
            reason: "no attempts were made".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProposalFilter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct RecordingExecutor {
        calls: StdMutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingExecutor {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: StdMutex::new(Vec::new()),
                fail,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StepExecutor for RecordingExecutor {
        async fn execute(
            &self,
            step: &concord_domain::ExecutionStep,
        ) -> Result<Value, ExecutorError> {
            self.calls.lock().unwrap().push(step.action.clone());
            if self.fail {
                Err(ExecutorError::StepFailed {
                    step: step.id.clone(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(json!({ "ok": true }))
            }
        }
    }

    struct TestSigner;

    impl VoteSigner for TestSigner {
        fn sign(&self, proposal: &ProposalId, agent: &AgentId, decision: VoteDecision) -> String {
            format!("sig:{}:{}:{}", proposal, agent, decision)
        }
    }

    fn engine() -> ConsensusEngine {
        ConsensusEngine::builder().build().unwrap()
    }

    fn engine_with(config: EngineConfig) -> ConsensusEngine {
        ConsensusEngine::builder().config(config).build().unwrap()
    }

    async fn register_agents(engine: &ConsensusEngine, names: &[&str]) {
        for name in names {
            engine.register_participant(*name, 1.0, vec![]).await;
        }
    }

    fn payload() -> ProposalPayload {
        ProposalPayload::MemoryUpdate {
            key: "shared/goal".to_string(),
            value: json!("reduce latency"),
        }
    }

    fn targets(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|name| AgentId::new(*name)).collect()
    }

    async fn wait_for_status(engine: &ConsensusEngine, id: &ProposalId, status: ProposalStatus) {
        for _ in 0..100 {
            if engine.proposal(id).await.unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("proposal {} never reached {}", id, status);
    }

    // ==================== Protocol selection ====================

    #[tokio::test]
    async fn test_emergency_action_selects_unanimous() {
        let engine = engine();
        register_agents(&engine, &["a", "b", "c", "d", "e", "f", "g", "h"]).await;

        let spec = ProposalSpec::new(
            "a",
            "halt everything",
            ProposalPayload::EmergencyAction {
                action: "halt".to_string(),
                params: Value::Null,
            },
        );
        let id = engine.create_proposal(spec).await.unwrap();
        assert_eq!(engine.proposal(&id).await.unwrap().protocol, "unanimous");
    }

    #[tokio::test]
    async fn test_selection_by_target_count() {
        let engine = engine();
        let all: Vec<String> = (0..12).map(|i| format!("agent-{i}")).collect();
        let names: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
        register_agents(&engine, &names).await;

        // Two targets: unanimous
        let id = engine
            .create_proposal(
                ProposalSpec::new("agent-0", "t", payload())
                    .with_targets(targets(&["agent-1", "agent-2"])),
            )
            .await
            .unwrap();
        assert_eq!(engine.proposal(&id).await.unwrap().protocol, "unanimous");

        // Eleven targets: weighted voting
        let eleven: Vec<AgentId> = (1..12).map(|i| AgentId::new(format!("agent-{i}"))).collect();
        let id = engine
            .create_proposal(ProposalSpec::new("agent-0", "t", payload()).with_targets(eleven))
            .await
            .unwrap();
        assert_eq!(
            engine.proposal(&id).await.unwrap().protocol,
            "weighted_voting"
        );

        // Seven targets, default kind: simple majority
        let seven: Vec<AgentId> = (1..8).map(|i| AgentId::new(format!("agent-{i}"))).collect();
        let id = engine
            .create_proposal(ProposalSpec::new("agent-0", "t", payload()).with_targets(seven))
            .await
            .unwrap();
        assert_eq!(
            engine.proposal(&id).await.unwrap().protocol,
            "simple_majority"
        );
    }

    #[tokio::test]
    async fn test_policy_change_selects_supermajority() {
        let engine = engine();
        let all: Vec<String> = (0..8).map(|i| format!("agent-{i}")).collect();
        let names: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
        register_agents(&engine, &names).await;

        let spec = ProposalSpec::new(
            "agent-0",
            "loosen limits",
            ProposalPayload::PolicyChange {
                policy: "limits".to_string(),
                changes: json!({}),
            },
        );
        let id = engine.create_proposal(spec).await.unwrap();
        assert_eq!(engine.proposal(&id).await.unwrap().protocol, "supermajority");
    }

    #[tokio::test]
    async fn test_default_targets_exclude_proposer() {
        let engine = engine();
        register_agents(&engine, &["a", "b", "c", "d"]).await;

        let id = engine
            .create_proposal(ProposalSpec::new("a", "t", payload()))
            .await
            .unwrap();
        let proposal = engine.proposal(&id).await.unwrap();
        assert_eq!(proposal.targets.len(), 3);
        assert!(!proposal.is_target(&AgentId::new("a")));
        // ceil(0.67 * 3)
        assert_eq!(proposal.required_participants, 3);
    }

    #[tokio::test]
    async fn test_no_registered_agents_fails() {
        let engine = engine();
        let result = engine
            .create_proposal(ProposalSpec::new("loner", "t", payload()))
            .await;
        assert!(matches!(result, Err(EngineError::NoTargets)));
    }

    #[tokio::test]
    async fn test_disabled_protocol_rejected() {
        let engine = ConsensusEngine::builder()
            .protocol(
                Protocol::new("frozen", concord_domain::ProtocolKind::SimpleMajority, 0.51)
                    .unwrap()
                    .disabled(),
            )
            .build()
            .unwrap();
        register_agents(&engine, &["a", "b", "c"]).await;

        let result = engine
            .create_proposal(ProposalSpec::new("a", "t", payload()).with_protocol("frozen"))
            .await;
        assert!(matches!(result, Err(EngineError::ProtocolDisabled(_))));

        let result = engine
            .create_proposal(ProposalSpec::new("a", "t", payload()).with_protocol("no-such"))
            .await;
        assert!(matches!(result, Err(EngineError::UnknownProtocol(_))));
    }

    #[tokio::test]
    async fn test_proposal_cap_per_agent() {
        let engine = engine_with(EngineConfig::default().with_max_proposals_per_agent(2));
        register_agents(&engine, &["a", "b", "c"]).await;

        for _ in 0..2 {
            engine
                .create_proposal(ProposalSpec::new("a", "t", payload()))
                .await
                .unwrap();
        }
        let result = engine
            .create_proposal(ProposalSpec::new("a", "t", payload()))
            .await;
        assert!(matches!(
            result,
            Err(EngineError::TooManyOpenProposals { .. })
        ));
    }

    // ==================== Voting ====================

    #[tokio::test]
    async fn test_simple_majority_two_approve_one_reject() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b", "c"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b", "c"]))
                    .with_protocol("simple_majority")
                    .with_required_participants(2),
            )
            .await
            .unwrap();

        let outcome = engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Reject, 0.8))
            .await
            .unwrap();
        assert!(outcome.finalized.is_none());

        let outcome = engine
            .cast_vote(&id, Ballot::new("b", VoteDecision::Approve, 0.8))
            .await
            .unwrap();
        // 1:1 split does not clear the 0.51 threshold
        assert!(outcome.finalized.is_none());

        let outcome = engine
            .cast_vote(&id, Ballot::new("c", VoteDecision::Approve, 0.8))
            .await
            .unwrap();
        assert_eq!(outcome.finalized, Some(ConsensusOutcome::Approved));

        let proposal = engine.proposal(&id).await.unwrap();
        assert_eq!(proposal.status, ProposalStatus::Passed);
        let result = proposal.result().unwrap();
        let rate = result.tally.approval_rate().unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(result.plan.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanimous_never_approves_with_dissent() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b", "c"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b", "c"]))
                    .with_protocol("unanimous")
                    .with_timeout(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        for (agent, decision) in [
            ("a", VoteDecision::Approve),
            ("b", VoteDecision::Reject),
            ("c", VoteDecision::Approve),
        ] {
            let outcome = engine
                .cast_vote(&id, Ballot::new(agent, decision, 0.9))
                .await
                .unwrap();
            assert!(outcome.finalized.is_none());
        }

        // The voting window elapses without consensus
        tokio::time::sleep(Duration::from_secs(61)).await;
        wait_for_status(&engine, &id, ProposalStatus::Expired).await;
    }

    #[tokio::test]
    async fn test_revote_replaces_and_finalizes() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_protocol("unanimous")
                    .with_required_participants(2),
            )
            .await
            .unwrap();

        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        let outcome = engine
            .cast_vote(&id, Ballot::new("b", VoteDecision::Reject, 0.9))
            .await
            .unwrap();
        assert!(!outcome.replaced);
        assert!(outcome.finalized.is_none());

        // b reconsiders; the revision replaces the reject and unanimity holds
        let outcome = engine
            .cast_vote(&id, Ballot::new("b", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        assert!(outcome.replaced);
        assert_eq!(outcome.finalized, Some(ConsensusOutcome::Approved));

        let proposal = engine.proposal(&id).await.unwrap();
        assert_eq!(proposal.votes().len(), 2);
    }

    #[tokio::test]
    async fn test_vote_weight_inherited_and_clamped() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        engine.register_participant("p", 1.0, vec![]).await;
        engine.register_participant("heavy", 50.0, vec![]).await;
        engine.register_participant("b", 1.0, vec![]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["heavy", "b"]))
                    .with_required_participants(2),
            )
            .await
            .unwrap();

        engine
            .cast_vote(&id, Ballot::new("heavy", VoteDecision::Approve, 0.9))
            .await
            .unwrap();

        let proposal = engine.proposal(&id).await.unwrap();
        let vote = proposal.vote_of(&AgentId::new("heavy")).unwrap();
        assert_eq!(vote.weight, concord_domain::MAX_WEIGHT);
    }

    #[tokio::test]
    async fn test_vote_guards() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(1)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();

        // Not a target
        let result = engine
            .cast_vote(&id, Ballot::new("p", VoteDecision::Approve, 0.9))
            .await;
        assert!(matches!(result, Err(EngineError::NotATarget { .. })));

        // Unknown proposal
        let result = engine
            .cast_vote(
                &ProposalId::new("missing"),
                Ballot::new("a", VoteDecision::Approve, 0.9),
            )
            .await;
        assert!(matches!(result, Err(EngineError::UnknownProposal(_))));

        // Resolve it, then voting is closed
        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        let result = engine
            .cast_vote(&id, Ballot::new("b", VoteDecision::Approve, 0.9))
            .await;
        assert!(matches!(result, Err(EngineError::NotAcceptingVotes { .. })));
    }

    // ==================== Timeout ====================

    #[tokio::test(start_paused = true)]
    async fn test_expiry_penalizes_non_voters() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b", "c"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b", "c"]))
                    .with_timeout(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        wait_for_status(&engine, &id, ProposalStatus::Expired).await;

        let voter = engine.participant(&AgentId::new("a")).await.unwrap();
        assert_eq!(voter.reliability, 1.0);
        for name in ["b", "c"] {
            let missed = engine.participant(&AgentId::new(name)).await.unwrap();
            assert!((missed.reliability - 0.95).abs() < 1e-9);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_after_resolution_is_a_no_op() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_protocol("simple_majority")
                    .with_required_participants(2)
                    .with_timeout(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        engine
            .cast_vote(&id, Ballot::new("b", VoteDecision::Approve, 0.9))
            .await
            .unwrap();

        // Already finalized during voting; the timer firing later is a no-op
        wait_for_status(&engine, &id, ProposalStatus::Passed).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(
            engine.proposal(&id).await.unwrap().status,
            ProposalStatus::Passed
        );
    }

    // ==================== Cancellation ====================

    #[tokio::test]
    async fn test_cancel_rules() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(1)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();

        // Non-proposer cannot cancel
        let result = engine.cancel_proposal(&id, &AgentId::new("a")).await;
        assert!(matches!(result, Err(EngineError::NotProposer { .. })));

        // Proposer cancels while voting
        engine.cancel_proposal(&id, &AgentId::new("p")).await.unwrap();
        assert_eq!(
            engine.proposal(&id).await.unwrap().status,
            ProposalStatus::Cancelled
        );

        // Resolved proposals cannot be cancelled
        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(1)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();
        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        let result = engine.cancel_proposal(&id, &AgentId::new("p")).await;
        assert!(matches!(result, Err(EngineError::NotCancellable { .. })));
    }

    // ==================== Execution ====================

    #[tokio::test]
    async fn test_auto_execute_runs_plan_to_completion() {
        let executor = RecordingExecutor::new(false);
        let engine = ConsensusEngine::builder()
            .executor("update_memory", executor.clone())
            .build()
            .unwrap();
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(1)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();
        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();

        wait_for_status(&engine, &id, ProposalStatus::Completed).await;
        assert_eq!(executor.calls(), vec!["update_memory".to_string()]);
    }

    #[tokio::test]
    async fn test_queue_survives_failing_proposal() {
        let failing = RecordingExecutor::new(true);
        let succeeding = RecordingExecutor::new(false);
        let engine = ConsensusEngine::builder()
            .executor("update_memory", failing.clone())
            .executor("update_policy", succeeding.clone())
            .build()
            .unwrap();
        register_agents(&engine, &["p", "a", "b"]).await;

        let doomed = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(1)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();
        engine
            .cast_vote(&doomed, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        wait_for_status(&engine, &doomed, ProposalStatus::Executing).await;

        let healthy = engine
            .create_proposal(
                ProposalSpec::new("p", "t2", ProposalPayload::PolicyChange {
                    policy: "limits".to_string(),
                    changes: json!({}),
                })
                .with_targets(targets(&["a", "b"]))
                .with_protocol("simple_majority")
                .with_required_participants(1),
            )
            .await
            .unwrap();
        engine
            .cast_vote(&healthy, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();

        // The failed proposal stays in executing; the next one completes
        wait_for_status(&engine, &healthy, ProposalStatus::Completed).await;
        assert_eq!(
            engine.proposal(&doomed).await.unwrap().status,
            ProposalStatus::Executing
        );
        // Retries exhausted the budget on the failing step
        assert!(!failing.calls().is_empty());

        let events = engine.events_for(&doomed, 50).await;
        assert!(events.iter().any(|e| e.kind == EventKind::ExecutionFailed));
    }

    #[tokio::test]
    async fn test_manual_execute_requires_passed_status() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(1)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();

        let result = engine.execute_proposal(&id).await;
        assert!(matches!(result, Err(EngineError::NotExecutable { .. })));
    }

    // ==================== Byzantine protection ====================

    #[tokio::test]
    async fn test_byzantine_rejects_inactive_and_flip_flopping() {
        let engine =
            engine_with(EngineConfig::default().with_byzantine_protection(true).with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b", "c"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b", "c"]))
                    .with_required_participants(3)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();

        // Suspended participants may not vote
        engine
            .set_participant_status(&AgentId::new("b"), ParticipantStatus::Suspended)
            .await
            .unwrap();
        let result = engine
            .cast_vote(&id, Ballot::new("b", VoteDecision::Approve, 0.9))
            .await;
        assert!(matches!(result, Err(EngineError::ParticipantNotActive { .. })));

        // Two flips pass, the third is rejected
        for decision in [
            VoteDecision::Approve,
            VoteDecision::Reject,
            VoteDecision::Approve,
        ] {
            engine
                .cast_vote(&id, Ballot::new("a", decision, 0.9))
                .await
                .unwrap();
        }
        let result = engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Reject, 0.9))
            .await;
        assert!(matches!(result, Err(EngineError::Equivocation { .. })));
    }

    // ==================== Signatures ====================

    #[tokio::test]
    async fn test_participant_verification_signs_and_verifies() {
        let engine = ConsensusEngine::builder()
            .config(
                EngineConfig::default()
                    .with_participant_verification(true)
                    .with_auto_execute(false),
            )
            .signer(Arc::new(TestSigner))
            .build()
            .unwrap();
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(2)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();

        // Unsigned ballots get signed by the engine
        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        let proposal = engine.proposal(&id).await.unwrap();
        let vote = proposal.vote_of(&AgentId::new("a")).unwrap();
        assert!(vote.signature.as_deref().unwrap().starts_with("sig:"));

        // Tampered signatures are rejected
        let result = engine
            .cast_vote(
                &id,
                Ballot::new("b", VoteDecision::Approve, 0.9).with_signature("forged"),
            )
            .await;
        assert!(matches!(result, Err(EngineError::SignatureRejected { .. })));
    }

    #[tokio::test]
    async fn test_verification_without_signer_fails() {
        let engine = engine_with(
            EngineConfig::default()
                .with_participant_verification(true)
                .with_auto_execute(false),
        );
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload()).with_targets(targets(&["a", "b"])),
            )
            .await
            .unwrap();
        let result = engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await;
        assert!(matches!(result, Err(EngineError::SignerUnavailable)));
    }

    // ==================== Snapshots & stats ====================

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b", "c"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b", "c"]))
                    .with_required_participants(2)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();
        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();
        engine
            .cast_vote(&id, Ballot::new("b", VoteDecision::Approve, 0.7))
            .await
            .unwrap();

        let exported = engine.export().await;
        let json = exported.to_json().unwrap();

        let fresh = self::engine();
        fresh
            .import(ConsensusSnapshot::from_json(&json).unwrap())
            .await
            .unwrap();
        let re_exported = fresh.export().await;

        assert_eq!(exported.proposals, re_exported.proposals);
        assert_eq!(exported.participants, re_exported.participants);
        assert_eq!(exported.protocols, re_exported.protocols);
        assert_eq!(exported.events, re_exported.events);
    }

    #[tokio::test]
    async fn test_stats_and_event_trail() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload())
                    .with_targets(targets(&["a", "b"]))
                    .with_required_participants(1)
                    .with_protocol("simple_majority"),
            )
            .await
            .unwrap();
        engine
            .cast_vote(&id, Ballot::new("a", VoteDecision::Approve, 0.9))
            .await
            .unwrap();

        let stats = engine.stats().await;
        assert_eq!(stats.overview.total_proposals, 1);
        assert_eq!(stats.overview.consensus_reached, 1);
        assert_eq!(stats.overview.participants, 3);
        assert_eq!(stats.recent_proposals.len(), 1);

        let events = engine.events_for(&id, 10).await;
        // Newest first: consensus_reached, vote_cast, voting_started, created
        assert_eq!(events[0].kind, EventKind::ConsensusReached);
        assert_eq!(events.last().unwrap().kind, EventKind::ProposalCreated);
    }

    #[tokio::test]
    async fn test_event_logging_disabled_records_nothing() {
        let engine = engine_with(
            EngineConfig::default()
                .with_event_logging(false)
                .with_auto_execute(false),
        );
        register_agents(&engine, &["p", "a", "b"]).await;

        let id = engine
            .create_proposal(
                ProposalSpec::new("p", "t", payload()).with_targets(targets(&["a", "b"])),
            )
            .await
            .unwrap();
        assert!(engine.events_for(&id, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_proposal_filter_query() {
        let engine = engine_with(EngineConfig::default().with_auto_execute(false));
        register_agents(&engine, &["p", "q", "a", "b"]).await;

        engine
            .create_proposal(
                ProposalSpec::new("p", "one", payload()).with_targets(targets(&["a", "b"])),
            )
            .await
            .unwrap();
        engine
            .create_proposal(
                ProposalSpec::new("q", "two", payload()).with_targets(targets(&["a", "b"])),
            )
            .await
            .unwrap();

        let by_p = engine
            .proposals(&ProposalFilter::new().by_proposer("p"))
            .await;
        assert_eq!(by_p.len(), 1);
        assert_eq!(by_p[0].title, "one");

        let voting = engine
            .proposals(&ProposalFilter::new().with_status(ProposalStatus::Voting))
            .await;
        assert_eq!(voting.len(), 2);
    }
}
