//! The cockpit: owner of the live log and the workflow records, and the one
//! place commands are dispatched.
//!
//! Reads go through the `select_*` methods, which fold the live log with any
//! replay overlay on top. Replay never writes to the live log.

pub mod command;
pub mod demo;
pub mod snapshot;

use crate::config::{CockpitConfig, StoreProfile};
use crate::error::{CockpitError, Result};
use crate::events::log::{EventLog, validate};
use crate::events::{DecisionAction, DomainEvent, EventPayload, LaborAction, NewEvent, PrepStatus};
use crate::incentive::{IncentiveDistribution, IncentiveInput, distribute};
use crate::incidents::{Incident, IncidentBook, IncidentStatus, detector};
use crate::logging::ndjson::mirror_event;
use crate::projection::{
    CalendarDay, CockpitMetrics, IncidentCounts, LaborMetrics, MonthlyForecastSummary,
    MonthlySalesMetrics, SalesLedger, SalesMetrics, StaffState, TodoIndex, TodoStats, TodoView,
    YearMonth, calendar_data, derive_staff_states, derive_staff_status, labor_metrics,
    monthly_forecast_summary, monthly_sales_metrics, prep_metrics,
};
use crate::replay::{ReplayController, ReplayState};
use crate::roles::Role;
use crate::time::{Clock, TimeBand};
use crate::workflow::proposal::{AGGREGATE_TARGET, PREP_TARGET};
use crate::workflow::{
    Proposal, ProposalDraft, proposal_from_decision, proposal_from_incident,
    validate_decision_transition,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::PathBuf;
use uuid::Uuid;

pub use command::{Command, Outcome, PrepInput};
pub use snapshot::{Persistence, SCHEMA_VERSION, STATE_NAMESPACE, Snapshot};

pub struct Cockpit {
    config: CockpitConfig,
    clock: Box<dyn Clock>,
    log: EventLog,
    proposals: Vec<Proposal>,
    incidents: IncidentBook,
    current_store: String,
    replay: ReplayController,
    persistence: Persistence,
    mirror: Option<PathBuf>,
}

impl Cockpit {
    /// Build a cockpit, restoring the last snapshot when the store has one.
    pub fn open(config: CockpitConfig, clock: Box<dyn Clock>, mut persistence: Persistence) -> Self {
        let replay = ReplayController::new(std::time::Duration::from_millis(
            config.replay.interval_ms,
        ));
        let mut cockpit = Self {
            current_store: config.current_store.clone(),
            config,
            clock,
            log: EventLog::new(),
            proposals: Vec::new(),
            incidents: IncidentBook::new(),
            replay,
            persistence: Persistence::in_memory(),
            mirror: None,
        };
        if let Some(snapshot) = persistence.load() {
            match EventLog::from_events(snapshot.events) {
                Ok(log) => {
                    cockpit.log = log;
                    cockpit.proposals = snapshot.proposals;
                    for proposal in &mut cockpit.proposals {
                        if proposal.store_id.is_empty() {
                            proposal.store_id = snapshot.current_store.clone();
                        }
                    }
                    cockpit.incidents = IncidentBook::from_incidents(snapshot.incidents);
                    if cockpit.config.store(&snapshot.current_store).is_some() {
                        cockpit.current_store = snapshot.current_store;
                    }
                    tracing::info!(events = cockpit.log.len(), "restored snapshot");
                }
                Err(err) => persistence.degrade("restore", &err.to_string()),
            }
        }
        cockpit.persistence = persistence;
        cockpit
    }

    pub fn in_memory(config: CockpitConfig, clock: Box<dyn Clock>) -> Self {
        Self::open(config, clock, Persistence::in_memory())
    }

    /// Mirror every appended event to an NDJSON file.
    pub fn with_mirror(mut self, path: PathBuf) -> Self {
        self.mirror = Some(path);
        self
    }

    pub fn config(&self) -> &CockpitConfig {
        &self.config
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn live_log(&self) -> &EventLog {
        &self.log
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            schema_version: SCHEMA_VERSION,
            current_store: self.current_store.clone(),
            events: self.log.events().to_vec(),
            proposals: self.proposals.clone(),
            incidents: self.incidents.to_vec(),
        }
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Outcome> {
        let name = command.name();
        let durable = command.is_durable();
        tracing::debug!(command = name, store = %self.current_store, "dispatch");
        match self.execute(command) {
            Ok(outcome) => {
                if durable {
                    let snapshot = self.snapshot();
                    self.persistence.save(&snapshot);
                }
                tracing::info!(command = name, appended = outcome.events().len(), "command applied");
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(command = name, error = %err, "command rejected");
                Err(err)
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::CheckIn { staff_id } => self.record_labor(&staff_id, LaborAction::CheckIn),
            Command::CheckOut { staff_id } => self.record_labor(&staff_id, LaborAction::CheckOut),
            Command::StartBreak { staff_id } => {
                self.record_labor(&staff_id, LaborAction::BreakStart)
            }
            Command::EndBreak { staff_id } => self.record_labor(&staff_id, LaborAction::BreakEnd),
            Command::RecordSale {
                menu_id,
                quantity,
                total,
            } => {
                let ev = NewEvent::sale(&self.current_store, self.now(), &menu_id, quantity, total);
                self.append_all(vec![ev]).map(Outcome::Events)
            }
            Command::RecordDelivery {
                item_name,
                status,
                delay_minutes,
            } => {
                let ev = NewEvent::new(
                    &self.current_store,
                    self.now(),
                    EventPayload::Delivery {
                        item_name,
                        status,
                        delay_minutes,
                    },
                );
                self.append_all(vec![ev]).map(Outcome::Events)
            }
            Command::UpsertForecast {
                date,
                time_band,
                customers,
                average_spend,
            } => {
                if !average_spend.is_finite() || average_spend < 0.0 {
                    return Err(CockpitError::validation(format!(
                        "average spend must be a finite non-negative amount, got {average_spend}"
                    )));
                }
                let ev = NewEvent::forecast(
                    &self.current_store,
                    self.now(),
                    date,
                    time_band,
                    customers as f64 * average_spend,
                    customers,
                );
                self.append_all(vec![ev]).map(Outcome::Events)
            }
            Command::StartPrep(input) => self.record_prep(input, PrepStatus::Started),
            Command::CompletePrep(input) => self.record_prep(input, PrepStatus::Completed),
            Command::CreateProposal(draft) => self.create_proposal(draft).map(Outcome::Proposal),
            Command::ProposeFromIncident { incident_id } => {
                let incident = self
                    .incidents
                    .get(&incident_id)
                    .ok_or_else(|| CockpitError::not_found(format!("incident {incident_id}")))?;
                let draft = proposal_from_incident(incident, self.now());
                self.create_proposal(draft).map(Outcome::Proposal)
            }
            Command::UpdateProposal(proposal) => {
                self.update_proposal(proposal).map(Outcome::Proposal)
            }
            Command::ApproveProposal { proposal_id } => {
                self.approve_proposal(&proposal_id).map(Outcome::Events)
            }
            Command::RejectProposal { proposal_id } => {
                self.reject_proposal(&proposal_id).map(Outcome::Events)
            }
            Command::StartDecision {
                proposal_id,
                target_id,
                actor_id,
            } => self
                .advance_todos(
                    &proposal_id,
                    target_id.as_deref(),
                    actor_id.as_deref(),
                    DecisionAction::Started,
                )
                .map(Outcome::Events),
            Command::CompleteDecision {
                proposal_id,
                target_id,
                actor_id,
            } => {
                let events = self.advance_todos(
                    &proposal_id,
                    target_id.as_deref(),
                    actor_id.as_deref(),
                    DecisionAction::Completed,
                )?;
                self.resolve_finished_incident(&proposal_id);
                Ok(Outcome::Events(events))
            }
            Command::ScanIncidents { date } => {
                let date = date.unwrap_or_else(|| self.today());
                let as_of = self.scan_instant(date);
                let findings = detector::detect(
                    self.log.events(),
                    &self.current_store,
                    date,
                    as_of,
                    &self.config,
                );
                let report =
                    self.incidents
                        .reconcile(&self.current_store, date, findings, self.clock.now());
                tracing::info!(
                    opened = report.opened.len(),
                    updated = report.updated.len(),
                    resolved = report.resolved.len(),
                    "incident scan"
                );
                Ok(Outcome::Scan(report))
            }
            Command::InvestigateIncident { incident_id } => {
                let now = self.now();
                self.incidents
                    .mark_investigating(&incident_id, now)
                    .cloned()
                    .map(Outcome::Incident)
            }
            Command::SwitchStore { store_id } => {
                let store = self
                    .config
                    .store(store_id.trim())
                    .cloned()
                    .ok_or_else(|| CockpitError::not_found(format!("store {store_id}")))?;
                self.current_store = store.id.clone();
                Ok(Outcome::Store(store))
            }
            Command::AppendEvents(batch) => self.append_all(batch).map(Outcome::Events),
            Command::StartReplay { batch } => {
                let batch =
                    batch.unwrap_or_else(|| demo::replay_batch(&self.current_store, self.today()));
                self.replay.start(batch)?;
                Ok(Outcome::Replay(self.replay.state()))
            }
            Command::StepReplay => {
                self.replay.step()?;
                Ok(Outcome::Replay(self.replay.state()))
            }
            Command::PlayReplay => {
                self.replay.play();
                Ok(Outcome::Replay(self.replay.state()))
            }
            Command::PauseReplay => {
                self.replay.pause();
                Ok(Outcome::Replay(self.replay.state()))
            }
            Command::ResetReplay => {
                self.replay.reset();
                Ok(Outcome::Replay(self.replay.state()))
            }
            Command::PumpReplay { wait } => {
                match wait {
                    Some(timeout) => self.replay.wait_and_pump(timeout)?,
                    None => self.replay.pump()?,
                };
                Ok(Outcome::Replay(self.replay.state()))
            }
            Command::SeedDemoData => {
                let batch = demo::seed_events(
                    &self.config,
                    &self.current_store,
                    self.today(),
                    self.now(),
                );
                self.append_all(batch).map(Outcome::Events)
            }
            Command::ResetAllData => {
                self.log = EventLog::new();
                self.proposals.clear();
                self.incidents = IncidentBook::new();
                self.replay.reset();
                self.current_store = self.config.current_store.clone();
                self.persistence.clear();
                Ok(Outcome::Cleared)
            }
        }
    }

    /// Validate the whole batch before appending any of it.
    fn append_all(&mut self, batch: Vec<NewEvent>) -> Result<Vec<DomainEvent>> {
        let mut ids = HashSet::new();
        for ev in &batch {
            validate(ev)?;
            if let Some(id) = ev.id.as_deref()
                && (self.log.contains_id(id.trim()) || !ids.insert(id.trim()))
            {
                return Err(CockpitError::validation(format!("duplicate event id `{id}`")));
            }
        }
        let mut appended = Vec::with_capacity(batch.len());
        for ev in batch {
            let ev = self.log.append(ev)?.clone();
            if let Some(path) = &self.mirror
                && let Err(err) = mirror_event(path, &ev)
            {
                tracing::warn!(path = %path.display(), error = %err, "event mirror failed");
            }
            appended.push(ev);
        }
        Ok(appended)
    }

    fn record_labor(&mut self, staff_id: &str, action: LaborAction) -> Result<Outcome> {
        let staff_id = staff_id.trim();
        if self.config.staff_profile(staff_id).is_none() {
            return Err(CockpitError::not_found(format!("staff {staff_id}")));
        }
        let now = self.now();
        let state = derive_staff_status(
            self.log.events(),
            &self.current_store,
            staff_id,
            now.date(),
            now,
        );
        if !state.status.accepts(action) {
            return Err(CockpitError::InvalidTransition {
                subject: format!("staff {staff_id}"),
                from: state.status.to_string(),
                to: action.to_string(),
            });
        }
        let ev = NewEvent::labor(&self.current_store, now, staff_id, action);
        self.append_all(vec![ev]).map(Outcome::Events)
    }

    /// A prep event linked to a proposal also advances that proposal's todo
    /// for the same prep item.
    fn record_prep(&mut self, input: PrepInput, status: PrepStatus) -> Result<Outcome> {
        let now = self.now();
        let mut batch = vec![NewEvent::new(
            &self.current_store,
            now,
            EventPayload::Prep {
                prep_item_id: input.prep_item_id.trim().to_string(),
                batch_id: input.batch_id.clone(),
                quantity: input.quantity,
                status,
                proposal_id: input.proposal_id.clone(),
            },
        )];

        let mut linked_proposal = None;
        if let Some(proposal_id) = input.proposal_id.as_deref() {
            let index = TodoIndex::build(self.log.events(), &self.current_store);
            if !index.contains_proposal(proposal_id) {
                return Err(CockpitError::not_found(format!("todos for proposal {proposal_id}")));
            }
            let target = format!("{PREP_TARGET}{}", input.prep_item_id.trim());
            let next = match status {
                PrepStatus::Started => DecisionAction::Started,
                _ => DecisionAction::Completed,
            };
            if let Some(todo) = index.get(proposal_id, &target)
                && validate_decision_transition(&target, Some(todo.action), next).is_ok()
            {
                let mut record = todo.record.clone();
                record.action = next;
                batch.push(NewEvent::new(
                    &self.current_store,
                    now,
                    EventPayload::Decision(record),
                ));
                linked_proposal = Some(proposal_id.to_string());
            }
        }

        let events = self.append_all(batch)?;
        if status == PrepStatus::Completed
            && let Some(proposal_id) = linked_proposal
        {
            self.resolve_finished_incident(&proposal_id);
        }
        Ok(Outcome::Events(events))
    }

    fn create_proposal(&mut self, draft: ProposalDraft) -> Result<Proposal> {
        let now = self.now();
        let id = format!("prop-{}", &Uuid::new_v4().simple().to_string()[..12]);
        let draft = if draft.store_id.trim().is_empty() {
            draft.store(self.current_store.clone())
        } else {
            draft
        };
        let proposal = draft.build(id, now)?;
        if let Some(incident_id) = proposal.incident_id.as_deref() {
            self.incidents.mark_proposed(incident_id, &proposal.id, now)?;
        }
        self.proposals.push(proposal.clone());
        Ok(proposal)
    }

    fn update_proposal(&mut self, proposal: Proposal) -> Result<Proposal> {
        let store = &self.current_store;
        let slot = self
            .proposals
            .iter_mut()
            .find(|p| p.id == proposal.id && &p.store_id == store)
            .ok_or_else(|| CockpitError::not_found(format!("pending proposal {}", proposal.id)))?;
        proposal.validate()?;
        let mut proposal = proposal;
        proposal.store_id = slot.store_id.clone();
        proposal.todo_count = proposal.planned_todo_count();
        *slot = proposal.clone();
        Ok(proposal)
    }

    /// Pending proposals are only reachable from their own store.
    fn take_pending(&self, proposal_id: &str) -> Result<(usize, Proposal)> {
        self.proposals
            .iter()
            .position(|p| p.id == proposal_id && p.store_id == self.current_store)
            .map(|idx| (idx, self.proposals[idx].clone()))
            .ok_or_else(|| CockpitError::not_found(format!("pending proposal {proposal_id}")))
    }

    fn approve_proposal(&mut self, proposal_id: &str) -> Result<Vec<DomainEvent>> {
        let (idx, mut proposal) = self.take_pending(proposal_id)?;
        proposal.todo_count = proposal.planned_todo_count();
        let index = TodoIndex::build(self.log.events(), &proposal.store_id);
        let now = self.now();
        let mut batch = Vec::new();
        for target in proposal.fan_out_targets() {
            validate_decision_transition(
                &format!("todo {proposal_id}/{target}"),
                index.get(proposal_id, &target).map(|t| t.action),
                DecisionAction::Approved,
            )?;
            batch.push(NewEvent::new(
                &proposal.store_id,
                now,
                EventPayload::Decision(proposal.decision_record(
                    &target,
                    DecisionAction::Approved,
                    None,
                )),
            ));
        }
        let events = self.append_all(batch)?;
        self.proposals.remove(idx);
        if let Some(incident_id) = proposal.incident_id.as_deref()
            && let Err(err) = self.incidents.mark_executing(incident_id, now)
        {
            tracing::debug!(incident = incident_id, error = %err, "incident not advanced");
        }
        Ok(events)
    }

    fn reject_proposal(&mut self, proposal_id: &str) -> Result<Vec<DomainEvent>> {
        let (idx, proposal) = self.take_pending(proposal_id)?;
        let now = self.now();
        let mut record = proposal.decision_record(AGGREGATE_TARGET, DecisionAction::Rejected, None);
        record.todo_count = 0;
        let events = self.append_all(vec![NewEvent::new(
            &proposal.store_id,
            now,
            EventPayload::Decision(record),
        )])?;
        self.proposals.remove(idx);
        if let Some(incident_id) = proposal.incident_id.as_deref()
            && let Err(err) = self.incidents.return_to_investigating(incident_id, now)
        {
            tracing::debug!(incident = incident_id, error = %err, "incident not returned");
        }
        Ok(events)
    }

    /// Without a target every todo of the proposal that can make the move
    /// does; with one, that todo must be able to.
    fn advance_todos(
        &mut self,
        proposal_id: &str,
        target_id: Option<&str>,
        actor_id: Option<&str>,
        next: DecisionAction,
    ) -> Result<Vec<DomainEvent>> {
        if let Some(actor) = actor_id
            && self.config.staff_profile(actor).is_none()
        {
            return Err(CockpitError::not_found(format!("staff {actor}")));
        }
        let index = TodoIndex::build(self.log.events(), &self.current_store);
        let todos: Vec<&TodoView> = match target_id {
            Some(target) => vec![index.get(proposal_id, target).ok_or_else(|| {
                CockpitError::not_found(format!("todo {proposal_id}/{target}"))
            })?],
            None => index.for_proposal(proposal_id).collect(),
        };
        if todos.is_empty() {
            return Err(CockpitError::not_found(format!("todos for proposal {proposal_id}")));
        }

        let mut movable = Vec::new();
        let mut first_err = None;
        for todo in todos {
            let subject = format!("todo {}/{}", todo.proposal_id, todo.target_id);
            match validate_decision_transition(&subject, Some(todo.action), next) {
                Ok(()) => movable.push(todo),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        if movable.is_empty() || (target_id.is_some() && first_err.is_some()) {
            return Err(first_err.unwrap_or_else(|| {
                CockpitError::not_found(format!("todos for proposal {proposal_id}"))
            }));
        }

        let now = self.now();
        let batch = movable
            .into_iter()
            .map(|todo| {
                let mut record = todo.record.clone();
                record.action = next;
                record.actor_id = actor_id.map(str::to_string).or(record.actor_id);
                NewEvent::new(&self.current_store, now, EventPayload::Decision(record))
            })
            .collect();
        self.append_all(batch)
    }

    /// Resolve the incident behind a proposal once all its todos are done.
    fn resolve_finished_incident(&mut self, proposal_id: &str) {
        let index = TodoIndex::build(self.log.events(), &self.current_store);
        let todos = index.for_proposal(proposal_id).collect::<Vec<_>>();
        if todos.is_empty() || todos.iter().any(|t| t.action != DecisionAction::Completed) {
            return;
        }
        let Some(incident_id) = todos[0].record.incident_id.clone() else {
            return;
        };
        let now = self.now();
        if self
            .incidents
            .get(&incident_id)
            .is_some_and(|i| i.status == IncidentStatus::Executing)
            && self.incidents.resolve(&incident_id, now).is_ok()
        {
            tracing::info!(incident = %incident_id, proposal = proposal_id, "incident resolved");
        }
    }

    /// Scans of past dates look at the whole day.
    fn scan_instant(&self, date: NaiveDate) -> NaiveDateTime {
        let now = self.now();
        if date < now.date() {
            date.and_time(NaiveTime::MIN) + Duration::days(1)
        } else {
            now
        }
    }

    /// Live log with the replay overlay appended. Overlay events are
    /// renumbered to follow the live log.
    pub fn events_view(&self) -> Cow<'_, [DomainEvent]> {
        let overlay = self.replay.overlay();
        if overlay.is_empty() {
            return Cow::Borrowed(self.log.events());
        }
        let base = self.log.last_seq().map_or(0, |s| s + 1);
        let mut merged = self.log.events().to_vec();
        merged.extend(overlay.iter().enumerate().map(|(i, ev)| DomainEvent {
            seq: base + i as u64,
            ..ev.clone()
        }));
        Cow::Owned(merged)
    }

    fn ledger(&self, events: &[DomainEvent]) -> SalesLedger {
        SalesLedger::build(events, &self.current_store, &self.config.bands)
    }

    pub fn select_current_store(&self) -> StoreProfile {
        self.config
            .store(&self.current_store)
            .cloned()
            .unwrap_or_else(|| StoreProfile {
                id: self.current_store.clone(),
                name: self.current_store.clone(),
            })
    }

    /// Roster members without labor events are listed as out.
    pub fn select_staff_states(&self, date: NaiveDate) -> Vec<StaffState> {
        let events = self.events_view();
        let mut states = derive_staff_states(&events, &self.current_store, date, self.now());
        for profile in &self.config.staff {
            if !states.iter().any(|s| s.staff_id == profile.id) {
                states.push(StaffState {
                    staff_id: profile.id.clone(),
                    ..StaffState::default()
                });
            }
        }
        states.sort_by(|a, b| a.staff_id.cmp(&b.staff_id));
        states
    }

    pub fn select_labor_metrics(&self, date: NaiveDate) -> LaborMetrics {
        let events = self.events_view();
        let states = derive_staff_states(&events, &self.current_store, date, self.now());
        let sales = self.ledger(&events).actual_sales(date, TimeBand::All);
        labor_metrics(date, &states, |id| self.config.wage_for(id), sales)
    }

    pub fn select_sales_metrics(&self, date: NaiveDate, band: TimeBand) -> SalesMetrics {
        self.ledger(&self.events_view()).metrics(date, band)
    }

    pub fn select_monthly_sales_metrics(&self, month: YearMonth, band: TimeBand) -> MonthlySalesMetrics {
        monthly_sales_metrics(
            &self.events_view(),
            &self.current_store,
            month,
            band,
            &self.config.bands,
        )
    }

    pub fn select_calendar_data(&self, month: YearMonth) -> Vec<CalendarDay> {
        calendar_data(&self.events_view(), &self.current_store, month, &self.config.bands)
    }

    pub fn select_monthly_forecast_summary(
        &self,
        month: YearMonth,
        band: TimeBand,
    ) -> MonthlyForecastSummary {
        monthly_forecast_summary(
            &self.events_view(),
            &self.current_store,
            month,
            band,
            &self.config.bands,
            self.now(),
        )
    }

    fn todo_index(&self) -> TodoIndex {
        TodoIndex::build(&self.events_view(), &self.current_store)
    }

    pub fn select_active_todos(&self, role: Option<Role>) -> Vec<TodoView> {
        self.todo_index().active(role).into_iter().cloned().collect()
    }

    pub fn select_completed_todos(&self, role: Option<Role>) -> Vec<TodoView> {
        self.todo_index().completed(role).into_iter().cloned().collect()
    }

    pub fn select_todo_stats(&self) -> TodoStats {
        self.todo_index().stats(self.now())
    }

    pub fn select_cockpit_metrics(&self, date: NaiveDate, band: TimeBand) -> CockpitMetrics {
        let events = self.events_view();
        let now = self.now();
        let ledger = self.ledger(&events);
        let states = derive_staff_states(&events, &self.current_store, date, now);
        let labor = labor_metrics(
            date,
            &states,
            |id| self.config.wage_for(id),
            ledger.actual_sales(date, TimeBand::All),
        );
        CockpitMetrics {
            store_id: self.current_store.clone(),
            date,
            time_band: band,
            as_of: now,
            sales: ledger.metrics(date, band),
            labor,
            prep: prep_metrics(&events, &self.current_store, date),
            todos: TodoIndex::build(&events, &self.current_store).stats(now),
            open_incidents: IncidentCounts::tally(self.incidents.open_for_store(&self.current_store)),
        }
    }

    /// Unresolved incidents of the current store, most severe first.
    pub fn select_exceptions(&self) -> Vec<Incident> {
        self.incidents
            .open_for_store(&self.current_store)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn select_incident(&self, incident_id: &str) -> Option<&Incident> {
        self.incidents.get(incident_id)
    }

    /// The target is the configured daily target, else the day's forecast.
    pub fn select_incentive_distribution(&self, date: NaiveDate) -> IncentiveDistribution {
        let events = self.events_view();
        let now = self.now();
        let ledger = self.ledger(&events);
        let states = derive_staff_states(&events, &self.current_store, date, now);
        let index = TodoIndex::build(&events, &self.current_store);
        let completed = index.completed(None);
        let target_sales = self
            .config
            .incentive
            .daily_target_sales
            .unwrap_or_else(|| ledger.forecast(date, TimeBand::All).0);
        let input = IncentiveInput {
            date,
            as_of: now,
            staff: &states,
            completed_todos: &completed,
            actual_sales: ledger.actual_sales(date, TimeBand::All),
            target_sales,
            schedule: &self.config.bands,
            config: &self.config.incentive,
        };
        distribute(&input, |id| self.config.staff_name(id))
    }

    pub fn select_pending_proposals(&self) -> Vec<&Proposal> {
        self.proposals
            .iter()
            .filter(|p| p.store_id == self.current_store)
            .collect()
    }

    /// A pending proposal, or the authoring shape rebuilt from its approved
    /// todos. Rejected proposals have no authoring shape left.
    pub fn select_proposal(&self, proposal_id: &str) -> Option<Proposal> {
        if let Some(p) = self
            .select_pending_proposals()
            .into_iter()
            .find(|p| p.id == proposal_id)
        {
            return Some(p.clone());
        }
        let index = self.todo_index();
        let todo = index
            .for_proposal(proposal_id)
            .find(|t| t.action != DecisionAction::Rejected)?;
        Some(proposal_from_decision(
            &todo.store_id,
            &todo.record,
            todo.approved_at.unwrap_or(todo.updated_at),
        ))
    }

    pub fn select_replay_state(&self) -> ReplayState {
        self.replay.state()
    }
}
