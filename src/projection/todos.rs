use crate::events::{DecisionAction, DecisionRecord, DomainEvent, EventPayload};
use crate::roles::Role;
use crate::workflow::proposal::ROLE_TARGET;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Current state of one `(proposal_id, target_id)` todo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoView {
    pub proposal_id: String,
    pub target_id: String,
    pub store_id: String,
    pub action: DecisionAction,
    pub record: DecisionRecord,
    pub approved_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
    pub last_seq: u64,
}

impl TodoView {
    pub fn is_active(&self) -> bool {
        matches!(self.action, DecisionAction::Approved | DecisionAction::Started)
    }

    pub fn is_overdue(&self, as_of: NaiveDateTime) -> bool {
        self.is_active() && self.record.deadline.is_some_and(|d| d < as_of)
    }

    /// Visible to `role`. A `role:` todo belongs to that role alone; other
    /// todos follow the proposal's distribution, and nobody means everyone.
    pub fn visible_to(&self, role: Option<Role>) -> bool {
        let Some(role) = role else {
            return true;
        };
        if let Some(target_role) = self
            .target_id
            .strip_prefix(ROLE_TARGET)
            .and_then(|r| r.parse::<Role>().ok())
        {
            return target_role == role;
        }
        self.record.distributed_to_roles.is_empty()
            || self.record.distributed_to_roles.contains(&role)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TodoStats {
    pub total: usize,
    pub approved: usize,
    pub started: usize,
    pub completed: usize,
    pub overdue: usize,
    pub completion_rate: f64,
}

/// `(proposal_id, target_id) → latest decision`, last write wins by
/// `(ts, seq)`.
#[derive(Debug, Clone, Default)]
pub struct TodoIndex {
    todos: BTreeMap<(String, String), TodoView>,
}

impl TodoIndex {
    pub fn build(events: &[DomainEvent], store_id: &str) -> Self {
        let mut index = Self::default();
        for ev in events.iter().filter(|ev| ev.store_id == store_id) {
            index.apply_event(ev);
        }
        index
    }

    pub fn apply_event(&mut self, ev: &DomainEvent) {
        let EventPayload::Decision(record) = &ev.payload else {
            return;
        };
        let key = (record.proposal_id.clone(), record.target_id.clone());
        let approved_at = (record.action == DecisionAction::Approved).then_some(ev.ts);
        match self.todos.get_mut(&key) {
            Some(cur) if (ev.ts, ev.seq) < (cur.updated_at, cur.last_seq) => {
                if approved_at.is_some() && cur.approved_at.is_none() {
                    cur.approved_at = approved_at;
                }
            }
            Some(cur) => {
                cur.action = record.action;
                cur.record = record.clone();
                cur.updated_at = ev.ts;
                cur.last_seq = ev.seq;
                cur.approved_at = cur.approved_at.or(approved_at);
            }
            None => {
                self.todos.insert(
                    key,
                    TodoView {
                        proposal_id: record.proposal_id.clone(),
                        target_id: record.target_id.clone(),
                        store_id: ev.store_id.clone(),
                        action: record.action,
                        record: record.clone(),
                        approved_at,
                        updated_at: ev.ts,
                        last_seq: ev.seq,
                    },
                );
            }
        }
    }

    pub fn get(&self, proposal_id: &str, target_id: &str) -> Option<&TodoView> {
        self.todos
            .get(&(proposal_id.to_string(), target_id.to_string()))
    }

    pub fn for_proposal<'a>(&'a self, proposal_id: &'a str) -> impl Iterator<Item = &'a TodoView> {
        self.todos
            .values()
            .filter(move |t| t.proposal_id == proposal_id)
    }

    pub fn contains_proposal(&self, proposal_id: &str) -> bool {
        self.for_proposal(proposal_id).next().is_some()
    }

    /// Approved or started todos, oldest approval first.
    pub fn active(&self, role: Option<Role>) -> Vec<&TodoView> {
        let mut out = self
            .todos
            .values()
            .filter(|t| t.is_active() && t.visible_to(role))
            .collect::<Vec<_>>();
        out.sort_by(|a, b| {
            a.approved_at
                .cmp(&b.approved_at)
                .then_with(|| a.last_seq.cmp(&b.last_seq))
        });
        out
    }

    /// Completed todos, most recent first.
    pub fn completed(&self, role: Option<Role>) -> Vec<&TodoView> {
        let mut out = self
            .todos
            .values()
            .filter(|t| t.action == DecisionAction::Completed && t.visible_to(role))
            .collect::<Vec<_>>();
        out.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.last_seq.cmp(&a.last_seq))
        });
        out
    }

    pub fn overdue(&self, as_of: NaiveDateTime) -> Vec<&TodoView> {
        self.todos.values().filter(|t| t.is_overdue(as_of)).collect()
    }

    /// Rejected proposals are not todos and are left out.
    pub fn stats(&self, as_of: NaiveDateTime) -> TodoStats {
        let mut stats = TodoStats::default();
        for todo in self.todos.values() {
            match todo.action {
                DecisionAction::Approved => stats.approved += 1,
                DecisionAction::Started => stats.started += 1,
                DecisionAction::Completed => stats.completed += 1,
                DecisionAction::Rejected => continue,
            }
            stats.total += 1;
            if todo.is_overdue(as_of) {
                stats.overdue += 1;
            }
        }
        if stats.total > 0 {
            stats.completion_rate = stats.completed as f64 * 100.0 / stats.total as f64;
        }
        stats
    }
}
