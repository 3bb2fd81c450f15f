//! Replay of a staged event batch into an overlay log.
//!
//! The overlay sits on top of the live log for reads and is discarded on
//! reset. Stepping by hand and playing on the ticker apply the same events in
//! the same order.

mod ticker;

use crate::error::{CockpitError, Result};
use crate::events::log::{EventLog, validate};
use crate::events::{DomainEvent, NewEvent};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use ticker::ReplayTicker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPhase {
    Idle,
    Loaded,
    Stepping,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayState {
    pub phase: ReplayPhase,
    pub pending_events: usize,
    pub current_index: usize,
    pub is_playing: bool,
    pub overlay_events: usize,
}

pub struct ReplayController {
    pending: Vec<NewEvent>,
    current_index: usize,
    overlay: EventLog,
    ticker: Option<ReplayTicker>,
    interval: Duration,
}

impl ReplayController {
    pub fn new(interval: Duration) -> Self {
        Self {
            pending: Vec::new(),
            current_index: 0,
            overlay: EventLog::new(),
            ticker: None,
            interval,
        }
    }

    /// Stage a batch, dropping any previous overlay. The whole batch is
    /// validated up front so stepping cannot fail halfway.
    pub fn start(&mut self, batch: Vec<NewEvent>) -> Result<()> {
        let mut ids = HashSet::new();
        for ev in &batch {
            validate(ev)?;
            if let Some(id) = ev.id.as_deref()
                && !ids.insert(id.trim())
            {
                return Err(CockpitError::validation(format!(
                    "replay batch repeats event id `{id}`"
                )));
            }
        }
        self.reset();
        self.pending = batch;
        Ok(())
    }

    /// Apply the next staged event. Past the end this does nothing.
    pub fn step(&mut self) -> Result<Option<&DomainEvent>> {
        let Some(next) = self.pending.get(self.current_index).cloned() else {
            self.stop_ticker();
            return Ok(None);
        };
        self.current_index += 1;
        if self.current_index == self.pending.len() {
            self.stop_ticker();
        }
        let ev = self.overlay.append(next)?;
        Ok(Some(ev))
    }

    /// Start the ticker. Returns false when nothing is left to play.
    pub fn play(&mut self) -> bool {
        if self.current_index >= self.pending.len() {
            return false;
        }
        if self.ticker.is_none() {
            tracing::debug!(interval_ms = self.interval.as_millis() as u64, "replay ticker started");
            self.ticker = Some(ReplayTicker::start(self.interval));
        }
        true
    }

    pub fn pause(&mut self) {
        self.stop_ticker();
    }

    pub fn reset(&mut self) {
        self.stop_ticker();
        self.pending.clear();
        self.current_index = 0;
        self.overlay = EventLog::new();
    }

    /// Step once per tick delivered since the last pump.
    pub fn pump(&mut self) -> Result<usize> {
        let ticks = self.ticker.as_ref().map_or(0, |t| t.drain());
        self.step_times(ticks)
    }

    /// Block for the next tick, then pump. Returns the number of steps taken.
    pub fn wait_and_pump(&mut self, timeout: Duration) -> Result<usize> {
        let ticked = self.ticker.as_ref().is_some_and(|t| t.wait(timeout));
        if !ticked {
            return Ok(0);
        }
        Ok(self.step_times(1)? + self.pump()?)
    }

    fn step_times(&mut self, n: usize) -> Result<usize> {
        let mut stepped = 0;
        for _ in 0..n {
            if self.step()?.is_none() {
                break;
            }
            stepped += 1;
        }
        Ok(stepped)
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
            tracing::debug!(current_index = self.current_index, "replay ticker stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn overlay(&self) -> &[DomainEvent] {
        self.overlay.events()
    }

    pub fn state(&self) -> ReplayState {
        let phase = if self.is_playing() {
            ReplayPhase::Playing
        } else if self.pending.is_empty() {
            ReplayPhase::Idle
        } else if self.current_index == 0 {
            ReplayPhase::Loaded
        } else {
            ReplayPhase::Stepping
        };
        ReplayState {
            phase,
            pending_events: self.pending.len(),
            current_index: self.current_index,
            is_playing: self.is_playing(),
            overlay_events: self.overlay.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn batch(n: u32) -> Vec<NewEvent> {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        (0..n)
            .map(|i| {
                NewEvent::sale("s1", date.and_hms_opt(11, i, 0).unwrap(), "m", 1, 100.0)
                    .with_id(format!("r-{i}"))
            })
            .collect()
    }

    #[test]
    fn step_past_end_is_noop() {
        let mut replay = ReplayController::new(Duration::from_millis(1));
        replay.start(batch(2)).unwrap();
        assert_eq!(replay.state().phase, ReplayPhase::Loaded);
        assert!(replay.step().unwrap().is_some());
        assert_eq!(replay.state().phase, ReplayPhase::Stepping);
        assert!(replay.step().unwrap().is_some());
        assert!(replay.step().unwrap().is_none());
        assert_eq!(replay.state().current_index, 2);
        assert_eq!(replay.overlay().len(), 2);
    }

    #[test]
    fn reset_clears_overlay_and_cursor() {
        let mut replay = ReplayController::new(Duration::from_millis(1));
        replay.start(batch(3)).unwrap();
        replay.step().unwrap();
        replay.reset();
        let state = replay.state();
        assert_eq!(state.phase, ReplayPhase::Idle);
        assert_eq!((state.pending_events, state.current_index, state.overlay_events), (0, 0, 0));
    }

    #[test]
    fn playing_runs_to_exhaustion_then_stops() {
        let mut replay = ReplayController::new(Duration::from_millis(1));
        replay.start(batch(3)).unwrap();
        assert!(replay.play());
        let mut guard = 0;
        while replay.is_playing() && guard < 1000 {
            replay.wait_and_pump(Duration::from_secs(1)).unwrap();
            guard += 1;
        }
        assert!(!replay.is_playing());
        assert_eq!(replay.overlay().len(), 3);
        assert!(!replay.play());
    }

    #[test]
    fn pause_keeps_cursor() {
        let mut replay = ReplayController::new(Duration::from_secs(3600));
        replay.start(batch(3)).unwrap();
        replay.step().unwrap();
        assert!(replay.play());
        replay.pause();
        assert!(!replay.is_playing());
        assert_eq!(replay.state().current_index, 1);
    }

    #[test]
    fn batch_with_repeated_ids_is_rejected() {
        let mut replay = ReplayController::new(Duration::from_millis(1));
        let mut events = batch(2);
        events[1].id = events[0].id.clone();
        assert!(replay.start(events).is_err());
        assert_eq!(replay.state().phase, ReplayPhase::Idle);
    }
}
