use chrono::{NaiveDate, NaiveDateTime};
use opscockpit::config::CockpitConfig;
use opscockpit::events::DomainEvent;
use opscockpit::replay::ReplayPhase;
use opscockpit::state::{Cockpit, Command, Outcome};
use opscockpit::time::{ManualClock, TimeBand};
use std::time::Duration;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(14, 0, 0)
        .unwrap()
}

fn cockpit(interval_ms: u64) -> Cockpit {
    let mut config = CockpitConfig::default();
    config.replay.interval_ms = interval_ms;
    Cockpit::in_memory(config, Box::new(ManualClock::new(now())))
}

fn fingerprint(events: &[DomainEvent]) -> Vec<(u64, String, String)> {
    events
        .iter()
        .map(|ev| (ev.seq, ev.id.clone(), ev.kind().to_string()))
        .collect()
}

#[test]
fn stepping_and_playing_build_the_same_overlay() {
    let mut stepped = cockpit(1_000);
    stepped.dispatch(Command::StartReplay { batch: None }).unwrap();
    loop {
        let state = stepped.select_replay_state();
        if state.current_index == state.pending_events {
            break;
        }
        stepped.dispatch(Command::StepReplay).unwrap();
    }

    let mut played = cockpit(5);
    played.dispatch(Command::StartReplay { batch: None }).unwrap();
    played.dispatch(Command::PlayReplay).unwrap();
    for _ in 0..1_000 {
        if !played.select_replay_state().is_playing {
            break;
        }
        played
            .dispatch(Command::PumpReplay {
                wait: Some(Duration::from_millis(200)),
            })
            .unwrap();
    }

    let state = played.select_replay_state();
    assert!(!state.is_playing);
    assert_eq!(state.current_index, state.pending_events);
    assert_eq!(
        fingerprint(&stepped.events_view()),
        fingerprint(&played.events_view())
    );
    assert_eq!(
        stepped.select_cockpit_metrics(now().date(), TimeBand::Lunch).sales,
        played.select_cockpit_metrics(now().date(), TimeBand::Lunch).sales
    );
}

#[test]
fn pause_keeps_position_and_reset_discards_overlay() {
    let mut c = cockpit(1_000);
    c.dispatch(Command::StartReplay { batch: None }).unwrap();
    c.dispatch(Command::StepReplay).unwrap();
    c.dispatch(Command::StepReplay).unwrap();
    c.dispatch(Command::PlayReplay).unwrap();
    assert!(c.select_replay_state().is_playing);

    let paused = match c.dispatch(Command::PauseReplay).unwrap() {
        Outcome::Replay(state) => state,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(paused.phase, ReplayPhase::Stepping);
    assert_eq!(paused.current_index, 2);
    assert_eq!(c.events_view().len(), 2);

    c.dispatch(Command::ResetReplay).unwrap();
    assert_eq!(c.select_replay_state().phase, ReplayPhase::Idle);
    assert!(c.events_view().is_empty());
}

#[test]
fn overlay_follows_live_sequence_numbers() {
    let mut c = cockpit(1_000);
    c.dispatch(Command::RecordSale {
        menu_id: "ramen".to_string(),
        quantity: 1,
        total: 980.0,
    })
    .unwrap();
    c.dispatch(Command::StartReplay { batch: None }).unwrap();
    c.dispatch(Command::StepReplay).unwrap();
    let view = c.events_view();
    let seqs: Vec<u64> = view.iter().map(|ev| ev.seq).collect();
    assert_eq!(seqs.len(), 2);
    assert!(seqs[0] < seqs[1]);
    assert_eq!(c.live_log().len(), 1);
}
