use crate::events::DomainEvent;
use anyhow::{Context, Result};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Append one line per event so the log can be tailed outside the process.
pub fn mirror_event(path: &Path, ev: &DomainEvent) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open event log {}", path.display()))?;
    let line = json!({
        "seq": ev.seq,
        "id": ev.id,
        "ts": ev.ts,
        "store": ev.store_id,
        "event": ev.kind(),
        "payload": ev.payload,
    });
    writeln!(f, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::log::EventLog;
    use crate::events::{LaborAction, NewEvent};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn writes_one_line_per_event() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("logs/events.ndjson");
        let ts = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut log = EventLog::new();
        log.append(NewEvent::labor("s1", ts, "staff-1", LaborAction::CheckIn))
            .unwrap();
        log.append(NewEvent::sale("s1", ts, "ramen", 1, 980.0)).unwrap();
        for ev in log.events() {
            mirror_event(&path, ev).unwrap();
        }
        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "labor");
        assert_eq!(first["payload"]["action"], "check-in");
    }
}
