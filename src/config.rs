use crate::roles::Role;
use crate::time::BandSchedule;
use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const CONFIG_RELATIVE_PATH: &str = ".opscockpit/config.toml";
const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CockpitConfig {
    pub version: u32,
    pub stores: Vec<StoreProfile>,
    pub current_store: String,
    pub staff: Vec<StaffProfile>,
    pub default_hourly_wage: f64,
    pub bands: BandSchedule,
    pub thresholds: Thresholds,
    pub incentive: IncentiveConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreProfile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffProfile {
    pub id: String,
    pub name: String,
    pub hourly_wage: f64,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub demand_warning_rate: f64,
    pub demand_critical_rate: f64,
    pub labor_cost_warning_rate: f64,
    pub labor_cost_critical_rate: f64,
    pub prep_warning_rate: f64,
    pub prep_critical_rate: f64,
    pub break_required_after_hours: f64,
    pub delivery_critical_delay_minutes: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            demand_warning_rate: 80.0,
            demand_critical_rate: 50.0,
            labor_cost_warning_rate: 35.0,
            labor_cost_critical_rate: 45.0,
            prep_warning_rate: 60.0,
            prep_critical_rate: 30.0,
            break_required_after_hours: 4.0,
            delivery_critical_delay_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncentiveConfig {
    /// Fixed daily target. When unset the day's `all` forecast is the target.
    pub daily_target_sales: Option<f64>,
    pub pool_share: f64,
    pub points_per_hour: f64,
}

impl Default for IncentiveConfig {
    fn default() -> Self {
        Self {
            daily_target_sales: None,
            pool_share: 0.1,
            points_per_hour: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayConfig {
    pub interval_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl Default for CockpitConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            stores: vec![StoreProfile {
                id: "store-1".to_string(),
                name: "Main Street".to_string(),
            }],
            current_store: "store-1".to_string(),
            staff: vec![
                staff("staff-1", "Aoi", 1400.0, Role::Manager),
                staff("staff-2", "Ren", 1200.0, Role::Staff),
                staff("staff-3", "Mio", 1150.0, Role::Staff),
            ],
            default_hourly_wage: 1100.0,
            bands: BandSchedule::default(),
            thresholds: Thresholds::default(),
            incentive: IncentiveConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

fn staff(id: &str, name: &str, hourly_wage: f64, role: Role) -> StaffProfile {
    StaffProfile {
        id: id.to_string(),
        name: name.to_string(),
        hourly_wage,
        role,
    }
}

impl CockpitConfig {
    pub fn staff_profile(&self, staff_id: &str) -> Option<&StaffProfile> {
        self.staff.iter().find(|s| s.id == staff_id)
    }

    pub fn wage_for(&self, staff_id: &str) -> f64 {
        self.staff_profile(staff_id)
            .map(|s| s.hourly_wage)
            .unwrap_or(self.default_hourly_wage)
    }

    pub fn staff_name(&self, staff_id: &str) -> String {
        self.staff_profile(staff_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| staff_id.to_string())
    }

    pub fn store(&self, store_id: &str) -> Option<&StoreProfile> {
        self.stores.iter().find(|s| s.id == store_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    version: Option<u32>,
    current_store: Option<String>,
    stores: Option<Vec<RawStore>>,
    staff: Option<Vec<RawStaff>>,
    default_hourly_wage: Option<f64>,
    time_bands: Option<RawTimeBands>,
    thresholds: Option<RawThresholds>,
    incentive: Option<RawIncentive>,
    replay: Option<RawReplay>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStore {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStaff {
    id: Option<String>,
    name: Option<String>,
    hourly_wage: Option<f64>,
    role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTimeBands {
    open: Option<String>,
    lunch_start: Option<String>,
    idle_start: Option<String>,
    dinner_start: Option<String>,
    close: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawThresholds {
    demand_warning_rate: Option<f64>,
    demand_critical_rate: Option<f64>,
    labor_cost_warning_rate: Option<f64>,
    labor_cost_critical_rate: Option<f64>,
    prep_warning_rate: Option<f64>,
    prep_critical_rate: Option<f64>,
    break_required_after_hours: Option<f64>,
    delivery_critical_delay_minutes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawIncentive {
    daily_target_sales: Option<f64>,
    pool_share: Option<f64>,
    points_per_hour: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawReplay {
    interval_ms: Option<u64>,
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_RELATIVE_PATH)
}

pub fn load_config(root: &Path) -> Result<Option<CockpitConfig>> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(None);
    }

    let raw =
        std::fs::read_to_string(&path).with_context(|| format!("read config {}", path.display()))?;
    let parsed: RawConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(validate_config(parsed, &path)?))
}

pub fn load_config_or_default(root: &Path) -> Result<CockpitConfig> {
    Ok(load_config(root)?.unwrap_or_default())
}

fn validate_config(raw: RawConfig, path: &Path) -> Result<CockpitConfig> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != CONFIG_VERSION {
        bail!(
            "{} has unsupported version {version}; expected version = {CONFIG_VERSION}",
            path.display()
        );
    }
    let defaults = CockpitConfig::default();

    let stores = match raw.stores {
        Some(stores) => {
            let mut out = Vec::new();
            for (idx, store) in stores.into_iter().enumerate() {
                let id = sanitize_optional(store.id).ok_or_else(|| {
                    anyhow::anyhow!("{} missing `id` for `[[stores]]` at index {idx}", path.display())
                })?;
                let name = sanitize_optional(store.name).unwrap_or_else(|| id.clone());
                out.push(StoreProfile { id, name });
            }
            if out.is_empty() {
                bail!("{} has empty `[[stores]]`", path.display());
            }
            ensure_unique(out.iter().map(|s| s.id.as_str()), "stores", path)?;
            out
        }
        None => defaults.stores.clone(),
    };

    let current_store = sanitize_optional(raw.current_store).unwrap_or_else(|| stores[0].id.clone());
    if !stores.iter().any(|s| s.id == current_store) {
        bail!(
            "{} `current_store = \"{current_store}\"` is not listed in `[[stores]]`",
            path.display()
        );
    }

    let default_hourly_wage = raw
        .default_hourly_wage
        .unwrap_or(defaults.default_hourly_wage);
    if !(default_hourly_wage.is_finite() && default_hourly_wage > 0.0) {
        bail!("{} `default_hourly_wage` must be positive", path.display());
    }

    let staff = match raw.staff {
        Some(staff) => {
            let mut out = Vec::new();
            for (idx, member) in staff.into_iter().enumerate() {
                out.push(validate_staff(member, default_hourly_wage, path, idx)?);
            }
            ensure_unique(out.iter().map(|s| s.id.as_str()), "staff", path)?;
            out
        }
        None => defaults.staff.clone(),
    };

    let bands = raw
        .time_bands
        .map(|bands| validate_bands(bands, path))
        .transpose()?
        .unwrap_or_default();

    let thresholds = raw
        .thresholds
        .map(|t| validate_thresholds(t, path))
        .transpose()?
        .unwrap_or_default();

    let incentive = raw
        .incentive
        .map(|i| {
            let pool_share = i.pool_share.unwrap_or(0.1);
            if !(0.0..=1.0).contains(&pool_share) {
                bail!("{} `[incentive].pool_share` must be within [0, 1]", path.display());
            }
            let points_per_hour = i.points_per_hour.unwrap_or(10.0);
            if !(points_per_hour.is_finite() && points_per_hour >= 0.0) {
                bail!("{} `[incentive].points_per_hour` must be non-negative", path.display());
            }
            if let Some(target) = i.daily_target_sales
                && !(target.is_finite() && target >= 0.0)
            {
                bail!("{} `[incentive].daily_target_sales` must be non-negative", path.display());
            }
            Ok(IncentiveConfig {
                daily_target_sales: i.daily_target_sales,
                pool_share,
                points_per_hour,
            })
        })
        .transpose()?
        .unwrap_or_default();

    let replay = raw
        .replay
        .map(|r| {
            let interval_ms = r.interval_ms.unwrap_or(1000);
            if interval_ms == 0 {
                bail!("{} `[replay].interval_ms` must be positive", path.display());
            }
            Ok(ReplayConfig { interval_ms })
        })
        .transpose()?
        .unwrap_or_default();

    Ok(CockpitConfig {
        version,
        stores,
        current_store,
        staff,
        default_hourly_wage,
        bands,
        thresholds,
        incentive,
        replay,
    })
}

fn validate_staff(
    raw: RawStaff,
    default_hourly_wage: f64,
    path: &Path,
    idx: usize,
) -> Result<StaffProfile> {
    let id = sanitize_optional(raw.id).ok_or_else(|| {
        anyhow::anyhow!("{} missing `id` for `[[staff]]` at index {idx}", path.display())
    })?;
    let hourly_wage = raw.hourly_wage.unwrap_or(default_hourly_wage);
    if !(hourly_wage.is_finite() && hourly_wage > 0.0) {
        bail!(
            "{} has non-positive `hourly_wage` for `[[staff]]` at index {idx}",
            path.display()
        );
    }
    let role = match sanitize_optional(raw.role) {
        None => Role::Staff,
        Some(role) => role.parse::<Role>().map_err(|e| {
            anyhow::anyhow!("{} `[[staff]]` at index {idx}: {e}", path.display())
        })?,
    };
    Ok(StaffProfile {
        name: sanitize_optional(raw.name).unwrap_or_else(|| id.clone()),
        id,
        hourly_wage,
        role,
    })
}

fn validate_bands(raw: RawTimeBands, path: &Path) -> Result<BandSchedule> {
    let d = BandSchedule::default();
    let parse = |value: Option<String>, key: &str, fallback: NaiveTime| -> Result<NaiveTime> {
        match sanitize_optional(value) {
            None => Ok(fallback),
            Some(v) => NaiveTime::parse_from_str(&v, "%H:%M").with_context(|| {
                format!("{} invalid `[time_bands].{key}` (expected HH:MM)", path.display())
            }),
        }
    };
    let bands = BandSchedule {
        open: parse(raw.open, "open", d.open)?,
        lunch_start: parse(raw.lunch_start, "lunch_start", d.lunch_start)?,
        idle_start: parse(raw.idle_start, "idle_start", d.idle_start)?,
        dinner_start: parse(raw.dinner_start, "dinner_start", d.dinner_start)?,
        close: parse(raw.close, "close", d.close)?,
    };
    let ordered = bands.open <= bands.lunch_start
        && bands.lunch_start < bands.idle_start
        && bands.idle_start < bands.dinner_start
        && bands.dinner_start < bands.close;
    if !ordered {
        bail!(
            "{} `[time_bands]` must satisfy open <= lunch_start < idle_start < dinner_start < close",
            path.display()
        );
    }
    Ok(bands)
}

fn validate_thresholds(raw: RawThresholds, path: &Path) -> Result<Thresholds> {
    let d = Thresholds::default();
    let t = Thresholds {
        demand_warning_rate: raw.demand_warning_rate.unwrap_or(d.demand_warning_rate),
        demand_critical_rate: raw.demand_critical_rate.unwrap_or(d.demand_critical_rate),
        labor_cost_warning_rate: raw
            .labor_cost_warning_rate
            .unwrap_or(d.labor_cost_warning_rate),
        labor_cost_critical_rate: raw
            .labor_cost_critical_rate
            .unwrap_or(d.labor_cost_critical_rate),
        prep_warning_rate: raw.prep_warning_rate.unwrap_or(d.prep_warning_rate),
        prep_critical_rate: raw.prep_critical_rate.unwrap_or(d.prep_critical_rate),
        break_required_after_hours: raw
            .break_required_after_hours
            .unwrap_or(d.break_required_after_hours),
        delivery_critical_delay_minutes: raw
            .delivery_critical_delay_minutes
            .unwrap_or(d.delivery_critical_delay_minutes),
    };
    if t.demand_critical_rate > t.demand_warning_rate {
        bail!(
            "{} `[thresholds].demand_critical_rate` must not exceed `demand_warning_rate`",
            path.display()
        );
    }
    if t.labor_cost_critical_rate < t.labor_cost_warning_rate {
        bail!(
            "{} `[thresholds].labor_cost_critical_rate` must not be below `labor_cost_warning_rate`",
            path.display()
        );
    }
    if t.prep_critical_rate > t.prep_warning_rate {
        bail!(
            "{} `[thresholds].prep_critical_rate` must not exceed `prep_warning_rate`",
            path.display()
        );
    }
    Ok(t)
}

fn ensure_unique<'a>(ids: impl Iterator<Item = &'a str>, table: &str, path: &Path) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            bail!("{} has duplicate id `{id}` in `[[{table}]]`", path.display());
        }
    }
    Ok(())
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::hm;
    use tempfile::tempdir;

    fn write(root: &Path, body: &str) {
        let path = config_path(root);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempdir().unwrap();
        assert!(load_config(tmp.path()).unwrap().is_none());
        let cfg = load_config_or_default(tmp.path()).unwrap();
        assert_eq!(cfg, CockpitConfig::default());
    }

    #[test]
    fn parses_valid_minimal_config() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "version = 1");
        let cfg = load_config(tmp.path()).unwrap().unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.current_store, "store-1");
        assert_eq!(cfg.thresholds, Thresholds::default());
    }

    #[test]
    fn rejects_invalid_version() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "version = 7");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("unsupported version"));
    }

    #[test]
    fn parses_roster_and_bands() {
        let tmp = tempdir().unwrap();
        write(
            tmp.path(),
            r#"
version = 1
current_store = "ebisu"
default_hourly_wage = 1000

[[stores]]
id = "shibuya"
name = "Shibuya"

[[stores]]
id = " ebisu "

[[staff]]
id = "k1"
name = "Kaito"
hourly_wage = 1300
role = "owner"

[[staff]]
id = "k2"

[time_bands]
lunch_start = "11:30"
close = "23:00"

[incentive]
daily_target_sales = 250000
pool_share = 0.05
"#,
        );
        let cfg = load_config(tmp.path()).unwrap().unwrap();
        assert_eq!(cfg.current_store, "ebisu");
        assert_eq!(cfg.store("ebisu").unwrap().name, "ebisu");
        assert_eq!(cfg.wage_for("k1"), 1300.0);
        assert_eq!(cfg.wage_for("k2"), 1000.0);
        assert_eq!(cfg.wage_for("ghost"), 1000.0);
        assert_eq!(cfg.staff_profile("k1").unwrap().role, Role::Owner);
        assert_eq!(cfg.bands.lunch_start, hm(11, 30));
        assert_eq!(cfg.bands.close, hm(23, 0));
        assert_eq!(cfg.incentive.daily_target_sales, Some(250000.0));
        assert_eq!(cfg.incentive.pool_share, 0.05);
    }

    #[test]
    fn rejects_unknown_current_store() {
        let tmp = tempdir().unwrap();
        write(
            tmp.path(),
            r#"
version = 1
current_store = "nowhere"
"#,
        );
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("not listed"));
    }

    #[test]
    fn rejects_unordered_bands() {
        let tmp = tempdir().unwrap();
        write(
            tmp.path(),
            r#"
version = 1
[time_bands]
idle_start = "18:00"
dinner_start = "17:00"
"#,
        );
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("must satisfy"));
    }

    #[test]
    fn rejects_out_of_range_pool_share_and_bad_role() {
        let tmp = tempdir().unwrap();
        write(
            tmp.path(),
            r#"
version = 1
[incentive]
pool_share = 1.5
"#,
        );
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("pool_share"));

        write(
            tmp.path(),
            r#"
version = 1
[[staff]]
id = "x"
role = "chef"
"#,
        );
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("unknown role"));
    }

    #[test]
    fn rejects_duplicate_staff_ids() {
        let tmp = tempdir().unwrap();
        write(
            tmp.path(),
            r#"
version = 1
[[staff]]
id = "x"
[[staff]]
id = "x"
"#,
        );
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("duplicate id"));
    }
}
