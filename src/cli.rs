use crate::config::load_config_or_default;
use crate::events::log::decode_batch;
use crate::events::store::SnapshotStore;
use crate::events::{DeliveryStatus, LaborAction};
use crate::projection::YearMonth;
use crate::roles::{Capability, Role, Session};
use crate::state::{Cockpit, Command, Outcome, Persistence, PrepInput};
use crate::time::{Clock, ManualClock, SystemClock, TimeBand};
use crate::workflow::{Priority, ProposalDraft};
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "opscockpit", version)]
#[command(
    about = "Store operations cockpit for a single restaurant shift",
    long_about = "opscockpit records shift events (labor, sales, prep, deliveries, forecasts), folds them into live metrics, detects operational incidents, and walks proposals through approval into per-target todos."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  opscockpit seed
  opscockpit labor check-in staff-2
  opscockpit sale ramen --quantity 2 --total 1960
  opscockpit scan
  opscockpit propose --from-incident <INCIDENT_ID>
  opscockpit approve <PROPOSAL_ID>
  opscockpit view cockpit --band lunch
  opscockpit replay --steps 10
  opscockpit completion zsh > ~/.zsh/completions/_opscockpit")]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Path to state DB (default: $XDG_STATE_HOME/opscockpit/state.db)"
    )]
    state_db: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Directory holding .opscockpit/config.toml (default: current directory)"
    )]
    root: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Append every recorded event to this NDJSON file"
    )]
    log: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "manager",
        value_name = "ROLE",
        help = "Session role: staff, manager or owner"
    )]
    role: Role,
    #[arg(
        long,
        global = true,
        value_name = "DATETIME",
        value_parser = parse_instant,
        help = "Pretend the current time is DATETIME (YYYY-MM-DDTHH:MM)"
    )]
    at: Option<NaiveDateTime>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Record a labor action for a staff member")]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  opscockpit labor check-in staff-2
  opscockpit labor break-start staff-2")]
    Labor {
        #[arg(
            value_name = "ACTION",
            value_parser = ["check-in", "check-out", "break-start", "break-end"],
            help = "Labor action"
        )]
        action: String,
        #[arg(value_name = "STAFF_ID", help = "Staff member from the roster")]
        staff: String,
    },
    #[command(about = "Record a sale")]
    #[command(arg_required_else_help = true)]
    Sale {
        #[arg(value_name = "MENU_ID", help = "Menu item sold")]
        menu: String,
        #[arg(long, default_value_t = 1, value_name = "N", help = "Units sold")]
        quantity: u32,
        #[arg(long, value_name = "AMOUNT", help = "Sale total")]
        total: f64,
    },
    #[command(about = "Record a delivery status update")]
    #[command(arg_required_else_help = true)]
    Delivery {
        #[arg(value_name = "ITEM", help = "Delivered item name")]
        item: String,
        #[arg(
            long,
            default_value = "scheduled",
            value_name = "STATUS",
            value_parser = ["scheduled", "in-transit", "delivered", "cancelled"],
            help = "Delivery status"
        )]
        status: String,
        #[arg(long, default_value_t = 0, value_name = "MIN", help = "Delay in minutes")]
        delay: u32,
    },
    #[command(about = "Set the forecast for one date and time band")]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Example:
  opscockpit forecast 2026-03-02 lunch --customers 50 --average-spend 1200")]
    Forecast {
        #[arg(value_name = "DATE", help = "Business date (YYYY-MM-DD)")]
        date: NaiveDate,
        #[arg(value_name = "BAND", help = "lunch, idle, dinner or all")]
        band: TimeBand,
        #[arg(long, value_name = "N", help = "Expected customers")]
        customers: u32,
        #[arg(long, value_name = "AMOUNT", help = "Expected spend per customer")]
        average_spend: f64,
    },
    #[command(about = "Start or complete a prep batch")]
    #[command(arg_required_else_help = true)]
    Prep {
        #[arg(
            value_name = "ACTION",
            value_parser = ["start", "complete"],
            help = "Prep action"
        )]
        action: String,
        #[arg(value_name = "PREP_ITEM_ID", help = "Prep item")]
        item: String,
        #[arg(long, default_value_t = 1, value_name = "N", help = "Batch quantity")]
        quantity: u32,
        #[arg(long, value_name = "BATCH_ID", help = "Batch identifier")]
        batch: Option<String>,
        #[arg(
            long,
            value_name = "PROPOSAL_ID",
            help = "Advance this proposal's todo for the same prep item"
        )]
        proposal: Option<String>,
    },
    #[command(
        about = "Queue a proposal",
        long_about = "Queue a proposal for review. Either author one from flags or derive one from an open incident."
    )]
    #[command(after_long_help = "Examples:
  opscockpit propose --title \"Prep more gyoza\" --type prep --prep-item gyoza --priority high
  opscockpit propose --from-incident inc-0123456789ab")]
    Propose {
        #[arg(
            long,
            value_name = "INCIDENT_ID",
            conflicts_with = "title",
            help = "Derive the proposal from an incident"
        )]
        from_incident: Option<String>,
        #[arg(long, value_name = "TEXT", required_unless_present = "from_incident")]
        title: Option<String>,
        #[arg(long = "type", default_value = "ops", value_name = "TYPE")]
        proposal_type: String,
        #[arg(long, value_name = "TEXT")]
        description: Option<String>,
        #[arg(long, value_name = "TEXT")]
        reason: Option<String>,
        #[arg(long, default_value = "medium", value_name = "PRIORITY")]
        priority: Priority,
        #[arg(long, value_name = "BAND")]
        band: Option<TimeBand>,
        #[arg(long = "role-target", value_name = "ROLE", value_delimiter = ',')]
        roles: Vec<Role>,
        #[arg(long = "prep-item", value_name = "ID", value_delimiter = ',')]
        prep_items: Vec<String>,
        #[arg(long = "menu", value_name = "ID", value_delimiter = ',')]
        menus: Vec<String>,
        #[arg(long, value_name = "N")]
        quantity: Option<u32>,
        #[arg(long, value_name = "DATETIME", value_parser = parse_instant)]
        deadline: Option<NaiveDateTime>,
        #[arg(long = "expect", value_name = "TEXT")]
        expected_effects: Vec<String>,
    },
    #[command(about = "Approve a pending proposal and fan it out into todos")]
    #[command(arg_required_else_help = true)]
    Approve {
        #[arg(value_name = "PROPOSAL_ID")]
        proposal: String,
    },
    #[command(about = "Reject a pending proposal")]
    #[command(arg_required_else_help = true)]
    Reject {
        #[arg(value_name = "PROPOSAL_ID")]
        proposal: String,
    },
    #[command(about = "Start or complete the todos of an approved proposal")]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  opscockpit todo start <PROPOSAL_ID> --target prep:gyoza --actor staff-2
  opscockpit todo complete <PROPOSAL_ID> --actor staff-2")]
    Todo {
        #[arg(
            value_name = "ACTION",
            value_parser = ["start", "complete"],
            help = "Todo action"
        )]
        action: String,
        #[arg(value_name = "PROPOSAL_ID")]
        proposal: String,
        #[arg(long, value_name = "TARGET_ID", help = "Single todo target (all todos when omitted)")]
        target: Option<String>,
        #[arg(long, value_name = "STAFF_ID", help = "Staff member doing the work")]
        actor: Option<String>,
    },
    #[command(about = "Run incident detection for a business date")]
    Scan {
        #[arg(long, value_name = "DATE", help = "Business date (default: today)")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Mark an open incident as under investigation")]
    #[command(arg_required_else_help = true)]
    Investigate {
        #[arg(value_name = "INCIDENT_ID")]
        incident: String,
    },
    #[command(about = "Switch the current store")]
    #[command(arg_required_else_help = true)]
    Store {
        #[arg(value_name = "STORE_ID")]
        store: String,
    },
    #[command(about = "Append a JSON array of raw events")]
    #[command(arg_required_else_help = true)]
    Import {
        #[arg(value_name = "FILE", help = "JSON file holding an array of events")]
        file: PathBuf,
    },
    #[command(
        about = "Print a derived view as JSON",
        long_about = "Print a derived view as JSON. Views are folded from the event log at the current time."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  opscockpit view cockpit --band lunch
  opscockpit view todos --role staff
  opscockpit view calendar --month 2026-03")]
    View {
        #[arg(
            value_name = "VIEW",
            value_parser = [
                "store", "cockpit", "staff", "labor", "sales", "monthly", "calendar",
                "forecast", "todos", "completed", "todo-stats", "exceptions",
                "incentives", "proposals",
            ],
            help = "View to print"
        )]
        view: String,
        #[arg(long, value_name = "DATE", help = "Business date (default: today)")]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "all", value_name = "BAND")]
        band: TimeBand,
        #[arg(long, value_name = "YYYY-MM", help = "Month for monthly views (default: this month)")]
        month: Option<YearMonth>,
        #[arg(long = "for-role", value_name = "ROLE", help = "Filter todos by distributed role")]
        for_role: Option<Role>,
        #[arg(long, value_name = "ID", help = "Show one proposal, pending or approved")]
        proposal: Option<String>,
    },
    #[command(
        about = "Replay a staged batch over the live log",
        long_about = "Replay a staged batch over the live log and print the cockpit view at the end. The overlay is never written to the state DB."
    )]
    #[command(after_long_help = "Examples:
  opscockpit replay --steps 5
  opscockpit replay --play
  opscockpit replay --batch rush.json --play")]
    Replay {
        #[arg(long, value_name = "FILE", help = "JSON batch (default: built-in lunch rush)")]
        batch: Option<PathBuf>,
        #[arg(long, value_name = "N", conflicts_with = "play", help = "Apply N events by hand")]
        steps: Option<usize>,
        #[arg(long, help = "Play the batch on the ticker until it is exhausted")]
        play: bool,
        #[arg(long, default_value = "all", value_name = "BAND")]
        band: TimeBand,
    },
    #[command(about = "Record a demo day for the current store up to now")]
    Seed,
    #[command(about = "Delete every recorded event, proposal and incident")]
    Reset {
        #[arg(long, help = "Confirm the reset")]
        yes: bool,
    },
    #[command(
        about = "Generate shell completion script",
        long_about = "Generate shell completion script for your shell. Redirect output to your shell completion directory."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  opscockpit completion bash > ~/.local/share/bash-completion/completions/opscockpit
  opscockpit completion zsh > ~/.zsh/completions/_opscockpit
  opscockpit completion fish > ~/.config/fish/completions/opscockpit.fish")]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Target shell")]
        shell: Shell,
    },
    #[command(
        about = "Generate a man page",
        long_about = "Generate a roff man page for opscockpit."
    )]
    Man {
        #[arg(
            long,
            value_name = "PATH",
            help = "Write man page to file (stdout when omitted)"
        )]
        output: Option<PathBuf>,
    },
}

impl Commands {
    fn capability(&self) -> Option<Capability> {
        let cap = match self {
            Commands::Labor { .. } => Capability::RecordLabor,
            Commands::Prep { .. } => Capability::RecordPrep,
            Commands::Todo { .. } => Capability::WorkTodos,
            Commands::Sale { .. } => Capability::RecordSales,
            Commands::Delivery { .. } => Capability::RecordPrep,
            Commands::Forecast { .. } => Capability::EditForecast,
            Commands::Propose { .. } | Commands::Approve { .. } | Commands::Reject { .. } => {
                Capability::ReviewProposals
            }
            Commands::Scan { .. } | Commands::Investigate { .. } => Capability::ViewIncidents,
            Commands::Replay { .. } => Capability::RunReplay,
            Commands::Seed | Commands::Reset { .. } | Commands::Import { .. } => {
                Capability::ManageData
            }
            Commands::View { view, .. } => match view.as_str() {
                "labor" => Capability::ViewLaborCost,
                "exceptions" => Capability::ViewIncidents,
                "incentives" => Capability::ViewIncentives,
                "proposals" => Capability::ReviewProposals,
                _ => return None,
            },
            Commands::Store { .. } | Commands::Completion { .. } | Commands::Man { .. } => {
                return None;
            }
        };
        Some(cap)
    }
}

fn parse_instant(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    Err(format!("invalid datetime `{raw}`; expected YYYY-MM-DDTHH:MM"))
}

fn default_state_db_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("opscockpit").join("state.db");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("opscockpit")
            .join("state.db");
    }
    PathBuf::from(".opscockpit/state.db")
}

fn open_persistence(path: &Path) -> Persistence {
    match SnapshotStore::open(path) {
        Ok(store) => Persistence::with_store(store),
        Err(err) => {
            let mut persistence = Persistence::in_memory();
            persistence.degrade("open", &format!("{err:#}"));
            persistence
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn labor_action(raw: &str) -> LaborAction {
    match raw {
        "check-in" => LaborAction::CheckIn,
        "check-out" => LaborAction::CheckOut,
        "break-start" => LaborAction::BreakStart,
        _ => LaborAction::BreakEnd,
    }
}

fn delivery_status(raw: &str) -> DeliveryStatus {
    match raw {
        "in-transit" => DeliveryStatus::InTransit,
        "delivered" => DeliveryStatus::Delivered,
        "cancelled" => DeliveryStatus::Cancelled,
        _ => DeliveryStatus::Scheduled,
    }
}

fn read_batch(path: &Path) -> Result<Vec<crate::events::NewEvent>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(decode_batch(&raw)?)
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(());
        }
        Commands::Man { output } => {
            let man = clap_mangen::Man::new(Cli::command());
            match output {
                Some(path) => {
                    let mut bytes = Vec::new();
                    man.render(&mut bytes)?;
                    fs::write(path, bytes)?;
                }
                None => {
                    man.render(&mut io::stdout())?;
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let session = Session::new(cli.role);
    if let Some(cap) = cli.command.capability()
        && !session.can(cap)
    {
        bail!("role `{}` cannot use this command", session.role);
    }

    let root = cli.root.unwrap_or_else(|| PathBuf::from("."));
    let config = load_config_or_default(&root)?;
    let clock: Box<dyn Clock> = match cli.at {
        Some(at) => Box::new(ManualClock::new(at)),
        None => Box::new(SystemClock),
    };
    let state_db = cli.state_db.unwrap_or_else(default_state_db_path);
    let mut cockpit = Cockpit::open(config, clock, open_persistence(&state_db));
    if let Some(log) = cli.log {
        cockpit = cockpit.with_mirror(log);
    }

    let today = cockpit.today();
    let outcome = match cli.command {
        Commands::Labor { action, staff } => {
            let command = match labor_action(&action) {
                LaborAction::CheckIn => Command::CheckIn { staff_id: staff },
                LaborAction::CheckOut => Command::CheckOut { staff_id: staff },
                LaborAction::BreakStart => Command::StartBreak { staff_id: staff },
                LaborAction::BreakEnd => Command::EndBreak { staff_id: staff },
            };
            cockpit.dispatch(command)?
        }
        Commands::Sale {
            menu,
            quantity,
            total,
        } => cockpit.dispatch(Command::RecordSale {
            menu_id: menu,
            quantity,
            total,
        })?,
        Commands::Delivery {
            item,
            status,
            delay,
        } => cockpit.dispatch(Command::RecordDelivery {
            item_name: item,
            status: delivery_status(&status),
            delay_minutes: delay,
        })?,
        Commands::Forecast {
            date,
            band,
            customers,
            average_spend,
        } => cockpit.dispatch(Command::UpsertForecast {
            date,
            time_band: band,
            customers,
            average_spend,
        })?,
        Commands::Prep {
            action,
            item,
            quantity,
            batch,
            proposal,
        } => {
            let mut input = PrepInput::new(item, quantity);
            input.batch_id = batch;
            input.proposal_id = proposal;
            let command = if action == "start" {
                Command::StartPrep(input)
            } else {
                Command::CompletePrep(input)
            };
            cockpit.dispatch(command)?
        }
        Commands::Propose {
            from_incident,
            title,
            proposal_type,
            description,
            reason,
            priority,
            band,
            roles,
            prep_items,
            menus,
            quantity,
            deadline,
            expected_effects,
        } => {
            if let Some(incident_id) = from_incident {
                cockpit.dispatch(Command::ProposeFromIncident { incident_id })?
            } else {
                let mut draft = ProposalDraft::new(title.unwrap_or_default(), proposal_type)
                    .priority(priority)
                    .roles(roles)
                    .prep_items(prep_items)
                    .menus(menus);
                if let Some(description) = description {
                    draft = draft.description(description);
                }
                if let Some(reason) = reason {
                    draft = draft.reason(reason);
                }
                if let Some(band) = band {
                    draft = draft.time_band(band);
                }
                if let Some(quantity) = quantity {
                    draft = draft.quantity(quantity);
                }
                if let Some(deadline) = deadline {
                    draft = draft.deadline(deadline);
                }
                for effect in expected_effects {
                    draft = draft.expected_effect(effect);
                }
                cockpit.dispatch(Command::CreateProposal(draft))?
            }
        }
        Commands::Approve { proposal } => cockpit.dispatch(Command::ApproveProposal {
            proposal_id: proposal,
        })?,
        Commands::Reject { proposal } => cockpit.dispatch(Command::RejectProposal {
            proposal_id: proposal,
        })?,
        Commands::Todo {
            action,
            proposal,
            target,
            actor,
        } => {
            let command = if action == "start" {
                Command::StartDecision {
                    proposal_id: proposal,
                    target_id: target,
                    actor_id: actor,
                }
            } else {
                Command::CompleteDecision {
                    proposal_id: proposal,
                    target_id: target,
                    actor_id: actor,
                }
            };
            cockpit.dispatch(command)?
        }
        Commands::Scan { date } => cockpit.dispatch(Command::ScanIncidents { date })?,
        Commands::Investigate { incident } => cockpit.dispatch(Command::InvestigateIncident {
            incident_id: incident,
        })?,
        Commands::Store { store } => cockpit.dispatch(Command::SwitchStore { store_id: store })?,
        Commands::Import { file } => cockpit.dispatch(Command::AppendEvents(read_batch(&file)?))?,
        Commands::Seed => cockpit.dispatch(Command::SeedDemoData)?,
        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to delete all data without --yes");
            }
            cockpit.dispatch(Command::ResetAllData)?
        }
        Commands::Replay {
            batch,
            steps,
            play,
            band,
        } => {
            let batch = batch.as_deref().map(read_batch).transpose()?;
            cockpit.dispatch(Command::StartReplay { batch })?;
            if play {
                cockpit.dispatch(Command::PlayReplay)?;
                let wait = std::time::Duration::from_millis(cockpit.config().replay.interval_ms * 2);
                while cockpit.select_replay_state().is_playing {
                    cockpit.dispatch(Command::PumpReplay { wait: Some(wait) })?;
                }
            } else {
                let state = cockpit.select_replay_state();
                let remaining = state.pending_events - state.current_index;
                for _ in 0..steps.unwrap_or(remaining).min(remaining) {
                    cockpit.dispatch(Command::StepReplay)?;
                }
            }
            #[derive(Serialize)]
            struct ReplayReport {
                replay: crate::replay::ReplayState,
                cockpit: crate::projection::CockpitMetrics,
            }
            return print_json(&ReplayReport {
                replay: cockpit.select_replay_state(),
                cockpit: cockpit.select_cockpit_metrics(today, band),
            });
        }
        Commands::View {
            view,
            date,
            band,
            month,
            for_role,
            proposal,
        } => {
            let date = date.unwrap_or(today);
            let month = month.unwrap_or_else(|| YearMonth::of(date));
            return match view.as_str() {
                "store" => print_json(&cockpit.select_current_store()),
                "cockpit" => print_json(&cockpit.select_cockpit_metrics(date, band)),
                "staff" => print_json(&cockpit.select_staff_states(date)),
                "labor" => print_json(&cockpit.select_labor_metrics(date)),
                "sales" => print_json(&cockpit.select_sales_metrics(date, band)),
                "monthly" => print_json(&cockpit.select_monthly_sales_metrics(month, band)),
                "calendar" => print_json(&cockpit.select_calendar_data(month)),
                "forecast" => print_json(&cockpit.select_monthly_forecast_summary(month, band)),
                "todos" => print_json(&cockpit.select_active_todos(for_role)),
                "completed" => print_json(&cockpit.select_completed_todos(for_role)),
                "todo-stats" => print_json(&cockpit.select_todo_stats()),
                "exceptions" => print_json(&cockpit.select_exceptions()),
                "incentives" => print_json(&cockpit.select_incentive_distribution(date)),
                "proposals" => match proposal.as_deref() {
                    Some(id) => match cockpit.select_proposal(id) {
                        Some(found) => print_json(&found),
                        None => bail!("proposal {id} not found in this store"),
                    },
                    None => print_json(&cockpit.select_pending_proposals()),
                },
                other => bail!("unknown view `{other}`"),
            };
        }
        Commands::Completion { .. } | Commands::Man { .. } => return Ok(()),
    };

    if cockpit.persistence().is_degraded() {
        eprintln!("warning: state DB unavailable; this change was not saved");
    }
    print_json::<Outcome>(&outcome)
}
