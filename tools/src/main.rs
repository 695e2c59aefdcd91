//! dash-runner: headless harness for the StatDesk engine.
//!
//! Stands in for the remote statistics service with a local SQLite file,
//! optionally seeded with deterministic fixture data, and drives a
//! dashboard session either for a fixed number of ticks (summary mode)
//! or interactively over line-JSON IPC on stdin/stdout.
//!
//! Usage:
//!   dash-runner --seed 7 --db dash.db --ticks 90
//!   dash-runner --db dash.db --ipc-mode

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use rusqlite::Connection;
use statdesk_core::client::{ApiError, FilterContext, MetricsApi};
use statdesk_core::config::DashConfig;
use statdesk_core::pivot::{PivotOptions, RowOrder};
use statdesk_core::record::{CellValue, MetricRecord};
use statdesk_core::selection::{Actor, Outcome};
use statdesk_core::session::DashSession;
use statdesk_core::types::RowId;
use std::env;
use std::io::{self, BufRead, Write};

// ── SQLite stand-in for the remote service ───────────────────────────────────

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metric_record (
    row_id       INTEGER PRIMARY KEY,
    description  TEXT NOT NULL,
    premium_type TEXT NOT NULL,
    category     TEXT NOT NULL,
    period_type  TEXT NOT NULL,
    period       TEXT NOT NULL,
    unit         TEXT NOT NULL,
    value        TEXT NOT NULL,
    entity_key   TEXT NOT NULL DEFAULT '',
    is_active    INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS dashboard_selection (
    description TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS row_selection (
    description TEXT NOT NULL,
    row_id      INTEGER NOT NULL,
    PRIMARY KEY (description, row_id)
);
";

struct SqliteApi {
    conn: Connection,
}

impl SqliteApi {
    fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

fn api_err(e: rusqlite::Error) -> ApiError {
    ApiError::Network(e.to_string())
}

fn parse_value(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return CellValue::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(n) => CellValue::Number(n),
        Err(_) => CellValue::Text(raw.to_string()),
    }
}

fn value_text(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => format!("{n}"),
        CellValue::Text(s) => s.clone(),
        CellValue::Missing => "-".to_string(),
    }
}

impl MetricsApi for SqliteApi {
    fn fetch_records(&self, ctx: &FilterContext) -> Result<Vec<MetricRecord>, ApiError> {
        let base = "SELECT row_id, description, premium_type, category, period_type, \
                    period, unit, value, entity_key, is_active FROM metric_record";
        let (sql, params) = if ctx.descriptions.is_empty() {
            (format!("{base} ORDER BY row_id"), Vec::new())
        } else {
            let placeholders = vec!["?"; ctx.descriptions.len()].join(", ");
            (
                format!("{base} WHERE description IN ({placeholders}) ORDER BY row_id"),
                ctx.descriptions.clone(),
            )
        };

        let mut stmt = self.conn.prepare(&sql).map_err(api_err)?;
        let records = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok(MetricRecord {
                    row_id: row.get(0)?,
                    description: row.get(1)?,
                    premium_type: row.get(2)?,
                    category: row.get(3)?,
                    period_type: row.get(4)?,
                    period: row.get(5)?,
                    unit: row.get(6)?,
                    value: parse_value(&row.get::<_, String>(7)?),
                    entity_key: row.get(8)?,
                    is_active: row.get::<_, i64>(9)? != 0,
                })
            })
            .map_err(api_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(api_err)?;

        Ok(match &ctx.entity_key {
            Some(entity) => records
                .into_iter()
                .filter(|r| r.entity_key == *entity)
                .collect(),
            None => records,
        })
    }

    fn fetch_selection_set(&self) -> Result<Vec<String>, ApiError> {
        let mut stmt = self
            .conn
            .prepare("SELECT description FROM dashboard_selection ORDER BY description")
            .map_err(api_err)?;
        let result = stmt
            .query_map([], |row| row.get(0))
            .map_err(api_err)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(api_err);
        result
    }

    fn write_selection_set(&self, descriptions: &[String]) -> Result<(), ApiError> {
        self.conn
            .execute("DELETE FROM dashboard_selection", [])
            .map_err(api_err)?;
        for description in descriptions {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO dashboard_selection (description) VALUES (?1)",
                    [description],
                )
                .map_err(api_err)?;
        }
        Ok(())
    }

    fn fetch_row_selection(&self, description: &str) -> Result<Vec<RowId>, ApiError> {
        let mut stmt = self
            .conn
            .prepare("SELECT row_id FROM row_selection WHERE description = ?1 ORDER BY row_id")
            .map_err(api_err)?;
        let result = stmt
            .query_map([description], |row| row.get(0))
            .map_err(api_err)?
            .collect::<rusqlite::Result<Vec<RowId>>>()
            .map_err(api_err);
        result
    }

    fn write_row_selection(&self, description: &str, row_ids: &[RowId]) -> Result<(), ApiError> {
        self.conn
            .execute("DELETE FROM row_selection WHERE description = ?1", [description])
            .map_err(api_err)?;
        for row_id in row_ids {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO row_selection (description, row_id) VALUES (?1, ?2)",
                    rusqlite::params![description, row_id],
                )
                .map_err(api_err)?;
        }
        Ok(())
    }
}

// ── Fixture generation ───────────────────────────────────────────────────────

/// Deterministic fixture data: same seed, same rows, byte for byte.
/// Nothing here calls a platform RNG.
fn seed_fixtures(conn: &Connection, seed: u64) -> Result<usize> {
    conn.execute("DELETE FROM metric_record", [])?;
    conn.execute("DELETE FROM dashboard_selection", [])?;
    conn.execute("DELETE FROM row_selection", [])?;

    let catalog: [(&str, &str, &[&str]); 4] = [
        (
            "Life",
            "Premiums",
            &["First Year Premium", "Renewal Premium", "Single Premium"],
        ),
        ("Life", "Claims", &["Death Claims Settled", "Maturity Claims Paid"]),
        (
            "Non-Life",
            "Premiums",
            &["Gross Direct Premium", "Net Earned Premium"],
        ),
        ("Non-Life", "Claims", &["Gross Claims Incurred"]),
    ];
    let period_sets: [(&str, &[&str]); 3] = [
        ("Annual", &["2020", "2021", "2022", "2023", "2024"]),
        ("Quarterly", &["2024-Q1", "2024-Q2", "2024-Q3", "2024-Q4"]),
        (
            "Monthly",
            &["2024-01", "2024-02", "2024-03", "2024-04", "2024-05", "2024-06"],
        ),
    ];
    let entities = ["India", "Japan", "Singapore"];

    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut row_id: i64 = 1;
    let mut inserted = 0usize;

    for (premium_type, category, descriptions) in catalog {
        for description in descriptions {
            for (period_type, periods) in period_sets {
                for period in periods {
                    for entity in entities {
                        let value = if rng.gen_bool(0.05) {
                            "-".to_string()
                        } else {
                            format!("{:.1}", rng.gen_range(10.0..5000.0))
                        };
                        let is_active = i64::from(!rng.gen_bool(0.03));
                        conn.execute(
                            "INSERT INTO metric_record
                             (row_id, description, premium_type, category, period_type,
                              period, unit, value, entity_key, is_active)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                            rusqlite::params![
                                row_id,
                                description,
                                premium_type,
                                category,
                                period_type,
                                period,
                                "INR Cr",
                                value,
                                entity,
                                is_active,
                            ],
                        )?;
                        row_id += 1;
                        inserted += 1;
                    }
                }
            }
        }
    }

    // A starter dashboard selection so a fresh run shows something.
    for description in ["First Year Premium", "Gross Direct Premium"] {
        conn.execute(
            "INSERT INTO dashboard_selection (description) VALUES (?1)",
            [description],
        )?;
    }

    Ok(inserted)
}

// ── IPC protocol ─────────────────────────────────────────────────────────────

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        count: u64,
    },
    EnterDashboard,
    SetFilter {
        dimension: String,
        value: String,
    },
    ToggleDescription {
        description: String,
    },
    SetRowSelection {
        description: String,
        row_id: RowId,
        selected: bool,
    },
    Pivot {
        #[serde(default)]
        alphabetical: bool,
        #[serde(default)]
        include_inactive: bool,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    tick: u64,
    session_id: String,
    updated_at: String,
    filters: statdesk_core::filter::FilterState,
    premium_type_options: Vec<String>,
    category_options: Vec<String>,
    description_options: Vec<String>,
    selected_descriptions: Vec<String>,
    record_count: usize,
    notices: Vec<statdesk_core::session::Notice>,
    events: Vec<statdesk_core::event::DashEvent>,
}

fn build_ui_state(session: &mut DashSession) -> UiState {
    UiState {
        tick: session.current_tick(),
        session_id: session.session_id().clone(),
        updated_at: chrono::Utc::now().to_rfc3339(),
        filters: session.filter_state().clone(),
        premium_type_options: session.premium_type_options(),
        category_options: session.category_options(),
        description_options: session.description_options(),
        selected_descriptions: session.selected_descriptions().iter().cloned().collect(),
        record_count: session.store().len(),
        notices: session.notices().to_vec(),
        events: session.take_events(),
    }
}

fn outcome_name(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Applied => "applied",
        Outcome::RejectedPrivilege => "rejected_privilege",
        Outcome::RejectedPrecondition => "rejected_precondition",
    }
}

fn run_ipc_loop(session: &mut DashSession) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => {
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(session))?)?;
            }
            IpcCommand::Tick { count } => {
                session.run_ticks(count);
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(session))?)?;
            }
            IpcCommand::EnterDashboard => {
                session.enter_dashboard();
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(session))?)?;
            }
            IpcCommand::SetFilter { dimension, value } => {
                let accepted = match dimension.as_str() {
                    "premium_type" => session.set_premium_type(&value),
                    "category" => session.set_category(&value),
                    "description" => session.set_description(&value),
                    _ => false,
                };
                let response = serde_json::json!({
                    "accepted": accepted,
                    "filters": session.filter_state(),
                });
                writeln!(stdout, "{response}")?;
            }
            IpcCommand::ToggleDescription { description } => {
                let response = match session.toggle_description(&description) {
                    Ok(outcome) => serde_json::json!({ "outcome": outcome_name(outcome) }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                writeln!(stdout, "{response}")?;
            }
            IpcCommand::SetRowSelection {
                description,
                row_id,
                selected,
            } => {
                let response = match session.set_row_selection(&description, row_id, selected) {
                    Ok(outcome) => serde_json::json!({ "outcome": outcome_name(outcome) }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                writeln!(stdout, "{response}")?;
            }
            IpcCommand::Pivot {
                alphabetical,
                include_inactive,
            } => {
                let options = PivotOptions {
                    row_order: if alphabetical {
                        RowOrder::Alphabetical
                    } else {
                        RowOrder::FirstSeen
                    },
                    include_inactive,
                };
                let json = serde_json::to_string(session.pivot(options))?;
                writeln!(stdout, "{json}")?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed_requested = args.iter().any(|a| a == "--seed");
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 90u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let viewer = args.iter().any(|a| a == "--viewer");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or("dash.db");

    if !ipc_mode {
        println!("StatDesk — dash-runner");
        println!("  seed:  {}", if seed_requested { seed.to_string() } else { "(keep db)".into() });
        println!("  ticks: {ticks}");
        println!("  db:    {db}");
        println!();
    }

    let api = SqliteApi::open(db)?;
    api.migrate()?;
    if seed_requested {
        let inserted = seed_fixtures(&api.conn, seed)?;
        log::info!("seeded {inserted} fixture records (seed {seed})");
    }

    let actor = if viewer { Actor::viewer() } else { Actor::admin() };
    let mut session = DashSession::new(DashConfig::default(), Box::new(api), actor);
    session.enter_dashboard();

    if ipc_mode {
        run_ipc_loop(&mut session)?;
    } else {
        session.run_ticks(ticks);
        print_summary(&mut session);
    }

    Ok(())
}

fn print_summary(session: &mut DashSession) {
    println!("=== SESSION SUMMARY ===");
    println!("  session_id: {}", session.session_id());
    println!("  final tick: {}", session.current_tick());
    println!("  records:    {}", session.store().len());
    println!(
        "  selected:   {}",
        session
            .selected_descriptions()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  notices:    {}", session.notices().len());

    println!();
    println!("=== PIVOT (first-seen row order) ===");
    let build = session.pivot(PivotOptions::default()).clone();
    if build.table.is_empty() {
        println!("  (no data)");
        return;
    }
    for (period_type, group) in &build.table {
        println!(
            "  {period_type}: {} rows × {} periods",
            group.descriptions.len(),
            group.periods.len()
        );
        for description in group.descriptions.iter().take(4) {
            let cells: Vec<String> = group
                .periods
                .iter()
                .map(|p| {
                    group
                        .cells
                        .get(description)
                        .and_then(|row| row.get(p))
                        .map(value_text)
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect();
            println!(
                "    {description} [{}] | {}",
                group.units.get(description).map(String::as_str).unwrap_or(""),
                cells.join(" | ")
            );
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
