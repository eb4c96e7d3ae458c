//! `distiller`: terminal front end for browsing jobs and driving the single
//! streaming session.
mod config;
mod persistence;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use distiller_core::{
    date_time_deserializer, JobCategory, JobId, JobListRequest, JobType, ParamValue, Params,
    SessionState, SessionsQuery, ROWS_PER_PAGE_OPTIONS,
};
use distiller_engine::{JobsService, MachineRegistry, ReqwestJobsClient};
use distiller_logging::distiller_info;
use log::LevelFilter;
use url::Url;

use crate::persistence::AppState;

#[derive(Parser, Debug)]
#[command(name = "distiller", version)]
#[command(about = "Browse distiller jobs and manage the streaming session.", long_about = None)]
struct Cli {
    /// RON config file.
    #[arg(long, default_value = config::CONFIG_FILENAME)]
    config: PathBuf,

    /// API base url; overrides the config file.
    #[arg(long)]
    url: Option<String>,

    /// Directory holding the saved list state.
    #[arg(long, default_value = ".")]
    state_dir: PathBuf,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List streaming sessions, grouped by submit date.
    Sessions(ListArgs),
    /// Show one job with its scans.
    Session { id: JobId },
    /// Start a streaming session.
    Stream {
        #[arg(long)]
        machine: Option<String>,
        /// Job parameter as key=value; repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,
        /// Poll the new session until it ends or this many seconds pass.
        #[arg(long)]
        watch_secs: Option<u64>,
    },
    /// Cancel a pending or running job.
    Cancel { id: JobId },
    /// Replace a job's notes.
    Notes { id: JobId, text: String },
    /// Step back to the previous list state.
    Back,
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    /// Page to show, starting at 1.
    #[arg(long)]
    page: Option<usize>,
    /// Rows per page: 10, 20 or 100.
    #[arg(long, value_parser = parse_rows)]
    rows: Option<usize>,
    /// Only sessions submitted at or after this time (RFC 3339 or YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    start: Option<DateTime<Utc>>,
    /// Only sessions submitted at or before this time.
    #[arg(long, value_parser = parse_date)]
    end: Option<DateTime<Utc>>,
    /// Drop both date bounds and return to paging.
    #[arg(long, conflicts_with_all = ["start", "end"])]
    all_dates: bool,
}

impl ListArgs {
    /// All flags of one command folded into a single location.
    fn apply(&self, query: &SessionsQuery, current: &Url) -> Url {
        let mut location = current.clone();
        if let Some(rows) = self.rows {
            location = query.with_rows_per_page(&location, rows);
        }
        if self.all_dates {
            location = query.with_start_date(&location, None);
            location = query.with_end_date(&location, None);
        }
        if self.start.is_some() {
            location = query.with_start_date(&location, self.start);
        }
        if self.end.is_some() {
            location = query.with_end_date(&location, self.end);
        }
        // Last: rows and dates reset the page.
        if let Some(page) = self.page {
            location = query.with_page(&location, page.saturating_sub(1));
        }
        location
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = config::load(&cli.config);
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    distiller_logging::initialize(config.log_destination, level);

    let client = Arc::new(ReqwestJobsClient::new(config.client_settings()?)?);
    let machines = Arc::new(MachineRegistry::new(client.clone()));
    let service = JobsService::new(client, machines);
    let mut state = persistence::load_state(&cli.state_dir)?;

    let app = App {
        service,
        query: SessionsQuery::new(),
        config,
    };
    let result = app.run(cli.command, &mut state).await;
    persistence::save_state(&cli.state_dir, &state);
    result
}

struct App {
    service: JobsService,
    query: SessionsQuery,
    config: config::AppConfig,
}

impl App {
    async fn run(&self, command: Command, state: &mut AppState) -> anyhow::Result<()> {
        match command {
            Command::Sessions(args) => {
                let history = &mut state.history;
                history.push(args.apply(&self.query, history.current()));
                self.show_sessions(history.current()).await
            }
            Command::Session { id } => self.show_job(id, state.history.current()).await,
            Command::Stream {
                machine,
                params,
                watch_secs,
            } => {
                let machine = machine
                    .or_else(|| state.machine.clone())
                    .or_else(|| self.config.machine.clone())
                    .context("no machine given; pass --machine or set it in the config")?;
                let job_id = self.start_stream(&machine, params.into_iter().collect()).await?;
                state.machine = Some(machine);
                state.session = Some(job_id);
                if let Some(secs) = watch_secs {
                    self.watch(job_id, Duration::from_secs(secs)).await?;
                }
                Ok(())
            }
            Command::Cancel { id } => {
                let job = self.service.refresh_job(id).await?;
                if !JobCategory::cancel_enabled(&job) {
                    if state.session == Some(id) {
                        state.session = None;
                    }
                    bail!(
                        "job {id} is {} and cannot be cancelled",
                        JobCategory::of(&job).label()
                    );
                }
                if state.session == Some(id) {
                    self.service.session().resume(&job);
                    let outcome = self.service.session().cancel().await?;
                    distiller_info!("Cancel of session {} gave {:?}", id, outcome);
                    if self.service.session().state() == (SessionState::Cancelled { job_id: id }) {
                        state.session = None;
                    }
                } else {
                    self.service.cancel_job(id).await?;
                }
                self.print_job(id)
            }
            Command::Notes { id, text } => {
                self.service.update_notes(id, &text).await?;
                self.print_job(id)
            }
            Command::Back => {
                if !state.history.back() {
                    println!("Already at the first list state.");
                    return Ok(());
                }
                self.show_sessions(state.history.current()).await
            }
        }
    }

    async fn show_sessions(&self, location: &Url) -> anyhow::Result<()> {
        let request = self.query.list_request(location, Some(JobType::Streaming));
        self.service.list_jobs(&request).await?;
        let model = self
            .service
            .sessions_view(&self.query, location, Some(JobType::Streaming));
        print!("{}", render::sessions(&model));
        Ok(())
    }

    async fn show_job(&self, id: JobId, location: &Url) -> anyhow::Result<()> {
        let job = self.service.refresh_job(id).await?;
        // The surrounding page gives the detail view its neighbours.
        let request = self.query.list_request(location, Some(job.job_type));
        self.service.list_jobs(&request).await?;
        self.service.ensure_synced(id).await?;
        self.print_job(id)
    }

    fn print_job(&self, id: JobId) -> anyhow::Result<()> {
        let row = self
            .service
            .job_view(id)
            .with_context(|| format!("job {id} is not loaded"))?;
        let scans = self.service.scans_for_job(id);
        let neighbours = self
            .service
            .store()
            .lock()
            .map(|store| store.neighbours(id))
            .unwrap_or((None, None));
        print!("{}", render::job_detail(&row, &scans, neighbours));
        Ok(())
    }

    async fn start_stream(&self, machine: &str, params: Params) -> anyhow::Result<JobId> {
        // Sessions left over from earlier runs also block a new start.
        let request =
            JobListRequest::paged(Some(JobType::Streaming), 0, ROWS_PER_PAGE_OPTIONS[2]);
        self.service.list_jobs(&request).await?;
        let store = self.service.store();
        if store.lock().is_ok_and(|store| store.any_streaming_jobs()) {
            bail!("a streaming session is still pending or running");
        }

        if !self.service.session().prepare_start(machine).await? {
            bail!("machine {machine} cannot run jobs right now");
        }
        let job = self
            .service
            .session()
            .submit(JobType::Streaming, machine, params)
            .await?;
        distiller_info!("Started streaming session {} on {}", job.id, machine);
        println!("Started streaming session {} on {}", job.id, machine);
        Ok(job.id)
    }

    async fn watch(&self, id: JobId, budget: Duration) -> anyhow::Result<()> {
        let interval = self.config.poll_interval();
        let polls = (budget.as_millis() / interval.as_millis()).max(1);
        let polls = usize::try_from(polls).unwrap_or(usize::MAX);
        let job = self.service.wait_for_terminal(id, interval, polls).await?;
        if JobCategory::of(&job).is_terminal() {
            self.service.ensure_synced(id).await?;
        } else {
            println!("Session {id} still {} after {:?}", JobCategory::of(&job).label(), budget);
        }
        self.print_job(id)
    }
}

fn parse_rows(raw: &str) -> Result<usize, String> {
    let rows: usize = raw.parse().map_err(|_| format!("not a number: {raw}"))?;
    if ROWS_PER_PAGE_OPTIONS.contains(&rows) {
        Ok(rows)
    } else {
        Err(format!("rows must be one of {ROWS_PER_PAGE_OPTIONS:?}"))
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    match date_time_deserializer(raw) {
        Some(Some(value)) => Ok(value),
        _ => Err(format!("not a date or date-time: {raw}")),
    }
}

fn parse_param(raw: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in {raw}"));
    }
    Ok((key.to_string(), ParamValue::parse(value.trim())))
}
