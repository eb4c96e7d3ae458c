//! Plain-text rendering of view models.

use std::fmt::Write;

use chrono::SecondsFormat;
use distiller_core::{JobId, JobRowView, Scan, ScanSummary, SessionView, SessionsViewModel};

pub(crate) fn sessions(model: &SessionsViewModel) -> String {
    let mut out = String::new();
    session_line(&mut out, &model.session);

    if model.groups.is_empty() {
        out.push_str("No sessions.\n");
    }
    for group in &model.groups {
        match group.date {
            Some(date) => {
                let _ = writeln!(out, "== {date} ==");
            }
            None => out.push_str("== no submit time ==\n"),
        }
        for row in &group.rows {
            row_line(&mut out, row);
        }
    }

    if model.date_filtered {
        let _ = writeln!(out, "{} sessions in range", model.row_count());
    } else {
        let total = if model.total_count < 0 {
            "?".to_string()
        } else {
            model.total_count.to_string()
        };
        let _ = writeln!(
            out,
            "page {} | {} per page | {} total",
            model.page + 1,
            model.rows_per_page,
            total
        );
    }
    out
}

pub(crate) fn job_detail(
    row: &JobRowView,
    scans: &[Scan],
    neighbours: (Option<JobId>, Option<JobId>),
) -> String {
    let mut out = String::new();
    row_line(&mut out, row);
    if let Some(submit) = row.submit {
        let _ = writeln!(
            out,
            "  submitted {}",
            submit.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
    if !row.notes.is_empty() {
        let _ = writeln!(out, "  notes: {}", row.notes);
    }
    if row.has_output {
        out.push_str("  output available\n");
    }
    match row.scans {
        ScanSummary::NotSynced => out.push_str("  scans: not loaded\n"),
        ScanSummary::Empty => out.push_str("  scans: none\n"),
        ScanSummary::Loaded(count) => {
            let _ = writeln!(out, "  scans: {count}");
            for scan in scans {
                let _ = writeln!(out, "    #{}", scan.id);
            }
        }
    }
    let (prev, next) = neighbours;
    let _ = writeln!(
        out,
        "  prev: {} | next: {}",
        prev.map_or("-".to_string(), |id| id.to_string()),
        next.map_or("-".to_string(), |id| id.to_string())
    );
    out
}

fn session_line(out: &mut String, session: &SessionView) {
    match &session.active {
        Some(row) if session.pending_cancel => {
            let _ = writeln!(out, "Streaming session {} (cancelling)", row.job_id);
        }
        Some(row) => {
            let _ = writeln!(out, "Streaming session {} ({})", row.job_id, row.category.label());
        }
        None if session.can_start => out.push_str("No streaming session; ready to start.\n"),
        None => out.push_str("No streaming session; start unavailable.\n"),
    }
}

fn row_line(out: &mut String, row: &JobRowView) {
    let marker = match (row.indicator.visible, row.indicator.pulsing) {
        (true, true) => "*",
        (true, false) => ".",
        (false, _) if row.shows_failure => "!",
        (false, _) => " ",
    };
    let state = row.state.as_deref().unwrap_or("-");
    let _ = write!(
        out,
        "{marker} {:>6} {:<9} {:<8} {:<12}",
        row.job_id,
        row.job_type.as_str(),
        row.category.label(),
        state
    );
    if row.cancel_enabled {
        out.push_str(" [cancel]");
    }
    out.push('\n');
}
