//! Human-readable rendering of plans and apply results.

use crate::core::output::compact_line;
use crate::infra::apply::ApplyResult;
use crate::infra::git::DirtyState;
use crate::infra::plan::{OpStatus, OrphanOp, Plan, WindowKey, WindowOp};
use colored::{ColoredString, Colorize};
use std::fmt::Write;

fn status_label(status: OpStatus) -> ColoredString {
    let label = format!("{:<7}", status.as_str());
    match status {
        OpStatus::Create => label.bright_green(),
        OpStatus::Missing => label.bright_yellow(),
        OpStatus::Delete => label.bright_red(),
        OpStatus::NoOp => label.dimmed(),
    }
}

fn dirty_label(state: &DirtyState) -> String {
    match state {
        DirtyState::Clean => "clean".to_string(),
        DirtyState::NotTracked => "untracked dir".to_string(),
        DirtyState::Dirty {
            modified,
            untracked,
        } => format!("DIRTY: {} modified, {} untracked", modified, untracked),
        DirtyState::Unknown { reason } => format!("unknown: {}", compact_line(reason, 60)),
    }
}

fn window_label(window: &WindowOp) -> String {
    match (&window.key, &window.name) {
        (_, Some(name)) => name.clone(),
        (WindowKey::Bootstrap, None) => "goblin-<new>".to_string(),
        (WindowKey::Workbench(id), None) => id.clone(),
    }
}

fn orphan_lines(out: &mut String, title: &str, orphans: &[OrphanOp]) {
    if orphans.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}", title.bold());
    for o in orphans {
        let _ = writeln!(
            out,
            "  {} {} {} ({})",
            status_label(o.status),
            o.id,
            o.path.display(),
            dirty_label(&o.dirty)
        );
    }
}

pub fn plan_text(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({}) in factory {} ({}){}",
        "Workshop".bold(),
        plan.workshop_name.bright_cyan(),
        plan.workshop_id,
        plan.factory_name,
        plan.factory_id,
        if plan.workshop_archived {
            " [archived]".bright_yellow().to_string()
        } else {
            String::new()
        }
    );

    let gh = &plan.gatehouse;
    let _ = writeln!(out, "{}", "Gatehouse".bold());
    let _ = writeln!(
        out,
        "  {} {} {}",
        status_label(gh.status),
        gh.id.as_deref().unwrap_or("(new)"),
        gh.path.display()
    );
    let _ = writeln!(out, "  {} config", status_label(gh.config_status));

    let _ = writeln!(out, "{}", "Workbenches".bold());
    if plan.workbenches.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for w in &plan.workbenches {
        let _ = writeln!(
            out,
            "  {} {} {} {}",
            status_label(w.status),
            w.id,
            w.name,
            w.path.display()
        );
        if w.config_status != OpStatus::NoOp {
            let _ = writeln!(out, "  {} config", status_label(w.config_status));
        }
    }

    orphan_lines(&mut out, "Orphan workbenches", &plan.orphan_workbenches);
    orphan_lines(&mut out, "Orphan gatehouses", &plan.orphan_gatehouses);

    if let Some(tmux) = &plan.tmux {
        let _ = writeln!(
            out,
            "{} {} {}",
            "Session".bold(),
            status_label(tmux.status),
            tmux.name
        );
        for w in &tmux.windows {
            let agent = if w.exists && !w.agent_ok {
                format!(
                    " agent {} != {}",
                    w.actual_agent.as_deref().unwrap_or("-"),
                    w.expected_agent.as_deref().unwrap_or("-")
                )
                .bright_yellow()
                .to_string()
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                "  {} {}:{}{}",
                status_label(w.status),
                w.index,
                window_label(w),
                agent
            );
            for p in w.panes.iter().filter(|p| !p.path_ok || !p.command_ok) {
                let _ = writeln!(
                    out,
                    "      pane {}: path {} cmd {}",
                    p.position,
                    if p.path_ok { "ok".green() } else { "mismatch".red() },
                    if p.command_ok { "ok".green() } else { "mismatch".red() },
                );
            }
        }
        for w in &tmux.orphan_windows {
            let _ = writeln!(out, "  {} {}:{}", status_label(w.status), w.index, w.name);
        }
    }

    let summary = if plan.needs_action() {
        "Changes pending; run `orc infra apply` to converge.".bright_yellow()
    } else {
        "Nothing to do.".bright_green()
    };
    let _ = writeln!(out, "{}", summary);
    out
}

pub fn apply_text(result: &ApplyResult) -> String {
    let mut out = String::new();
    if result.nothing_to_do {
        let _ = writeln!(out, "{} Nothing to do.", "✓".bright_green());
        return out;
    }
    let _ = writeln!(
        out,
        "{} Applied (run {})",
        "✓".bright_green(),
        result.run_id
    );
    if let Some(id) = &result.gatehouse_id {
        let _ = writeln!(
            out,
            "  gatehouse {}{}{}",
            id,
            if result.gatehouse_record_created { " recorded" } else { "" },
            if result.gatehouse_created { " created" } else { "" }
        );
    }
    let rows = [
        ("workbenches created", result.workbenches_created),
        ("configs written", result.configs_created),
        ("workbenches deleted", result.workbenches_deleted),
        ("gatehouses deleted", result.gatehouses_deleted),
        ("windows renamed", result.windows_renamed),
        ("windows created", result.windows_created),
        ("windows killed", result.windows_killed),
        ("agent tags set", result.agent_tags_set),
    ];
    for (label, n) in rows.iter().filter(|(_, n)| *n > 0) {
        let _ = writeln!(out, "  {}: {}", label, n);
    }
    if result.session_created {
        let _ = writeln!(out, "  session created");
    }
    if result.session_killed {
        let _ = writeln!(out, "  session killed");
    }
    out
}
