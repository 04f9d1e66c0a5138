//! Plain-text roster report for sharing by email or messaging apps.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{ReportSettings, Soldier};
use crate::roster::StatusCounts;
use crate::status::Status;
use crate::utils::cmp_ignore_case;

const TOTAL_LABEL: &str = "סה״כ";
const PLATOON_LABEL: &str = "מחלקה";
const NO_PLATOON_LABEL: &str = "ללא מחלקה";

fn soldier_line(soldier: &Soldier, include_notes: bool) -> String {
    let mut line = format!("- {} - {}", soldier.name, soldier.raw_status());
    let notes = soldier.notes_display().trim();
    if include_notes && !notes.is_empty() {
        let _ = write!(line, " ({})", notes);
    }
    line
}

fn sorted(mut soldiers: Vec<&Soldier>) -> Vec<&Soldier> {
    soldiers.sort_by(|a, b| {
        cmp_ignore_case(&a.last_name, &b.last_name)
            .then_with(|| cmp_ignore_case(&a.first_name, &b.first_name))
    });
    soldiers
}

/// Render the report. Counts always cover every soldier; the listing skips
/// soldiers at home unless `include_home` is set.
pub fn build_report(soldiers: &[Soldier], settings: &ReportSettings) -> String {
    let mut counts = StatusCounts::default();
    for soldier in soldiers {
        counts.add(soldier.status);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} - {}", settings.title, settings.date.format("%d/%m/%Y"));
    let summary: Vec<String> = std::iter::once(format!("{}: {}", TOTAL_LABEL, counts.total()))
        .chain(Status::ALL.iter().map(|s| format!("{}: {}", s.label(), counts.get(*s))))
        .collect();
    let _ = writeln!(out, "{}", summary.join(" | "));

    let listed: Vec<&Soldier> = soldiers
        .iter()
        .filter(|s| settings.include_home || s.status != Status::Home)
        .collect();

    if settings.group_by_platoon {
        let mut platoons: BTreeMap<&str, Vec<&Soldier>> = BTreeMap::new();
        for soldier in listed {
            platoons.entry(soldier.platoon.trim()).or_default().push(soldier);
        }
        for (platoon, members) in platoons {
            out.push('\n');
            if platoon.is_empty() {
                let _ = writeln!(out, "{} ({})", NO_PLATOON_LABEL, members.len());
            } else {
                let _ = writeln!(out, "{} {} ({})", PLATOON_LABEL, platoon, members.len());
            }
            for soldier in sorted(members) {
                let _ = writeln!(out, "{}", soldier_line(soldier, settings.include_notes));
            }
        }
    } else if !listed.is_empty() {
        out.push('\n');
        for soldier in sorted(listed) {
            let _ = writeln!(out, "{}", soldier_line(soldier, settings.include_notes));
        }
    }

    out
}
