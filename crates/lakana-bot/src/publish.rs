//! Markdown rendering of the election sheet.

use std::fmt::Write as _;
use std::path::Path;

use lakana_sync::{Candidate, ElectionSheet, RoleRecord, RoleType};

/// Render the sheet the way it is posted on the forum.
pub fn render_markdown(sheet: &ElectionSheet, year: i32) -> String {
    let mut text = format!("# VAALILAKANA {year} / ELECTION SHEET {year}\n\n");

    for division in &sheet.divisions {
        let _ = write!(
            text,
            "### {} / {}\n\n",
            division.name_local, division.name_foreign
        );

        for entry in &division.roles {
            text.push_str(&role_line(&entry.role));
            text.push('\n');

            if !entry.candidates.is_empty() {
                text.push('\n');
                for candidate in &entry.candidates {
                    let name = candidate_name(candidate);
                    if candidate.elected {
                        let _ = writeln!(text, "* **{name}**");
                    } else {
                        let _ = writeln!(text, "* {name}");
                    }
                }
                text.push('\n');
            }
            text.push('\n');
        }

        text.push_str("—\n\n");
    }

    text
}

/// The name, linked to the candidate's forum post when there is one.
fn candidate_name(candidate: &Candidate) -> String {
    if candidate.post_link.is_empty() {
        candidate.name.clone()
    } else {
        format!("[{}]({})", candidate.name, candidate.post_link)
    }
}

fn role_line(role: &RoleRecord) -> String {
    let tag = match role.role_type {
        RoleType::Executive => "**",
        RoleType::Elected | RoleType::Auditor => "*",
        RoleType::NonElected => "",
    };

    let mut line = String::from(tag);
    line.push_str(&role.title_local);
    if role.title_foreign != role.title_local && !role.title_foreign.is_empty() {
        let _ = write!(line, " / {}", role.title_foreign);
    }
    if !role.capacity.is_empty() {
        let _ = write!(line, " ({})", role.capacity);
    }
    if let Some(deadline) = &role.deadline {
        let _ = write!(line, " {deadline}");
    }
    line.push_str(tag);
    line
}

/// Write the rendered sheet to `path` (temporary sibling, then rename).
pub fn write_document(path: &Path, markdown: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, markdown)?;
    std::fs::rename(&tmp, path)
}
