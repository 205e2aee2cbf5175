//! Line-oriented admin console.
//!
//! Stands in for the chat surface: each line is one command, parsed into a
//! [`Command`] and run against the engine. Output comes back as lines for
//! the caller to log.

use chrono::NaiveDate;
use lakana_sync::{
    ApplicantId, ApplicantInfo, ApplicationKey, ApplicationRecord, ChannelId, RemoteTableClient,
    RoleId, RoleRegistry, SubmitRequest, Submission, SyncEngine, SyncResult, Transition,
};

use crate::publish;

pub const HELP: &[&str] = &[
    "Commands:",
    "  submit <role> <applicant> <lang> <email> <handle> <name...>  - Apply for a role",
    "  submit! ...                       - Same, accepting the exclusivity warning",
    "  approve|deny|elect|remove <role> <applicant>",
    "  link <role> <applicant> [url]     - Set or clear the forum post link",
    "  find <role> <name...>             - Look up an application by applicant name",
    "  start <channel> / stop <channel>  - Register or unregister a broadcast channel",
    "  roles, pending, channels          - Listings",
    "  open [division]                   - Roles still taking applications",
    "  sheet                             - Print the election sheet",
    "  flush                             - Write queued changes now",
    "  refresh                           - Drop cached tables",
    "  q, quit                           - Flush and exit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit {
        role: String,
        applicant: ApplicantInfo,
        acknowledge: bool,
    },
    Transition {
        transition: Transition,
        role: String,
        applicant: ApplicantId,
    },
    Link {
        role: String,
        applicant: ApplicantId,
        link: Option<String>,
    },
    Find {
        role: String,
        name: String,
    },
    Start(ChannelId),
    Stop(ChannelId),
    Roles,
    /// Optionally limited to one division, by local name.
    Open(Option<String>),
    Pending,
    Channels,
    Sheet,
    Flush,
    Refresh,
    Help,
    Quit,
    /// Known command, wrong arguments.
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let mut words = input.split_whitespace();
    let Some(head) = words.next() else {
        return Command::Unknown(String::new());
    };
    let args: Vec<&str> = words.collect();

    match head.to_lowercase().as_str() {
        verb @ ("submit" | "submit!") => parse_submit(&args, verb == "submit!"),
        verb @ ("approve" | "deny" | "elect" | "remove") => {
            let transition = match verb {
                "approve" => Transition::Approve,
                "deny" => Transition::Deny,
                "elect" => Transition::Elect,
                _ => Transition::Remove,
            };
            match parse_target(&args) {
                Some((role, applicant)) if args.len() == 2 => Command::Transition {
                    transition,
                    role,
                    applicant,
                },
                _ => Command::Usage("<approve|deny|elect|remove> <role> <applicant>"),
            }
        }
        "link" => match parse_target(&args) {
            Some((role, applicant)) if args.len() <= 3 => Command::Link {
                role,
                applicant,
                link: args.get(2).map(|&url| url.to_owned()),
            },
            _ => Command::Usage("link <role> <applicant> [url]"),
        },
        "find" => match args.as_slice() {
            [role, name @ ..] if !name.is_empty() => Command::Find {
                role: (*role).to_owned(),
                name: name.join(" "),
            },
            _ => Command::Usage("find <role> <name...>"),
        },
        verb @ ("start" | "stop") => match args.as_slice() {
            [id] => match id.parse() {
                Ok(id) if verb == "start" => Command::Start(ChannelId(id)),
                Ok(id) => Command::Stop(ChannelId(id)),
                Err(_) => Command::Usage("<start|stop> <channel id>"),
            },
            _ => Command::Usage("<start|stop> <channel id>"),
        },
        "roles" => Command::Roles,
        "open" if args.is_empty() => Command::Open(None),
        "open" => Command::Open(Some(args.join(" "))),
        "pending" => Command::Pending,
        "channels" => Command::Channels,
        "sheet" => Command::Sheet,
        "flush" => Command::Flush,
        "refresh" => Command::Refresh,
        "help" | "h" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_owned()),
    }
}

fn parse_target(args: &[&str]) -> Option<(String, ApplicantId)> {
    let role = (*args.first()?).to_owned();
    let applicant = args.get(1)?.parse().ok()?;
    Some((role, ApplicantId(applicant)))
}

fn parse_submit(args: &[&str], acknowledge: bool) -> Command {
    const USAGE: &str = "submit <role> <applicant> <lang> <email> <handle> <name...>";
    let [role, applicant, language, email, handle, name @ ..] = args else {
        return Command::Usage(USAGE);
    };
    let Ok(applicant_id) = applicant.parse() else {
        return Command::Usage(USAGE);
    };
    if name.is_empty() {
        return Command::Usage(USAGE);
    }
    Command::Submit {
        role: (*role).to_owned(),
        applicant: ApplicantInfo {
            applicant_id: ApplicantId(applicant_id),
            name: name.join(" "),
            email: (*email).to_owned(),
            handle: handle.trim_start_matches('@').to_owned(),
            language: (*language).to_owned(),
        },
        acknowledge,
    }
}

/// Role by title first, then by id.
fn resolve_role<C: RemoteTableClient>(engine: &SyncEngine<C>, role: &str) -> SyncResult<RoleId> {
    Ok(match engine.role_by_name(role)? {
        Some(found) => found.id,
        None => RoleId::new(role),
    })
}

fn describe(application: &ApplicationRecord) -> String {
    format!(
        "{} ({}) {} [{}]",
        application.name, application.applicant_id, application.role_id, application.status
    )
}

/// Run one command. `Quit` is the caller's business and yields nothing.
pub fn execute<C: RemoteTableClient>(
    engine: &SyncEngine<C>,
    command: Command,
    today: NaiveDate,
) -> Vec<String> {
    match run(engine, command, today) {
        Ok(lines) => lines,
        Err(e) => vec![format!("Error: {e}")],
    }
}

fn run<C: RemoteTableClient>(
    engine: &SyncEngine<C>,
    command: Command,
    today: NaiveDate,
) -> SyncResult<Vec<String>> {
    let lines = match command {
        Command::Submit {
            role,
            applicant,
            acknowledge,
        } => {
            let role_id = resolve_role(engine, &role)?;
            let request = SubmitRequest {
                role_id,
                applicant,
                acknowledge_conflicts: acknowledge,
            };
            match engine.submit(request)? {
                Submission::Accepted(record) => vec![format!("Submitted: {}", describe(&record))],
                Submission::NeedsConfirmation { conflicts } => {
                    let mut lines = vec![
                        "Already applied to elected positions:".to_owned(),
                    ];
                    lines.extend(conflicts.iter().map(|r| format!("  - {}", r.title_local)));
                    lines.push("Use submit! to apply anyway.".to_owned());
                    lines
                }
            }
        }
        Command::Transition {
            transition,
            role,
            applicant,
        } => {
            let key = ApplicationKey::new(resolve_role(engine, &role)?, applicant);
            let record = engine.transition(&key, transition)?;
            vec![format!("{transition}: {}", describe(&record))]
        }
        Command::Link {
            role,
            applicant,
            link,
        } => {
            let key = ApplicationKey::new(resolve_role(engine, &role)?, applicant);
            let record = engine.set_post_link(&key, link)?;
            if record.post_link.is_empty() {
                vec![format!("Cleared post link of {}", describe(&record))]
            } else {
                vec![format!("Linked {} to {}", describe(&record), record.post_link)]
            }
        }
        Command::Find { role, name } => {
            let role_id = resolve_role(engine, &role)?;
            match engine.find_application_by_name(&role_id, &name)? {
                Some(record) => vec![describe(&record)],
                None => vec![format!("No active application from '{name}' to {role_id}")],
            }
        }
        Command::Start(channel) => {
            engine.register_channel(channel)?;
            vec![format!("Channel {channel} registered")]
        }
        Command::Stop(channel) => {
            engine.unregister_channel(channel)?;
            vec![format!("Channel {channel} unregistered")]
        }
        Command::Roles => {
            let roles = engine.current_roles()?;
            let mut lines = Vec::new();
            for division in RoleRegistry::new(&roles).divisions() {
                lines.push(format!("{} / {}", division.name_local, division.name_foreign));
                for role in division.roles {
                    lines.push(format!(
                        "  {} [{}] {} ({})",
                        role.title_local, role.role_type, role.id, role.capacity
                    ));
                }
            }
            lines
        }
        Command::Open(division) => {
            let open = match division {
                Some(division) => engine.open_roles_in_division(&division, today)?,
                None => engine.open_roles(today)?,
            };
            open.iter()
                .map(|role| {
                    let deadline = role.deadline.as_deref().unwrap_or("-");
                    format!("{} / {} until {deadline}", role.title_local, role.title_foreign)
                })
                .collect()
        }
        Command::Pending => {
            let pending = engine.pending_applications()?;
            if pending.is_empty() {
                vec!["No pending applications".to_owned()]
            } else {
                pending.iter().map(describe).collect()
            }
        }
        Command::Channels => engine
            .current_channels()?
            .iter()
            .map(|c| c.channel_id.to_string())
            .collect(),
        Command::Sheet => {
            let sheet = engine.election_sheet()?;
            publish::render_markdown(&sheet, chrono::Datelike::year(&today))
                .lines()
                .map(str::to_owned)
                .collect()
        }
        Command::Flush => vec![format!("Flushed: {}", engine.flush())],
        Command::Refresh => {
            engine.refresh();
            vec!["Caches dropped".to_owned()]
        }
        Command::Help => HELP.iter().map(|&line| line.to_owned()).collect(),
        Command::Quit => Vec::new(),
        Command::Usage(usage) => vec![format!("Usage: {usage}")],
        Command::Unknown(command) if command.is_empty() => Vec::new(),
        Command::Unknown(command) => {
            vec![format!("Unknown command: '{command}'. Type 'help' for commands.")]
        }
    };
    Ok(lines)
}
