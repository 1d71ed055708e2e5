//! `rolodex` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, resolve config and start logging.
//! - Map each subcommand onto one `ContactService` call.
//!
//! Every invocation re-reads the contacts directory; nothing is cached.

mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use rolodex_core::{
    default_log_dir, default_log_level, init_logging, CadenceStyle, Category, Config,
    ContactListQuery, ContactPatch, ContactService, ContactSort, InteractionKind, LoggingOptions,
    NewContact, RelationKind,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "rolodex", version, about = "Plain-text contact records with follow-up tracking")]
struct Cli {
    /// Config file to use instead of the default search path.
    #[arg(long, global = true, env = "ROLODEX_CONFIG")]
    config: Option<PathBuf>,

    /// Contacts directory; overrides config and ROLODEX_DIR.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Only print errors and requested data.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List contacts.
    List(ListArgs),
    /// Show one contact by index or identifier.
    Show { reference: String },
    /// Create a contact.
    New(NewArgs),
    /// Change fields on a contact.
    Update(UpdateArgs),
    /// Record an interaction.
    Log(LogArgs),
    /// Mark a contact as reviewed without counting it as contact.
    Bump { reference: String },
    /// Delete a contact file.
    Delete {
        reference: String,
        /// Required; deletion cannot be undone.
        #[arg(long)]
        confirm: bool,
    },
    /// Add a relation to a person, task or idea.
    Link(RelationArgs),
    /// Remove a relation.
    Unlink(RelationArgs),
    /// Repair duplicate or missing indices.
    Reindex,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Relationship type (close, family, work, network, ...).
    #[arg(long = "type")]
    category: Option<String>,
    #[arg(long)]
    state: Option<String>,
    /// Contact style (periodic, ambient, triggered).
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    overdue: bool,
    #[arg(long)]
    search: Option<String>,
    /// Include archived contacts.
    #[arg(long)]
    all: bool,
    #[arg(long, value_enum, default_value_t = SortArg::Name)]
    sort: SortArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Name,
    Days,
    Type,
    State,
}

impl From<SortArg> for ContactSort {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => Self::Name,
            SortArg::Days => Self::Days,
            SortArg::Type => Self::Category,
            SortArg::State => Self::State,
        }
    }
}

#[derive(Args, Debug)]
struct NewArgs {
    /// Full name.
    #[arg(required = true, num_args = 1..)]
    name: Vec<String>,
    #[arg(long = "type")]
    category: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    state: Option<String>,
    /// Comma-separated tags.
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    reference: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long = "type")]
    category: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    label: Option<String>,
    /// Days between contacts; 0 falls back to the type default.
    #[arg(long)]
    frequency: Option<u32>,
    /// Replaces all tags; comma-separated.
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,
}

#[derive(Args, Debug)]
struct LogArgs {
    reference: String,
    #[arg(long, short = 'i', value_parser = parse_interaction)]
    interaction: InteractionKind,
    /// New state after the interaction.
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args, Debug)]
struct RelationArgs {
    reference: String,
    /// Contact index or identifier.
    #[arg(
        long,
        required_unless_present_any = ["task", "idea"],
        conflicts_with_all = ["task", "idea"]
    )]
    people: Option<String>,
    #[arg(long, conflicts_with = "idea")]
    task: Option<String>,
    #[arg(long)]
    idea: Option<String>,
}

impl RelationArgs {
    fn target(&self) -> Option<(RelationKind, &str)> {
        self.people
            .as_deref()
            .map(|value| (RelationKind::People, value))
            .or_else(|| self.task.as_deref().map(|value| (RelationKind::Tasks, value)))
            .or_else(|| self.idea.as_deref().map(|value| (RelationKind::Ideas, value)))
    }
}

fn parse_interaction(value: &str) -> Result<InteractionKind, String> {
    InteractionKind::parse(value).ok_or_else(|| {
        let known: Vec<&str> = InteractionKind::ALL.iter().map(|kind| kind.as_str()).collect();
        format!("unknown interaction `{value}`; expected one of {}", known.join(", "))
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=command_failed module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::load(cli.config.as_deref())?.with_directory_override(cli.dir.clone());
    start_logging(&config, cli.quiet);

    let service = ContactService::open(&config.contacts_directory, config.identifier_scheme)?;
    let printer = output::Printer::new(cli.json, cli.quiet);
    info!(
        "event=command_start module=cli status=ok command={}",
        command_name(&cli.command)
    );

    match cli.command {
        Command::List(args) => {
            let query = ContactListQuery {
                category: args.category.map(Category::from),
                state: args.state,
                cadence: args.style.map(CadenceStyle::from),
                overdue_only: args.overdue,
                search: args.search,
                include_archived: args.all,
                sort: args.sort.into(),
            };
            printer.contacts(&service.list(&query)?)?;
        }
        Command::Show { reference } => printer.contact_detail(&service.get(&reference)?)?,
        Command::New(args) => {
            let contact = service.create(NewContact {
                title: args.name.join(" "),
                category: args.category.map(Category::from),
                cadence: args.style.map(CadenceStyle::from),
                state: args.state,
                email: args.email,
                phone: args.phone,
                company: args.company,
                role: args.role,
                location: args.location,
                tags: args.tags,
            })?;
            printer.changed("Created", &contact)?;
        }
        Command::Update(args) => {
            let patch = ContactPatch {
                title: args.name,
                category: args.category.map(Category::from),
                cadence: args.style.map(CadenceStyle::from),
                state: args.state,
                email: args.email,
                phone: args.phone,
                company: args.company,
                role: args.role,
                location: args.location,
                label: args.label,
                custom_frequency_days: args.frequency,
                tags: args.tags,
            };
            if patch.is_empty() {
                return Err("nothing to update; pass at least one field flag".into());
            }
            let contact = service.update(&args.reference, patch)?;
            printer.changed("Updated", &contact)?;
        }
        Command::Log(args) => {
            let contact = service.log_interaction(
                &args.reference,
                args.interaction,
                args.note.as_deref(),
                args.state.as_deref(),
            )?;
            printer.changed("Logged interaction for", &contact)?;
        }
        Command::Bump { reference } => {
            let contact = service.review(&reference)?;
            printer.changed("Bumped", &contact)?;
        }
        Command::Delete { reference, confirm } => {
            if !confirm {
                return Err("refusing to delete without --confirm".into());
            }
            let contact = service.delete(&reference)?;
            printer.changed("Deleted", &contact)?;
        }
        Command::Link(args) => {
            let (kind, target) = args.target().ok_or("missing relation target")?;
            let contact = service.add_relation(&args.reference, kind, target)?;
            printer.changed("Linked", &contact)?;
        }
        Command::Unlink(args) => {
            let (kind, target) = args.target().ok_or("missing relation target")?;
            let contact = service.remove_relation(&args.reference, kind, target)?;
            printer.changed("Unlinked", &contact)?;
        }
        Command::Reindex => printer.reindex(&service.reindex()?)?,
    }
    Ok(())
}

/// Logging problems are reported but never stop the command.
fn start_logging(config: &Config, quiet: bool) {
    let Some(log_dir) = config.log_dir.clone().or_else(default_log_dir) else {
        return;
    };
    let level = config
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let options = LoggingOptions {
        echo_warnings: !quiet,
        ..LoggingOptions::new(level, log_dir)
    };
    if let Err(err) = init_logging(&options) {
        eprintln!("warning: {err}");
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::List(_) => "list",
        Command::Show { .. } => "show",
        Command::New(_) => "new",
        Command::Update(_) => "update",
        Command::Log(_) => "log",
        Command::Bump { .. } => "bump",
        Command::Delete { .. } => "delete",
        Command::Link(_) => "link",
        Command::Unlink(_) => "unlink",
        Command::Reindex => "reindex",
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::{CommandFactory, Parser};
    use rolodex_core::{InteractionKind, RelationKind};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn new_joins_name_words_and_splits_tags() {
        let cli = Cli::parse_from([
            "rolodex", "new", "Sarah", "Chen", "--type", "work", "--tags", "rust,conf",
        ]);
        let Command::New(args) = cli.command else {
            panic!("expected new");
        };
        assert_eq!(args.name.join(" "), "Sarah Chen");
        assert_eq!(args.tags, vec!["rust", "conf"]);
    }

    #[test]
    fn log_parses_interaction_kind() {
        let cli = Cli::parse_from(["rolodex", "log", "3", "-i", "Meeting", "--note", "coffee"]);
        let Command::Log(args) = cli.command else {
            panic!("expected log");
        };
        assert_eq!(args.interaction, InteractionKind::Meeting);
        assert!(Cli::try_parse_from(["rolodex", "log", "3", "-i", "fax"]).is_err());
    }

    #[test]
    fn link_requires_exactly_one_target() {
        let cli = Cli::parse_from(["rolodex", "link", "1", "--task", "20240101T000000"]);
        let Command::Link(args) = cli.command else {
            panic!("expected link");
        };
        assert_eq!(
            args.target(),
            Some((RelationKind::Tasks, "20240101T000000"))
        );
        assert!(Cli::try_parse_from(["rolodex", "link", "1"]).is_err());
        assert!(
            Cli::try_parse_from(["rolodex", "link", "1", "--task", "a", "--idea", "b"]).is_err()
        );
    }

    #[test]
    fn people_flag_selects_a_person_relation() {
        let cli = Cli::parse_from(["rolodex", "unlink", "1", "--people", "7"]);
        let Command::Unlink(args) = cli.command else {
            panic!("expected unlink");
        };
        assert_eq!(args.target(), Some((RelationKind::People, "7")));
        assert!(Cli::try_parse_from(["rolodex", "link", "1", "--person", "7"]).is_err());
        assert!(
            Cli::try_parse_from(["rolodex", "link", "1", "--people", "7", "--task", "a"]).is_err()
        );
    }
}
