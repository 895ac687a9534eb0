use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tb", about = concat!("taskboard v", env!("CARGO_PKG_VERSION"), " - projects, cards and tasks from the terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and remember the session
    Login(LoginArgs),
    /// Forget the stored session (no server call)
    Logout,
    /// Create an account
    Register(RegisterArgs),
    /// Show session and server settings
    Status,
    /// List all users
    Users,
    /// Show a project's cards with their tasks
    Board(BoardArgs),
    /// Project management
    Projects(ProjectsCmd),
    /// Task management
    Tasks(TasksCmd),
    /// Card management
    Cards(CardsCmd),
    /// Task comments
    Comments(CommentsCmd),
    /// Project and user reports
    Report(ReportCmd),
    /// View or edit the config file
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Session args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    pub email: String,
    /// Password (read from stdin when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct RegisterArgs {
    pub name: String,
    pub email: String,
    /// Password (read from stdin when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct BoardArgs {
    /// Project ID
    pub project: String,
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ProjectsCmd {
    #[command(subcommand)]
    pub action: Option<ProjectsAction>,
}

#[derive(Subcommand)]
pub enum ProjectsAction {
    /// List projects
    List,
    /// Show one project
    Show(ProjectIdArg),
    /// Create a project, optionally with members
    Create(ProjectCreateArgs),
    /// Change a project's name or description
    Update(ProjectUpdateArgs),
    /// Delete a project
    Delete(ProjectIdArg),
    /// List or change project members
    Members(MembersCmd),
}

#[derive(Args)]
pub struct ProjectIdArg {
    /// Project ID
    pub id: String,
}

#[derive(Args)]
pub struct ProjectCreateArgs {
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Member to add: USER_ID[:PERM+PERM] (repeatable, perms: read, write, admin)
    #[arg(long = "member", value_name = "MEMBER")]
    pub members: Vec<String>,
}

#[derive(Args)]
pub struct ProjectUpdateArgs {
    /// Project ID
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct MembersCmd {
    /// Project ID
    pub project: String,
    #[command(subcommand)]
    pub action: Option<MembersAction>,
}

#[derive(Subcommand)]
pub enum MembersAction {
    /// Add a member: USER_ID[:PERM+PERM]
    Add { member: String },
    /// Replace a member's permissions: USER_ID:PERM+PERM
    Set { member: String },
    /// Remove a member
    Remove { user: String },
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TasksCmd {
    #[command(subcommand)]
    pub action: TasksAction,
}

#[derive(Subcommand)]
pub enum TasksAction {
    /// List a project's tasks
    List(TaskListArgs),
    /// Show one task
    Show(TaskIdArg),
    /// Add a task
    Add(TaskAddArgs),
    /// Change a task's title or description
    Edit(TaskEditArgs),
    /// Set status (todo, in_progress, done)
    Status(TaskValueArgs),
    /// Set priority (low, medium, high)
    Priority(TaskValueArgs),
    /// Assign a user, or `none` to unassign
    Assign(TaskValueArgs),
    /// File under a card, or `none` to unfile
    Card(TaskValueArgs),
    /// Delete a task
    Delete(TaskIdArg),
}

#[derive(Args)]
pub struct TaskListArgs {
    /// Project ID
    pub project: String,
    /// Filter by status
    #[arg(long)]
    pub status: Option<String>,
    /// Only tasks on this card
    #[arg(long)]
    pub card: Option<String>,
}

#[derive(Args)]
pub struct TaskIdArg {
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct TaskAddArgs {
    /// Project ID
    pub project: String,
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Card to file the task under
    #[arg(long)]
    pub card: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    /// User to assign
    #[arg(long)]
    pub assign: Option<String>,
}

#[derive(Args)]
pub struct TaskEditArgs {
    /// Task ID
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct TaskValueArgs {
    /// Task ID
    pub id: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CardsCmd {
    #[command(subcommand)]
    pub action: CardsAction,
}

#[derive(Subcommand)]
pub enum CardsAction {
    /// List a project's cards
    List { project: String },
    /// Show one card and its tasks
    Show { id: String },
    /// Add a card
    Add(CardAddArgs),
    /// Rename a card
    Rename { id: String, title: String },
    /// Delete a card (its tasks are kept)
    Delete { id: String },
    /// Put a task on a card
    Assign { card: String, task: String },
    /// Take a task off a card
    Unassign { card: String, task: String },
}

#[derive(Args)]
pub struct CardAddArgs {
    /// Project ID
    pub project: String,
    pub title: String,
    #[arg(long)]
    pub position: Option<i64>,
}

// ---------------------------------------------------------------------------
// Comments, reports, config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CommentsCmd {
    #[command(subcommand)]
    pub action: CommentsAction,
}

#[derive(Subcommand)]
pub enum CommentsAction {
    /// List a task's comments
    List { task: String },
    /// Comment on a task
    Add { task: String, content: String },
    /// Replace a comment's text
    Edit { id: String, content: String },
    /// Delete a comment
    Delete { id: String },
}

#[derive(Args)]
pub struct ReportCmd {
    #[command(subcommand)]
    pub action: ReportAction,
}

#[derive(Subcommand)]
pub enum ReportAction {
    /// Metrics for one project
    Project { id: String },
    /// Metrics for one user (default: the logged-in user)
    User { id: Option<String> },
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective config
    Show,
    /// Set a key in the config file (api.base_url, api.timeout_secs, session.state_dir)
    Set { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tb", "tasks", "list", "7", "--json", "--log-format", "json"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Tasks(TasksCmd {
                action: TasksAction::List(args),
            }) => assert_eq!(args.project, "7"),
            _ => panic!("expected tasks list"),
        }
    }

    #[test]
    fn repeatable_members() {
        let cli = Cli::try_parse_from([
            "tb", "projects", "create", "Launch", "--member", "2:write", "--member", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Projects(ProjectsCmd {
                action: Some(ProjectsAction::Create(args)),
            }) => assert_eq!(args.members, vec!["2:write", "3"]),
            _ => panic!("expected projects create"),
        }
    }
}
