use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::client::Client;
use crate::gateway::HttpGateway;
use crate::io::config_io;
use crate::io::state::FileStorage;
use crate::model::{
    CardId, CardUpdate, ClientConfig, CommentId, Credentials, MemberAssignment, NewCard,
    NewProject, NewTask, ProjectId, Registration, TaskId, TaskPriority, TaskStatus, UserId,
};
use crate::store::Listing;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let config_path = cli.config.clone().unwrap_or_else(config_io::config_path);

    // Config editing must work even when the file does not parse
    if let Commands::Config(args) = cli.command {
        return cmd_config(args, &config_path, json);
    }

    let config = config_io::load_config(Some(&config_path))?;
    let mut ctx = Context::open(config, config_path, json);

    match cli.command {
        Commands::Login(args) => cmd_login(&mut ctx, args),
        Commands::Logout => cmd_logout(&mut ctx),
        Commands::Register(args) => cmd_register(&ctx, args),
        Commands::Status => cmd_status(&ctx),
        Commands::Users => cmd_users(&mut ctx),
        Commands::Board(args) => cmd_board(&mut ctx, args),
        Commands::Projects(args) => cmd_projects(&mut ctx, args),
        Commands::Tasks(args) => cmd_tasks(&mut ctx, args),
        Commands::Cards(args) => cmd_cards(&mut ctx, args),
        Commands::Comments(args) => cmd_comments(&mut ctx, args),
        Commands::Report(args) => cmd_report(&mut ctx, args),
        Commands::Config(_) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Context {
    client: Client<HttpGateway, FileStorage>,
    config: ClientConfig,
    config_path: PathBuf,
    json: bool,
}

impl Context {
    fn open(config: ClientConfig, config_path: PathBuf, json: bool) -> Self {
        let gateway = Arc::new(HttpGateway::new(&config.api));
        let storage = FileStorage::open(&config_io::state_dir(&config));
        Context {
            client: Client::new(gateway, storage),
            config,
            config_path,
            json,
        }
    }

    fn require_login(&self) -> CmdResult {
        if self.client.is_logged_in() {
            Ok(())
        } else {
            Err("not logged in (run `tb login <email>`)".into())
        }
    }
}

/// Turn a degraded listing into an error for the command line
fn loaded<T>(listing: Listing<T>, what: &str) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    match listing.failure {
        Some(e) => Err(format!("could not load {}: {}", what, e).into()),
        None => Ok(listing.items),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

/// `none` (any case) clears an optional reference
fn optional_ref(value: &str) -> Option<&str> {
    if value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value)
    }
}

fn read_password(given: Option<String>) -> Result<String, std::io::Error> {
    if let Some(pw) = given {
        return Ok(pw);
    }
    eprint!("password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ---------------------------------------------------------------------------
// Session commands
// ---------------------------------------------------------------------------

fn cmd_login(ctx: &mut Context, args: LoginArgs) -> CmdResult {
    let password = read_password(args.password)?;
    let credentials = Credentials {
        email: args.email,
        password,
    };
    let Some(info) = ctx.client.login(&credentials) else {
        return Err(format!("login failed for {}", credentials.email).into());
    };
    let user_id = info.user_id.map(|id| id.to_string());
    if ctx.json {
        #[derive(Serialize)]
        struct LoginJson {
            logged_in: bool,
            user_id: Option<String>,
        }
        return print_json(&LoginJson {
            logged_in: true,
            user_id,
        });
    }
    match user_id {
        Some(id) => println!("Logged in as user {}", id),
        None => println!("Logged in"),
    }
    Ok(())
}

fn cmd_logout(ctx: &mut Context) -> CmdResult {
    let was_logged_in = ctx.client.logout();
    if ctx.json {
        return print_json(&serde_json::json!({ "was_logged_in": was_logged_in }));
    }
    if was_logged_in {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

fn cmd_register(ctx: &Context, args: RegisterArgs) -> CmdResult {
    let password = read_password(args.password)?;
    let user = ctx.client.register(&Registration {
        name: args.name,
        email: args.email,
        password,
    })?;
    if ctx.json {
        return print_json(&user);
    }
    println!("Registered {}", format_user_line(&user));
    println!("Run `tb login {}` to start a session.", user.email);
    Ok(())
}

fn cmd_status(ctx: &Context) -> CmdResult {
    let session = ctx.client.session();
    let status = StatusJson {
        logged_in: session.is_logged_in(),
        user_id: session.session().user_id().map(|id| id.to_string()),
        api_url: ctx.config.api.base_url.clone(),
        config_path: ctx.config_path.display().to_string(),
        session_file: session.storage().path().display().to_string(),
    };
    if ctx.json {
        return print_json(&status);
    }
    match (&status.logged_in, &status.user_id) {
        (true, Some(id)) => println!("logged in: yes (user {})", id),
        (true, None) => println!("logged in: yes"),
        (false, _) => println!("logged in: no"),
    }
    println!("api: {}", status.api_url);
    println!("config: {}", status.config_path);
    println!("session: {}", status.session_file);
    Ok(())
}

fn cmd_users(ctx: &mut Context) -> CmdResult {
    ctx.require_login()?;
    let users = loaded(ctx.client.store_mut().fetch_users(), "users")?;
    if ctx.json {
        return print_json(&users);
    }
    if users.is_empty() {
        println!("No users.");
    }
    for user in &users {
        println!("{}", format_user_line(user));
    }
    Ok(())
}

fn cmd_board(ctx: &mut Context, args: BoardArgs) -> CmdResult {
    ctx.require_login()?;
    let pid = ProjectId::parse(&args.project);
    let store = ctx.client.store_mut();
    let project = store.fetch_project(&pid)?;
    loaded(store.fetch_tasks(&pid), "tasks")?;
    loaded(store.fetch_cards(&pid), "cards")?;

    let cards: Vec<_> = store.cards().filter(|c| c.project_id == pid).collect();
    let unlisted = store.unlisted_tasks(&pid);
    if ctx.json {
        return print_json(&BoardJson {
            project: &project,
            cards,
            unlisted,
        });
    }
    print_lines(&format_board(&project, &cards, &unlisted));
    Ok(())
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

fn cmd_projects(ctx: &mut Context, args: ProjectsCmd) -> CmdResult {
    ctx.require_login()?;
    match args.action {
        None | Some(ProjectsAction::List) => cmd_projects_list(ctx),
        Some(ProjectsAction::Show(a)) => cmd_projects_show(ctx, a),
        Some(ProjectsAction::Create(a)) => cmd_projects_create(ctx, a),
        Some(ProjectsAction::Update(a)) => cmd_projects_update(ctx, a),
        Some(ProjectsAction::Delete(a)) => cmd_projects_delete(ctx, a),
        Some(ProjectsAction::Members(a)) => cmd_members(ctx, a),
    }
}

fn cmd_projects_list(ctx: &mut Context) -> CmdResult {
    let projects = loaded(ctx.client.store_mut().fetch_projects(), "projects")?;
    if ctx.json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects.");
        println!();
        println!("Run `tb projects create <name>` to start one.");
    }
    for project in &projects {
        println!("{}", format_project_line(project));
    }
    Ok(())
}

fn cmd_projects_show(ctx: &mut Context, args: ProjectIdArg) -> CmdResult {
    let project = ctx
        .client
        .store_mut()
        .fetch_project(&ProjectId::parse(&args.id))?;
    if ctx.json {
        return print_json(&project);
    }
    println!("{}", format_project_line(&project));
    Ok(())
}

fn cmd_projects_create(ctx: &mut Context, args: ProjectCreateArgs) -> CmdResult {
    let members = args
        .members
        .iter()
        .map(|m| m.parse::<MemberAssignment>())
        .collect::<Result<Vec<_>, _>>()?;
    let creation = ctx.client.store_mut().create_project(&NewProject {
        name: args.name,
        description: args.description,
        members,
    })?;
    if ctx.json {
        return print_json(&creation_to_json(&creation));
    }
    print_lines(&format_creation(&creation));
    Ok(())
}

fn cmd_projects_update(ctx: &mut Context, args: ProjectUpdateArgs) -> CmdResult {
    if args.name.is_none() && args.description.is_none() {
        return Err("nothing to change (use --name and/or --description)".into());
    }
    let store = ctx.client.store_mut();
    let mut project = store.fetch_project(&ProjectId::parse(&args.id))?;
    if let Some(name) = args.name {
        project.name = name;
    }
    if let Some(desc) = args.description {
        project.description = Some(desc).filter(|d| !d.is_empty());
    }
    let updated = store.update_project(&project)?;
    if ctx.json {
        return print_json(&updated);
    }
    println!("Updated {}", format_project_line(&updated));
    Ok(())
}

fn cmd_projects_delete(ctx: &mut Context, args: ProjectIdArg) -> CmdResult {
    ctx.client
        .store_mut()
        .delete_project(&ProjectId::parse(&args.id))?;
    if ctx.json {
        return print_json(&DeletedJson::new("project", &args.id));
    }
    println!("Deleted project {}", args.id);
    Ok(())
}

fn cmd_members(ctx: &mut Context, args: MembersCmd) -> CmdResult {
    let pid = ProjectId::parse(&args.project);
    let store = ctx.client.store_mut();
    let member = match args.action {
        None => {
            let members = loaded(store.fetch_project_users(&pid), "members")?;
            if ctx.json {
                return print_json(&members);
            }
            if members.is_empty() {
                println!("No members.");
            }
            for member in &members {
                println!("{}", format_member_line(member));
            }
            return Ok(());
        }
        Some(MembersAction::Add { member }) => {
            let m: MemberAssignment = member.parse()?;
            store.assign_member(&pid, &m.user_id, &m.permissions)?
        }
        Some(MembersAction::Set { member }) => {
            let m: MemberAssignment = member.parse()?;
            store.update_member_permissions(&pid, &m.user_id, &m.permissions)?
        }
        Some(MembersAction::Remove { user }) => {
            store.remove_member(&pid, &UserId::parse(&user))?;
            if ctx.json {
                return print_json(&DeletedJson {
                    project: Some(pid.to_string()),
                    ..DeletedJson::new("member", &user)
                });
            }
            println!("Removed user {} from project {}", user, pid);
            return Ok(());
        }
    };
    if ctx.json {
        return print_json(&member);
    }
    println!("{}", format_member_line(&member));
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

fn cmd_tasks(ctx: &mut Context, args: TasksCmd) -> CmdResult {
    ctx.require_login()?;
    let json = ctx.json;
    let store = ctx.client.store_mut();
    let task = match args.action {
        TasksAction::List(a) => {
            let pid = ProjectId::parse(&a.project);
            let status = a.status.as_deref().map(str::parse::<TaskStatus>).transpose()?;
            let card = a.card.as_deref().map(CardId::parse);
            let tasks: Vec<_> = loaded(store.fetch_tasks(&pid), "tasks")?
                .into_iter()
                .filter(|t| status.is_none_or(|s| t.status == s))
                .filter(|t| card.is_none() || t.card_id == card)
                .collect();
            if json {
                return print_json(&tasks);
            }
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in &tasks {
                println!("{}", format_task_line(task));
            }
            return Ok(());
        }
        TasksAction::Show(a) => {
            let task = store.fetch_task(&TaskId::parse(&a.id))?;
            if json {
                return print_json(&task);
            }
            print_lines(&format_task_detail(&task));
            return Ok(());
        }
        TasksAction::Add(a) => {
            let data = NewTask {
                title: a.title,
                description: a.description,
                status: a.status.as_deref().map(str::parse::<TaskStatus>).transpose()?,
                priority: a
                    .priority
                    .as_deref()
                    .map(str::parse::<TaskPriority>)
                    .transpose()?,
                card_id: a.card.as_deref().map(CardId::parse),
                assigned_user_id: a.assign.as_deref().map(UserId::parse),
            };
            store.create_task(&ProjectId::parse(&a.project), &data)?
        }
        TasksAction::Edit(a) => {
            if a.title.is_none() && a.description.is_none() {
                return Err("nothing to change (use --title and/or --description)".into());
            }
            let mut task = store.fetch_task(&TaskId::parse(&a.id))?;
            if let Some(title) = a.title {
                task.title = title;
            }
            if let Some(desc) = a.description {
                task.description = Some(desc).filter(|d| !d.is_empty());
            }
            store.update_task(&task)?
        }
        TasksAction::Status(a) => {
            let status: TaskStatus = a.value.parse()?;
            store.update_task_status(&TaskId::parse(&a.id), status)?
        }
        TasksAction::Priority(a) => {
            let priority: TaskPriority = a.value.parse()?;
            store.update_task_priority(&TaskId::parse(&a.id), priority)?
        }
        TasksAction::Assign(a) => {
            let user = optional_ref(&a.value).map(UserId::parse);
            store.update_task_assigned_user(&TaskId::parse(&a.id), user.as_ref())?
        }
        TasksAction::Card(a) => {
            let id = TaskId::parse(&a.id);
            // load first so the move knows the card it leaves
            store.fetch_task(&id)?;
            let card = optional_ref(&a.value).map(CardId::parse);
            store.update_task_card(&id, card.as_ref())?
        }
        TasksAction::Delete(a) => {
            store.delete_task(&TaskId::parse(&a.id))?;
            if json {
                return print_json(&DeletedJson::new("task", &a.id));
            }
            println!("Deleted task {}", a.id);
            return Ok(());
        }
    };
    if json {
        return print_json(&task);
    }
    println!("{}", format_task_line(&task));
    Ok(())
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

fn cmd_cards(ctx: &mut Context, args: CardsCmd) -> CmdResult {
    ctx.require_login()?;
    let json = ctx.json;
    let store = ctx.client.store_mut();
    match args.action {
        CardsAction::List { project } => {
            let cards = loaded(store.fetch_cards(&ProjectId::parse(&project)), "cards")?;
            if json {
                return print_json(&cards);
            }
            if cards.is_empty() {
                println!("No cards.");
            }
            for card in &cards {
                println!("{} ({})  {} tasks", card.title, card.id, card.tasks.len());
            }
        }
        CardsAction::Show { id } => {
            let card = store.fetch_card(&CardId::parse(&id))?;
            if json {
                return print_json(&card);
            }
            print_lines(&format_card(&card));
        }
        CardsAction::Add(a) => {
            let card = store.create_card(&ProjectId::parse(&a.project), &NewCard {
                title: a.title,
                position: a.position,
            })?;
            if json {
                return print_json(&card);
            }
            println!("Added card {} ({})", card.title, card.id);
        }
        CardsAction::Rename { id, title } => {
            let current = store.fetch_card(&CardId::parse(&id))?;
            let mut update = CardUpdate::from(&current);
            update.title = title;
            let card = store.update_card(&update)?;
            if json {
                return print_json(&card);
            }
            println!("Renamed card {} to {}", card.id, card.title);
        }
        CardsAction::Delete { id } => {
            store.delete_card(&CardId::parse(&id))?;
            if json {
                return print_json(&DeletedJson::new("card", &id));
            }
            println!("Deleted card {} (its tasks are kept)", id);
        }
        CardsAction::Assign { card, task } => {
            let task = store.assign_task_to_card(&CardId::parse(&card), &TaskId::parse(&task))?;
            if json {
                return print_json(&task);
            }
            println!("{}  -> card {}", format_task_line(&task), card);
        }
        CardsAction::Unassign { card, task } => {
            let task =
                store.remove_task_from_card(&CardId::parse(&card), &TaskId::parse(&task))?;
            if json {
                return print_json(&task);
            }
            println!("{}  (off card {})", format_task_line(&task), card);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Comments and reports
// ---------------------------------------------------------------------------

fn cmd_comments(ctx: &mut Context, args: CommentsCmd) -> CmdResult {
    ctx.require_login()?;
    let store = ctx.client.store();
    let comment = match args.action {
        CommentsAction::List { task } => {
            let comments = loaded(store.fetch_task_comments(&TaskId::parse(&task)), "comments")?;
            if ctx.json {
                return print_json(&comments);
            }
            if comments.is_empty() {
                println!("No comments.");
            }
            for comment in &comments {
                println!("{}", format_comment(comment));
            }
            return Ok(());
        }
        CommentsAction::Add { task, content } => {
            store.add_comment(&TaskId::parse(&task), &content)?
        }
        CommentsAction::Edit { id, content } => {
            store.update_comment(&CommentId::parse(&id), &content)?
        }
        CommentsAction::Delete { id } => {
            store.delete_comment(&CommentId::parse(&id))?;
            if ctx.json {
                return print_json(&DeletedJson::new("comment", &id));
            }
            println!("Deleted comment {}", id);
            return Ok(());
        }
    };
    if ctx.json {
        return print_json(&comment);
    }
    println!("{}", format_comment(&comment));
    Ok(())
}

fn cmd_report(ctx: &mut Context, args: ReportCmd) -> CmdResult {
    ctx.require_login()?;
    let metrics = match args.action {
        ReportAction::Project { id } => {
            let report = ctx
                .client
                .store_mut()
                .fetch_project_report(&ProjectId::parse(&id))?;
            if ctx.json {
                return print_json(&report);
            }
            println!("Project {}", id);
            report.metrics
        }
        ReportAction::User { id } => {
            let user = match id {
                Some(id) => UserId::parse(&id),
                None => ctx
                    .client
                    .session()
                    .session()
                    .user_id()
                    .cloned()
                    .ok_or("no user id in the session; pass one explicitly")?,
            };
            let report = ctx.client.store_mut().fetch_user_report(&user)?;
            if ctx.json {
                return print_json(&report);
            }
            println!("User {}", user);
            report.metrics
        }
    };
    for line in format_metrics(&metrics) {
        println!("  {}", line);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(args: ConfigCmd, path: &Path, json: bool) -> CmdResult {
    match args.action {
        None | Some(ConfigAction::Show) => {
            let config = config_io::load_config(Some(path))?;
            if json {
                #[derive(Serialize)]
                struct ConfigJson<'a> {
                    path: String,
                    state_dir: String,
                    #[serde(flatten)]
                    config: &'a ClientConfig,
                }
                return print_json(&ConfigJson {
                    path: path.display().to_string(),
                    state_dir: config_io::state_dir(&config).display().to_string(),
                    config: &config,
                });
            }
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
            println!("# session state: {}", config_io::state_dir(&config).display());
            Ok(())
        }
        Some(ConfigAction::Set { key, value }) => {
            let mut doc = config_io::read_document(path)?;
            config_io::set_value(&mut doc, &key, &value)?;
            config_io::write_document(path, &doc)?;
            if !json {
                println!("Set {} = {}", key, value);
            }
            Ok(())
        }
    }
}
