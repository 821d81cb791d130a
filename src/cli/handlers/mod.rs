mod edit;
mod init;
pub use edit::cmd_edit;
pub use init::cmd_init;

use std::path::PathBuf;

use chrono::{Local, NaiveDate};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::context::{DataContext, NewOrder};
use crate::io::store_io;
use crate::model::config::SavedView;
use crate::model::finance::EntryKind;
use crate::model::sales::{OpportunityStatus, QuoteStatus};
use crate::model::user::Role;
use crate::model::workflow::KanbanColumn;
use crate::ops::board::{self, OrderFilter};
use crate::ops::{activity_ops, chat_ops, finance, portal, sales_ops, status, timeline};

/// Where and as whom a command runs
pub struct Session {
    start: PathBuf,
    actor: Option<String>,
    json: bool,
}

impl Session {
    fn from_cli(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let start = match &cli.studio_dir {
            Some(dir) => std::fs::canonicalize(dir)
                .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
            None => std::env::current_dir()?,
        };
        Ok(Session {
            start,
            actor: cli.actor.clone(),
            json: cli.json,
        })
    }

    fn open(&self) -> Result<DataContext, Box<dyn std::error::Error>> {
        let root = store_io::discover_store(&self.start)?;
        Ok(DataContext::open(&root, self.actor.as_deref())?)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_cli(&cli)?;

    match cli.command {
        Commands::Init(args) => cmd_init(args, &session.start),

        // Read commands
        Commands::Orders(args) => cmd_orders(args, &session),
        Commands::Show(args) => cmd_show(args, &session),
        Commands::Board(args) => cmd_board(args, &session),
        Commands::Timeline(args) => cmd_timeline(args, &session),
        Commands::Log(args) => cmd_log(args, &session),
        Commands::Portal(args) => cmd_portal(args, &session),
        Commands::Progress => cmd_progress(&session),

        // Order writes
        Commands::Add(args) => cmd_add(args, &session),
        Commands::Status(args) => cmd_status(args, &session),
        Commands::Set(args) => cmd_set(args, &session),
        Commands::Comment(args) => cmd_comment(args, &session),
        Commands::Delete(args) => cmd_delete(args, &session),
        Commands::Share(args) => cmd_share(args, &session),
        Commands::Edit(args) => cmd_edit(args, &session),

        // Everything else
        Commands::Quote(args) => cmd_quote(args, &session),
        Commands::Opportunity(args) => cmd_opportunity(args, &session),
        Commands::Finance(args) => cmd_finance(args, &session),
        Commands::Chat(args) => cmd_chat(args, &session),
        Commands::Users(args) => cmd_users(args, &session),
        Commands::Column(args) => cmd_column(args, &session),
        Commands::View(args) => cmd_view(args, &session),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD", s))
}

fn parse_optional_date(s: Option<&str>) -> Result<Option<NaiveDate>, String> {
    s.map(parse_date).transpose()
}

/// Combine a saved view (if named) with explicit flags; flags win
fn resolve_view(ctx: &DataContext, args: &FilterArgs) -> Result<SavedView, Box<dyn std::error::Error>> {
    let mut view = match &args.view {
        Some(name) => ctx
            .studio()
            .config
            .view(name)
            .cloned()
            .ok_or_else(|| format!("view not found: {}", name))?,
        None => SavedView::default(),
    };
    if args.search.is_some() {
        view.search = args.search.clone();
    }
    if args.responsible.is_some() {
        view.responsible = args.responsible.clone();
    }
    if let Some(from) = parse_optional_date(args.from.as_deref())? {
        view.from = Some(from);
    }
    if let Some(to) = parse_optional_date(args.to.as_deref())? {
        view.to = Some(to);
    }
    Ok(view)
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

/// Toasts go to stderr so stdout stays parseable
fn flush_notifications(ctx: &mut DataContext) {
    for note in ctx.drain_notifications() {
        eprintln!("{}", format_notification(&note));
    }
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_orders(args: FilterArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = session.open()?;
    let filter = OrderFilter::from_view(&resolve_view(&ctx, &args)?);
    let orders = board::filter_orders(&ctx.studio().orders, &filter);

    if session.json {
        println!("{}", serde_json::to_string_pretty(&orders)?);
    } else {
        for order in orders {
            println!("{}", format_order_line(order));
        }
    }
    Ok(())
}

fn cmd_show(args: OrderArg, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = session.open()?;
    let order = ctx.order(&args.order)?;
    if session.json {
        println!("{}", serde_json::to_string_pretty(order)?);
    } else {
        print_lines(&format_order_detail(order));
    }
    Ok(())
}

fn cmd_board(args: FilterArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = session.open()?;
    let filter = OrderFilter::from_view(&resolve_view(&ctx, &args)?);
    let board = board::build_board(&ctx.studio().orders, ctx.workflow(), &filter);

    if session.json {
        println!("{}", serde_json::to_string_pretty(&board_to_json(&board))?);
    } else {
        print_lines(&format_board(&board));
    }
    Ok(())
}

fn cmd_timeline(args: FilterArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = session.open()?;
    let filter = OrderFilter::from_view(&resolve_view(&ctx, &args)?);
    let orders = board::filter_orders(&ctx.studio().orders, &filter);
    let day_width = ctx.studio().config.timeline.day_width;

    match timeline::build_timeline(&orders, day_width) {
        Some(t) if session.json => println!("{}", serde_json::to_string_pretty(&timeline_to_json(&t))?),
        Some(t) => print_lines(&format_timeline(&t)),
        None if session.json => println!("null"),
        None => println!("no orders"),
    }
    Ok(())
}

fn cmd_log(args: LogArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = session.open()?;
    let entries = activity_ops::recent(&ctx.studio().activity, args.user.as_deref(), args.limit);
    if session.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in entries {
            println!("{}", format_activity(entry));
        }
    }
    Ok(())
}

fn cmd_portal(args: PortalArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = session.open()?;
    let token = portal::token_from_path(&args.link).ok_or(portal::PortalError::NotFound)?;
    let view = ctx.portal(token)?;
    if session.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_lines(&format_portal(&view));
    }
    Ok(())
}

fn cmd_progress(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = session.open()?;
    let scale = status::progress_scale(ctx.workflow());
    if session.json {
        let stages: Vec<StageJson> = scale
            .iter()
            .map(|&(status, progress)| StageJson { status, progress })
            .collect();
        println!("{}", serde_json::to_string_pretty(&stages)?);
    } else {
        for (status, progress) in scale {
            println!("{:<16} {:>3}%", status, progress);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Order write handlers
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    let draft = NewOrder {
        client: args.client,
        title: args.title,
        value: args.value,
        costs: args.costs,
        responsible: args.responsible,
        expected_delivery_date: parse_optional_date(args.due.as_deref())?,
        status: args.status,
    };
    let order = ctx.create_order(draft)?;
    if session.json {
        println!("{}", serde_json::to_string_pretty(&order)?);
    } else {
        println!("{}", order.number);
    }
    flush_notifications(&mut ctx);
    Ok(())
}

fn cmd_status(args: StatusArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    let transition = ctx.change_status(&args.order, &args.status)?;
    let order = ctx.order(&args.order)?;

    if session.json {
        let json = TransitionJson {
            order: &order.number,
            from: transition.as_ref().map_or(order.status.as_str(), |t| t.from.as_str()),
            to: &order.status,
            progress: order.progress,
            changed: transition.is_some(),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", format_transition(&order.number, transition.as_ref(), &order.status));
    }
    flush_notifications(&mut ctx);
    Ok(())
}

fn cmd_set(args: SetArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    let mut order = ctx.order(&args.order)?.clone();
    for field in &args.fields {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", field))?;
        edit::apply_field(&mut order, key.trim(), value)?;
    }
    let number = order.number.clone();
    ctx.update_order(order)?;
    println!("{} updated", number);
    Ok(())
}

fn cmd_comment(args: CommentArgs, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    ctx.add_comment(&args.order, &args.text)?;
    Ok(())
}

fn cmd_delete(args: OrderArg, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    let order = ctx.delete_order(&args.order)?;
    println!("deleted {}", order.number);
    Ok(())
}

fn cmd_share(args: OrderArg, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    let token = ctx.share_order(&args.order)?;
    println!("{}", portal::portal_path(&token));
    Ok(())
}

// ---------------------------------------------------------------------------
// Sales handlers
// ---------------------------------------------------------------------------

fn cmd_quote(args: QuoteCmd, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    match args.action {
        QuoteAction::Add(add) => {
            let items = add
                .items
                .iter()
                .map(|spec| {
                    sales_ops::parse_quote_item(spec)
                        .ok_or_else(|| format!("invalid item '{}': expected description:quantity:price", spec))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let quote = ctx.create_quote(&add.client, &add.description, items)?;
            println!("{}", quote.id);
        }
        QuoteAction::List => {
            let quotes = &ctx.studio().quotes;
            if session.json {
                let json: Vec<QuoteJson> = quotes
                    .iter()
                    .map(|quote| QuoteJson {
                        quote,
                        total: quote.total(),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                for quote in quotes {
                    println!("{}", format_quote(quote));
                }
            }
        }
        QuoteAction::Status(args) => {
            let status = QuoteStatus::parse_status(&args.status)
                .ok_or_else(|| format!("unknown quote status: {}", args.status))?;
            ctx.set_quote_status(&args.id, status)?;
        }
        QuoteAction::Convert(args) => {
            let order = ctx.convert_quote(&args.id)?;
            println!("{}", order.number);
        }
    }
    flush_notifications(&mut ctx);
    Ok(())
}

fn cmd_opportunity(args: OpportunityCmd, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    match args.action {
        OpportunityAction::Add(add) => {
            let opportunity = ctx.create_opportunity(&add.client, &add.title, add.value)?;
            println!("{}", opportunity.id);
        }
        OpportunityAction::List => {
            let opportunities = &ctx.studio().opportunities;
            if session.json {
                println!("{}", serde_json::to_string_pretty(opportunities)?);
            } else {
                for opportunity in opportunities {
                    println!("{}", format_opportunity(opportunity));
                }
            }
        }
        OpportunityAction::Status(args) => {
            let status = OpportunityStatus::parse_status(&args.status)
                .ok_or_else(|| format!("unknown opportunity status: {}", args.status))?;
            ctx.set_opportunity_status(&args.id, status)?;
        }
        OpportunityAction::Convert(args) => {
            let order = ctx.convert_opportunity(&args.id)?;
            println!("{}", order.number);
        }
    }
    flush_notifications(&mut ctx);
    Ok(())
}

// ---------------------------------------------------------------------------
// Finance handlers
// ---------------------------------------------------------------------------

fn cmd_finance(args: FinanceCmd, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    match args.action {
        FinanceAction::Add(add) => {
            let kind = EntryKind::parse_kind(&add.kind)
                .ok_or_else(|| format!("unknown entry kind '{}': use income or expense", add.kind))?;
            let date = match add.date.as_deref() {
                Some(d) => parse_date(d)?,
                None => Local::now().date_naive(),
            };
            let entry =
                ctx.add_financial_entry(kind, add.amount, &add.description, date, add.order.as_deref())?;
            println!("{}", entry.id);
        }
        FinanceAction::Summary => {
            let summary = finance::summarize(&ctx.studio().orders, &ctx.studio().finance);
            if session.json {
                println!("{}", serde_json::to_string_pretty(&finance_to_json(&summary))?);
            } else {
                print_lines(&format_finance(&summary));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Chat handlers
// ---------------------------------------------------------------------------

fn cmd_chat(args: ChatCmd, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    match args.action {
        ChatAction::Channel(add) => {
            let channel = ctx.create_channel(&add.name)?;
            println!("{}", channel.id);
        }
        ChatAction::Channels => {
            let channels = &ctx.studio().channels;
            if session.json {
                println!("{}", serde_json::to_string_pretty(channels)?);
            } else {
                for channel in channels {
                    println!("#{}", channel.name);
                }
            }
        }
        ChatAction::Post(post) => {
            let message = ctx.post_message(&post.channel, &post.text)?;
            println!("{}", message.id);
        }
        ChatAction::List(list) => {
            let channel = ctx
                .studio()
                .find_channel(&list.channel)
                .ok_or_else(|| format!("channel not found: {}", list.channel))?;
            let messages = chat_ops::channel_messages(&ctx.studio().messages, &channel.id);
            let page_size = ctx.studio().config.chat.page_size;
            let mut loaded = page_size.min(messages.len());
            for _ in 0..list.more {
                loaded = chat_ops::load_more(loaded, page_size, messages.len());
            }
            let page = chat_ops::page(&messages, loaded);
            if session.json {
                let json = ChatPageJson {
                    messages: page.messages,
                    has_more: page.has_more,
                };
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                if page.has_more {
                    println!("… older messages: --more {}", list.more + 1);
                }
                for message in page.messages {
                    println!("{}", format_message(message));
                }
            }
        }
        ChatAction::React(react) => {
            let added = ctx.toggle_reaction(&react.message, &react.emoji)?;
            println!("{} {}", if added { "added" } else { "removed" }, react.emoji);
        }
    }
    flush_notifications(&mut ctx);
    Ok(())
}

// ---------------------------------------------------------------------------
// Users, columns and views
// ---------------------------------------------------------------------------

fn cmd_users(args: UsersCmd, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    match args.action {
        UsersAction::Add(add) => {
            let role = Role::parse_role(&add.role)
                .ok_or_else(|| format!("unknown role '{}': use admin, assistant or viewer", add.role))?;
            let user = ctx.add_user(&add.id, &add.name, role)?;
            println!("{}", user.id);
        }
        UsersAction::List => {
            let users = &ctx.studio().users;
            if session.json {
                println!("{}", serde_json::to_string_pretty(users)?);
            } else {
                for user in users {
                    println!("{:<12} {:<10} {}", user.id, user.role, user.name);
                }
            }
        }
        UsersAction::Use(args) => {
            ctx.set_session_user(&args.id)?;
            println!("now acting as {}", args.id);
        }
    }
    Ok(())
}

fn cmd_column(args: ColumnCmd, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    match args.action {
        ColumnAction::Add(add) => {
            ctx.add_column(KanbanColumn::new(&add.title, &add.status, &add.color))?;
            for (status, progress) in status::progress_scale(ctx.workflow()) {
                println!("{:<16} {:>3}%", status, progress);
            }
        }
    }
    Ok(())
}

fn cmd_view(args: ViewCmd, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    match args.action {
        ViewAction::Save(save) => {
            let mut view = resolve_view(&ctx, &save.filter)?;
            view.name = save.name;
            ctx.save_view(view)?;
        }
        ViewAction::List => {
            let views = &ctx.studio().config.views;
            if session.json {
                println!("{}", serde_json::to_string_pretty(views)?);
            } else {
                for view in views {
                    let mut parts = Vec::new();
                    if let Some(search) = &view.search {
                        parts.push(format!("search={}", search));
                    }
                    if let Some(responsible) = &view.responsible {
                        parts.push(format!("responsible={}", responsible));
                    }
                    if let Some(from) = view.from {
                        parts.push(format!("from={}", from));
                    }
                    if let Some(to) = view.to {
                        parts.push(format!("to={}", to));
                    }
                    println!("{}  {}", view.name, parts.join(" "));
                }
            }
        }
    }
    Ok(())
}
