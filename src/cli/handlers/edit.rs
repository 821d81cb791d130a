use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::{Session, flush_notifications, parse_date, print_lines};
use crate::cli::commands::OrderArg;
use crate::cli::output::{format_order_detail, format_transition};
use crate::context::DataContext;
use crate::io::store_io::Collection;
use crate::io::watcher::{StoreEvent, StoreWatcher};
use crate::model::order::{Attachment, OrderTask, ServiceOrder};
use crate::ops::autosave::{AutoSave, ExternalUpdate, SaveStatus};

/// How often the loop wakes to fire debounced saves and drain the watcher
const TICK: Duration = Duration::from_millis(100);

const HELP: &[&str] = &[
    "  key=value     edit a field (client, title, value, costs, responsible, due,",
    "                task=+Title, done=N, undone=N, file=name|url, custom.<key>)",
    "  status <S>    save, then move the order to stage S",
    "  save          save now",
    "  show          print the form",
    "  quit          save and exit (also on end of input)",
];

/// Apply one `key=value` assignment to an order form
pub(crate) fn apply_field(order: &mut ServiceOrder, key: &str, value: &str) -> Result<(), String> {
    let parse_amount = |v: &str| -> Result<f64, String> {
        match v.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => Ok(n),
            _ => Err(format!("invalid amount for {}: '{}'", key, v)),
        }
    };
    let parse_index = |v: &str| -> Result<usize, String> {
        match v.trim().parse::<usize>() {
            Ok(n) if n >= 1 && n <= order.tasks.len() => Ok(n - 1),
            _ => Err(format!("no task number {}", v.trim())),
        }
    };

    match key {
        "client" => {
            if value.trim().is_empty() {
                return Err("client name is required".into());
            }
            order.client = value.trim().to_string();
        }
        "title" => order.title = value.to_string(),
        "value" => order.value = parse_amount(value)?,
        "costs" => order.costs = parse_amount(value)?,
        "responsible" => {
            order.responsible = Some(value.trim().to_string()).filter(|s| !s.is_empty());
        }
        "due" => {
            order.expected_delivery_date = if value.trim().is_empty() {
                None
            } else {
                Some(parse_date(value)?)
            };
        }
        "task" => {
            let title = value
                .strip_prefix('+')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or("add a task with task=+Title")?;
            order.tasks.push(OrderTask {
                title: title.to_string(),
                done: false,
            });
        }
        "done" => {
            let i = parse_index(value)?;
            order.tasks[i].done = true;
        }
        "undone" => {
            let i = parse_index(value)?;
            order.tasks[i].done = false;
        }
        "file" => {
            let (name, url) = value.split_once('|').ok_or("attach a file with file=name|url")?;
            order.files.push(Attachment {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            });
        }
        "status" | "progress" => {
            return Err(format!("{} follows the workflow: use `studio status <order> <stage>`", key));
        }
        _ => match key.strip_prefix("custom.") {
            Some(field) if !field.is_empty() => {
                if value.is_empty() {
                    order.custom_fields.shift_remove(field);
                } else {
                    order.custom_fields.insert(field.to_string(), value.to_string());
                }
            }
            _ => return Err(format!("unknown field: {}", key)),
        },
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum EditCommand {
    Set(String, String),
    Status(String),
    Save,
    Show,
    Help,
    Quit,
    Empty,
}

fn parse_edit_command(line: &str) -> Result<EditCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(EditCommand::Empty);
    }
    if let Some((key, value)) = line.split_once('=') {
        return Ok(EditCommand::Set(key.trim().to_string(), value.to_string()));
    }
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    match word {
        "status" if !rest.trim().is_empty() => Ok(EditCommand::Status(rest.trim().to_string())),
        "save" | "w" => Ok(EditCommand::Save),
        "show" => Ok(EditCommand::Show),
        "help" | "?" => Ok(EditCommand::Help),
        "quit" | "q" | "exit" => Ok(EditCommand::Quit),
        _ => Err(format!("unknown command: {} (try `help`)", line)),
    }
}

/// Read stdin on its own thread so the loop can keep ticking
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn run_command(
    cmd: EditCommand,
    autosave: &mut AutoSave,
    ctx: &mut DataContext,
    order_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        EditCommand::Set(key, value) => {
            let mut draft = autosave.form().clone();
            apply_field(&mut draft, &key, &value)?;
            autosave.edit(Instant::now(), |form| *form = draft);
        }
        EditCommand::Status(to) => {
            autosave.save_now(Instant::now(), ctx);
            if let SaveStatus::Error(e) = autosave.status() {
                return Err(format!("stage not changed, save failed: {}", e).into());
            }
            let transition = ctx.change_status(order_id, &to)?;
            let order = ctx.order(order_id)?.clone();
            println!("{}", format_transition(&order.number, transition.as_ref(), &order.status));
            autosave.external_update(order);
        }
        EditCommand::Save => {
            if !autosave.save_now(Instant::now(), ctx) {
                println!("nothing to save");
            }
        }
        EditCommand::Show => print_lines(&format_order_detail(autosave.form())),
        EditCommand::Help => {
            for line in HELP {
                println!("{}", line);
            }
        }
        EditCommand::Quit | EditCommand::Empty => {}
    }
    Ok(())
}

/// Feed watcher events into the context and offer the reloaded order to
/// the form. Returns false when the order disappeared.
fn sync_external(
    events: Vec<StoreEvent>,
    autosave: &mut AutoSave,
    ctx: &mut DataContext,
    order_id: &str,
) -> bool {
    for event in events {
        if let Err(e) = ctx.apply_event(&event) {
            tracing::warn!(error = %e, "could not reload after store change");
            continue;
        }
        let StoreEvent::Collections(collections) = &event else {
            continue;
        };
        if !collections.contains(&Collection::Orders) {
            continue;
        }
        let Ok(remote) = ctx.order(order_id) else {
            return false;
        };
        match autosave.external_update(remote.clone()) {
            ExternalUpdate::Merged => println!("[reloaded: changed elsewhere]"),
            ExternalUpdate::Deferred => tracing::debug!("external change ignored while editing"),
            ExternalUpdate::Unchanged => {}
        }
    }
    true
}

pub fn cmd_edit(args: OrderArg, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = session.open()?;
    let order = ctx.order(&args.order)?.clone();
    let order_id = order.id.clone();
    let mut autosave = AutoSave::new(order, &ctx.studio().config.autosave);

    let watcher = match StoreWatcher::start(ctx.store_dir()) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "store watcher unavailable, external changes won't show");
            None
        }
    };
    let lines = spawn_stdin_reader();

    println!("editing {} (type `help` for commands)", autosave.form().number);
    let mut shown = autosave.status().clone();

    loop {
        match lines.recv_timeout(TICK) {
            Ok(line) => match parse_edit_command(&line) {
                Ok(EditCommand::Quit) => break,
                Ok(cmd) => {
                    if let Err(e) = run_command(cmd, &mut autosave, &mut ctx, &order_id) {
                        eprintln!("error: {}", e);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        autosave.tick(Instant::now(), &mut ctx);
        if let Some(watcher) = &watcher
            && !sync_external(watcher.poll(), &mut autosave, &mut ctx, &order_id)
        {
            println!("order was deleted elsewhere");
            return Ok(());
        }

        if *autosave.status() != shown {
            shown = autosave.status().clone();
            println!("[{}]", shown);
        }
        flush_notifications(&mut ctx);
    }

    autosave.save_now(Instant::now(), &mut ctx);
    if let SaveStatus::Error(e) = autosave.status() {
        return Err(format!("unsaved changes: {}", e).into());
    }
    Ok(())
}
