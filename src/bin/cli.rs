use std::io::{self, Write};
use std::sync::Arc;

use case_schedule::persistence::{load_template_from_json, save_template_to_json};
use case_schedule::{
    AppConfig, CaseRepository, HolidayFile, HolidaySource, HolidayStore, InMemoryRepository,
    ReplanEngine, SharedCalendar, TracingNotifier, report, telemetry,
};
use chrono::NaiveDate;
use polars::prelude::{DataFrame, PolarsResult};

struct Session {
    engine: ReplanEngine,
    holidays: Arc<dyn HolidayStore>,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn print_table(frame: PolarsResult<DataFrame>) {
    match frame {
        Ok(df) => println!("{}", report::render_text_table(&df)),
        Err(e) => println!("Render error: {}", e),
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                                   Show this help\n  holiday add <YYYY-MM-DD>               Add a holiday\n  holiday remove <YYYY-MM-DD>            Remove a holiday\n  holiday list                           List holidays\n  holiday load <file.csv|file.json>      Import holidays from a file\n  template load <file.json>              Validate and register a template\n  template save <id> <file.json>         Write a registered template to disk\n  template show <id>                     Show a template's steps\n  schedule <template> <YYYY-MM-DD>       Compute a schedule for a goal date\n  case create <case> <template> <goal>   Create a case with its initial schedule\n  show <case>                            Show a case's steps\n  lock <case> <step>                     Lock a step's due date\n  unlock <case> <step>                   Unlock a step's due date\n  set <case> <step> <YYYY-MM-DD> [lock]  Override a step's due date\n  preview <case> <YYYY-MM-DD>            Preview a replan to a new goal date\n  apply <case> <YYYY-MM-DD>              Apply a replan to a new goal date\n  quit|exit                              Exit"
    );
}

fn open_session(config: &AppConfig) -> Result<Session, Box<dyn std::error::Error>> {
    let calendar = SharedCalendar::new(config.calendar.build_calendar()?);
    let (repository, holidays): (Arc<dyn CaseRepository>, Arc<dyn HolidayStore>) =
        match &config.storage.database_path {
            #[cfg(feature = "sqlite")]
            Some(path) => {
                let store = Arc::new(case_schedule::SqliteCaseStore::new(path)?);
                (store.clone() as Arc<dyn CaseRepository>, store as Arc<dyn HolidayStore>)
            }
            _ => {
                let store = Arc::new(InMemoryRepository::new());
                (store.clone() as Arc<dyn CaseRepository>, store as Arc<dyn HolidayStore>)
            }
        };
    for date in calendar.snapshot().holidays() {
        holidays.add_holiday(date)?;
    }
    calendar.refresh_from(holidays.as_ref())?;

    let engine = ReplanEngine::new(repository, Arc::new(TracingNotifier), calendar)
        .with_lock_propagation(config.replan.lock_propagation);
    Ok(Session { engine, holidays })
}

fn holiday_command<'a>(session: &Session, mut parts: impl Iterator<Item = &'a str>) {
    let calendar = session.engine.calendar();
    match (parts.next(), parts.next()) {
        (Some("list"), _) => {
            let holidays = calendar.snapshot().holidays();
            if holidays.is_empty() {
                println!("No holidays.");
            }
            for date in holidays {
                println!("{}", date);
            }
        }
        (Some(action @ ("add" | "remove")), Some(date_s)) => {
            let Some(date) = parse_date(date_s) else {
                println!("Invalid date (YYYY-MM-DD)");
                return;
            };
            let stored = if action == "add" {
                session.holidays.add_holiday(date)
            } else {
                session.holidays.remove_holiday(date)
            };
            match stored {
                Ok(_) => {
                    let changed = if action == "add" {
                        calendar.add_holiday(date)
                    } else {
                        calendar.remove_holiday(date)
                    };
                    match (action, changed) {
                        ("add", true) => println!("Holiday {} added.", date),
                        ("add", false) => println!("{} is already a holiday.", date),
                        (_, true) => println!("Holiday {} removed.", date),
                        (_, false) => println!("{} is not a holiday.", date),
                    }
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        (Some("load"), Some(path)) => {
            let imported = HolidayFile::new(path).list_holidays().and_then(|dates| {
                for date in &dates {
                    session.holidays.add_holiday(*date)?;
                }
                calendar.refresh_from(session.holidays.as_ref())
            });
            match imported {
                Ok(count) => println!("Holidays loaded from {} ({} total).", path, count),
                Err(e) => println!("Error: {}", e),
            }
        }
        _ => println!("Usage: holiday add|remove <YYYY-MM-DD> | holiday list | holiday load <file>"),
    }
}

fn template_command<'a>(session: &Session, mut parts: impl Iterator<Item = &'a str>) {
    match (parts.next(), parts.next(), parts.next()) {
        (Some("load"), Some(path), _) => {
            let template = match load_template_from_json(path) {
                Ok(t) => t,
                Err(e) => {
                    println!("Error: {}", e);
                    return;
                }
            };
            match session.engine.register_template(&template) {
                Ok(warnings) => {
                    println!(
                        "Template {} registered ({} steps).",
                        template.id,
                        template.steps.len()
                    );
                    for warning in warnings {
                        println!("Warning: {}", warning);
                    }
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        (Some("save"), Some(id), Some(path)) => {
            match session.engine.repository().load_template(id) {
                Ok(Some(template)) => match save_template_to_json(&template, path) {
                    Ok(()) => println!("Template {} saved to {}.", id, path),
                    Err(e) => println!("Error: {}", e),
                },
                Ok(None) => println!("Error: template '{}' not found", id),
                Err(e) => println!("Error: {}", e),
            }
        }
        (Some("show"), Some(id), _) => match session.engine.repository().load_template(id) {
            Ok(Some(template)) => print_table(report::definitions_frame(&template.steps)),
            Ok(None) => println!("Error: template '{}' not found", id),
            Err(e) => println!("Error: {}", e),
        },
        _ => println!("Usage: template load <file> | template save <id> <file> | template show <id>"),
    }
}

fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    telemetry::init_tracing(&config.logging.level);
    let session = match open_session(&config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Startup error: {}", e);
            std::process::exit(1);
        }
    };
    let engine = &session.engine;

    println!("Case Schedule (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "holiday" => holiday_command(&session, parts),
            "template" => template_command(&session, parts),
            "schedule" => match (parts.next(), parts.next().and_then(parse_date)) {
                (Some(template_id), Some(goal)) => {
                    match engine.compute_initial_schedule(template_id, goal) {
                        Ok(schedule) => {
                            for warning in &schedule.warnings {
                                println!("Warning: {}", warning);
                            }
                            print_table(report::schedule_frame(&schedule));
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                _ => println!("Usage: schedule <template> <YYYY-MM-DD>"),
            },
            "case" => match (
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next().and_then(parse_date),
            ) {
                (Some("create"), Some(case_id), Some(template_id), Some(goal)) => {
                    match engine.create_case(case_id, template_id, goal) {
                        Ok(steps) => {
                            println!("Case {} created.", case_id);
                            print_table(report::instances_frame(&steps));
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                _ => println!("Usage: case create <case> <template> <YYYY-MM-DD>"),
            },
            "show" => match parts.next() {
                Some(case_id) => match engine.load_case(case_id) {
                    Ok((case, steps)) => {
                        println!(
                            "Case {} (template {}, goal {}, version {})",
                            case.id, case.template_id, case.goal_date, case.version
                        );
                        print_table(report::instances_frame(&steps));
                    }
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("Usage: show <case>"),
            },
            "lock" | "unlock" => match (parts.next(), parts.next()) {
                (Some(case_id), Some(step_id)) => {
                    match engine.set_step_locked(case_id, step_id, cmd == "lock") {
                        Ok(step) => println!(
                            "Step {} {}ed (due {}).",
                            step.template_step_id, cmd, step.due_date
                        ),
                        Err(e) => println!("Error: {}", e),
                    }
                }
                _ => println!("Usage: {} <case> <step>", cmd),
            },
            "set" => {
                let case_id = parts.next();
                let step_id = parts.next();
                let date = parts.next().and_then(parse_date);
                let lock = matches!(parts.next(), Some("lock"));
                match (case_id, step_id, date) {
                    (Some(case_id), Some(step_id), Some(date)) => {
                        match engine.override_step_due_date(case_id, step_id, date, lock) {
                            Ok(step) => println!(
                                "Step {} due {}{}.",
                                step.template_step_id,
                                step.due_date,
                                if step.locked { " (locked)" } else { "" }
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: set <case> <step> <YYYY-MM-DD> [lock]"),
                }
            }
            "preview" | "apply" => match (parts.next(), parts.next().and_then(parse_date)) {
                (Some(case_id), Some(goal)) => {
                    let result = engine.stage_replan(case_id, goal).and_then(|mut attempt| {
                        if cmd == "apply" {
                            engine.commit_replan(&mut attempt)?;
                        }
                        Ok(attempt)
                    });
                    match result {
                        Ok(attempt) => {
                            for warning in attempt.warnings() {
                                println!("Warning: {}", warning);
                            }
                            print_table(report::diff_frame(attempt.entries()));
                            let verb = if cmd == "apply" { "applied" } else { "would change" };
                            println!("Replan {}: {} step(s).", verb, attempt.changed_count());
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                _ => println!("Usage: {} <case> <YYYY-MM-DD>", cmd),
            },
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
