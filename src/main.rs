// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use realty_insights::{
    add_user, can_access_user_data, config::AppConfig, delete_user, export_valuations_csv,
    get_user_valuations, load_catalog, load_user_directory, logging, open_database, save_enrollment,
    save_valuation, Access, FileStore, Identity, NewUser, PropertyInput, Role, Route, RouteGuard,
    Session, SqliteCredentials, Valuator, DEFAULT_TOTAL_LESSONS,
};

const CONFIG_ENV: &str = "REALTY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "realty.toml";

type CliSession<'a> = Session<FileStore, SqliteCredentials<'a>>;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = AppConfig::load(Some(&config_path))?;
    logging::init(&config.logging);

    if args.len() < 2 {
        // UI mode (default)
        return run_ui_mode(&config);
    }

    let conn = open_database(&config.storage.db_path)?;
    let mut session: CliSession<'_> = Session::open(
        FileStore::new(&config.storage.session_file),
        SqliteCredentials::new(&conn),
        &config.storage.session_key,
    );
    let rest = &args[2..];

    match args[1].as_str() {
        "login" => cmd_login(&mut session, rest),
        "logout" => {
            session.logout();
            println!("👋 Logged out");
            Ok(())
        }
        "whoami" => {
            match session.current() {
                Some(identity) => println!("👤 {} (id {}, {})", identity.username, identity.id, identity.role),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        "register" => cmd_register(&session, rest),
        "value" => cmd_value(&conn, &session, &config, rest),
        "courses" => cmd_courses(&conn, &session, rest),
        "enroll" => cmd_enroll(&conn, &session, rest),
        "lesson" => cmd_lesson(&conn, &session, rest),
        "users" => cmd_users(&conn, &session, rest),
        "add-user" => cmd_add_user(&conn, &session, rest),
        "delete-user" => cmd_delete_user(&conn, &session, rest),
        "export-valuations" => cmd_export(&conn, &session, rest),
        "init-db" => {
            println!("✓ Database ready at {:?}", config.storage.db_path);
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage() {
    eprintln!("Usage: realty-insights [COMMAND]");
    eprintln!();
    eprintln!("  login <username> <password>");
    eprintln!("  logout");
    eprintln!("  whoami");
    eprintln!("  register <username> <password> <confirm>");
    eprintln!("  value residential|commercial <json-file>");
    eprintln!("  courses [query]");
    eprintln!("  enroll <course_id> [lessons]");
    eprintln!("  lesson <course_id>");
    eprintln!("  users [query]              (admin only)");
    eprintln!("  add-user <username> <email> [user|admin]   (admin only)");
    eprintln!("  delete-user <id>           (admin only)");
    eprintln!("  export-valuations <user_id> <csv-path>   (own id, or any as admin)");
    eprintln!("  init-db");
    eprintln!();
    eprintln!("With no command the terminal UI starts.");
}

fn arg<'a>(rest: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    rest.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: <{}>", name))
}

/// Applies the route guard the same way the UI does
fn require(session: &CliSession<'_>, route: Route) -> Result<()> {
    match RouteGuard::check(&session.status(), route) {
        Access::Allow => Ok(()),
        Access::Pending => bail!("Session is still loading"),
        Access::RedirectToLogin { from } => bail!("Login required for {}", from),
        Access::RedirectToDashboard => bail!("Admin access required for {}", route.path()),
    }
}

/// `require` plus the identity it admitted
fn require_identity(session: &CliSession<'_>, route: Route) -> Result<Identity> {
    require(session, route)?;
    session.current().cloned().ok_or_else(|| anyhow!("Login required"))
}

fn parse_id(rest: &[String], index: usize, name: &str) -> Result<i64> {
    arg(rest, index, name)?
        .parse()
        .with_context(|| format!("{} must be an integer", name))
}

fn cmd_login(session: &mut CliSession<'_>, rest: &[String]) -> Result<()> {
    let username = arg(rest, 0, "username")?;
    let password = arg(rest, 1, "password")?;

    let identity = session.login(username, password)?;
    println!("✅ Logged in as {} ({})", identity.username, identity.role);
    Ok(())
}

fn cmd_register(session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    let username = arg(rest, 0, "username")?;
    let password = arg(rest, 1, "password")?;
    let confirm = arg(rest, 2, "confirm")?;

    session.register(username, password, confirm)?;
    println!("✅ Account '{}' created. Log in to continue.", username);
    Ok(())
}

fn cmd_value(conn: &Connection, session: &CliSession<'_>, config: &AppConfig, rest: &[String]) -> Result<()> {
    require(session, Route::Valuation)?;

    let kind = arg(rest, 0, "residential|commercial")?;
    let path = arg(rest, 1, "json-file")?;
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;

    let input = match kind {
        "residential" => PropertyInput::Residential(serde_json::from_str(&content).context("Invalid residential input")?),
        "commercial" => PropertyInput::Commercial(serde_json::from_str(&content).context("Invalid commercial input")?),
        other => bail!("Unknown property type: {} (expected residential or commercial)", other),
    };

    let valuator = Valuator::new(config.valuation.reference_year);
    let result = valuator.valuate(&input)?;

    println!("🏠 {}", input.address().one_line());
    println!("💰 Estimated value: ${}", format_dollars(result.estimated_value));
    println!("{}", serde_json::to_string_pretty(&result.breakdown)?);

    if let Some(identity) = session.current() {
        let id = save_valuation(conn, identity.id, &input, &result)?;
        println!("✓ Saved as valuation #{}", id);
    }
    Ok(())
}

fn cmd_courses(conn: &Connection, session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    let identity = require_identity(session, Route::MyCourses)?;
    let query = rest.first().map(String::as_str).unwrap_or("");
    let catalog = load_catalog(conn, identity.id)?;

    let summary = catalog.summary();
    println!(
        "📊 {} enrolled, {} completed, {} in progress, {}% average",
        summary.enrolled, summary.completed, summary.in_progress, summary.average_progress
    );

    println!("\n📚 Enrolled");
    for entry in catalog.search_enrolled(query) {
        println!(
            "  #{:<2} [{:>3}%] {} - {} ({} of {} lessons)",
            entry.course.id,
            entry.progress,
            entry.course.title,
            entry.course.instructor,
            entry.completed_lessons,
            entry.total_lessons
        );
    }

    println!("\n🛒 Available");
    for course in catalog.search_available(query) {
        println!(
            "  #{:<2} {} - {} | {} | {}h | ${:.2}",
            course.id,
            course.title,
            course.instructor,
            course.level.as_str(),
            course.duration_hours,
            course.price
        );
    }
    Ok(())
}

fn cmd_enroll(conn: &Connection, session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    let identity = require_identity(session, Route::MyCourses)?;
    let course_id = parse_id(rest, 0, "course_id")?;
    let total_lessons = match rest.get(1) {
        Some(raw) => raw.parse().context("lessons must be a positive integer")?,
        None => DEFAULT_TOTAL_LESSONS,
    };

    let mut catalog = load_catalog(conn, identity.id)?;
    catalog.enroll(course_id, total_lessons)?;
    if let Some(enrollment) = catalog.enrollment(course_id) {
        save_enrollment(conn, identity.id, enrollment)?;
        println!(
            "✓ Enrolled in course #{} ({} of {} lessons done)",
            course_id, enrollment.completed_lessons, enrollment.total_lessons
        );
    }
    Ok(())
}

fn cmd_lesson(conn: &Connection, session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    let identity = require_identity(session, Route::MyCourses)?;
    let course_id = parse_id(rest, 0, "course_id")?;

    let mut catalog = load_catalog(conn, identity.id)?;
    let progress = catalog.record_lesson(course_id)?;
    if let Some(enrollment) = catalog.enrollment(course_id) {
        save_enrollment(conn, identity.id, enrollment)?;
    }
    println!("✓ Course #{} is {}% complete", course_id, progress);
    Ok(())
}

fn cmd_users(conn: &Connection, session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    require(session, Route::Users)?;
    let query = rest.first().map(String::as_str).unwrap_or("");

    let directory = load_user_directory(conn)?;
    println!(
        "{} users, {} active, {} admins",
        directory.count(),
        directory.active_count(),
        directory.count_by_role(Role::Admin)
    );
    println!("{:<4} {:<12} {:<24} {:<6} {:<9} {:<7} {:<10}", "ID", "Username", "Email", "Role", "Status", "Courses", "Joined");
    for user in directory.search(query) {
        println!(
            "{:<4} {:<12} {:<24} {:<6} {:<9} {:<7} {:<10}",
            user.id,
            user.username,
            user.email,
            user.role,
            user.status.as_str(),
            user.courses,
            user.joined
        );
    }
    Ok(())
}

fn cmd_add_user(conn: &Connection, session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    require(session, Route::Users)?;
    let role = match rest.get(2) {
        Some(raw) => raw.parse::<Role>().map_err(|e| anyhow!(e))?,
        None => Role::User,
    };
    let new_user = NewUser {
        username: arg(rest, 0, "username")?.to_string(),
        email: arg(rest, 1, "email")?.to_string(),
        role,
    };

    let (user, temporary_password) = add_user(conn, new_user)?;
    println!("✅ Added {} (id {}, {})", user.username, user.id, user.role);
    println!("   Temporary password: {}", temporary_password);
    Ok(())
}

fn cmd_delete_user(conn: &Connection, session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    let identity = require_identity(session, Route::Users)?;
    let user_id = parse_id(rest, 0, "id")?;
    if user_id == identity.id {
        bail!("You cannot delete your own account");
    }

    delete_user(conn, user_id)?;
    println!("🗑️  Deleted user #{}", user_id);
    Ok(())
}

fn cmd_export(conn: &Connection, session: &CliSession<'_>, rest: &[String]) -> Result<()> {
    require(session, Route::Valuation)?;
    let user_id = parse_id(rest, 0, "user_id")?;
    if !can_access_user_data(&session.status(), user_id) {
        bail!("Valuations of user #{} are not yours to export", user_id);
    }
    let csv_path = Path::new(arg(rest, 1, "csv-path")?);

    let valuations = get_user_valuations(conn, user_id)?;
    let written = export_valuations_csv(&valuations, csv_path)?;
    println!("✓ Exported {} valuations to {:?}", written, csv_path);
    Ok(())
}

fn format_dollars(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading Realty Insights...\n");

    let conn = open_database(&config.storage.db_path)?;
    let session = Session::open(
        FileStore::new(&config.storage.session_file),
        SqliteCredentials::new(&conn),
        &config.storage.session_key,
    );

    let mut app = ui::App::new(&conn, session, Valuator::new(config.valuation.reference_year))?;
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin realty-server --features server");
    print_usage();
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dollars() {
        assert_eq!(format_dollars(407_500), "407,500");
        assert_eq!(format_dollars(1_597_500), "1,597,500");
        assert_eq!(format_dollars(-174_800), "-174,800");
        assert_eq!(format_dollars(999), "999");
        assert_eq!(format_dollars(0), "0");
    }
}
