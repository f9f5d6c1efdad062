//! CLI command implementations

use anyhow::{Result, bail};
use civiq_core::{
    Config, Coordinates, Engine, IssueFilter, IssueQuery, NewComment, NewIssue, Priority,
    ServiceManager, ServiceStatus, Status, UpdateIssue,
};
use colored::Colorize;
use crate::{CreateArgs, ListArgs, ServiceAction, UpdateArgs};
use std::path::{Path, PathBuf};

pub fn init(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("civiq.toml"));
    if path.exists() {
        bail!("config file already exists: {}", path.display());
    }

    std::fs::write(&path, Config::default_with_comments())?;
    let config = Config::load(&path)?;
    std::fs::create_dir_all(&config.storage.data_dir)?;
    std::fs::create_dir_all(&config.media.upload_dir)?;

    println!("{} Initialized civiq", "✓".green());
    println!("  Config:   {}", path.display());
    println!("  Data:     {}", config.storage.data_dir.display());
    println!("  Uploads:  {}", config.media.upload_dir.display());
    Ok(())
}

pub async fn create(engine: &Engine, args: CreateArgs, json: bool) -> Result<()> {
    let coordinates = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
        (None, None) => None,
        _ => bail!("--lat and --lng must be given together"),
    };

    let issue = engine
        .create_issue(NewIssue {
            title: args.title,
            description: args.description,
            category: args.category,
            priority: args.priority,
            state: args.state,
            district: args.district,
            location: args.location,
            coordinates,
            image_url: None,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("{} Created issue: {}", "✓".green(), issue.id.cyan());
        println!("  Title:    {}", issue.title);
        println!("  Category: {}", issue.category);
        println!("  Priority: {}", issue.priority);
    }
    Ok(())
}

pub async fn list(engine: &Engine, args: ListArgs, json: bool) -> Result<()> {
    let mut filter = IssueFilter {
        state: args.state,
        district: args.district,
        ..Default::default()
    };
    if let Some(ref category) = args.category {
        filter.category = Some(category.parse()?);
    }
    if let Some(ref status) = args.status {
        filter.status = Some(status.parse()?);
    }

    let issues = engine
        .list_issues(IssueQuery {
            filter,
            limit: args.limit,
            offset: args.offset,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string(&issues)?);
    } else if issues.is_empty() {
        println!("No issues found");
    } else {
        for issue in issues {
            println!(
                "{} [{}] [{}] {} - {}",
                issue.id.cyan(),
                priority_colored(issue.priority),
                issue.category.to_string().blue(),
                status_colored(issue.status),
                issue.title
            );
        }
    }
    Ok(())
}

pub async fn show(engine: &Engine, id: &str, json: bool) -> Result<()> {
    let issue = engine.get_issue(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issue)?);
        return Ok(());
    }

    println!("{} {}", issue.id.cyan().bold(), issue.title.bold());
    println!();
    println!("Status:   {}", status_colored(issue.status));
    println!("Category: {}", issue.category);
    println!("Priority: {}", priority_colored(issue.priority));
    println!("State:    {}", issue.state);
    println!("District: {}", issue.district);
    println!("Location: {}", issue.location);
    if let Some(coordinates) = issue.coordinates {
        println!("Coords:   {}, {}", coordinates.lat, coordinates.lng);
    }
    if let Some(ref assigned) = issue.assigned_to {
        println!("Assigned: {}", assigned);
    }
    if let Some(ref image_url) = issue.image_url {
        println!("Photo:    {}", image_url);
    }
    println!("Created:  {}", local_stamp(issue.created_at));
    println!("Updated:  {}", local_stamp(issue.updated_at));

    if let Some(category) = issue.ai_category {
        let confidence = issue.ai_confidence.unwrap_or(0);
        println!();
        println!(
            "{} {} ({}% confidence)",
            "AI suggestion:".bold(),
            category.to_string().blue(),
            confidence
        );
    }

    println!();
    println!("{}", "Description:".bold());
    println!("{}", issue.description);
    Ok(())
}

pub async fn update(engine: &Engine, args: UpdateArgs, json: bool) -> Result<()> {
    let issue = engine
        .update_issue(
            &args.id,
            UpdateIssue {
                title: args.title,
                description: args.description,
                category: args.category,
                priority: args.priority,
                status: args.status,
                location: args.location,
                assigned_to: args.assign,
                ..Default::default()
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("{} Updated {}", "✓".green(), issue.id.cyan());
    }
    Ok(())
}

pub async fn delete(engine: &Engine, id: &str, json: bool) -> Result<()> {
    if !engine.delete_issue(id).await? {
        bail!("issue not found: {id}");
    }

    if json {
        println!(r#"{{"success": true}}"#);
    } else {
        println!("{} Deleted {}", "✓".green(), id.cyan());
    }
    Ok(())
}

pub async fn comment(
    engine: &Engine,
    id: &str,
    content: String,
    internal: bool,
    json: bool,
) -> Result<()> {
    let comment = engine
        .add_comment(
            id,
            NewComment {
                content,
                user_id: None,
                is_internal: internal,
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string(&comment)?);
    } else {
        println!("{} Comment added to {}", "✓".green(), id.cyan());
    }
    Ok(())
}

pub async fn comments(engine: &Engine, id: &str, json: bool) -> Result<()> {
    let comments = engine.list_comments(id).await?;

    if json {
        println!("{}", serde_json::to_string(&comments)?);
    } else if comments.is_empty() {
        println!("No comments");
    } else {
        for comment in comments {
            let marker = if comment.is_internal {
                " (internal)".yellow().to_string()
            } else {
                String::new()
            };
            println!(
                "{}{} {}",
                local_stamp(comment.created_at).dimmed(),
                marker,
                comment.content
            );
        }
    }
    Ok(())
}

pub async fn stats(engine: &Engine, json: bool) -> Result<()> {
    let stats = engine.issue_stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{} {}", "Total issues:".bold(), stats.total);
    print_counts("By status:", &stats.by_status);
    print_counts("By category:", &stats.by_category);
    print_counts("By priority:", &stats.by_priority);
    Ok(())
}

fn print_counts(header: &str, counts: &std::collections::BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("{}", header.bold());
    for (key, count) in counts {
        println!("  {:<12} {}", key, count);
    }
}

pub fn service(action: ServiceAction, config: Option<&Path>) -> Result<()> {
    let manager = ServiceManager::new()?;

    match action {
        ServiceAction::Start => {
            manager.start(false, config)?;
            match manager.read_port() {
                Ok(port) => println!("{} Service started on port {}", "✓".green(), port),
                Err(_) => println!("{} Service started", "✓".green()),
            }
        }
        ServiceAction::Run => manager.start(true, config)?,
        ServiceAction::Stop => {
            manager.stop()?;
            println!("{} Service stopped", "✓".green());
        }
        ServiceAction::Restart => {
            manager.restart(config)?;
            println!("{} Service restarted", "✓".green());
        }
        ServiceAction::Status => match manager.status() {
            ServiceStatus::Running { pid, port: Some(port) } => {
                println!("{} Running (pid {}, port {})", "●".green(), pid, port);
            }
            ServiceStatus::Running { pid, port: None } => {
                println!("{} Running (pid {})", "●".green(), pid);
            }
            ServiceStatus::Stopped => println!("{} Stopped", "●".red()),
            ServiceStatus::Dead => println!("{} Dead (stale pid file)", "●".yellow()),
        },
    }
    Ok(())
}

/// Render a UTC timestamp in the reader's local timezone.
fn local_stamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn status_colored(status: Status) -> colored::ColoredString {
    match status {
        Status::New => "new".white(),
        Status::InProgress => "in_progress".yellow(),
        Status::Resolved => "resolved".green(),
        Status::Closed => "closed".dimmed(),
    }
}

fn priority_colored(priority: Priority) -> colored::ColoredString {
    match priority {
        Priority::Low => "low".normal(),
        Priority::Medium => "medium".yellow(),
        Priority::High => "high".red(),
    }
}
