//! Project initialization for sentinel
//!
//! `sentinel init` creates the .sentinel directory, a default config and the database

use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db::Database;

const CONFIG_HEADER: &str = "# Sentinel configuration\n# Every key is optional; missing keys use the defaults shown here.\n\n";

/// Initialize sentinel in the current directory
pub fn init_project() -> Result<PathBuf, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Could not get current directory: {}", e))?;
    init_project_in(&cwd)
}

/// Initialize sentinel in `root`. Returns the database path.
pub fn init_project_in(root: &Path) -> Result<PathBuf, String> {
    println!("\n{}", "Initializing Sentinel...".cyan().bold());
    println!("   Directory: {}\n", root.display());

    // 1. Create .sentinel directory
    let sentinel_dir = root.join(".sentinel");
    create_dir_if_missing(&sentinel_dir)?;

    // 2. Default config
    let config_path = sentinel_dir.join("config.toml");
    let rendered = toml::to_string(&Config::default())
        .map_err(|e| format!("Could not render config: {}", e))?;
    write_file_if_missing(
        &config_path,
        &format!("{}{}", CONFIG_HEADER, rendered),
        ".sentinel/config.toml",
    )?;

    // 3. Initialize database by opening it (creates tables)
    let db_path = sentinel_dir.join("sentinel.db");
    let existed = db_path.exists();
    Database::open_at(&db_path).map_err(|e| format!("Could not create database: {}", e))?;
    if existed {
        println!("   {} .sentinel/sentinel.db (already exists)", "Skipping".yellow());
    } else {
        println!("   {} .sentinel/sentinel.db", "Creating".green());
    }

    // 4. Keep the database out of version control
    add_to_gitignore(root)?;

    println!("\n{}", "Sentinel initialized!".green().bold());
    println!("\nNext steps:");
    println!("  1. Run {} to accept audit events over HTTP", "sentinel serve".cyan());
    println!("  2. Run {} to follow an investigation", "sentinel watch <event-id>".cyan());
    println!();

    Ok(db_path)
}

fn create_dir_if_missing(path: &Path) -> Result<(), String> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| format!("Could not create {}: {}", path.display(), e))?;
        println!("   {} {}", "Creating".green(), path.display());
    }
    Ok(())
}

fn write_file_if_missing(path: &Path, content: &str, display_name: &str) -> Result<(), String> {
    if path.exists() {
        println!("   {} {} (already exists)", "Skipping".yellow(), display_name);
    } else {
        fs::write(path, content)
            .map_err(|e| format!("Could not write {}: {}", display_name, e))?;
        println!("   {} {}", "Creating".green(), display_name);
    }
    Ok(())
}

fn add_to_gitignore(root: &Path) -> Result<(), String> {
    let gitignore_path = root.join(".gitignore");
    let entry = ".sentinel/sentinel.db";

    if gitignore_path.exists() {
        let existing = fs::read_to_string(&gitignore_path)
            .map_err(|e| format!("Could not read .gitignore: {}", e))?;

        if existing.lines().any(|line| line.trim() == entry || line.trim() == ".sentinel/") {
            return Ok(());
        }

        let new_content = format!("{}\n\n# Sentinel database (local)\n{}\n", existing.trim_end(), entry);
        fs::write(&gitignore_path, new_content)
            .map_err(|e| format!("Could not update .gitignore: {}", e))?;
        println!("   {} .gitignore (added {})", "Updated".green(), entry);
    } else {
        let content = format!("# Sentinel database (local)\n{}\n", entry);
        fs::write(&gitignore_path, content)
            .map_err(|e| format!("Could not create .gitignore: {}", e))?;
        println!("   {} .gitignore", "Creating".green());
    }

    Ok(())
}
