use colored::{ColoredString, Colorize};
use prettytable::{format, Table};

use crate::config::Config;
use crate::error::Result;
use crate::oauth::TokenHealth;
use crate::persistence::open_provider;
use crate::server::dashboard::{collect_entries, DashboardEntry};

/// Print every registration with the health of its stored token.
pub async fn run_list(config: Config) -> Result<()> {
    let http = super::http_client(config.server.token_timeout())?;
    let provider = open_provider(&config.backend, &config.server.redirect_url(), http)?;
    let entries = collect_entries(provider.as_ref()).await?;

    if entries.is_empty() {
        println!("{}", "No registrations found.".yellow());
        return Ok(());
    }

    println!("\nRegistrations:");
    build_table(&entries).printstd();
    println!();
    println!(
        "Authorize one with {} in a browser.",
        "http://<host>:<port>/auth?id=<ID>".cyan()
    );
    println!();
    Ok(())
}

/// Builds the registration table.
pub fn build_table(entries: &[DashboardEntry]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "External ID".bold(),
        "Label".bold(),
        "Token Endpoint".bold(),
        "Token".bold()
    ]);

    for entry in entries {
        table.add_row(prettytable::row![
            entry.identifier.cyan(),
            entry.external_id.as_deref().unwrap_or("-"),
            entry.label,
            entry.token_endpoint,
            health_cell(entry.health)
        ]);
    }
    table
}

fn health_cell(health: TokenHealth) -> ColoredString {
    let text = health.describe();
    match health {
        TokenHealth::Green => text.green(),
        TokenHealth::Yellow => text.yellow(),
        TokenHealth::Red => text.red(),
        TokenHealth::White => text.normal(),
    }
}
