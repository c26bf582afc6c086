use crate::api::{ApiClient, DEFAULT_API_URL};
use crate::error::{ApiError, ValidationError};
use crate::format::DEFAULT_DATE_FORMAT;
use crate::logging::{init_logging, LogTarget};
use crate::manager::PortfolioList;
use crate::overview::{history_json, load_overview, print_history, print_overview};
use crate::portfolio::{print_portfolios, PortfolioDraft, PortfolioId};
use crate::tui::{run_tui, Component, Tab};

use clap::{arg, ArgMatches, Command};
use colored::Colorize;
use eyre::{eyre, WrapErr};
use serde::Deserialize;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;

mod api;
mod chart;
mod error;
mod format;
mod history;
mod logging;
mod manager;
mod overview;
mod portfolio;
mod summary;
mod tui;

const APP_NAME: &str = "portfolio_dash";
const CONFIG_NAME: &str = "config";

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    api_url: String,
    currency: String,
    date_format: String,
    /// 0 leaves the transport default in place.
    request_timeout_secs: u64,
    log_level: String,
    /// Empty disables logging while the dashboard is open.
    log_file: String,
    disabled_components: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            currency: "EUR".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            request_timeout_secs: 30,
            log_level: "warn".to_string(),
            log_file: String::new(),
            disabled_components: Vec::new(),
        }
    }
}

fn cli() -> Command {
    Command::new(APP_NAME)
        .about("Dashboard and command line client for your portfolio tracker")
        .arg_required_else_help(true)
        .arg(arg!(--"api-url" <URL> "Backend base URL, overrides the config").global(true))
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(
            Command::new("components")
                .about("List dashboard components that can be disabled in the config"),
        )
        .subcommand(
            Command::new("overview")
                .about("Show totals, performance and allocation across portfolios"),
        )
        .subcommand(
            Command::new("history")
                .about("Show the daily value history of all portfolios")
                .arg(arg!(--json "Print rows as name-keyed JSON")),
        )
        .subcommand(Command::new("portfolios").about("List all portfolios"))
        .subcommand(
            Command::new("create")
                .about("Create a portfolio")
                .arg(arg!(<NAME> "Portfolio name"))
                .arg(arg!(--description <TEXT> "Description"))
                .arg(arg!(--exclude "Exclude from the overview")),
        )
        .subcommand(
            Command::new("update")
                .about("Edit a portfolio")
                .arg(arg!(<ID> "Portfolio id"))
                .arg(arg!(--name <NAME> "New name"))
                .arg(arg!(--description <TEXT> "New description"))
                .arg(arg!(--exclude <BOOL> "Exclude from the overview (true/false)")),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a portfolio")
                .arg(arg!(<ID> "Portfolio id"))
                .arg(arg!(-y --yes "Do not ask for confirmation")),
        )
        .subcommand(
            Command::new("archive")
                .about("Archive a portfolio")
                .arg(arg!(<ID> "Portfolio id")),
        )
        .subcommand(
            Command::new("unarchive")
                .about("Unarchive a portfolio")
                .arg(arg!(<ID> "Portfolio id")),
        )
        .subcommand(
            Command::new("tui")
                .about("Open the interactive dashboard")
                .arg(arg!(--tab <TAB> "Start tab: overview or portfolios")),
        )
}

fn id_arg(matches: &ArgMatches) -> eyre::Result<PortfolioId> {
    matches
        .get_one::<String>("ID")
        .map(|s| PortfolioId::from(s.as_str()))
        .ok_or_else(|| eyre!("missing portfolio id"))
}

fn parse_flag(value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ValidationError::InvalidFlag(value.to_string())),
    }
}

/// Keeps the backend detail as the cause under the generic banner text.
fn fetch_error(err: ApiError) -> eyre::Report {
    let message = err.user_message();
    eyre::Report::new(err).wrap_err(message)
}

fn confirm(prompt: &str) -> eyre::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn run_command(
    name: &str,
    matches: &ArgMatches,
    cfg: &Config,
    client: ApiClient,
) -> eyre::Result<()> {
    match name {
        "overview" => {
            let data = load_overview(&client).await.map_err(fetch_error)?;
            print_overview(&data, &cfg.currency);
        }
        "history" => {
            let data = load_overview(&client).await.map_err(fetch_error)?;
            if matches.get_flag("json") {
                let json = history_json(&data, &cfg.date_format);
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                print_history(&data, &cfg.currency, &cfg.date_format);
            }
        }
        "portfolios" => {
            let mut list = PortfolioList::new(client);
            list.load().await.wrap_err("failed to load portfolios")?;
            if list.portfolios().is_empty() {
                println!("No portfolios yet. Create one with `{APP_NAME} create <NAME>`.");
            } else {
                print_portfolios(list.portfolios(), &cfg.currency, false);
            }
        }
        "create" => {
            let mut draft = PortfolioDraft::new(
                matches.get_one::<String>("NAME").cloned().unwrap_or_default(),
            );
            if let Some(description) = matches.get_one::<String>("description") {
                draft.description = description.clone();
            }
            draft.exclude_from_overview = matches.get_flag("exclude");

            let mut list = PortfolioList::new(client);
            let created = list.create(draft).await?;
            println!(
                "{} {} (id {})",
                "Created".green(),
                created.name,
                created.id
            );
        }
        "update" => {
            let id = id_arg(matches)?;
            let mut list = PortfolioList::new(client);
            list.load().await.wrap_err("failed to load portfolios")?;
            let existing = list
                .get(&id)
                .ok_or_else(|| ValidationError::UnknownPortfolio(id.to_string()))?;

            let mut draft = PortfolioDraft::from_portfolio(existing);
            if let Some(name) = matches.get_one::<String>("name") {
                draft.name = name.clone();
            }
            if let Some(description) = matches.get_one::<String>("description") {
                draft.description = description.clone();
            }
            if let Some(exclude) = matches.get_one::<String>("exclude") {
                draft.exclude_from_overview = parse_flag(exclude)?;
            }

            let updated = list.update(&id, draft).await?;
            println!("{} {} (id {})", "Updated".green(), updated.name, updated.id);
        }
        "delete" => {
            let id = id_arg(matches)?;
            let mut list = PortfolioList::new(client);
            list.load().await.wrap_err("failed to load portfolios")?;
            list.request_delete(&id)?;

            let name = list
                .pending_delete()
                .map(|p| p.name.clone())
                .unwrap_or_default();
            if !matches.get_flag("yes") && !confirm(&format!("Delete portfolio \"{name}\"?"))? {
                list.cancel_delete();
                println!("Aborted.");
                return Ok(());
            }

            list.confirm_delete().await?;
            println!("{} {name} (id {id})", "Deleted".red());
        }
        "archive" | "unarchive" => {
            let id = id_arg(matches)?;
            let mut list = PortfolioList::new(client);
            if name == "archive" {
                list.archive(&id).await?;
            } else {
                list.unarchive(&id).await?;
            }
            if let Some(error) = list.last_error() {
                eprintln!("{}", error.yellow());
            }
            match list.get(&id) {
                Some(p) if p.is_archived => println!("{} is now {}", p.name, "archived".yellow()),
                Some(p) => println!("{} is now {}", p.name, "active".green()),
                None => println!("Done."),
            }
        }
        "tui" => {
            let tab = match matches.get_one::<String>("tab") {
                Some(t) => Some(Tab::from_name(t).ok_or_else(|| eyre!("unknown tab: {t}"))?),
                None => None,
            };
            run_tui(
                client,
                cfg.currency.clone(),
                cfg.date_format.clone(),
                tab,
                &cfg.disabled_components,
            )
            .await
            .map_err(|e| eyre!("dashboard failed: {e}"))?;
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cfg: Config = confy::load(APP_NAME, CONFIG_NAME).wrap_err("failed to load config")?;

    let matches = cli().get_matches();

    let log_target = if matches.subcommand_name() == Some("tui") {
        if cfg.log_file.is_empty() {
            LogTarget::Off
        } else {
            LogTarget::File(Path::new(&cfg.log_file))
        }
    } else {
        LogTarget::Stderr
    };
    init_logging(log_target, &cfg.log_level)?;

    match matches.subcommand() {
        Some(("config", _)) => {
            let path = confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)?;
            println!("Your config file is located here: \n{}", path.display());
        }
        Some(("components", _)) => {
            for component in Component::all() {
                println!("{:<16} {}", component.as_str(), component.description());
            }
        }
        Some((name, sub_matches)) => {
            let api_url = matches
                .get_one::<String>("api-url")
                .cloned()
                .unwrap_or_else(|| cfg.api_url.clone());
            let timeout =
                (cfg.request_timeout_secs > 0).then(|| Duration::from_secs(cfg.request_timeout_secs));
            let client = ApiClient::new(&api_url, timeout)?;
            tracing::debug!(api_url = client.base_url(), command = name, "starting");
            run_command(name, sub_matches, &cfg, client).await?;
        }
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli() {
        let matches = cli().get_matches_from(vec![APP_NAME, "history", "--json"]);
        assert_eq!(matches.subcommand_name(), Some("history"));
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_flag("json"));
    }

    #[test]
    fn global_api_url_after_subcommand() {
        let matches =
            cli().get_matches_from(vec![APP_NAME, "portfolios", "--api-url", "http://x/api"]);
        assert_eq!(
            matches.get_one::<String>("api-url").map(String::as_str),
            Some("http://x/api")
        );
    }

    #[test]
    fn create_args() {
        let matches = cli().get_matches_from(vec![
            APP_NAME,
            "create",
            "Bonds",
            "--description",
            "Fixed income",
            "--exclude",
        ]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("NAME").unwrap(), "Bonds");
        assert_eq!(sub.get_one::<String>("description").unwrap(), "Fixed income");
        assert!(sub.get_flag("exclude"));
    }

    #[test]
    fn delete_requires_id() {
        assert!(cli().try_get_matches_from(vec![APP_NAME, "delete"]).is_err());
        let matches = cli().get_matches_from(vec![APP_NAME, "delete", "4", "-y"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(id_arg(sub).unwrap(), PortfolioId::from("4"));
        assert!(sub.get_flag("yes"));
    }

    #[test]
    fn flag_values() {
        assert_eq!(parse_flag("TRUE"), Ok(true));
        assert_eq!(parse_flag("no"), Ok(false));
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn config_defaults_fill_missing_keys() {
        let cfg: Config = serde_json::from_str(r#"{"currency": "USD"}"#).unwrap();
        assert_eq!(cfg.currency, "USD");
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.date_format, DEFAULT_DATE_FORMAT);
    }
}
