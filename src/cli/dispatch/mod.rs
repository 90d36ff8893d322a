use crate::cli::actions::{
    Action,
    client::{self, ClientCommand, Connection},
    server,
};
use crate::cli::commands::{ARG_PORT, client as client_args, session as session_args};
use crate::config::SessionConfig;
use crate::routes::RouteTable;
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{env, path::PathBuf, time::Duration};

const STATE_DIR: &str = ".tessera";
const STATE_FILE: &str = "session.json";

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let config = session_config(matches)?;

    match matches.subcommand() {
        Some(("serve", sub_m)) => Ok(Action::Server(server::Args {
            port: sub_m.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
            config,
        })),
        Some((name, sub_m)) => {
            let command = client_command(name, sub_m)?;
            Ok(Action::Client(client::Args {
                config,
                connection: connection(sub_m)?,
                command,
            }))
        }
        None => Err(anyhow!("missing subcommand")),
    }
}

/// # Errors
/// Returns an error if the route table is inconsistent or the login and
/// landing paths would make the guard redirect in a loop.
pub fn session_config(matches: &ArgMatches) -> Result<SessionConfig> {
    let mut config = SessionConfig::new();

    if let Some(name) = matches.get_one::<String>(session_args::ARG_COOKIE_NAME) {
        config = config.with_cookie_name(name.clone());
    }
    if let Some(seconds) = matches.get_one::<u64>(session_args::ARG_SKEW_BUFFER) {
        config = config.with_skew_buffer(Duration::from_secs(*seconds));
    }
    if let Some(path) = matches.get_one::<String>(session_args::ARG_LOGIN_PATH) {
        config = config.with_login_path(path.clone());
    }
    if let Some(path) = matches.get_one::<String>(session_args::ARG_LANDING_PATH) {
        config = config.with_landing_path(path.clone());
    }

    let protected = list(matches, session_args::ARG_PROTECTED_ROUTES);
    let auth_only = list(matches, session_args::ARG_AUTH_ROUTES);
    let routes = RouteTable::new(&protected, &auth_only).context("invalid route table")?;

    let config = config.with_routes(routes);
    config.validate().context("invalid session configuration")?;
    Ok(config)
}

fn list(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| {
            values
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

fn client_command(name: &str, matches: &ArgMatches) -> Result<ClientCommand> {
    let command = match name {
        "login" => ClientCommand::Login {
            identifier: required(matches, client_args::ARG_IDENTIFIER)?,
            password: SecretString::from(required(matches, client_args::ARG_PASSWORD)?),
            redirect: matches.get_one::<String>(client_args::ARG_REDIRECT).cloned(),
        },
        "register" => ClientCommand::Register {
            username: required(matches, client_args::ARG_USERNAME)?,
            email: required(matches, client_args::ARG_EMAIL)?,
            name: required(matches, client_args::ARG_NAME)?,
            password: SecretString::from(required(matches, client_args::ARG_PASSWORD)?),
        },
        "logout" => ClientCommand::Logout,
        "status" => ClientCommand::Status,
        "fetch" => ClientCommand::Fetch {
            path: required(matches, client_args::ARG_PATH)?,
        },
        other => return Err(anyhow!("unknown subcommand: {other}")),
    };
    Ok(command)
}

fn connection(matches: &ArgMatches) -> Result<Connection> {
    let api_base_url = required(matches, client_args::ARG_API_BASE_URL)?;
    let state_file = match matches.get_one::<String>(client_args::ARG_STATE_FILE) {
        Some(path) => PathBuf::from(path),
        None => default_state_file()?,
    };
    let timeout = matches
        .get_one::<u64>(client_args::ARG_TIMEOUT)
        .copied()
        .map_or(crate::api::DEFAULT_TIMEOUT, Duration::from_secs);

    Ok(Connection {
        api_base_url,
        state_file,
        timeout,
    })
}

fn default_state_file() -> Result<PathBuf> {
    let home = env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .context("HOME is not set; pass --state-file")?;
    Ok(PathBuf::from(home).join(STATE_DIR).join(STATE_FILE))
}
