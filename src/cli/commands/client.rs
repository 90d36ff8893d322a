use clap::{Arg, Command, value_parser};

pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_STATE_FILE: &str = "state-file";
pub const ARG_TIMEOUT: &str = "timeout-seconds";
pub const ARG_IDENTIFIER: &str = "identifier";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_REDIRECT: &str = "redirect";
pub const ARG_USERNAME: &str = "username";
pub const ARG_EMAIL: &str = "email";
pub const ARG_NAME: &str = "name";
pub const ARG_PATH: &str = "path";

/// Backing API and local state options for the client subcommands.
fn with_connection_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long(ARG_API_BASE_URL)
                .help("Base URL of the backing API")
                .env("TESSERA_API_BASE_URL")
                .default_value("http://localhost:3001"),
        )
        .arg(
            Arg::new(ARG_STATE_FILE)
                .long(ARG_STATE_FILE)
                .help("Session state file (default: $HOME/.tessera/session.json)")
                .env("TESSERA_STATE_FILE"),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long(ARG_TIMEOUT)
                .help("Request timeout in seconds")
                .env("TESSERA_TIMEOUT_SECONDS")
                .default_value("30")
                .value_parser(value_parser!(u64).range(1..)),
        )
}

fn password_arg() -> Arg {
    Arg::new(ARG_PASSWORD)
        .long(ARG_PASSWORD)
        .help("Account password")
        .env("TESSERA_PASSWORD")
        .hide_env_values(true)
        .required(true)
}

#[must_use]
pub fn subcommands() -> Vec<Command> {
    vec![
        with_connection_args(
            Command::new("login")
                .about("Sign in and persist the session")
                .arg(
                    Arg::new(ARG_IDENTIFIER)
                        .short('u')
                        .long(ARG_IDENTIFIER)
                        .help("Username or email")
                        .env("TESSERA_IDENTIFIER")
                        .required(true),
                )
                .arg(password_arg())
                .arg(
                    Arg::new(ARG_REDIRECT)
                        .long(ARG_REDIRECT)
                        .help("Encoded redirect parameter received by the login page"),
                ),
        ),
        with_connection_args(
            Command::new("register")
                .about("Create an account and persist the session")
                .arg(
                    Arg::new(ARG_USERNAME)
                        .long(ARG_USERNAME)
                        .help("Username, 3-50 letters, digits or underscores")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_EMAIL)
                        .long(ARG_EMAIL)
                        .help("Email address")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_NAME)
                        .long(ARG_NAME)
                        .help("Display name")
                        .required(true),
                )
                .arg(password_arg()),
        ),
        with_connection_args(Command::new("logout").about("End the persisted session")),
        with_connection_args(
            Command::new("status").about("Show the persisted session and the profile it maps to"),
        ),
        with_connection_args(
            Command::new("fetch")
                .about("GET a backing API path with the session token attached")
                .arg(
                    Arg::new(ARG_PATH)
                        .help("Path relative to the API base URL")
                        .required(true),
                ),
        ),
    ]
}
