use clap::{Arg, Command, value_parser};

pub const ARG_COOKIE_NAME: &str = "cookie-name";
pub const ARG_SKEW_BUFFER: &str = "skew-buffer-seconds";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_LANDING_PATH: &str = "landing-path";
pub const ARG_PROTECTED_ROUTES: &str = "protected-routes";
pub const ARG_AUTH_ROUTES: &str = "auth-routes";

/// Session and route table options, shared by every subcommand.
#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_NAME)
                .long(ARG_COOKIE_NAME)
                .help("Cookie carrying the bearer token on page loads")
                .env("TESSERA_COOKIE_NAME")
                .default_value("rpg_auth_token")
                .global(true),
        )
        .arg(
            Arg::new(ARG_SKEW_BUFFER)
                .long(ARG_SKEW_BUFFER)
                .help("Treat tokens as expired this many seconds before exp")
                .env("TESSERA_SKEW_BUFFER_SECONDS")
                .default_value("300")
                .value_parser(value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Login page that receives the redirect parameter")
                .env("TESSERA_LOGIN_PATH")
                .default_value("/login")
                .global(true),
        )
        .arg(
            Arg::new(ARG_LANDING_PATH)
                .long(ARG_LANDING_PATH)
                .help("Landing page for authenticated users")
                .env("TESSERA_LANDING_PATH")
                .default_value("/dashboard")
                .global(true),
        )
        .arg(
            Arg::new(ARG_PROTECTED_ROUTES)
                .long(ARG_PROTECTED_ROUTES)
                .help("Comma separated path prefixes that require a session")
                .env("TESSERA_PROTECTED_ROUTES")
                .value_delimiter(',')
                .default_value("/dashboard,/characters,/profile,/settings")
                .global(true),
        )
        .arg(
            Arg::new(ARG_AUTH_ROUTES)
                .long(ARG_AUTH_ROUTES)
                .help("Comma separated path prefixes hidden from authenticated users")
                .env("TESSERA_AUTH_ROUTES")
                .value_delimiter(',')
                .default_value("/login,/register")
                .global(true),
        )
}
