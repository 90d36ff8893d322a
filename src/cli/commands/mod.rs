pub mod client;
pub mod logging;
pub mod session;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let serve = Command::new("serve")
        .about("Serve pages behind the edge guard")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("TESSERA_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = Command::new("tessera")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(serve)
        .subcommands(client::subcommands());

    let command = session::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVE_ENV: [&str; 7] = [
        "TESSERA_PORT",
        "TESSERA_COOKIE_NAME",
        "TESSERA_SKEW_BUFFER_SECONDS",
        "TESSERA_LOGIN_PATH",
        "TESSERA_LANDING_PATH",
        "TESSERA_PROTECTED_ROUTES",
        "TESSERA_AUTH_ROUTES",
    ];

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "tessera");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        let names: Vec<_> = command.get_subcommands().map(Command::get_name).collect();
        assert_eq!(
            names,
            vec!["serve", "login", "register", "logout", "status", "fetch"]
        );
    }

    #[test]
    fn test_serve_defaults() {
        temp_env::with_vars_unset(SERVE_ENV, || {
            let matches = new().get_matches_from(vec!["tessera", "serve"]);
            let serve = matches.subcommand_matches("serve");
            assert_eq!(
                serve.and_then(|m| m.get_one::<u16>(ARG_PORT).copied()),
                Some(8080)
            );
            assert_eq!(
                matches
                    .get_one::<String>(session::ARG_COOKIE_NAME)
                    .map(String::as_str),
                Some("rpg_auth_token")
            );
            let protected: Vec<_> = matches
                .get_many::<String>(session::ARG_PROTECTED_ROUTES)
                .map(|values| values.map(String::as_str).collect())
                .unwrap_or_default();
            assert_eq!(
                protected,
                vec!["/dashboard", "/characters", "/profile", "/settings"]
            );
        });
    }

    #[test]
    fn test_session_args_after_subcommand() {
        let matches = new().get_matches_from(vec![
            "tessera",
            "serve",
            "--port",
            "9000",
            "--skew-buffer-seconds",
            "60",
            "--protected-routes",
            "/app,/admin",
        ]);

        assert_eq!(
            matches.get_one::<u64>(session::ARG_SKEW_BUFFER).copied(),
            Some(60)
        );
        let protected: Vec<_> = matches
            .get_many::<String>(session::ARG_PROTECTED_ROUTES)
            .map(|values| values.map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(protected, vec!["/app", "/admin"]);
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("TESSERA_PORT", Some("443")),
                ("TESSERA_COOKIE_NAME", Some("sid")),
                ("TESSERA_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["tessera", "serve"]);
                assert_eq!(
                    matches
                        .subcommand_matches("serve")
                        .and_then(|m| m.get_one::<u16>(ARG_PORT).copied()),
                    Some(443)
                );
                assert_eq!(
                    matches
                        .get_one::<String>(session::ARG_COOKIE_NAME)
                        .map(String::as_str),
                    Some("sid")
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_login_requires_password() {
        temp_env::with_vars_unset(["TESSERA_PASSWORD", "TESSERA_IDENTIFIER"], || {
            let result = new().try_get_matches_from(vec!["tessera", "login", "-u", "aria"]);
            assert!(result.is_err());
        });

        temp_env::with_vars(
            [
                ("TESSERA_PASSWORD", Some("secret")),
                ("TESSERA_API_BASE_URL", Some("https://api.example.com")),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "tessera",
                    "login",
                    "-u",
                    "aria",
                    "--redirect",
                    "%2Fdashboard%2F42",
                ]);
                let login = matches.subcommand_matches("login");
                assert_eq!(
                    login
                        .and_then(|m| m.get_one::<String>(client::ARG_PASSWORD))
                        .map(String::as_str),
                    Some("secret")
                );
                assert_eq!(
                    login
                        .and_then(|m| m.get_one::<String>(client::ARG_API_BASE_URL))
                        .map(String::as_str),
                    Some("https://api.example.com")
                );
                assert_eq!(
                    login
                        .and_then(|m| m.get_one::<String>(client::ARG_REDIRECT))
                        .map(String::as_str),
                    Some("%2Fdashboard%2F42")
                );
            },
        );
    }

    #[test]
    fn test_watch_interval_is_not_a_flag() {
        let result = new().try_get_matches_from(vec![
            "tessera",
            "serve",
            "--watch-interval-seconds",
            "30",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_fetch_takes_a_path() {
        let matches = new().get_matches_from(vec!["tessera", "fetch", "characters"]);
        assert_eq!(
            matches
                .subcommand_matches("fetch")
                .and_then(|m| m.get_one::<String>(client::ARG_PATH))
                .map(String::as_str),
            Some("characters")
        );
    }
}
