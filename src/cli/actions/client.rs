use crate::{
    api::HttpTransport,
    config::SessionConfig,
    context::SessionContext,
    routes::post_login_destination,
    session::{AuthState, LoginRequest, RegisterRequest},
    storage::FileStore,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::debug;

#[derive(Debug)]
pub struct Connection {
    pub api_base_url: String,
    pub state_file: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug)]
pub enum ClientCommand {
    Login {
        identifier: String,
        password: SecretString,
        /// Raw `redirect` query value handed to the login page.
        redirect: Option<String>,
    },
    Register {
        username: String,
        email: String,
        name: String,
        password: SecretString,
    },
    Logout,
    Status,
    Fetch {
        path: String,
    },
}

#[derive(Debug)]
pub struct Args {
    pub config: SessionConfig,
    pub connection: Connection,
    pub command: ClientCommand,
}

/// Execute a client command against the persisted session and print the result.
/// # Errors
/// Returns an error if the API is unreachable or rejects the request.
pub async fn execute(args: Args) -> Result<()> {
    let context = context(args.config, &args.connection)?;
    let output = run(&context, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn context(config: SessionConfig, connection: &Connection) -> Result<SessionContext> {
    let transport = HttpTransport::new(&connection.api_base_url, connection.timeout)
        .with_context(|| format!("invalid API base URL: {}", connection.api_base_url))?;
    let storage = Arc::new(FileStore::new(connection.state_file.clone()));
    debug!(state_file = %connection.state_file.display(), "using session state file");
    Ok(SessionContext::new(config, storage, transport))
}

/// Restore the persisted session, then run `command` against it.
pub(crate) async fn run(context: &SessionContext, command: ClientCommand) -> Result<Value> {
    let session = context.session();
    let restored = session.initialize();
    debug!(state = restored.label(), "session restored");

    match command {
        ClientCommand::Login {
            identifier,
            password,
            redirect,
        } => {
            let request = LoginRequest::new(identifier, password.expose_secret());
            let user = session.login(&request).await.map_err(user_facing)?;
            let destination =
                post_login_destination(redirect.as_deref(), context.config().landing_path());
            Ok(json!({ "user": user, "redirectTo": destination }))
        }
        ClientCommand::Register {
            username,
            email,
            name,
            password,
        } => {
            let request = RegisterRequest::new(username, email, name, password.expose_secret());
            let user = session.register(&request).await.map_err(user_facing)?;
            Ok(json!({
                "user": user,
                "redirectTo": context.config().landing_path(),
            }))
        }
        ClientCommand::Logout => {
            let ended = session.logout().await;
            Ok(json!({ "loggedOut": ended }))
        }
        ClientCommand::Status => status(context, &restored).await,
        ClientCommand::Fetch { path } => context
            .gateway()
            .get::<Value>(&path)
            .await
            .with_context(|| format!("GET {path} failed")),
    }
}

/// Display the end-user message, keep the typed error as the source.
fn user_facing(err: crate::Error) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

/// The local state plus the backend's view of the token, when there is one.
async fn status(context: &SessionContext, restored: &AuthState) -> Result<Value> {
    if !restored.is_authenticated() {
        return Ok(json!({ "state": restored.label(), "user": Value::Null }));
    }

    match context.gateway().current_user().await {
        Ok(user) => Ok(json!({
            "state": "authenticated",
            "user": user,
            "permissions": context.session().permissions(),
        })),
        // The gateway already tore the session down.
        Err(err) if err.invalidates_session() => Ok(json!({
            "state": context.session().state().label(),
            "user": Value::Null,
        })),
        Err(err) => Err(err).context("failed to fetch the current user"),
    }
}
