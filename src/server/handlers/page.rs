//! Layout data for server-rendered pages.

use axum::{Extension, http::Uri, response::Json};
use serde::Serialize;

use crate::guard::AuthContext;

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub is_authenticated: bool,
    pub pathname: String,
}

/// Reads the context the edge guard attached; the token itself stays server side.
pub async fn page(Extension(auth): Extension<AuthContext>, uri: Uri) -> Json<Layout> {
    Json(Layout {
        is_authenticated: auth.is_authenticated,
        pathname: uri.path().to_string(),
    })
}
