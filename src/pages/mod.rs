//! Minimal server-rendered pages: the login form and the gated dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, Extension};

use crate::auth::SessionUser;
use crate::AppState;

/// Sign-in form; posts JSON to the login API and follows its redirect.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate;

/// Landing page behind the session gate.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub user_name: String,
    /// Protected prefix without a trailing slash
    pub prefix: String,
}

/// The multipart "add product" form.
#[derive(Template, WebTemplate)]
#[template(path = "add_product.html")]
pub struct AddProductTemplate {
    pub user_email: String,
}

/// GET /login
pub async fn login_page() -> LoginTemplate {
    LoginTemplate
}

/// GET {protected prefix}
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> DashboardTemplate {
    DashboardTemplate {
        user_name: user.name,
        prefix: state.config.protected_prefix.trim_end_matches('/').to_string(),
    }
}

/// GET {protected prefix}/add-product
pub async fn add_product_page(Extension(user): Extension<SessionUser>) -> AddProductTemplate {
    AddProductTemplate {
        user_email: user.email,
    }
}
