//! Home page: every stored file with its size

use hyper::Response;

use crate::config::AppState;
use crate::error::AppResult;
use crate::handler::router::RequestContext;
use crate::http::{self, ResponseBody};
use crate::storage::template::ListingTemplate;

pub async fn home(state: &AppState, ctx: &RequestContext) -> AppResult<Response<ResponseBody>> {
    let entries = state.store.list().await?;
    // Read per request so template edits show up without a restart
    let template = ListingTemplate::load(&state.template_path).await?;
    let html = template.render(&entries, &state.config.http.server_name);
    Ok(http::build_html_response(html, ctx.is_head()))
}
