//! Landing-page variants. Markup is deliberately minimal; the interesting
//! part of each request is the boundary hook in [`crate::tracking`].

use axum::{response::Html, Extension};

use crate::tracking::CurrentSession;

/// `GET /` — variant A landing page. An optional `uid` query parameter
/// identifies the visitor; the boundary hook stores it.
pub async fn index() -> Html<String> {
    Html(layout(
        "Welcome",
        r#"<h1>Welcome</h1>
<p>Everything you need, in one place.</p>
<p><a href="/learn_more">Learn more</a></p>
<p><a class="button" href="/log_binary">Sign me up</a></p>"#,
    ))
}

/// `GET /learn_more`
pub async fn learn_more() -> Html<String> {
    Html(layout(
        "Learn more",
        r#"<h1>Learn more</h1>
<p>Here is how it works.</p>
<p><a href="/confirmation">Continue</a></p>"#,
    ))
}

/// `GET /confirmation` — terminal page; ends the visit's timing.
pub async fn confirmation(Extension(CurrentSession(session)): Extension<CurrentSession>) -> Html<String> {
    Html(done_page(session.visitor_id.as_deref()))
}

/// `GET /website_b` — variant B landing page. Accepts `uid` like `/`.
pub async fn website_b() -> Html<String> {
    Html(layout(
        "Welcome",
        r#"<h1>Try it today</h1>
<p>Start in minutes. No setup required.</p>
<p><a href="/learn_more_b">See how</a></p>
<p><a class="button" href="/log_binary">Get started</a></p>"#,
    ))
}

/// `GET /learn_more_b`
pub async fn learn_more_b() -> Html<String> {
    Html(layout(
        "How it works",
        r#"<h1>How it works</h1>
<p>Three steps and you are done.</p>
<p><a href="/confirmation_b">Continue</a></p>"#,
    ))
}

/// `GET /confirmation_b`
pub async fn confirmation_b(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Html<String> {
    Html(done_page(session.visitor_id.as_deref()))
}

fn done_page(visitor_id: Option<&str>) -> String {
    let body = match visitor_id {
        Some(id) => format!(
            "<h1>Thank you!</h1>\n<p>Your participant id is <code>{}</code>.</p>",
            escape_html(id)
        ),
        None => "<h1>Thank you!</h1>".to_string(),
    };
    layout("Thank you", &body)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body></html>\n",
        escape_html(title),
        body
    )
}

/// The visitor id comes straight from a query string.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
