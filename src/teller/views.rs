//! Server-rendered pages.

use std::fmt::Write;

use super::csrf::CSRF_FIELD;

/// Fields the accounts page needs.
#[derive(Debug)]
pub struct AccountsPage<'a> {
    pub username: &'a str,
    pub balance: i64,
    pub transfers: bool,
    pub csrf_token: Option<&'a str>,
}

#[must_use]
pub fn login_page(csrf_token: Option<&str>) -> String {
    let mut body = String::from("<h1>Login</h1>\n<form method=\"post\" action=\"/\">\n");
    if let Some(token) = csrf_token {
        let _ = writeln!(
            body,
            r#"  <input type="hidden" name="{CSRF_FIELD}" value="{}">"#,
            escape(token)
        );
    }
    body.push_str(
        r#"  <label>Username <input type="text" name="username" autocomplete="username"></label>
  <label>Password <input type="password" name="password" autocomplete="current-password"></label>
  <button type="submit">Login</button>
</form>"#,
    );

    layout("Login", &body)
}

#[must_use]
pub fn accounts_page(page: &AccountsPage<'_>) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>Welcome, {}</h1>", escape(page.username));
    let _ = writeln!(
        body,
        r#"<p>Your balance is <span id="balance">{}</span></p>"#,
        page.balance
    );
    body.push_str("<form method=\"post\" action=\"/accounts\">\n");
    if let Some(token) = page.csrf_token {
        let _ = writeln!(
            body,
            r#"  <input type="hidden" name="{CSRF_FIELD}" value="{}">"#,
            escape(token)
        );
    }
    if page.transfers {
        body.push_str(
            "  <label>Recipient account <input type=\"text\" name=\"account\"></label>\n",
        );
        body.push_str("  <label>Amount <input type=\"text\" name=\"amount\"></label>\n");
        body.push_str("  <button type=\"submit\">Transfer</button>\n");
    } else {
        body.push_str("  <label>Amount <input type=\"text\" name=\"amount\"></label>\n");
        body.push_str("  <button type=\"submit\">Withdraw</button>\n");
    }
    body.push_str("</form>\n<p><a href=\"/logout\">Logout</a></p>");

    layout("Accounts", &body)
}

#[must_use]
pub fn not_found_page() -> String {
    layout(
        "404 Not Found",
        "<h1>404</h1>\n<p>The page you are looking for does not exist.</p>\n<p><a href=\"/\">Home</a></p>",
    )
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
