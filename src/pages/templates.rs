//! HTML rendering. Every interpolated value goes through [`escape`].

use std::fmt::Write;

use time::{macros::format_description, OffsetDateTime};

use crate::accounts::dto::{ErrorSet, FieldSpec, LOGIN_FIELDS, REGISTRATION_FIELDS};
use crate::accounts::paths;
use crate::store::UserAccount;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn layout(title: &str, user: Option<&UserAccount>, body: &str) -> String {
    let nav = match user {
        Some(u) => format!(
            r#"<span class="navbar-text">Signed in as {}</span>
<form method="post" action="{}" class="d-inline"><button type="submit" class="btn btn-link">Log out</button></form>"#,
            escape(&u.username),
            paths::LOGOUT
        ),
        None => format!(
            r#"<a class="nav-link" href="{}">Log in</a> <a class="nav-link" href="{}">Register</a>"#,
            paths::LOGIN,
            paths::REGISTER
        ),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css">
</head>
<body>
<nav class="navbar px-3"><a class="navbar-brand" href="{home}">Home</a>{nav}</nav>
<main class="container">
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        home = paths::HOME,
    )
}

pub fn home(user: Option<&UserAccount>) -> String {
    let body = match user {
        Some(u) => format!("<h1>Welcome back, {}!</h1>", escape(&u.username)),
        None => format!(
            r#"<h1>Welcome!</h1>
<p>You are not signed in. <a href="{}">Create an account</a> or <a href="{}">log in</a>.</p>"#,
            paths::REGISTER,
            paths::LOGIN
        ),
    };
    layout("Home", user, &body)
}

pub fn current_time(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");
    let stamp = now.format(&fmt).unwrap_or_else(|_| now.to_string());
    format!("<html><body><h2>Current date and time: {stamp}</h2></body></html>")
}

pub fn register(values: &[(&str, &str)], errors: Option<&ErrorSet>) -> String {
    let form = form(paths::REGISTER, "Sign up", &REGISTRATION_FIELDS, values, errors);
    layout("Register", None, &format!("<h1>Register</h1>\n{form}"))
}

pub fn login(values: &[(&str, &str)], errors: Option<&ErrorSet>) -> String {
    let form = form(paths::LOGIN, "Log in", &LOGIN_FIELDS, values, errors);
    layout("Log in", None, &format!("<h1>Log in</h1>\n{form}"))
}

/// Renders a form from field definitions. Password inputs never echo a
/// submitted value.
fn form(
    action: &str,
    submit: &str,
    fields: &[FieldSpec],
    values: &[(&str, &str)],
    errors: Option<&ErrorSet>,
) -> String {
    let mut out = format!(r#"<form method="post" action="{action}">"#);
    out.push('\n');

    if let Some(errors) = errors {
        for msg in errors.non_field() {
            let _ = writeln!(out, r#"<div class="alert alert-danger">{}</div>"#, escape(msg));
        }
    }

    for field in fields {
        let value = if field.input_type == "password" {
            ""
        } else {
            values
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, v)| *v)
                .unwrap_or("")
        };
        let _ = writeln!(
            out,
            r#"<div class="mb-3"><label for="id_{name}">{label}</label>
<input type="{ty}" name="{name}" id="id_{name}" class="{class}" placeholder="{placeholder}" value="{value}" required>"#,
            name = field.name,
            label = escape(field.label),
            ty = field.input_type,
            class = field.css_class,
            placeholder = escape(field.placeholder),
            value = escape(value),
        );
        if let Some(help) = field.help_text {
            let _ = writeln!(out, r#"<small class="form-text">{}</small>"#, escape(help));
        }
        if let Some(messages) = errors.and_then(|e| e.get(field.name)) {
            out.push_str(r#"<ul class="errorlist">"#);
            for msg in messages {
                let _ = write!(out, "<li>{}</li>", escape(msg));
            }
            out.push_str("</ul>\n");
        }
        out.push_str("</div>\n");
    }

    let _ = writeln!(
        out,
        r#"<button type="submit" class="btn btn-primary">{}</button>"#,
        escape(submit)
    );
    out.push_str("</form>");
    out
}
