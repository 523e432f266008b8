//! Rendering of confirmation and reset mail.
//!
//! Bodies are per-language HTML templates with a `{token}` placeholder
//! for the signed token; confirmation and reset links embed it as a
//! URL parameter on the caller's side.

use std::collections::HashMap;

use keygate_core::{KeygateError, KeygateResult, Mail};

use crate::config::MailTemplate;

const TOKEN_PLACEHOLDER: &str = "{token}";

/// Substitute the signed token into a body template.
pub fn render_body(template: &str, token: &str) -> String {
    template.replace(TOKEN_PLACEHOLDER, token)
}

/// Look up the template for `lang` and build the message around the
/// signed token. A missing language is a configuration error, not a
/// user error.
pub fn build_mail(
    templates: &HashMap<String, MailTemplate>,
    from: &str,
    to: &str,
    lang: &str,
    token: &str,
) -> KeygateResult<Mail> {
    let template = templates
        .get(lang)
        .ok_or_else(|| KeygateError::Mail(format!("no mail template for language {lang:?}")))?;

    Ok(Mail {
        from: from.to_string(),
        to: vec![to.to_string()],
        subject: template.subject.clone(),
        body: render_body(&template.body, token),
    })
}
