//! HTML email bodies.

use std::fmt::Write;

use crate::model::{
    api::otp::Code,
    common::{Position, Purpose},
    db::{Nomination, Withdrawal},
};

use super::Email;

/// Escape text for inclusion in HTML.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(heading: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family: sans-serif\">\
         <h2>{heading}</h2>{body}\
         <p style=\"color: #777\">This is an automated message, please do not reply.</p>\
         </body></html>"
    )
}

fn position_list<'a>(positions: impl IntoIterator<Item = &'a Position>) -> String {
    let mut list = String::from("<ul>");
    for position in positions {
        let _ = write!(list, "<li>{position}</li>");
    }
    list.push_str("</ul>");
    list
}

/// The one-time code for `purpose` on the named event.
pub fn otp(to: &str, purpose: Purpose, event_name: &str, code: Code, valid_minutes: i64) -> Email {
    let action = match purpose {
        Purpose::Nomination => "submit your nomination",
        Purpose::Withdrawal => "withdraw your nomination",
        Purpose::Voting => "cast your vote",
    };
    let event = escape(event_name);
    let body = format!(
        "<p>Use the code below to {action} for <strong>{event}</strong>.</p>\
         <p style=\"font-size: 2em; letter-spacing: 0.3em\"><strong>{code}</strong></p>\
         <p>The code expires in {valid_minutes} minutes. If you did not ask for it, \
         you can ignore this email.</p>"
    );
    Email {
        to: to.to_string(),
        subject: format!("Your {purpose} verification code for {event_name}"),
        html: layout("Verification code", &body),
    }
}

/// Confirms a nomination and carries the link used to withdraw it later.
pub fn nomination_confirmation(
    nomination: &Nomination,
    event_name: &str,
    frontend_url: &str,
) -> Email {
    let link = format!(
        "{frontend_url}/withdraw?token={}",
        nomination.withdrawal_token
    );
    let body = format!(
        "<p>Dear {name},</p>\
         <p>Your nomination for <strong>{event}</strong> has been received for:</p>{positions}\
         <p>If you later wish to withdraw from some or all of these positions, use this \
         link. Keep it private, anyone with it can request a withdrawal code.</p>\
         <p><a href=\"{href}\">{href}</a></p>",
        name = escape(&nomination.full_name()),
        event = escape(event_name),
        positions = position_list(&nomination.positions),
        href = escape(&link),
    );
    Email {
        to: nomination.email.clone(),
        subject: format!("Nomination received: {event_name}"),
        html: layout("Nomination received", &body),
    }
}

/// A receipt enumerating each position and the candidate chosen for it.
pub fn vote_receipt(to: &str, event_name: &str, choices: &[(Position, String)]) -> Email {
    let mut rows = String::new();
    for (position, candidate) in choices {
        let _ = write!(
            rows,
            "<tr><td>{position}</td><td>{}</td></tr>",
            escape(candidate)
        );
    }
    let body = format!(
        "<p>Your vote in <strong>{event}</strong> has been recorded.</p>\
         <table><tr><th align=\"left\">Position</th><th align=\"left\">Candidate</th></tr>\
         {rows}</table>",
        event = escape(event_name),
    );
    Email {
        to: to.to_string(),
        subject: format!("Vote receipt: {event_name}"),
        html: layout("Vote recorded", &body),
    }
}

/// Confirms which positions were given up and which are kept.
pub fn withdrawal_confirmation(
    nomination: &Nomination,
    event_name: &str,
    withdrawal: &Withdrawal,
) -> Email {
    let kept = if withdrawal.is_complete() {
        "<p>Your nomination has been withdrawn completely.</p>".to_string()
    } else {
        format!(
            "<p>You remain nominated for:</p>{}",
            position_list(&withdrawal.kept)
        )
    };
    let body = format!(
        "<p>Dear {name},</p>\
         <p>You have withdrawn from the following positions in <strong>{event}</strong>:</p>\
         {withdrawn}{kept}",
        name = escape(&nomination.full_name()),
        event = escape(event_name),
        withdrawn = position_list(&withdrawal.withdrawn),
    );
    Email {
        to: nomination.email.clone(),
        subject: format!("Nomination withdrawn: {event_name}"),
        html: layout("Withdrawal confirmed", &body),
    }
}
