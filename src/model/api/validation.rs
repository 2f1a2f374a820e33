//! Field validators shared by the nomination, ballot and admin bodies.
//!
//! Validators never stop at the first problem: each failing field is
//! recorded in an [`Issues`] collector so the client sees every issue at once.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::{Error, Issue, Result},
    model::common::{Position, Year},
};

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z' -]+$").expect("valid regex"));
static FACULTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z&' ,.-]+$").expect("valid regex"));
static STUDENT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{7}$").expect("valid regex"));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
static SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid regex"));

const NAME_MAX: usize = 50;
const FACULTY_MAX: usize = 100;
const MIN_STUDENT_ID: u32 = 3_000_000;

/// Collects field-level validation issues.
#[derive(Debug, Default)]
pub struct Issues(Vec<Issue>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the error of a failed check, passing any value through.
    pub fn check<T>(&mut self, field: impl Into<String>, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.0.push(Issue::new(field, message));
                None
            }
        }
    }

    pub fn push(&mut self, issue: Issue) {
        self.0.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Succeed iff no issue was recorded.
    pub fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(self.0))
        }
    }

    /// Succeed with `value` iff no issue was recorded. Every check that
    /// produced a part of `value` records an issue on failure, so `value`
    /// is only missing when an issue was recorded.
    pub fn finish_with<T>(self, value: Option<T>) -> Result<T> {
        self.finish()?;
        value.ok_or_else(|| Error::Internal("validated value is incomplete".to_string()))
    }
}

/// A first or last name.
pub fn name(value: &str) -> Result<String, String> {
    let value = value.trim();
    let len = value.chars().count();
    if len == 0 || len > NAME_MAX {
        return Err(format!("must be between 1 and {NAME_MAX} characters"));
    }
    if !NAME.is_match(value) {
        return Err("may only contain letters, spaces, apostrophes and hyphens".to_string());
    }
    Ok(value.to_string())
}

/// A faculty name.
pub fn faculty(value: &str) -> Result<String, String> {
    let value = value.trim();
    let len = value.chars().count();
    if len == 0 || len > FACULTY_MAX {
        return Err(format!("must be between 1 and {FACULTY_MAX} characters"));
    }
    if !FACULTY.is_match(value) {
        return Err("contains invalid characters".to_string());
    }
    Ok(value.to_string())
}

/// A seven-digit student number, numerically greater than 3,000,000.
///
/// The pattern is checked before the numeric bound.
pub fn student_id(value: &str) -> Result<String, String> {
    if !STUDENT_ID.is_match(value) {
        return Err("must be exactly 7 digits".to_string());
    }
    let number = value
        .parse::<u32>()
        .map_err(|_| "must be exactly 7 digits".to_string())?;
    if number <= MIN_STUDENT_ID {
        return Err(format!("must be greater than {MIN_STUDENT_ID}"));
    }
    Ok(value.to_string())
}

pub fn year(value: &str) -> Result<Year, String> {
    value.parse::<Year>().map_err(|_| {
        let choices = Year::ALL.map(|year| year.as_str()).join(", ");
        format!("must be one of: {choices}")
    })
}

/// A set of positions, at least one of which must be given when `required`.
pub fn positions(values: &[String], required: bool) -> Result<BTreeSet<Position>, String> {
    if required && values.is_empty() {
        return Err("select at least one position".to_string());
    }
    values
        .iter()
        .map(|value| {
            value
                .parse::<Position>()
                .map_err(|err| err.to_string())
        })
        .collect()
}

/// An email address in any domain, normalised to lowercase.
pub fn email(value: &str) -> Result<String, String> {
    let value = value.trim().to_lowercase();
    if value.len() > 254 || !EMAIL.is_match(&value) {
        return Err("must be a valid email address".to_string());
    }
    Ok(value)
}

/// An email address that must belong to the institutional `domain`.
pub fn institutional_email(value: &str, domain: &str) -> Result<String, String> {
    let value = email(value)?;
    let suffix = format!("@{}", domain.to_lowercase());
    if !value.ends_with(&suffix) {
        return Err(format!("must be a {suffix} address"));
    }
    Ok(value)
}

/// An event slug: lowercase letters, digits and hyphens.
pub fn slug(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() || value.len() > 100 || !SLUG.is_match(value) {
        return Err("must contain only lowercase letters, digits and hyphens".to_string());
    }
    Ok(value.to_string())
}

/// Free text that must not be blank.
pub fn required_text(value: &str, max: usize) -> Result<String, String> {
    let value = value.trim();
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(format!("must be between 1 and {max} characters"));
    }
    Ok(value.to_string())
}
