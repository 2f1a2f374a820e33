use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::{
        api::validation::{self, Issues},
        common::{Position, Year},
        db::Nomination,
        mongodb::Id,
    },
};

const LOCATION_MAX: usize = 200;

/// The nomination form as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NominationForm {
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub faculty: String,
    pub year: String,
    pub positions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A student's identifying details, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDetails {
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub faculty: String,
    pub year: Year,
}

impl StudentDetails {
    /// Validate the raw fields, recording issues against the given field names
    /// (`[first name, last name, student ID, faculty, year]`).
    pub fn check(
        issues: &mut Issues,
        fields: [&str; 5],
        values: [&str; 5],
    ) -> Option<Self> {
        let [first_name_field, last_name_field, student_id_field, faculty_field, year_field] =
            fields;
        let [first_name, last_name, student_id, faculty, year] = values;
        let first_name = issues.check(first_name_field, validation::name(first_name));
        let last_name = issues.check(last_name_field, validation::name(last_name));
        let student_id = issues.check(student_id_field, validation::student_id(student_id));
        let faculty = issues.check(faculty_field, validation::faculty(faculty));
        let year = issues.check(year_field, validation::year(year));
        Some(Self {
            first_name: first_name?,
            last_name: last_name?,
            student_id: student_id?,
            faculty: faculty?,
            year: year?,
        })
    }
}

/// A nomination form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominationDetails {
    pub student: StudentDetails,
    pub positions: BTreeSet<Position>,
    pub location: Option<String>,
}

/// Optional free-text location, blank treated as absent.
pub(crate) fn location(issues: &mut Issues, value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    issues.check("location", validation::required_text(value, LOCATION_MAX))
}

impl NominationForm {
    pub fn validate(&self) -> Result<NominationDetails> {
        let mut issues = Issues::new();
        let student = StudentDetails::check(
            &mut issues,
            ["firstName", "lastName", "studentId", "faculty", "year"],
            [
                self.first_name.as_str(),
                self.last_name.as_str(),
                self.student_id.as_str(),
                self.faculty.as_str(),
                self.year.as_str(),
            ],
        );
        let positions = issues.check("positions", validation::positions(&self.positions, true));
        let location = location(&mut issues, self.location.as_deref());

        let details = student.zip(positions).map(|(student, positions)| NominationDetails {
            student,
            positions,
            location,
        });
        issues.finish_with(details)
    }
}

/// Returned to the nominee on a successful submission or withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationReceipt {
    pub id: Id,
    pub event_id: Id,
    pub positions: BTreeSet<Position>,
    pub is_withdrawn: bool,
    pub withdrawn_positions: BTreeSet<Position>,
    pub created_at: DateTime<Utc>,
}

impl From<&Nomination> for NominationReceipt {
    fn from(nomination: &Nomination) -> Self {
        Self {
            id: nomination.id,
            event_id: nomination.event_id,
            positions: nomination.positions.clone(),
            is_withdrawn: nomination.is_withdrawn,
            withdrawn_positions: nomination.withdrawn_positions.clone(),
            created_at: nomination.created_at,
        }
    }
}

/// A nomination as shown to admins. The withdrawal token is never shown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationDescription {
    pub id: Id,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub faculty: String,
    pub year: Year,
    pub positions: BTreeSet<Position>,
    pub is_withdrawn: bool,
    pub withdrawn_positions: BTreeSet<Position>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Nomination> for NominationDescription {
    fn from(nomination: Nomination) -> Self {
        Self {
            id: nomination.id,
            email: nomination.email,
            first_name: nomination.first_name,
            last_name: nomination.last_name,
            student_id: nomination.student_id,
            faculty: nomination.faculty,
            year: nomination.year,
            positions: nomination.positions,
            is_withdrawn: nomination.is_withdrawn,
            withdrawn_positions: nomination.withdrawn_positions,
            withdrawn_at: nomination.withdrawn_at,
            ip_address: nomination.ip_address,
            location: nomination.location,
            created_at: nomination.created_at,
        }
    }
}
