//! Validation and normalisation of the people covered by one purchase.

use serde::Deserialize;
use serde_json::Value;

use crate::entities::user;

const MIN_NAME_LEN: usize = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeInput {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub passport_data: Option<Value>,
}

/// An attendee that passed validation and is ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendee {
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub passport_data: Option<Value>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttendeeError {
    #[error("attendee details are required when booking for {0} people")]
    MissingAttendeeData(i32),

    #[error("expected {expected} attendees, got {actual}")]
    AttendeeCountMismatch { expected: i32, actual: usize },

    #[error("attendee #{0} must have a full name of at least 2 characters")]
    InvalidAttendeeName(usize),
}

/// Produces exactly `num_people` attendees or fails. `num_people` must already
/// be validated as positive.
pub fn reconcile(
    num_people: i32,
    attendees: Option<&[AttendeeInput]>,
    requester: &user::Model,
) -> Result<Vec<NewAttendee>, AttendeeError> {
    let Some(attendees) = attendees else {
        if num_people == 1 {
            return Ok(vec![from_profile(requester)]);
        }
        return Err(AttendeeError::MissingAttendeeData(num_people));
    };

    if usize::try_from(num_people).ok() != Some(attendees.len()) {
        return Err(AttendeeError::AttendeeCountMismatch {
            expected: num_people,
            actual: attendees.len(),
        });
    }

    attendees
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let full_name = input.full_name.trim();
            if full_name.chars().count() < MIN_NAME_LEN {
                return Err(AttendeeError::InvalidAttendeeName(index + 1));
            }
            let (first_name, last_name, middle_name) = split_full_name(full_name);
            Ok(NewAttendee {
                full_name: full_name.to_string(),
                first_name,
                last_name,
                middle_name,
                email: non_empty(input.email.as_deref()),
                phone: non_empty(input.phone.as_deref()),
                passport_data: input.passport_data.clone(),
            })
        })
        .collect()
}

fn from_profile(requester: &user::Model) -> NewAttendee {
    let (first_name, last_name, middle_name) = split_full_name(&requester.full_name);
    NewAttendee {
        full_name: requester.full_name.trim().to_string(),
        first_name,
        last_name,
        middle_name,
        email: non_empty(Some(&requester.email)),
        phone: non_empty(requester.phone.as_deref()),
        passport_data: None,
    }
}

/// First token is the first name, last token the last name (the first token
/// again when there is only one), anything in between the middle name.
pub fn split_full_name(full_name: &str) -> (String, String, Option<String>) {
    let tokens: Vec<&str> = full_name.split_whitespace().collect();
    match tokens.as_slice() {
        [] => (String::new(), String::new(), None),
        [only] => (only.to_string(), only.to_string(), None),
        [first, middle @ .., last] => {
            let middle = (!middle.is_empty()).then(|| middle.join(" "));
            (first.to_string(), last.to_string(), middle)
        }
    }
}

/// Lower-cased with whitespace runs collapsed to one space.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl NewAttendee {
    /// Whether this attendee is the requester: matching e-mail, or matching
    /// normalised name when no e-mail was given.
    pub fn is_requester(&self, requester: &user::Model) -> bool {
        match &self.email {
            Some(email) => email.to_lowercase() == requester.email.trim().to_lowercase(),
            None => normalize_name(&self.full_name) == normalize_name(&requester.full_name),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
