//! Friend aggregate and its phone-number children.
//!
//! # Invariants
//! - `first_name` is required and may not be the literal "Robot" (any case).
//! - Phone numbers belong to exactly one friend through `friend_id`.

use super::{Aggregate, Entity, EntityId, EntityKind};
use crate::validation::Rule;
use crate::wrapper::field::{
    into_optional_number, into_optional_text, into_text, FieldDescriptor, FieldValue,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const EMAIL: &str = "email";
pub const FAVORITE_LANGUAGE_ID: &str = "favorite_language_id";
pub const PHONE_NUMBER: &str = "number";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ]+$").expect("valid phone regex"));

static FRIEND_FIELDS: Lazy<Vec<FieldDescriptor<Friend>>> = Lazy::new(|| {
    vec![
        FieldDescriptor::<Friend>::new(
            FIRST_NAME,
            |friend| FieldValue::text(friend.first_name.as_str()),
            |friend, value| {
                friend.first_name = into_text(value)?;
                Ok(())
            },
        )
        .with_rule(Rule::required("First name is required"))
        .with_rule(Rule::reject_literal("Robot", "Robots are not valid friends"))
        .with_rule(Rule::max_length(50, "First name must be at most 50 characters")),
        FieldDescriptor::<Friend>::new(
            LAST_NAME,
            |friend| friend.last_name.clone().into(),
            |friend, value| {
                friend.last_name = into_optional_text(value)?;
                Ok(())
            },
        )
        .with_rule(Rule::max_length(50, "Last name must be at most 50 characters")),
        FieldDescriptor::<Friend>::new(
            EMAIL,
            |friend| friend.email.clone().into(),
            |friend, value| {
                friend.email = into_optional_text(value)?;
                Ok(())
            },
        )
        .with_rule(Rule::pattern(&EMAIL_RE, "Email is not a valid address")),
        FieldDescriptor::<Friend>::new(
            FAVORITE_LANGUAGE_ID,
            |friend| friend.favorite_language_id.into(),
            |friend, value| {
                friend.favorite_language_id = into_optional_number(value)?;
                Ok(())
            },
        ),
    ]
});

static PHONE_FIELDS: Lazy<Vec<FieldDescriptor<FriendPhoneNumber>>> = Lazy::new(|| {
    vec![FieldDescriptor::<FriendPhoneNumber>::new(
        PHONE_NUMBER,
        |phone| FieldValue::text(phone.number.as_str()),
        |phone, value| {
            phone.number = into_text(value)?;
            Ok(())
        },
    )
    .with_rule(Rule::required("Phone number is required"))
    .with_rule(Rule::pattern(
        &PHONE_RE,
        "Phone number may contain digits, spaces and a leading +",
    ))]
});

/// A person tracked by the organizer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Friend {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// References a `ProgrammingLanguage` lookup entry.
    pub favorite_language_id: Option<EntityId>,
    pub phone_numbers: Vec<FriendPhoneNumber>,
}

impl Friend {
    pub fn new(first_name: impl Into<String>, last_name: Option<&str>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.map(str::to_string),
            ..Self::default()
        }
    }
}

/// Phone number owned by a friend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FriendPhoneNumber {
    pub id: EntityId,
    pub number: String,
    pub friend_id: EntityId,
}

impl FriendPhoneNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ..Self::default()
        }
    }
}

impl Entity for Friend {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
        for phone in &mut self.phone_numbers {
            phone.friend_id = id;
        }
    }

    fn fields() -> &'static [FieldDescriptor<Self>] {
        &FRIEND_FIELDS
    }

    fn create_validation_fields() -> &'static [&'static str] {
        &[FIRST_NAME]
    }
}

impl Aggregate for Friend {
    const KIND: EntityKind = EntityKind::Friend;

    type Child = FriendPhoneNumber;

    fn new_transient() -> Self {
        Self::default()
    }

    fn label(&self) -> String {
        match self.last_name.as_deref() {
            Some(last_name) => format!("{} {}", self.first_name, last_name)
                .trim()
                .to_string(),
            None => self.first_name.trim().to_string(),
        }
    }

    fn children(&self) -> &[FriendPhoneNumber] {
        &self.phone_numbers
    }

    fn children_mut(&mut self) -> &mut [FriendPhoneNumber] {
        &mut self.phone_numbers
    }

    fn set_children(&mut self, children: Vec<FriendPhoneNumber>) {
        self.phone_numbers = children;
    }

    fn new_child(&self) -> Option<FriendPhoneNumber> {
        Some(FriendPhoneNumber {
            friend_id: self.id,
            ..FriendPhoneNumber::default()
        })
    }

    fn picker_kinds() -> &'static [EntityKind] {
        &[EntityKind::ProgrammingLanguage]
    }
}

impl Entity for FriendPhoneNumber {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn fields() -> &'static [FieldDescriptor<Self>] {
        &PHONE_FIELDS
    }

    fn create_validation_fields() -> &'static [&'static str] {
        &[PHONE_NUMBER]
    }
}
