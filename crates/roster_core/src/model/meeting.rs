//! Meeting aggregate.

use super::{Aggregate, Entity, EntityId, EntityKind, NoChildren};
use crate::validation::Rule;
use crate::wrapper::field::{
    into_ids, into_optional_number, into_text, FieldDescriptor, FieldValue,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const TITLE: &str = "title";
pub const DATE_FROM: &str = "date_from";
pub const DATE_TO: &str = "date_to";
pub const PARTICIPANT_IDS: &str = "participant_ids";

static MEETING_FIELDS: Lazy<Vec<FieldDescriptor<Meeting>>> = Lazy::new(|| {
    vec![
        FieldDescriptor::<Meeting>::new(
            TITLE,
            |meeting| FieldValue::text(meeting.title.as_str()),
            |meeting, value| {
                meeting.title = into_text(value)?;
                Ok(())
            },
        )
        .with_rule(Rule::required("Title is required"))
        .with_rule(Rule::max_length(50, "Title must be at most 50 characters")),
        FieldDescriptor::<Meeting>::new(
            DATE_FROM,
            |meeting| meeting.date_from.into(),
            |meeting, value| {
                meeting.date_from = into_optional_number(value)?;
                Ok(())
            },
        ),
        FieldDescriptor::<Meeting>::new(
            DATE_TO,
            |meeting| meeting.date_to.into(),
            |meeting, value| {
                meeting.date_to = into_optional_number(value)?;
                Ok(())
            },
        ),
        FieldDescriptor::<Meeting>::new(
            PARTICIPANT_IDS,
            |meeting| meeting.participant_ids.clone().into(),
            |meeting, value| {
                meeting.participant_ids = into_ids(value)?;
                Ok(())
            },
        ),
    ]
});

/// A scheduled get-together between friends.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meeting {
    pub id: EntityId,
    pub title: String,
    /// Unix epoch milliseconds.
    pub date_from: Option<i64>,
    /// Unix epoch milliseconds.
    pub date_to: Option<i64>,
    /// Friends taking part; a listed friend cannot be deleted.
    pub participant_ids: Vec<EntityId>,
}

impl Meeting {
    pub fn new(title: impl Into<String>, participant_ids: Vec<EntityId>) -> Self {
        Self {
            title: title.into(),
            participant_ids,
            ..Self::default()
        }
    }
}

impl Entity for Meeting {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn fields() -> &'static [FieldDescriptor<Self>] {
        &MEETING_FIELDS
    }

    fn create_validation_fields() -> &'static [&'static str] {
        &[TITLE]
    }
}

impl Aggregate for Meeting {
    const KIND: EntityKind = EntityKind::Meeting;

    type Child = NoChildren;

    fn new_transient() -> Self {
        Self::default()
    }

    fn label(&self) -> String {
        self.title.trim().to_string()
    }

    fn children(&self) -> &[NoChildren] {
        &[]
    }

    fn children_mut(&mut self) -> &mut [NoChildren] {
        &mut []
    }

    fn set_children(&mut self, _children: Vec<NoChildren>) {}

    fn picker_kinds() -> &'static [EntityKind] {
        &[EntityKind::Friend]
    }
}
