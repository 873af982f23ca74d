//! Most recent decoded values, keyed by frame direction and Data-ID label.

use crate::{
    frame::Direction,
    message::{Message, Value},
};
use alloc::{borrow::Cow, collections::BTreeMap};

#[derive(Default, Debug)]
struct Entries {
    values: BTreeMap<Cow<'static, str>, Value>,
    status_labels: BTreeMap<&'static str, &'static str>,
}

/// Store of the latest value seen per direction and label.
///
/// Data-IDs sharing a label overwrite each other.
#[derive(Default, Debug)]
pub struct DataStore {
    directions: BTreeMap<Direction, Entries>,
}

impl DataStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            directions: BTreeMap::new(),
        }
    }

    /// Stores the value of a decoded message.
    ///
    /// For status messages, the human-readable status labels are stored as well.
    pub fn update(&mut self, msg: &Message) {
        let entries = self.directions.entry(msg.frame.direction).or_default();

        if let Value::Status(status) = &msg.value {
            entries.status_labels = status.labels();
        }

        entries.values.insert(msg.label.clone(), msg.value.clone());
    }

    /// Returns the latest value stored for a direction and label.
    #[must_use]
    pub fn get(&self, direction: Direction, label: &str) -> Option<&Value> {
        self.directions.get(&direction)?.values.get(label)
    }

    /// Returns the human-readable labels of the latest status seen in a direction.
    #[must_use]
    pub fn status_labels(&self, direction: Direction) -> Option<&BTreeMap<&'static str, &'static str>> {
        self.directions
            .get(&direction)
            .map(|entries| &entries.status_labels)
            .filter(|labels| !labels.is_empty())
    }

    /// Returns an iterator over all labels and values stored for a direction.
    pub fn iter(&self, direction: Direction) -> impl Iterator<Item = (&str, &Value)> {
        self.directions
            .get(&direction)
            .into_iter()
            .flat_map(|entries| entries.values.iter())
            .map(|(label, value)| (label.as_ref(), value))
    }

    /// Returns whether no values have been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }
}
