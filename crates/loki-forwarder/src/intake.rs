// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

use crate::entry::{Entry, Labels};
use crate::errors::IntakeError;
use crate::flatten::flatten;

/// Label carrying the routing key of the source (topic, listener, ...).
pub const ROUTING_KEY_LABEL: &str = "key";
/// Label carrying the record's client identifier, when it has one.
pub const CLIENT_ID_LABEL: &str = "clientId";
/// Flat record field the client identifier is read from.
pub const CLIENT_ID_FIELD: &str = "clientID";

/// Fixed weight of the label names in an entry's size estimate.
const LABEL_NAMES_SIZE: usize = 8;

/// Turns raw records from one source into pipeline entries.
#[derive(Debug, Clone)]
pub struct Intake {
    routing_key: String,
}

impl Intake {
    pub fn new(routing_key: impl Into<String>) -> Self {
        Intake {
            routing_key: routing_key.into(),
        }
    }

    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Parses `raw` as a JSON object and flattens it into a single line.
    ///
    /// The entry is labelled with the routing key and, when the flat record
    /// has a string `clientID`, with that client id. Its size is the raw
    /// record length plus the label overhead.
    pub fn entry_from_slice(&self, raw: &[u8]) -> Result<Entry, IntakeError> {
        let record: Value = serde_json::from_slice(raw).map_err(IntakeError::Parse)?;
        let flat = flatten(&record)?;
        let line = serde_json::to_string(&flat).map_err(IntakeError::Serialize)?;

        let mut labels = Labels::new();
        labels.insert(ROUTING_KEY_LABEL.to_string(), self.routing_key.clone());

        let client_id = match flat.get(CLIENT_ID_FIELD) {
            Some(Value::String(client_id)) => client_id.as_str(),
            _ => "",
        };
        if !client_id.is_empty() {
            labels.insert(CLIENT_ID_LABEL.to_string(), client_id.to_string());
        }

        let size = raw.len() + LABEL_NAMES_SIZE + client_id.len();
        Ok(Entry::new(labels, line).with_size(size))
    }
}
