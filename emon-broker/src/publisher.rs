// EMon Broker - Subscription scheduling and publishing
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Publisher abstraction
//!
//! The scheduler never encodes messages. It hands each [`Batch`] to a
//! [`Publisher`], which owns the wire format.

use crate::batch::Batch;
use crate::error::Result;

/// Trait for batch sinks
pub trait Publisher {
    /// Deliver one batch
    fn publish(&mut self, batch: &Batch) -> Result<()>;
}

/// A publisher that keeps every batch, for tests and local inspection
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    batches: Vec<Batch>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All batches received so far
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// The most recent batch
    pub fn last(&self) -> Option<&Batch> {
        self.batches.last()
    }

    /// Take the received batches, leaving the publisher empty
    pub fn drain(&mut self) -> Vec<Batch> {
        std::mem::take(&mut self.batches)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, batch: &Batch) -> Result<()> {
        self.batches.push(batch.clone());
        Ok(())
    }
}

#[cfg(feature = "json")]
pub use json::JsonPublisher;

#[cfg(feature = "json")]
mod json {
    use std::io::Write;

    use serde_json::{Map, Number, Value};

    use super::Publisher;
    use crate::batch::{Batch, BatchEntry};
    use crate::error::{BrokerError, Result};

    /// Writes each batch as one line of JSON
    ///
    /// ```text
    /// {"result":{"Power":{"value":24.0,"units":"W","min":24.0,"max":24.0,"time":"000000.500"},
    ///            "message_time":{"value":"000000.500","units":"UTC"}},"id":1}
    /// ```
    ///
    /// Undefined values and extrema are written as `null`.
    #[derive(Debug)]
    pub struct JsonPublisher<W: Write> {
        writer: W,
        next_id: u64,
    }

    impl<W: Write> JsonPublisher<W> {
        pub fn new(writer: W) -> Self {
            Self { writer, next_id: 1 }
        }

        /// Id the next message will carry
        pub fn next_id(&self) -> u64 {
            self.next_id
        }

        pub fn into_inner(self) -> W {
            self.writer
        }

        /// Build the JSON document for a batch with the given message id
        pub fn render(batch: &Batch, id: u64) -> Value {
            let mut result = Map::new();
            for entry in &batch.entries {
                result.insert(entry.name.clone(), render_entry(entry));
            }

            let mut message_time = Map::new();
            message_time.insert(
                "value".to_string(),
                Value::String(batch.message_time.clone()),
            );
            message_time.insert("units".to_string(), Value::String(batch.time_zone.clone()));
            result.insert("message_time".to_string(), Value::Object(message_time));

            let mut root = Map::new();
            root.insert("result".to_string(), Value::Object(result));
            root.insert("id".to_string(), Value::from(id));
            Value::Object(root)
        }
    }

    fn render_entry(entry: &BatchEntry) -> Value {
        let mut fields = Map::new();
        fields.insert(
            "value".to_string(),
            number(entry.value, entry.precision),
        );
        fields.insert("units".to_string(), Value::String(entry.unit.clone()));
        if let Some(min) = entry.min {
            fields.insert("min".to_string(), number(min, entry.precision));
        }
        if let Some(max) = entry.max {
            fields.insert("max".to_string(), number(max, entry.precision));
        }
        fields.insert("time".to_string(), Value::String(entry.sample_time.clone()));
        Value::Object(fields)
    }

    /// A value rounded to `precision` decimals, or `null` if not finite
    fn number(value: f64, precision: u8) -> Value {
        let scale = 10f64.powi(precision as i32);
        let rounded = (value * scale).round() / scale;
        Number::from_f64(rounded)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    impl<W: Write> Publisher for JsonPublisher<W> {
        fn publish(&mut self, batch: &Batch) -> Result<()> {
            let doc = Self::render(batch, self.next_id);
            serde_json::to_writer(&mut self.writer, &doc)
                .map_err(|e| BrokerError::Publish(e.to_string()))?;
            self.writer.write_all(b"\n")?;
            self.writer.flush()?;
            self.next_id += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchEntry;

    fn batch() -> Batch {
        let mut batch = Batch::new("000000.500", "UTC");
        batch.push(BatchEntry {
            name: "Power".to_string(),
            unit: "W".to_string(),
            value: 24.0,
            min: Some(23.5),
            max: Some(24.25),
            sample_time: "000000.500".to_string(),
            precision: 3,
        });
        batch
    }

    #[test]
    fn test_memory_publisher_records() {
        let mut publisher = MemoryPublisher::new();
        assert!(publisher.is_empty());
        publisher.publish(&batch()).unwrap();
        publisher.publish(&batch()).unwrap();
        assert_eq!(publisher.len(), 2);
        assert_eq!(publisher.last().unwrap().len(), 1);

        let drained = publisher.drain();
        assert_eq!(drained.len(), 2);
        assert!(publisher.is_empty());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_publisher_shape() {
        let mut publisher = JsonPublisher::new(Vec::new());
        publisher.publish(&batch()).unwrap();
        assert_eq!(publisher.next_id(), 2);

        let out = String::from_utf8(publisher.into_inner()).unwrap();
        assert!(out.ends_with('\n'));
        let doc: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(doc["id"], 1);
        assert_eq!(doc["result"]["Power"]["value"], 24.0);
        assert_eq!(doc["result"]["Power"]["units"], "W");
        assert_eq!(doc["result"]["Power"]["min"], 23.5);
        assert_eq!(doc["result"]["Power"]["max"], 24.25);
        assert_eq!(doc["result"]["Power"]["time"], "000000.500");
        assert_eq!(doc["result"]["message_time"]["units"], "UTC");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_publisher_undefined_is_null() {
        let mut batch = batch();
        batch.entries[0].value = f64::NAN;
        batch.entries[0].min = Some(f64::NAN);
        let doc = JsonPublisher::<Vec<u8>>::render(&batch, 7);
        assert!(doc["result"]["Power"]["value"].is_null());
        assert!(doc["result"]["Power"]["min"].is_null());
        assert_eq!(doc["id"], 7);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_publisher_rounds_to_precision() {
        let mut batch = batch();
        batch.entries[0].value = 1.23456;
        batch.entries[0].precision = 2;
        let doc = JsonPublisher::<Vec<u8>>::render(&batch, 1);
        assert_eq!(doc["result"]["Power"]["value"], 1.23);
    }
}
