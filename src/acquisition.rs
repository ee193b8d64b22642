//! Polling-cycle orchestration
//!
//! One cycle reads every planned chunk in order through a
//! [`RegisterTransport`], then decodes all fields into a [`DecodedRecord`].
//! A cycle is all-or-nothing: any failed read or inconsistent response aborts
//! it with [`MeterError::Cycle`] and no record is produced.

use crate::decoder::{Endianness, Value, decode_field};
use crate::error::{MeterError, Result};
use crate::planner::{ChunkPlan, ChunkPlanner};
use crate::register_map::DeviceDescriptor;
use crate::transport::RegisterTransport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Values of one successful polling cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRecord {
    /// Device the values were read from
    pub device: String,

    /// Capture time, taken after the last chunk was read
    pub timestamp: DateTime<Utc>,

    /// Field name to decoded value
    pub values: BTreeMap<String, Value>,
}

impl DecodedRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names of float fields holding NaN or an infinity
    pub fn non_finite_fields(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(_, v)| matches!(v, Value::Float(f) if !f.is_finite()))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Serialize as a single JSON object
    ///
    /// JSON has no NaN or infinity; such values are written as `null`. Use
    /// [`DecodedRecord::non_finite_fields`] to tell them apart from absent
    /// fields.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode the responses of a whole plan into a record
///
/// `responses[i]` must hold the words read for `plan.chunks()[i]`. A chunk
/// whose word count differs from the plan fails with a cycle error wrapping
/// [`MeterError::Decode`]; nothing is truncated or padded.
pub fn decode_record(
    descriptor: &DeviceDescriptor,
    plan: &ChunkPlan,
    endianness: &Endianness,
    responses: &[Vec<u16>],
    timestamp: DateTime<Utc>,
) -> Result<DecodedRecord> {
    if plan.slots().len() != descriptor.len() {
        return Err(MeterError::decode(format!(
            "plan covers {} fields but device '{}' has {}",
            plan.slots().len(),
            descriptor.name(),
            descriptor.len()
        )));
    }
    if responses.len() != plan.chunks().len() {
        return Err(MeterError::decode(format!(
            "plan has {} chunks but {} responses were supplied",
            plan.chunks().len(),
            responses.len()
        )));
    }

    for (index, (chunk, words)) in plan.chunks().iter().zip(responses).enumerate() {
        if words.len() != usize::from(chunk.count) {
            return Err(MeterError::cycle(
                index,
                chunk,
                MeterError::decode(format!(
                    "expected {} words, transport returned {}",
                    chunk.count,
                    words.len()
                )),
            ));
        }
    }

    let mut values = BTreeMap::new();
    for (field, slot) in descriptor.fields().iter().zip(plan.slots()) {
        let words = &responses[slot.chunk];
        let offset = usize::from(slot.offset);
        let end = offset + usize::from(field.word_count);
        let value = words
            .get(offset..end)
            .ok_or_else(|| {
                MeterError::decode(format!(
                    "field '{}' lies outside its chunk ({}..{} of {})",
                    field.name,
                    offset,
                    end,
                    words.len()
                ))
            })
            .and_then(|w| decode_field(w, field, endianness))
            .map_err(|e| MeterError::cycle(slot.chunk, &plan.chunks()[slot.chunk], e))?;
        values.insert(field.name.clone(), value);
    }

    Ok(DecodedRecord {
        device: descriptor.name().to_string(),
        timestamp,
        values,
    })
}

/// Drives planner, transport and decoder for one device
pub struct Acquisition<T> {
    descriptor: Arc<DeviceDescriptor>,
    plan: Arc<ChunkPlan>,
    endianness: Endianness,
    transport: T,
}

impl<T: RegisterTransport> Acquisition<T> {
    /// Plan the reads for `descriptor` once and keep the plan for every cycle
    pub fn new(
        descriptor: Arc<DeviceDescriptor>,
        endianness: Endianness,
        planner: ChunkPlanner,
        transport: T,
    ) -> Result<Self> {
        let plan = Arc::new(planner.plan(&descriptor)?);
        Ok(Self {
            descriptor,
            plan,
            endianness,
            transport,
        })
    }

    pub fn descriptor(&self) -> &Arc<DeviceDescriptor> {
        &self.descriptor
    }

    pub fn plan(&self) -> &Arc<ChunkPlan> {
        &self.plan
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run one polling cycle
    ///
    /// Chunks are read strictly one after another. The first failing or
    /// short read aborts the cycle with [`MeterError::Cycle`] naming that
    /// chunk; no further requests are issued and words already read in this
    /// cycle are dropped.
    pub async fn run_cycle(&mut self) -> Result<DecodedRecord> {
        let mut responses = Vec::with_capacity(self.plan.chunks().len());
        for (index, chunk) in self.plan.chunks().iter().enumerate() {
            let words = self
                .transport
                .read(chunk.start, chunk.count)
                .await
                .map_err(|e| MeterError::cycle(index, chunk, e))?;
            if words.len() != usize::from(chunk.count) {
                return Err(MeterError::cycle(
                    index,
                    chunk,
                    MeterError::decode(format!(
                        "expected {} words, transport returned {}",
                        chunk.count,
                        words.len()
                    )),
                ));
            }
            responses.push(words);
        }

        decode_record(
            &self.descriptor,
            &self.plan,
            &self.endianness,
            &responses,
            Utc::now(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Order;
    use crate::register_map::{RegisterField, ValueKind};

    fn descriptor() -> DeviceDescriptor {
        DeviceDescriptor::new(
            "unit",
            vec![
                RegisterField::new("voltage", 10, ValueKind::Float32),
                RegisterField::new("status", 12, ValueKind::UInt16),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_decode_record_by_slot() {
        let d = descriptor();
        let plan = ChunkPlanner::new(100).plan(&d).unwrap();
        let record = decode_record(
            &d,
            &plan,
            &Endianness::default(),
            &[vec![0x4348, 0x0000, 7]],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(record.get("voltage"), Some(&Value::Float(200.0)));
        assert_eq!(record.get("status"), Some(&Value::Unsigned(7)));
        assert_eq!(record.device, "unit");
    }

    #[test]
    fn test_decode_record_little_word_order() {
        let d = descriptor();
        let plan = ChunkPlanner::new(100).plan(&d).unwrap();
        let endianness = Endianness::new(Order::Big, Order::Little);
        let record =
            decode_record(&d, &plan, &endianness, &[vec![0x0000, 0x4348, 7]], Utc::now())
                .unwrap();
        assert_eq!(record.get("voltage"), Some(&Value::Float(200.0)));
    }

    #[test]
    fn test_short_response_is_decode_error() {
        let d = descriptor();
        let plan = ChunkPlanner::new(100).plan(&d).unwrap();
        let err = decode_record(
            &d,
            &plan,
            &Endianness::default(),
            &[vec![0x4348, 0x0000]],
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.failed_chunk(), Some(0));
        assert!(matches!(err.root_cause(), MeterError::Decode { .. }));
    }

    #[test]
    fn test_missing_response_is_decode_error() {
        let d = descriptor();
        let plan = ChunkPlanner::new(100).plan(&d).unwrap();
        let err = decode_record(&d, &plan, &Endianness::default(), &[], Utc::now()).unwrap_err();
        assert!(matches!(err, MeterError::Decode { .. }));
    }

    #[test]
    fn test_nan_is_null_in_json_and_reported() {
        let d = descriptor();
        let plan = ChunkPlanner::new(100).plan(&d).unwrap();
        let record = decode_record(
            &d,
            &plan,
            &Endianness::default(),
            &[vec![0x7FC0, 0x0000, 7]],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(record.non_finite_fields(), ["voltage"]);
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert!(json["values"]["voltage"].is_null());
        assert_eq!(json["values"]["status"], 7);
    }

    #[test]
    fn test_record_json_shape() {
        let d = descriptor();
        let plan = ChunkPlanner::new(100).plan(&d).unwrap();
        let record = decode_record(
            &d,
            &plan,
            &Endianness::default(),
            &[vec![0x4348, 0x0000, 7]],
            Utc::now(),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(json["device"], "unit");
        assert_eq!(json["values"]["voltage"], 200.0);
        assert_eq!(json["values"]["status"], 7);
    }
}
