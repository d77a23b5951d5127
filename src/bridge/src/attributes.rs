use std::collections::BTreeMap;

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value::Value};

use crate::error::ConversionFailure;
use crate::source::{LabelKey, LabelValue, Resource};

/// Label set of one time-series, before it is turned into OTLP attributes.
///
/// Keys are unique and ordered, so equal label sets always produce equal
/// attribute lists regardless of the source map's iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Starts from the resource labels. A missing resource yields an empty set.
    pub fn from_resource(resource: Option<&Resource>) -> Self {
        let labels = resource
            .map(|r| {
                r.labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self(labels)
    }

    /// Adds the time-series labels on top, overriding resource labels with
    /// the same key. Absent values are skipped.
    pub fn with_series_labels(
        &self,
        keys: &[LabelKey],
        values: &[LabelValue],
    ) -> Result<Self, ConversionFailure> {
        if keys.len() != values.len() {
            return Err(ConversionFailure::LabelArityMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }

        let mut labels = self.0.clone();
        for (key, value) in keys.iter().zip(values) {
            if value.present {
                labels.insert(key.key.clone(), value.value.clone());
            }
        }
        Ok(Self(labels))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_attributes(&self) -> Vec<KeyValue> {
        self.0
            .iter()
            .map(|(key, value)| string_attribute(key, value))
            .collect()
    }
}

pub fn string_attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

/// Converts a resource label mapping straight to attributes.
pub fn resource_attributes(resource: Option<&Resource>) -> Vec<KeyValue> {
    LabelSet::from_resource(resource).to_attributes()
}
