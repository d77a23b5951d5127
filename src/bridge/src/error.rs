use std::fmt;

use chrono::{DateTime, Utc};

use crate::source::MetricKind;

/// Why a single source metric could not be converted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionFailure {
    #[error("unsupported metric kind {0}")]
    UnsupportedKind(MetricKind),
    #[error("point value is {found} but the descriptor declares {expected}")]
    ValueKindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("time-series carries {values} label values for {keys} label keys")]
    LabelArityMismatch { keys: usize, values: usize },
    #[error("timestamp {0} cannot be expressed as nanoseconds since the Unix epoch")]
    TimestampOutOfRange(DateTime<Utc>),
}

/// Failure record for one source metric. The metric produces no output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to convert metric {metric:?}: {reason}")]
pub struct ConversionError {
    pub metric: String,
    pub reason: ConversionFailure,
}

impl ConversionError {
    pub fn new(metric: impl Into<String>, reason: ConversionFailure) -> Self {
        Self {
            metric: metric.into(),
            reason,
        }
    }
}

/// Every conversion failure from one produce call, in encounter order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateError {
    errors: Vec<ConversionError>,
}

impl AggregateError {
    /// Returns `None` when there is nothing to report.
    pub fn from_errors(errors: Vec<ConversionError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn errors(&self) -> &[ConversionError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversionError> {
        self.errors.iter()
    }

    /// Names of the metrics that were dropped.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.metric.as_str())
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

impl IntoIterator for AggregateError {
    type Item = ConversionError;
    type IntoIter = std::vec::IntoIter<ConversionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProduceError {
    #[error("metric production cancelled before it started")]
    Cancelled,
    #[error("{count} metric(s) dropped during conversion:\n{0}", count = .0.len())]
    Partial(AggregateError),
}
