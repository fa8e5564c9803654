//! Feature and label matrices.
//!
//! Aligned events are pivoted into one surprise matrix per forecast variant;
//! labels are forward returns over the session that follows each row date.

pub mod builder;
pub mod events;
pub mod labels;
pub mod matrix;
pub mod surprise;

pub use builder::FeatureMatrixBuilder;
pub use events::{AlignedEvent, EventPreparer};
pub use labels::{finish_labels, label_column, label_columns, LabelBuilder, LabelSet};
pub use matrix::{normalize_column, DateMatrix, FeatureMatrix, LabelMatrix, SparseMatrix};
pub use surprise::{percent_surprise, ForecastVariant};
