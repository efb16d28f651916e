/// Provenance labels ("Tap water", "River Thames", ...) attached to the
/// newest reading of a device. Only the label column is ever rewritten.

use crate::logging::{self, DataSource};
use crate::model::{AnnotateError, StoredReading, ValidationError, MAX_LABEL_CHARS};
use crate::store::ReadingStore;

/// Trims a label and checks its length in characters.
pub fn validate_label(label: &str) -> Result<&str, ValidationError> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    let len = trimmed.chars().count();
    if len > MAX_LABEL_CHARS {
        return Err(ValidationError::LabelTooLong { len, max: MAX_LABEL_CHARS });
    }
    Ok(trimmed)
}

/// Labels the newest reading of `device_id` and returns the updated record.
pub fn annotate<S>(store: &mut S, device_id: &str, label: &str) -> Result<StoredReading, AnnotateError>
where
    S: ReadingStore + ?Sized,
{
    let label = validate_label(label)?;

    let latest = store
        .latest(device_id)?
        .ok_or_else(|| AnnotateError::NothingToLabel(device_id.to_string()))?;

    let updated = store.update_label(latest.id, label).map_err(|e| {
        logging::log_store_failure(device_id, "update label", &e);
        e
    })?;

    logging::info(
        DataSource::Database,
        Some(device_id),
        &format!("record {} labelled \"{}\"", updated.id, label),
    );
    Ok(updated)
}
