//! Loads raw occurrences of a name from storage.

use crate::CoreError;
use crate::db::{RawOccurrence, Storage};

/// Occurrences of a name together with its currently accepted form.
#[derive(Debug, Default)]
pub struct Candidates {
    /// Accepted canonical, empty if the name is unknown to the backbone.
    pub current_canonical: String,
    pub rows: Vec<RawOccurrence>,
}

/// Find occurrences of `canonical`. With `with_taxon` the lookup goes through
/// the accepted name, so occurrences of all synonyms are included.
pub fn load_candidates(
    storage: &dyn Storage,
    canonical: &str,
    with_taxon: bool,
) -> Result<Candidates, CoreError> {
    let current_canonical = storage
        .find_current_name(canonical)
        .inspect_err(|e| tracing::error!(canonical, error = %e, "cannot get current canonical"))?
        .unwrap_or_default();

    let rows = if with_taxon && !current_canonical.is_empty() {
        storage.find_occurrences(&current_canonical, true)
    } else {
        storage.find_occurrences(canonical, false)
    }
    .inspect_err(|e| tracing::error!(canonical, error = %e, "cannot load occurrences"))?;

    tracing::debug!(canonical, rows = rows.len(), with_taxon, "loaded occurrences");
    Ok(Candidates {
        current_canonical,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockStorage;

    fn occ(page_id: i64, name: &str) -> RawOccurrence {
        RawOccurrence {
            page_id,
            matched_canonical: name.to_string(),
            ..Default::default()
        }
    }

    fn storage() -> MockStorage {
        MockStorage::new()
            .with_occurrences("Aus cus", vec![occ(1, "Aus cus")])
            .with_taxon_occurrences("Aus bus", vec![occ(1, "Aus cus"), occ(2, "Aus bus")])
            .with_current_name("Aus cus", "Aus bus")
    }

    #[test]
    fn name_search_uses_matched_name() {
        let res = load_candidates(&storage(), "Aus cus", false).unwrap();
        assert_eq!(res.current_canonical, "Aus bus");
        assert_eq!(res.rows.len(), 1);
    }

    #[test]
    fn taxon_search_uses_accepted_name() {
        let res = load_candidates(&storage(), "Aus cus", true).unwrap();
        assert_eq!(res.rows.len(), 2);
    }

    #[test]
    fn unknown_name_falls_back_to_itself() {
        let storage = MockStorage::new().with_occurrences("Xus yus", vec![occ(5, "Xus yus")]);
        let res = load_candidates(&storage, "Xus yus", true).unwrap();
        assert_eq!(res.current_canonical, "");
        assert_eq!(res.rows.len(), 1);
    }

    #[test]
    fn storage_failure_is_returned() {
        let storage = MockStorage::new().failing_for("Aus bus");
        let err = load_candidates(&storage, "Aus bus", false).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(storage.call_count(), 1);
    }

    #[test]
    fn current_name_failure_is_returned() {
        for with_taxon in [false, true] {
            let storage = MockStorage::new()
                .with_occurrences("Aus bus", vec![occ(1, "Aus bus")])
                .failing_current_name();
            let err = load_candidates(&storage, "Aus bus", with_taxon).unwrap_err();
            assert!(matches!(err, CoreError::Storage(_)), "with_taxon {with_taxon}");
            assert_eq!(storage.call_count(), 0, "with_taxon {with_taxon}");
        }
    }
}
