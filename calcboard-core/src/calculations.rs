//! Calculation lifecycle: browse, read, edit, add, delete.
//!
//! Every operation takes the resolved owner explicitly. A record that exists
//! but belongs to someone else is reported exactly like a missing one.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::{CalculationQuery, CalculationStore};
use crate::types::{Calculation, CalculationUpdate, NewCalculation};

/// Validate a record identifier and return it in canonical hyphenated form.
pub fn parse_id(id: &str) -> Result<String> {
    uuid::Uuid::parse_str(id.trim())
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|_| Error::InvalidId(id.to_string()))
}

/// Validate, compute and persist a new calculation for `owner`.
pub fn create_calculation<S: CalculationStore + ?Sized>(
    store: &S,
    owner: &str,
    request: &NewCalculation,
) -> Result<Calculation> {
    let calc = Calculation::from_request(owner, request)?;
    store.create(&calc)?;

    tracing::info!(
        id = %calc.id,
        owner,
        operation = %calc.operation,
        inputs = calc.inputs.len(),
        "Calculation created"
    );
    Ok(calc)
}

/// Fetch one of `owner`'s calculations.
pub fn get_calculation<S: CalculationStore + ?Sized>(
    store: &S,
    owner: &str,
    id: &str,
) -> Result<Calculation> {
    let id = parse_id(id)?;
    store.get(&id, owner)?.ok_or(Error::NotFound)
}

/// All of `owner`'s calculations, newest first.
pub fn list_calculations<S: CalculationStore + ?Sized>(
    store: &S,
    owner: &str,
) -> Result<Vec<Calculation>> {
    store.list_by_owner(owner, &CalculationQuery::all())
}

/// Edit one of `owner`'s calculations.
pub fn update_calculation<S: CalculationStore + ?Sized>(
    store: &S,
    owner: &str,
    id: &str,
    update: &CalculationUpdate,
) -> Result<Calculation> {
    update_calculation_at(store, owner, id, update, Utc::now())
}

/// [`update_calculation`] with an explicit clock.
pub fn update_calculation_at<S: CalculationStore + ?Sized>(
    store: &S,
    owner: &str,
    id: &str,
    update: &CalculationUpdate,
    now: DateTime<Utc>,
) -> Result<Calculation> {
    let mut calc = get_calculation(store, owner, id)?;
    calc.apply(update, now)?;

    // The record can vanish between read and write.
    if !store.update(&calc)? {
        return Err(Error::NotFound);
    }

    tracing::info!(
        id = %calc.id,
        owner,
        operation = %calc.operation,
        "Calculation updated"
    );
    Ok(calc)
}

/// Delete one of `owner`'s calculations.
pub fn delete_calculation<S: CalculationStore + ?Sized>(
    store: &S,
    owner: &str,
    id: &str,
) -> Result<()> {
    let id = parse_id(id)?;
    if !store.delete(&id, owner)? {
        return Err(Error::NotFound);
    }
    tracing::info!(id = %id, owner, "Calculation deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::OperationType;
    use chrono::Duration;

    fn request(tag: &str, inputs: &[f64]) -> NewCalculation {
        NewCalculation {
            operation: tag.to_string(),
            inputs: inputs.to_vec(),
        }
    }

    #[test]
    fn test_create_and_read() {
        let store = MemoryStore::new();
        let calc = create_calculation(&store, "alice", &request("Addition", &[1.0, 2.0, 3.5])).unwrap();

        assert_eq!(calc.operation, OperationType::Addition);
        assert_eq!(calc.result, 6.5);

        let fetched = get_calculation(&store, "alice", &calc.id).unwrap();
        assert_eq!(fetched, calc);
    }

    #[test]
    fn test_create_rejects_invalid_request_without_persisting() {
        let store = MemoryStore::new();

        assert!(matches!(
            create_calculation(&store, "alice", &request("division", &[5.0, 0.0])),
            Err(Error::DivisionByZero)
        ));
        assert!(matches!(
            create_calculation(&store, "alice", &request("power", &[2.0, 3.0])),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(matches!(
            create_calculation(&store, "alice", &request("addition", &[5.0])),
            Err(Error::InvalidInput(_))
        ));

        assert!(list_calculations(&store, "alice").unwrap().is_empty());
    }

    #[test]
    fn test_other_owner_sees_not_found() {
        let store = MemoryStore::new();
        let calc = create_calculation(&store, "alice", &request("addition", &[1.0, 2.0])).unwrap();

        assert!(matches!(
            get_calculation(&store, "bob", &calc.id),
            Err(Error::NotFound)
        ));
        let missing = uuid::Uuid::new_v4().to_string();
        assert!(matches!(
            get_calculation(&store, "bob", &missing),
            Err(Error::NotFound)
        ));

        let update = CalculationUpdate {
            operation: None,
            inputs: Some(vec![100.0, 200.0]),
        };
        assert!(matches!(
            update_calculation(&store, "bob", &calc.id, &update),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            delete_calculation(&store, "bob", &calc.id),
            Err(Error::NotFound)
        ));

        // Alice's record is unchanged.
        let fetched = get_calculation(&store, "alice", &calc.id).unwrap();
        assert_eq!(fetched.result, 3.0);
    }

    #[test]
    fn test_malformed_id() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_calculation(&store, "alice", "not-a-uuid"),
            Err(Error::InvalidId(_))
        ));
        assert!(matches!(
            delete_calculation(&store, "alice", "42"),
            Err(Error::InvalidId(_))
        ));
    }

    #[test]
    fn test_parse_id_canonicalizes() {
        let id = uuid::Uuid::new_v4();
        let upper = id.hyphenated().to_string().to_uppercase();
        assert_eq!(parse_id(&upper).unwrap(), id.to_string());
    }

    #[test]
    fn test_update_recomputes_and_keeps_created_at() {
        let store = MemoryStore::new();
        let created = Utc::now() - Duration::hours(1);
        let calc =
            Calculation::new_at("alice", OperationType::Addition, vec![2.0, 3.0], created).unwrap();
        store.create(&calc).unwrap();

        let update = CalculationUpdate {
            operation: Some("multiplication".to_string()),
            inputs: None,
        };
        let updated = update_calculation(&store, "alice", &calc.id, &update).unwrap();

        assert_eq!(updated.result, 6.0);
        assert_eq!(updated.inputs, vec![2.0, 3.0]);
        assert_eq!(updated.created_at, created);
        assert!(updated.updated_at > created);

        let fetched = get_calculation(&store, "alice", &calc.id).unwrap();
        assert_eq!(fetched, updated);
    }

    #[test]
    fn test_failed_update_leaves_stored_record() {
        let store = MemoryStore::new();
        let calc = create_calculation(&store, "alice", &request("addition", &[4.0, 0.0])).unwrap();

        let update = CalculationUpdate {
            operation: Some("division".to_string()),
            inputs: None,
        };
        assert!(matches!(
            update_calculation(&store, "alice", &calc.id, &update),
            Err(Error::DivisionByZero)
        ));

        let fetched = get_calculation(&store, "alice", &calc.id).unwrap();
        assert_eq!(fetched, calc);
    }

    #[test]
    fn test_empty_update_refreshes_timestamp() {
        let store = MemoryStore::new();
        let calc = create_calculation(&store, "alice", &request("subtraction", &[9.0, 4.0])).unwrap();

        let updated =
            update_calculation_at(&store, "alice", &calc.id, &CalculationUpdate::default(), calc.updated_at)
                .unwrap();
        assert!(updated.updated_at > calc.updated_at);
        assert_eq!(updated.result, 5.0);
    }

    #[test]
    fn test_delete_then_read() {
        let store = MemoryStore::new();
        let calc = create_calculation(&store, "alice", &request("addition", &[1.0, 1.0])).unwrap();

        delete_calculation(&store, "alice", &calc.id).unwrap();
        assert!(matches!(
            get_calculation(&store, "alice", &calc.id),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            delete_calculation(&store, "alice", &calc.id),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_list_is_newest_first_and_scoped() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (i, owner) in ["alice", "bob", "alice"].iter().enumerate() {
            let calc = Calculation::new_at(
                owner,
                OperationType::Addition,
                vec![i as f64, 1.0],
                now + Duration::seconds(i as i64),
            )
            .unwrap();
            store.create(&calc).unwrap();
        }

        let listed = list_calculations(&store, "alice").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at > listed[1].created_at);
        assert!(listed.iter().all(|c| c.user_id == "alice"));
    }
}
