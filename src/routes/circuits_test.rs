use super::*;

#[test]
fn circuit_errors_map_to_statuses() {
    assert_eq!(circuit_error_to_status(circuit::CircuitError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(
        circuit_error_to_status(circuit::CircuitError::Invalid("name is required")),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        circuit_error_to_status(circuit::CircuitError::Database(sqlx::Error::PoolClosed)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
