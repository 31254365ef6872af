use super::*;

#[test]
fn vector_record_structure() {
    let record = VectorRecord {
        position: 0,
        row_id: 42,
        vector: vec![0.1, 0.2, 0.3],
    };

    assert_eq!(record.position, 0);
    assert_eq!(record.row_id, 42);
    assert_eq!(record.dimension(), 3);
}

#[test]
fn vector_record_serialization() {
    let record = VectorRecord {
        position: 3,
        row_id: 7,
        vector: vec![1.0, -0.5],
    };

    let json = serde_json::to_string(&record).expect("should serialize record");
    let back: VectorRecord = serde_json::from_str(&json).expect("should deserialize record");
    assert_eq!(back, record);
}
