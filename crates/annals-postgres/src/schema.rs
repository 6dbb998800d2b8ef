//! Event store database schema.

/// SQL to create the event records table. Safe to run repeatedly.
pub const CREATE_EVENT_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS event_records (
    event_id        UUID PRIMARY KEY,
    aggregate_type  VARCHAR(255) NOT NULL,
    aggregate_id    VARCHAR(255) NOT NULL,
    sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
    event_type      VARCHAR(255) NOT NULL,
    payload         JSONB NOT NULL,
    metadata        JSONB NOT NULL DEFAULT 'null'::jsonb,
    created_at      TIMESTAMPTZ NOT NULL,
    UNIQUE (aggregate_type, aggregate_id, sequence_number)
);

CREATE INDEX IF NOT EXISTS idx_event_records_type_id
    ON event_records (aggregate_type, aggregate_id);
";

/// Columns selected when reading records, in decode order.
pub(crate) const RECORD_COLUMNS: &str = "event_id, aggregate_id, aggregate_type, sequence_number, \
     event_type, payload, metadata, created_at";
