//! Database schema for both back ends.
//!
//! Column names follow the tables the dashboard already reads:
//! `session_data`, `raw_timeseries` and `interpolated_timeseries`.

/// PostgreSQL schema. Requires PostGIS for the `location` column.
pub const POSTGRES_SCHEMA: &str = r#"
CREATE EXTENSION IF NOT EXISTS postgis;

CREATE TABLE IF NOT EXISTS session_data (
    sessionid UUID PRIMARY KEY,
    devicename TEXT NOT NULL,
    profilenumber BIGINT NOT NULL UNIQUE,
    startdatetime TIMESTAMPTZ NOT NULL,
    airtemp DOUBLE PRECISION,
    location geometry(Point, 4326),
    filename TEXT NOT NULL,
    windspeed DOUBLE PRECISION,
    winddirection DOUBLE PRECISION,
    airpressure DOUBLE PRECISION
);

CREATE INDEX IF NOT EXISTS idx_session_data_start ON session_data(startdatetime DESC);

CREATE TABLE IF NOT EXISTS raw_timeseries (
    sessionid UUID NOT NULL REFERENCES session_data(sessionid) ON DELETE CASCADE,
    seq BIGINT NOT NULL,
    salinity DOUBLE PRECISION,
    temperature DOUBLE PRECISION,
    pressure_dbar DOUBLE PRECISION NOT NULL,
    oxygen DOUBLE PRECISION,
    fluorescence DOUBLE PRECISION,
    turbidity DOUBLE PRECISION,

    PRIMARY KEY (sessionid, seq)
);

CREATE TABLE IF NOT EXISTS interpolated_timeseries (
    sessionid UUID NOT NULL REFERENCES session_data(sessionid) ON DELETE CASCADE,
    seq BIGINT,
    salinity DOUBLE PRECISION,
    temperature DOUBLE PRECISION,
    pressure_dbar DOUBLE PRECISION NOT NULL,
    oxygen DOUBLE PRECISION,
    fluorescence DOUBLE PRECISION,
    turbidity DOUBLE PRECISION,

    PRIMARY KEY (sessionid, pressure_dbar)
);

CREATE INDEX IF NOT EXISTS idx_interpolated_depth ON interpolated_timeseries(pressure_dbar);
"#;

/// SQLite schema. `location` holds WKT (`POINT(lon lat)`).
pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_data (
    sessionid BLOB PRIMARY KEY,
    devicename TEXT NOT NULL,
    profilenumber INTEGER NOT NULL UNIQUE,
    startdatetime TEXT NOT NULL,
    airtemp REAL,
    location TEXT,
    filename TEXT NOT NULL,
    windspeed REAL,
    winddirection REAL,
    airpressure REAL
);

CREATE INDEX IF NOT EXISTS idx_session_data_start ON session_data(startdatetime);

CREATE TABLE IF NOT EXISTS raw_timeseries (
    sessionid BLOB NOT NULL REFERENCES session_data(sessionid) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    salinity REAL,
    temperature REAL,
    pressure_dbar REAL NOT NULL,
    oxygen REAL,
    fluorescence REAL,
    turbidity REAL,

    PRIMARY KEY (sessionid, seq)
);

CREATE TABLE IF NOT EXISTS interpolated_timeseries (
    sessionid BLOB NOT NULL REFERENCES session_data(sessionid) ON DELETE CASCADE,
    seq INTEGER,
    salinity REAL,
    temperature REAL,
    pressure_dbar REAL NOT NULL,
    oxygen REAL,
    fluorescence REAL,
    turbidity REAL,

    PRIMARY KEY (sessionid, pressure_dbar)
);
"#;

/// Split a schema script into individual statements.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_split() {
        let pg: Vec<_> = statements(POSTGRES_SCHEMA).collect();
        assert_eq!(pg.len(), 6);
        assert!(pg[0].starts_with("CREATE EXTENSION"));

        let sqlite: Vec<_> = statements(SQLITE_SCHEMA).collect();
        assert_eq!(sqlite.len(), 4);
        assert!(sqlite.iter().all(|s| s.starts_with("CREATE")));
    }

    #[test]
    fn test_profile_number_unique_in_both() {
        for sql in [POSTGRES_SCHEMA, SQLITE_SCHEMA] {
            assert!(sql.contains("profilenumber BIGINT NOT NULL UNIQUE")
                || sql.contains("profilenumber INTEGER NOT NULL UNIQUE"));
        }
    }
}
