//! Star-schema DDL for the SQLite reference store.

use rusqlite::Connection;
use tracing::debug;

use super::types::AnalyticsResult;

/// Tables the store reads from. Every store call checks them before querying.
pub const REQUIRED_TABLES: &[&str] = &[
    "dim_date",
    "dim_location",
    "dim_industry_field",
    "dim_job",
    "fact_salaries",
];

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS dim_date (
    date_id   INTEGER PRIMARY KEY,
    full_date TEXT NOT NULL UNIQUE,
    year      INTEGER NOT NULL,
    quarter   INTEGER NOT NULL CHECK (quarter BETWEEN 1 AND 4),
    month     INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12)
);

CREATE TABLE IF NOT EXISTS dim_location (
    location_id   INTEGER PRIMARY KEY,
    city_name     TEXT NOT NULL,
    oblast_name   TEXT NOT NULL,
    district_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dim_industry_field (
    industry_field_id   INTEGER PRIMARY KEY,
    industry_field_code TEXT NOT NULL UNIQUE,
    industry_field_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS dim_job (
    job_id                  INTEGER PRIMARY KEY,
    job_role_title          TEXT NOT NULL,
    standard_job_role_title TEXT NOT NULL,
    hierarchy_level_name    TEXT NOT NULL,
    industry_field_id       INTEGER NOT NULL REFERENCES dim_industry_field(industry_field_id)
);

CREATE TABLE IF NOT EXISTS dim_employer (
    employer_id   INTEGER PRIMARY KEY,
    employer_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dim_employee (
    employee_id       INTEGER PRIMARY KEY,
    birth_date        TEXT,
    career_start_date TEXT
);

CREATE TABLE IF NOT EXISTS fact_salaries (
    salary_fact_id INTEGER PRIMARY KEY,
    date_id        INTEGER NOT NULL REFERENCES dim_date(date_id),
    location_id    INTEGER NOT NULL REFERENCES dim_location(location_id),
    employer_id    INTEGER NOT NULL REFERENCES dim_employer(employer_id),
    job_id         INTEGER NOT NULL REFERENCES dim_job(job_id),
    employee_id    INTEGER NOT NULL REFERENCES dim_employee(employee_id),
    salary_amount  REAL NOT NULL CHECK (salary_amount >= 0),
    bonus_amount   REAL
);

CREATE INDEX IF NOT EXISTS idx_fact_salaries_date ON fact_salaries(date_id);
CREATE INDEX IF NOT EXISTS idx_fact_salaries_location ON fact_salaries(location_id);
CREATE INDEX IF NOT EXISTS idx_fact_salaries_job ON fact_salaries(job_id);
CREATE INDEX IF NOT EXISTS idx_dim_location_names ON dim_location(city_name, oblast_name, district_name);
CREATE INDEX IF NOT EXISTS idx_dim_job_standard ON dim_job(standard_job_role_title, hierarchy_level_name);
";

/// Create every table and index that does not exist yet.
pub fn apply(conn: &Connection) -> AnalyticsResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    debug!("salary schema applied");
    Ok(())
}
