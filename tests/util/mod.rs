//! Shared fixture for integration tests: a small salary star schema on disk.
//!
//! Roles (all in 2024):
//! - "Data Scientist": 15 rows at 200000, Moscow, IT, Senior
//! - "Accountant": 12 rows at 50000, Kazan, Finance, Middle
//! - "Designer": 5 rows at 120000, Moscow, IT, Junior
//!
//! Data Scientist and Accountant rows cycle through January, February and
//! March; Designer rows are all in March.

#![allow(dead_code)]

use std::path::PathBuf;

use rusqlite::{Connection, params};
use salary_analytics::analytics::schema;
use tempfile::TempDir;

pub const TOTAL_ROWS: i64 = 32;

/// Create and seed a fixture database inside a fresh temp dir.
pub fn fixture_db() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let db_path = tmp.path().join("salary.db");
    let conn = Connection::open(&db_path).expect("open db");
    seed(&conn);
    (tmp, db_path)
}

pub fn seed(conn: &Connection) {
    schema::apply(conn).expect("apply schema");
    conn.execute_batch(
        r#"
        INSERT INTO dim_date (date_id, full_date, year, quarter, month) VALUES
            (1, '2024-01-15', 2024, 1, 1),
            (2, '2024-02-15', 2024, 1, 2),
            (3, '2024-03-15', 2024, 1, 3);
        INSERT INTO dim_location (location_id, city_name, oblast_name, district_name) VALUES
            (1, 'Moscow', 'Moscow', 'Central'),
            (2, 'Kazan', 'Tatarstan', 'Volga'),
            (3, 'Podolsk', 'Moscow Oblast', 'Central');
        INSERT INTO dim_industry_field (industry_field_id, industry_field_code, industry_field_name) VALUES
            (1, 'IT', 'IT'),
            (2, 'FIN', 'Finance');
        INSERT INTO dim_job (job_id, job_role_title, standard_job_role_title, hierarchy_level_name, industry_field_id) VALUES
            (1, 'ML Engineer', 'Data Scientist', 'Senior', 1),
            (2, 'Chief Accountant', 'Accountant', 'Middle', 2),
            (3, 'UI Designer', 'Designer', 'Junior', 1);
        INSERT INTO dim_employer (employer_id, employer_name) VALUES (1, 'Acme');
        INSERT INTO dim_employee (employee_id, birth_date, career_start_date) VALUES
            (1, '1990-05-01', '2012-09-01');
        "#,
    )
    .expect("seed dimensions");

    let mut insert = conn
        .prepare(
            "INSERT INTO fact_salaries
                (date_id, location_id, employer_id, job_id, employee_id, salary_amount, bonus_amount)
             VALUES (?1, ?2, 1, ?3, 1, ?4, NULL)",
        )
        .expect("prepare insert");
    for i in 0..15i64 {
        insert
            .execute(params![i % 3 + 1, 1, 1, 200_000.0])
            .expect("insert data scientist");
    }
    for i in 0..12i64 {
        insert
            .execute(params![i % 3 + 1, 2, 2, 50_000.0])
            .expect("insert accountant");
    }
    for _ in 0..5 {
        insert
            .execute(params![3, 1, 3, 120_000.0])
            .expect("insert designer");
    }
}
