// 🗄️ SQLite Adapters - concrete implementations of the catalog ports
//
// Two databases, two adapters:
// - SourceDb: read-only access to the upstream car catalog
//   (car_mark / car_model / car_modification + characteristic value rows)
// - TargetDb: the business catalog (brands / vehicles / modifications),
//   opened with WAL and written through scoped upserts
//
// Name matching on the target side is case-insensitive and scoped name
// uniqueness is enforced by the schema. Characteristic rows use the upstream
// attribute ids: 12 = fuel type, 13 = cylinder capacity, 14 = horsepower,
// 27 = impulsion type.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::entities::target::UNASSIGNED_ID;
use crate::entities::{source, target};
use crate::ports::{BrandStore, ModificationStore, SourceCatalog, StoreError, VehicleStore};

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::from(anyhow::Error::new(err))
    }
}

// Well-known characteristic attribute ids in the source catalog
const CHAR_FUEL_TYPE: i64 = 12;
const CHAR_CYLINDER_CAPACITY: i64 = 13;
const CHAR_HORSE_POWER: i64 = 14;
const CHAR_IMPULSION_TYPE: i64 = 27;

// ============================================================================
// SOURCE DATABASE
// ============================================================================

pub struct SourceDb {
    conn: Connection,
}

impl SourceDb {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open source catalog at {}", path.display()))?;
        Ok(SourceDb { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        SourceDb { conn }
    }
}

impl SourceCatalog for SourceDb {
    fn marks(&self) -> Result<Vec<source::Mark>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id_car_mark, name, name_rus, id_car_type FROM car_mark ORDER BY id_car_mark",
        )?;
        let marks = stmt
            .query_map([], |row| {
                Ok(source::Mark {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    name_ru: row.get(2)?,
                    car_type_id: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(marks)
    }

    fn models_by_mark(&self, mark_id: i64) -> Result<Vec<source::Model>, StoreError> {
        // Production-year bounds are aggregated from the per-model year rows.
        // The upper bound is only meaningful when it exceeds the lower one,
        // matching the upstream catalog's convention.
        let mut stmt = self.conn.prepare(
            "SELECT car_model.id_car_model, car_model.id_car_mark, car_model.name,
                    MIN(year.year) AS year_from, MAX(year.year) AS year_to
             FROM car_model
             LEFT JOIN year ON year.id_car_model = car_model.id_car_model
             WHERE car_model.id_car_mark = ?1
             GROUP BY car_model.id_car_model, car_model.id_car_mark, car_model.name
             ORDER BY car_model.id_car_model",
        )?;
        let models = stmt
            .query_map(params![mark_id], |row| {
                let year_from: Option<i32> = row.get(3)?;
                let year_to: Option<i32> = row.get(4)?;
                Ok(source::Model {
                    id: row.get(0)?,
                    mark_id: row.get(1)?,
                    name: row.get(2)?,
                    year_from,
                    year_to: match (year_from, year_to) {
                        (Some(from), Some(to)) if to > from => Some(to),
                        _ => None,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(models)
    }

    fn modifications_by_model(
        &self,
        model_id: i64,
    ) -> Result<Vec<source::Modification>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT car_modification.id_car_modification, car_modification.id_car_model,
                    car_modification.name,
                    car_modification.start_production_year, car_modification.end_production_year,
                    car_serie.name AS serie_name,
                    car_generation.name AS generation_name,
                    car_generation.year_begin, car_generation.year_end
             FROM car_modification
             JOIN car_serie ON car_serie.id_car_serie = car_modification.id_car_serie
             JOIN car_generation
               ON car_generation.id_car_generation = car_serie.id_car_generation
             WHERE car_modification.id_car_model = ?1
             ORDER BY car_modification.start_production_year DESC",
        )?;
        let modifications = stmt
            .query_map(params![model_id], |row| {
                Ok(source::Modification {
                    id: row.get(0)?,
                    model_id: row.get(1)?,
                    name: row.get(2)?,
                    start_production_year: row.get(3)?,
                    end_production_year: row.get(4)?,
                    serie_name: row.get(5)?,
                    generation: source::Generation {
                        name: row.get(6)?,
                        year_begin: row.get(7)?,
                        year_end: row.get(8)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(modifications)
    }

    fn characteristic(
        &self,
        modification_id: i64,
    ) -> Result<Option<source::Characteristic>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT car_characteristic.id_car_characteristic, car_characteristic_value.value
             FROM car_characteristic_value
             JOIN car_characteristic
               ON car_characteristic.id_car_characteristic
                = car_characteristic_value.id_car_characteristic
             WHERE car_characteristic_value.id_car_modification = ?1
               AND car_characteristic.id_car_characteristic IN (?2, ?3, ?4, ?5)",
        )?;
        let rows = stmt
            .query_map(
                params![
                    modification_id,
                    CHAR_FUEL_TYPE,
                    CHAR_CYLINDER_CAPACITY,
                    CHAR_HORSE_POWER,
                    CHAR_IMPULSION_TYPE
                ],
                |row| {
                    let id: i64 = row.get(0)?;
                    let value: Option<String> = row.get(1)?;
                    Ok((id, value))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Attribute rows with NULL (or unparsable) values contribute nothing;
        // a modification whose rows are all empty has no characteristic at
        // all, same as one with no rows.
        let mut characteristic = source::Characteristic::default();
        let mut any_value = false;
        for (id, value) in rows {
            let Some(value) = value else { continue };
            match id {
                CHAR_FUEL_TYPE => {
                    characteristic.fuel_type = value;
                    any_value = true;
                }
                CHAR_IMPULSION_TYPE => {
                    characteristic.impulsion_type = value;
                    any_value = true;
                }
                CHAR_CYLINDER_CAPACITY => {
                    if let Ok(capacity) = value.parse() {
                        characteristic.cylinder_capacity = capacity;
                        any_value = true;
                    }
                }
                CHAR_HORSE_POWER => {
                    if let Ok(power) = value.parse() {
                        characteristic.horse_power = power;
                        any_value = true;
                    }
                }
                _ => {}
            }
        }

        if !any_value {
            return Ok(None);
        }

        Ok(Some(characteristic))
    }
}

/// Create the source-catalog schema. Production runs read an upstream export;
/// tests and demos seed their own copy through this.
pub fn setup_source_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS car_mark (
            id_car_mark INTEGER PRIMARY KEY,
            name        TEXT NOT NULL,
            name_rus    TEXT,
            id_car_type INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS car_model (
            id_car_model INTEGER PRIMARY KEY,
            id_car_mark  INTEGER NOT NULL REFERENCES car_mark(id_car_mark),
            name         TEXT NOT NULL,
            name_rus     TEXT,
            id_car_type  INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS year (
            id_car_model INTEGER NOT NULL REFERENCES car_model(id_car_model),
            year         INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS car_generation (
            id_car_generation INTEGER PRIMARY KEY,
            name              TEXT NOT NULL,
            year_begin        INTEGER,
            year_end          INTEGER
        );
        CREATE TABLE IF NOT EXISTS car_serie (
            id_car_serie      INTEGER PRIMARY KEY,
            id_car_generation INTEGER NOT NULL REFERENCES car_generation(id_car_generation),
            name              TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS car_modification (
            id_car_modification   INTEGER PRIMARY KEY,
            id_car_serie          INTEGER NOT NULL REFERENCES car_serie(id_car_serie),
            id_car_model          INTEGER NOT NULL REFERENCES car_model(id_car_model),
            name                  TEXT NOT NULL,
            start_production_year INTEGER,
            end_production_year   INTEGER
        );
        CREATE TABLE IF NOT EXISTS car_characteristic (
            id_car_characteristic INTEGER PRIMARY KEY,
            name                  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS car_characteristic_value (
            id_car_characteristic INTEGER NOT NULL REFERENCES car_characteristic(id_car_characteristic),
            id_car_modification   INTEGER NOT NULL REFERENCES car_modification(id_car_modification),
            value                 TEXT,
            unit                  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_car_model_mark ON car_model(id_car_mark);
        CREATE INDEX IF NOT EXISTS idx_year_model ON year(id_car_model);
        CREATE INDEX IF NOT EXISTS idx_car_modification_model ON car_modification(id_car_model);
        CREATE INDEX IF NOT EXISTS idx_characteristic_value_modification
            ON car_characteristic_value(id_car_modification);",
    )?;

    Ok(())
}

// ============================================================================
// TARGET DATABASE
// ============================================================================

pub struct TargetDb {
    conn: Connection,
}

impl TargetDb {
    /// Open (or create) the target catalog and ensure its schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open target catalog at {}", path.display()))?;
        setup_target_database(&conn)?;
        Ok(TargetDb { conn })
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_target_database(&conn)?;
        Ok(TargetDb { conn })
    }
}

pub fn setup_target_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery on the one database this process writes
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS brands (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            auto_id     INTEGER,
            tec_doc_id  INTEGER,
            name        TEXT NOT NULL COLLATE NOCASE
        );
        CREATE TABLE IF NOT EXISTS vehicles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            auto_id     INTEGER,
            tec_doc_id  INTEGER,
            brand_id    INTEGER NOT NULL REFERENCES brands(id),
            name        TEXT NOT NULL COLLATE NOCASE,
            year_from   TEXT,
            year_to     TEXT
        );
        CREATE TABLE IF NOT EXISTS modifications (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            auto_id           INTEGER,
            tec_doc_id        INTEGER,
            vehicle_id        INTEGER NOT NULL REFERENCES vehicles(id),
            brand_id          INTEGER NOT NULL REFERENCES brands(id),
            name              TEXT NOT NULL COLLATE NOCASE,
            construction_type TEXT NOT NULL DEFAULT '',
            fuel_type         TEXT NOT NULL DEFAULT '',
            impulsion_type    TEXT NOT NULL DEFAULT '',
            power_hp          INTEGER NOT NULL DEFAULT 0,
            cylinder_capacity INTEGER NOT NULL DEFAULT 0,
            year_from         TEXT,
            year_to           TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_brands_name ON brands(name);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_vehicles_brand_name ON vehicles(brand_id, name);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_modifications_vehicle_name
            ON modifications(vehicle_id, name);",
    )?;

    Ok(())
}

// ------------------------------------------------------------------
// Row mapping + date helpers
// ------------------------------------------------------------------

fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn date_from_sql(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn brand_from_row(row: &Row<'_>) -> rusqlite::Result<target::Brand> {
    Ok(target::Brand {
        id: row.get(0)?,
        auto_link_id: row.get(1)?,
        third_party_id: row.get(2)?,
        name: row.get(3)?,
    })
}

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<target::Vehicle> {
    Ok(target::Vehicle {
        id: row.get(0)?,
        auto_link_id: row.get(1)?,
        third_party_id: row.get(2)?,
        brand_id: row.get(3)?,
        name: row.get(4)?,
        year_from: date_from_sql(row.get(5)?),
        year_to: date_from_sql(row.get(6)?),
    })
}

fn modification_from_row(row: &Row<'_>) -> rusqlite::Result<target::Modification> {
    Ok(target::Modification {
        id: row.get(0)?,
        auto_link_id: row.get(1)?,
        third_party_id: row.get(2)?,
        vehicle_id: row.get(3)?,
        brand_id: row.get(4)?,
        name: row.get(5)?,
        construction_type: row.get(6)?,
        fuel_type: row.get(7)?,
        impulsion_type: row.get(8)?,
        horse_power: row.get(9)?,
        cylinder_capacity: row.get(10)?,
        year_from: date_from_sql(row.get(11)?),
        year_to: date_from_sql(row.get(12)?),
    })
}

// ------------------------------------------------------------------
// Port implementations
// ------------------------------------------------------------------

impl BrandStore for TargetDb {
    fn find_brand_by_name(&self, name: &str) -> Result<Option<target::Brand>, StoreError> {
        let brand = self
            .conn
            .query_row(
                "SELECT id, auto_id, tec_doc_id, name FROM brands
                 WHERE name = ?1 COLLATE NOCASE",
                params![name],
                brand_from_row,
            )
            .optional()?;
        Ok(brand)
    }

    fn upsert_brand(&self, brand: &target::Brand) -> Result<target::Brand, StoreError> {
        let mut stored = brand.clone();
        if stored.id == UNASSIGNED_ID {
            self.conn.execute(
                "INSERT INTO brands (auto_id, tec_doc_id, name) VALUES (?1, ?2, ?3)",
                params![stored.auto_link_id, stored.third_party_id, stored.name],
            )?;
            stored.id = self.conn.last_insert_rowid();
        } else {
            self.conn.execute(
                "UPDATE brands SET auto_id = ?1, tec_doc_id = ?2, name = ?3 WHERE id = ?4",
                params![
                    stored.auto_link_id,
                    stored.third_party_id,
                    stored.name,
                    stored.id
                ],
            )?;
        }
        Ok(stored)
    }
}

impl VehicleStore for TargetDb {
    fn find_vehicle(
        &self,
        brand_id: i64,
        name: &str,
    ) -> Result<Option<target::Vehicle>, StoreError> {
        let vehicle = self
            .conn
            .query_row(
                "SELECT id, auto_id, tec_doc_id, brand_id, name, year_from, year_to
                 FROM vehicles
                 WHERE brand_id = ?1 AND name = ?2 COLLATE NOCASE",
                params![brand_id, name],
                vehicle_from_row,
            )
            .optional()?;
        Ok(vehicle)
    }

    fn upsert_vehicle(&self, vehicle: &target::Vehicle) -> Result<target::Vehicle, StoreError> {
        let mut stored = vehicle.clone();
        if stored.id == UNASSIGNED_ID {
            self.conn.execute(
                "INSERT INTO vehicles (auto_id, tec_doc_id, brand_id, name, year_from, year_to)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    stored.auto_link_id,
                    stored.third_party_id,
                    stored.brand_id,
                    stored.name,
                    date_to_sql(stored.year_from),
                    date_to_sql(stored.year_to),
                ],
            )?;
            stored.id = self.conn.last_insert_rowid();
        } else {
            self.conn.execute(
                "UPDATE vehicles
                 SET auto_id = ?1, tec_doc_id = ?2, brand_id = ?3, name = ?4,
                     year_from = ?5, year_to = ?6
                 WHERE id = ?7",
                params![
                    stored.auto_link_id,
                    stored.third_party_id,
                    stored.brand_id,
                    stored.name,
                    date_to_sql(stored.year_from),
                    date_to_sql(stored.year_to),
                    stored.id,
                ],
            )?;
        }
        Ok(stored)
    }
}

impl ModificationStore for TargetDb {
    fn find_modification(
        &self,
        vehicle_id: i64,
        name: &str,
    ) -> Result<Option<target::Modification>, StoreError> {
        let modification = self
            .conn
            .query_row(
                "SELECT id, auto_id, tec_doc_id, vehicle_id, brand_id, name,
                        construction_type, fuel_type, impulsion_type,
                        power_hp, cylinder_capacity, year_from, year_to
                 FROM modifications
                 WHERE vehicle_id = ?1 AND name = ?2 COLLATE NOCASE",
                params![vehicle_id, name],
                modification_from_row,
            )
            .optional()?;
        Ok(modification)
    }

    fn upsert_modification(
        &self,
        modification: &target::Modification,
    ) -> Result<target::Modification, StoreError> {
        let mut stored = modification.clone();
        if stored.id == UNASSIGNED_ID {
            self.conn.execute(
                "INSERT INTO modifications (
                    auto_id, tec_doc_id, vehicle_id, brand_id, name,
                    construction_type, fuel_type, impulsion_type,
                    power_hp, cylinder_capacity, year_from, year_to
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    stored.auto_link_id,
                    stored.third_party_id,
                    stored.vehicle_id,
                    stored.brand_id,
                    stored.name,
                    stored.construction_type,
                    stored.fuel_type,
                    stored.impulsion_type,
                    stored.horse_power,
                    stored.cylinder_capacity,
                    date_to_sql(stored.year_from),
                    date_to_sql(stored.year_to),
                ],
            )?;
            stored.id = self.conn.last_insert_rowid();
        } else {
            self.conn.execute(
                "UPDATE modifications
                 SET auto_id = ?1, tec_doc_id = ?2, vehicle_id = ?3, brand_id = ?4,
                     name = ?5, construction_type = ?6, fuel_type = ?7,
                     impulsion_type = ?8, power_hp = ?9, cylinder_capacity = ?10,
                     year_from = ?11, year_to = ?12
                 WHERE id = ?13",
                params![
                    stored.auto_link_id,
                    stored.third_party_id,
                    stored.vehicle_id,
                    stored.brand_id,
                    stored.name,
                    stored.construction_type,
                    stored.fuel_type,
                    stored.impulsion_type,
                    stored.horse_power,
                    stored.cylinder_capacity,
                    date_to_sql(stored.year_from),
                    date_to_sql(stored.year_to),
                    stored.id,
                ],
            )?;
        }
        Ok(stored)
    }
}

// ============================================================================
// TESTS
// ============================================================================
