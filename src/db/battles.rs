use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use uuid::Uuid;

use crate::model::record::{BattleRecord, decode_plots, encode_plots};
use crate::model::stage::BattleStage;

/// Absent optional fields are stored as this sentinel, never as SQL NULL.
/// It exists only at the storage boundary; everything above it sees `Option`.
const NONE_SENTINEL: &str = "_";

/// Battle row access on top of a shared pool.
#[derive(Clone, Debug)]
pub struct BattleStore {
    pool: SqlitePool,
}

impl BattleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every stored battle. Rows with an unknown stage name are skipped with
    /// a warning rather than failing the whole load.
    pub async fn all(&self) -> Result<Vec<BattleRecord>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM Battle")
            .fetch_all(&self.pool)
            .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_row(&row) {
                Some(record) => records.push(record),
                None => {
                    let town: String = row.get("ContestedTown");
                    tracing::warn!(town, "skipping undecodable battle row");
                }
            }
        }
        Ok(records)
    }

    /// Insert or replace the row for this battle's town.
    pub async fn upsert(&self, record: &BattleRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR REPLACE INTO Battle \
             (ContestedTown, Attacker, Defender, HomeX, HomeZ, StageStartTime, \
              CityState, Stage, World, TownBlocks, InitialMayor) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.contested_town)
        .bind(encode_opt(record.attacker.as_deref()))
        .bind(encode_opt(record.defender.as_deref()))
        .bind(record.home_x)
        .bind(record.home_z)
        .bind(record.stage_start_time as i64)
        .bind(record.city_state)
        .bind(record.stage.as_str())
        .bind(encode_opt(record.world_id.map(|u| u.to_string()).as_deref()))
        .bind(encode_plots(&record.town_blocks))
        .bind(encode_opt(
            record.initial_mayor.map(|u| u.to_string()).as_deref(),
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove the row for `town`, if any.
    pub async fn delete(&self, town: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM Battle WHERE ContestedTown = ?")
            .bind(town)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop every row.
    pub async fn reset(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM Battle").execute(&self.pool).await?;
        Ok(())
    }
}

fn encode_opt(value: Option<&str>) -> String {
    value.unwrap_or(NONE_SENTINEL).to_string()
}

fn decode_opt(value: String) -> Option<String> {
    (value != NONE_SENTINEL).then_some(value)
}

fn decode_row(row: &SqliteRow) -> Option<BattleRecord> {
    let stage = BattleStage::parse(&row.get::<String, _>("Stage"))?;
    let world_id = match decode_opt(row.get("World")) {
        Some(s) => Some(Uuid::parse_str(&s).ok()?),
        None => None,
    };
    let initial_mayor = match decode_opt(row.get("InitialMayor")) {
        Some(s) => Some(Uuid::parse_str(&s).ok()?),
        None => None,
    };
    Some(BattleRecord {
        contested_town: row.get("ContestedTown"),
        attacker: decode_opt(row.get("Attacker")),
        defender: decode_opt(row.get("Defender")),
        home_x: row.get("HomeX"),
        home_z: row.get("HomeZ"),
        stage_start_time: row.get::<i64, _>("StageStartTime") as u64,
        city_state: row.get("CityState"),
        stage,
        world_id,
        town_blocks: decode_plots(&row.get::<String, _>("TownBlocks")),
        initial_mayor,
    })
}
