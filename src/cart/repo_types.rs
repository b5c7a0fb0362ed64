use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One pending (user, item) line. At most one per pair; `quantity >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: String,
    pub item_id: Uuid,
    pub quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}
