pub use std::{collections::HashMap, time::Duration};

pub use anyhow::Context;
pub use async_trait::async_trait;
pub use chrono::{NaiveDateTime as DateTime, TimeDelta, Timelike, Utc};
pub use dashmap::DashMap;
pub use sea_orm::{
  ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection,
  EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
pub use sea_orm_migration::MigratorTrait;
pub use tokio::time;
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Missing, Result};
pub(crate) use crate::utils;
