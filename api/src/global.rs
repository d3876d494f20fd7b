use std::sync::Arc;

use common::context::Context;

use crate::config::AppConfig;

pub struct GlobalState {
    pub config: AppConfig,
    pub db: Arc<sqlx::PgPool>,
    pub ctx: Context,
}

impl GlobalState {
    pub fn new(config: AppConfig, db: Arc<sqlx::PgPool>, ctx: Context) -> Self {
        Self { config, db, ctx }
    }
}
