pub mod apply;
pub mod live;
pub mod prepare;
pub mod review;
pub mod scrape;

use crate::ai::AiProvider;
use crate::config::Config;
use crate::db::Database;

/// Everything a stage needs besides the browser session, which is owned per
/// job or per batch and passed explicitly.
pub struct StageContext<'a> {
    pub db: &'a Database,
    pub config: &'a Config,
    pub ai: &'a dyn AiProvider,
}
