use super::FusedContext;
use crate::evidence::SourceType;
use serde::Serialize;

/// How current the fused evidence is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessReport {
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    /// Local chunks dated more than the staleness horizon ago.
    pub stale_local: Vec<String>,
    pub has_web: bool,
}

impl FreshnessReport {
    pub fn assess(ctx: &FusedContext, current_year: i32, stale_after_years: i32) -> Self {
        let years = ctx.chunks.iter().filter_map(|c| c.published_year());

        Self {
            earliest_year: years.clone().min(),
            latest_year: years.max(),
            stale_local: ctx
                .chunks
                .iter()
                .filter(|c| c.source_type() == SourceType::Local)
                .filter(|c| {
                    c.published_year()
                        .is_some_and(|y| current_year - y > stale_after_years)
                })
                .map(|c| c.id().to_string())
                .collect(),
            has_web: ctx
                .chunks
                .iter()
                .any(|c| c.source_type() == SourceType::Web),
        }
    }

    /// Stale local evidence with nothing current to check it against.
    pub fn needs_warning(&self) -> bool {
        !self.stale_local.is_empty() && !self.has_web
    }
}
