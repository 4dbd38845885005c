//! Property query engine: request DTOs, plan construction, and execution.

pub mod compile;
pub mod pipeline;

use crate::{
    config::AppConfig,
    descriptor::{FilterDescriptor, FilterInput},
    error::Result,
    pagination::PaginationMeta,
    store::PropertyStore,
};
use pipeline::{FilterPlan, PipelineOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub use pipeline::FilterOutcome;

/// Body of `POST /api/properties`. `page_size` is accepted for wire
/// compatibility but the server-fixed size always wins.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyQueryRequest {
    #[serde(default)]
    pub filters: Option<Vec<FilterInput>>,
    #[serde(default)]
    pub market_status: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default)]
    pub page_size: Option<i64>,
}

const fn default_page() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub data: Vec<Value>,
    pub pagination: PaginationMeta,
}

#[derive(Clone)]
pub struct FilterEngine {
    store: Arc<dyn PropertyStore>,
    config: Arc<AppConfig>,
}

impl FilterEngine {
    pub fn new(store: Arc<dyn PropertyStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn execute(&self, request: PropertyQueryRequest) -> Result<ResultEnvelope> {
        let page_size = self.config.page_size;
        let plan = build_plan(request, page_size);
        let output = pipeline::run(self.store.as_ref(), &plan, page_size).await?;
        Ok(envelope(output, plan.page, page_size))
    }
}

fn build_plan(request: PropertyQueryRequest, page_size: i64) -> FilterPlan {
    let page = request.page.max(1);
    if let Some(requested) = request.page_size {
        if requested != page_size {
            debug!(requested, fixed = page_size, "client page_size ignored");
        }
    }

    let mut descriptors = Vec::new();
    for input in request.filters.unwrap_or_default() {
        match FilterDescriptor::from_input(input) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(err) => warn!(error = %err, "rejecting malformed filter"),
        }
    }

    let market_status = request
        .market_status
        .filter(|status| !status.trim().is_empty());

    FilterPlan {
        descriptors,
        market_status,
        page,
    }
}

fn envelope(output: PipelineOutput, page: i64, page_size: i64) -> ResultEnvelope {
    let pagination = if output.schema_drift {
        PaginationMeta::empty(page, page_size)
    } else {
        PaginationMeta::build(output.total_count, page, page_size)
    };

    ResultEnvelope {
        data: output.rows,
        pagination,
    }
}
