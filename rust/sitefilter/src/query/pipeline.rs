//! The filter pipeline: an ordered fold of descriptors into one predicate
//! accumulator, with a cardinality probe after every step.
//!
//! Each step's predicates are committed only once the store successfully
//! counts under them; a step that trips schema drift (or any other store
//! error) is skipped whole and leaves the accumulator untouched. Count and
//! data are materialized from the same accumulator at the end, so the two
//! can never disagree about which filters applied.

use crate::{
    descriptor::FilterDescriptor,
    error::{Result, ServiceError},
    pagination::PageWindow,
    predicate::Predicate,
    query::compile,
    schema,
    store::{PropertyStore, StoreError},
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// One request's worth of filtering input, immutable during evaluation.
#[derive(Debug, Clone)]
pub struct FilterPlan {
    pub descriptors: Vec<FilterDescriptor>,
    pub market_status: Option<String>,
    /// 1-based page, already clamped to >= 1.
    pub page: i64,
}

/// Per-filter cardinality diagnostic. `resulting_count` is `None` when the
/// step was skipped (the store could not evaluate it), in which case the
/// running count is unchanged.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub label: String,
    pub column: Option<String>,
    pub previous_count: i64,
    pub resulting_count: Option<i64>,
    pub eliminated: Option<i64>,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub rows: Vec<Value>,
    pub total_count: i64,
    pub outcomes: Vec<FilterOutcome>,
    /// Set when the final execute hit a missing column and the result was
    /// degraded to the empty envelope.
    pub schema_drift: bool,
}

impl PipelineOutput {
    fn drifted(outcomes: Vec<FilterOutcome>) -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
            outcomes,
            schema_drift: true,
        }
    }
}

pub async fn run(
    store: &dyn PropertyStore,
    plan: &FilterPlan,
    page_size: i64,
) -> Result<PipelineOutput> {
    let initial_count = match store.count(&[]).await {
        Ok(count) => count,
        Err(err) => {
            warn!(error = %err, "could not compute initial property count, assuming 0");
            0
        }
    };
    info!(initial = initial_count, "filter session start");

    let mut state = PipelineState {
        store,
        predicates: Vec::new(),
        current_count: initial_count,
        outcomes: Vec::new(),
    };

    if let Some(market_status) = plan.market_status.as_deref() {
        let step = compile::exact_match(schema::CATEGORY_COLUMN, market_status);
        state
            .apply_step("market_status", Some(schema::CATEGORY_COLUMN), step)
            .await;
    }

    for descriptor in &plan.descriptors {
        let step = compile::compile(descriptor);
        state
            .apply_step(descriptor.label(), descriptor.column.as_deref(), step)
            .await;
    }

    let PipelineState {
        predicates,
        outcomes,
        ..
    } = state;

    let total_count = match store.count(&predicates).await {
        Ok(count) => count.max(0),
        Err(StoreError::ColumnNotFound) => {
            warn!("final count hit a missing column, returning empty result set");
            return Ok(PipelineOutput::drifted(outcomes));
        }
        Err(StoreError::Backend(err)) => return Err(ServiceError::Internal(err)),
    };

    let window = PageWindow::for_page(plan.page, page_size);
    let rows = match store
        .fetch(schema::RESULT_COLUMNS, &predicates, Some(window))
        .await
    {
        Ok(rows) => rows,
        Err(StoreError::ColumnNotFound) => {
            warn!("final query hit a missing column, returning empty result set");
            return Ok(PipelineOutput::drifted(outcomes));
        }
        Err(StoreError::Backend(err)) => return Err(ServiceError::Internal(err)),
    };

    info!(
        total = total_count,
        eliminated = initial_count - total_count,
        "filter session end"
    );
    info!(
        page = plan.page,
        total_pages = crate::pagination::total_pages(total_count, page_size),
        returned = rows.len(),
        "page fetched"
    );

    Ok(PipelineOutput {
        rows,
        total_count,
        outcomes,
        schema_drift: false,
    })
}

struct PipelineState<'a> {
    store: &'a dyn PropertyStore,
    predicates: Vec<Predicate>,
    current_count: i64,
    outcomes: Vec<FilterOutcome>,
}

impl PipelineState<'_> {
    /// Probes the count under the accumulator plus this step's predicates
    /// and commits the step only on success.
    async fn apply_step(&mut self, label: &str, column: Option<&str>, step: Vec<Predicate>) {
        let previous = self.current_count;

        if step.is_empty() {
            debug!(filter = label, "filter compiled to no predicates");
            self.outcomes.push(FilterOutcome {
                label: label.to_string(),
                column: column.map(str::to_string),
                previous_count: previous,
                resulting_count: Some(previous),
                eliminated: Some(0),
            });
            return;
        }

        let mut candidate = self.predicates.clone();
        candidate.extend(step);

        match self.store.count(&candidate).await {
            Ok(count) => {
                let count = count.max(0);
                self.predicates = candidate;
                self.current_count = count;
                info!(
                    filter = label,
                    remaining = count,
                    eliminated = previous - count,
                    "filter applied"
                );
                self.outcomes.push(FilterOutcome {
                    label: label.to_string(),
                    column: column.map(str::to_string),
                    previous_count: previous,
                    resulting_count: Some(count),
                    eliminated: Some(previous - count),
                });
            }
            Err(StoreError::ColumnNotFound) => {
                warn!(
                    filter = label,
                    column = column.unwrap_or("<multiple>"),
                    "skipping filter: column does not exist"
                );
                self.skip(label, column, previous);
            }
            Err(err) => {
                error!(filter = label, error = %err, "skipping filter: store error");
                self.skip(label, column, previous);
            }
        }
    }

    fn skip(&mut self, label: &str, column: Option<&str>, previous: i64) {
        self.outcomes.push(FilterOutcome {
            label: label.to_string(),
            column: column.map(str::to_string),
            previous_count: previous,
            resulting_count: None,
            eliminated: None,
        });
    }
}
