//! DevLake analytics tools: incidents and deployments.
//!
//! Both tools build one CTE query over the `lake` schema. Filter values are
//! always bound as positional parameters; the only interpolated text is a
//! date column taken from a fixed whitelist.

use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryRequest, QueryResult, Row};
use crate::security::sanitize_input;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const DEFAULT_INCIDENT_LIMIT: u32 = 100;
pub const DEFAULT_DEPLOYMENT_LIMIT: u32 = 50;
pub const MAX_INCIDENT_LIMIT: u32 = 500;
pub const MAX_DEPLOYMENT_LIMIT: u32 = 200;
pub const MAX_DAYS_BACK: u32 = 365;

pub const INCIDENT_DATE_FIELDS: &[&str] = &["created_date", "resolution_date", "updated_date"];
pub const DEPLOYMENT_DATE_FIELDS: &[&str] = &["finished_date", "created_date", "updated_date"];

/// Environment assumed when `get_deployments` is called without one.
pub const DEFAULT_ENVIRONMENT: &str = "PRODUCTION";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const INCIDENTS_HEAD: &str = "WITH _incident_rank AS (
    SELECT
        i.*,
        row_number() OVER(
            PARTITION BY i.incident_key
            ORDER BY i.updated_date DESC
        ) AS _incident_rank
    FROM lake.incidents i
    WHERE 1=1";

const INCIDENTS_TAIL: &str = "
)
SELECT *
FROM _incident_rank
WHERE _incident_rank = 1
ORDER BY created_date DESC";

// Component deployments (`components-<name>-<id>`) collapse onto their base id.
const DEPLOYMENTS_HEAD: &str = "WITH _deployment_commit_rank AS (
    SELECT
        pm.project_name,
        IF(cdc._raw_data_table != '', cdc._raw_data_table, cdc.cicd_scope_id) AS _raw_data_table,
        cdc.id,
        cdc.display_title,
        cdc.url,
        cdc.cicd_deployment_id,
        cdc.cicd_scope_id,
        cdc.result,
        cdc.environment,
        cdc.finished_date,
        row_number() OVER(
            PARTITION BY
                CASE
                    WHEN cdc.cicd_deployment_id LIKE 'components-%'
                    THEN SUBSTRING_INDEX(cdc.cicd_deployment_id, '-', -1)
                    ELSE cdc.cicd_deployment_id
                END
            ORDER BY cdc.finished_date DESC, cdc.id DESC
        ) AS _deployment_commit_rank
    FROM lake.cicd_deployment_commits cdc
    LEFT JOIN lake.project_mapping pm
        ON cdc.cicd_scope_id = pm.row_id AND pm.`table` = 'cicd_scopes'
    WHERE 1=1";

const DEPLOYMENTS_TAIL: &str = "
)
SELECT
    project_name,
    cicd_deployment_id AS deployment_id,
    CASE WHEN display_title = '' THEN 'N/A' ELSE display_title END AS display_title,
    url,
    url AS metric_hidden,
    result,
    environment,
    finished_date
FROM _deployment_commit_rank
WHERE _deployment_commit_rank = 1
ORDER BY finished_date DESC
LIMIT ?";

/// Input for the get_incidents tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct IncidentsInput {
    /// Filter by status (e.g. "DONE", "IN_PROGRESS", "OPEN"). Omit for all statuses.
    #[serde(default)]
    pub status: Option<String>,
    /// Filter by component name. Omit for all components.
    #[serde(default)]
    pub component: Option<String>,
    /// Only include the last N days (max 365). Ignored when start_date or end_date is set.
    #[serde(default)]
    pub days_back: Option<u32>,
    /// Start of the range, "YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS"
    #[serde(default)]
    pub start_date: Option<String>,
    /// End of the range, "YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS"
    #[serde(default)]
    pub end_date: Option<String>,
    /// Column the date range applies to: created_date (default), resolution_date or updated_date
    #[serde(default)]
    pub date_field: Option<String>,
    /// Maximum incidents to return. Default: 100, max: 500
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Input for the get_deployments tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DeploymentsInput {
    /// Filter by DevLake project name. Omit for all projects.
    #[serde(default)]
    pub project: Option<String>,
    /// Deployment environment. Default: PRODUCTION
    #[serde(default)]
    pub environment: Option<String>,
    /// Only include the last N days (max 365). Ignored when start_date or end_date is set.
    #[serde(default)]
    pub days_back: Option<u32>,
    /// Start of the range, "YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS"
    #[serde(default)]
    pub start_date: Option<String>,
    /// End of the range, "YYYY-MM-DD" or "YYYY-MM-DD HH:MM:SS"
    #[serde(default)]
    pub end_date: Option<String>,
    /// Column the date range applies to: finished_date (default), created_date or updated_date
    #[serde(default)]
    pub date_field: Option<String>,
    /// Maximum deployments to return. Default: 50, max: 200
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Result of an analytics tool: the applied filters plus the query outcome.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AnalyticsOutput {
    /// Filters as applied; unset filters are reported as "all"
    pub filters: Row,
    #[serde(flatten)]
    pub result: QueryResult,
}

/// A fully bound analytics query and the filters it encodes.
#[derive(Debug, Clone)]
pub struct AnalyticsQuery {
    pub request: QueryRequest,
    pub filters: Row,
}

impl AnalyticsQuery {
    pub fn into_output(self, result: QueryResult) -> AnalyticsOutput {
        AnalyticsOutput {
            filters: self.filters,
            result,
        }
    }
}

/// Accumulates `AND` conditions with their bound values.
#[derive(Debug, Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<QueryParam>,
}

impl Conditions {
    fn push(&mut self, clause: impl Into<String>, param: impl Into<QueryParam>) {
        self.clauses.push(clause.into());
        self.params.push(param.into());
    }

    fn render_into(&self, sql: &mut String) {
        for clause in &self.clauses {
            sql.push_str("\n        AND ");
            sql.push_str(clause);
        }
    }
}

/// Resolved date window. Explicit bounds win over `days_back`.
#[derive(Debug, Default, PartialEq)]
struct DateWindow {
    start: Option<String>,
    end: Option<String>,
    days_back: Option<u32>,
}

impl IncidentsInput {
    /// Build the deduplicated incidents query relative to `now`.
    pub fn build(&self, now: NaiveDateTime) -> DbResult<AnalyticsQuery> {
        let date_field = pick_date_field(self.date_field.as_deref(), INCIDENT_DATE_FIELDS)?;
        let limit = clamp_limit(self.limit, DEFAULT_INCIDENT_LIMIT, MAX_INCIDENT_LIMIT);
        let window = resolve_window(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            self.days_back,
        )?;

        let status = non_blank(self.status.as_deref());
        let component = non_blank(self.component.as_deref());

        let mut conditions = Conditions::default();
        if let Some(status) = status {
            conditions.push("i.status = ?", status);
        }
        if let Some(component) = component {
            conditions.push("i.component = ?", component);
        }
        window.push_conditions(&mut conditions, &format!("i.{}", date_field), now);

        let mut sql = String::from(INCIDENTS_HEAD);
        conditions.render_into(&mut sql);
        sql.push_str(INCIDENTS_TAIL);

        let mut filters = Row::new();
        filters.insert("status".into(), echo(status));
        filters.insert("component".into(), echo(component));
        window.describe_into(&mut filters);
        filters.insert("date_field".into(), date_field.into());
        filters.insert("limit".into(), limit.into());

        Ok(AnalyticsQuery {
            request: QueryRequest::new(sql)
                .with_params(conditions.params)
                .with_limit(limit),
            filters,
        })
    }
}

impl DeploymentsInput {
    /// Build the latest-successful-deployment query relative to `now`.
    pub fn build(&self, now: NaiveDateTime) -> DbResult<AnalyticsQuery> {
        let date_field = pick_date_field(self.date_field.as_deref(), DEPLOYMENT_DATE_FIELDS)?;
        let limit = clamp_limit(self.limit, DEFAULT_DEPLOYMENT_LIMIT, MAX_DEPLOYMENT_LIMIT);
        let window = resolve_window(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            self.days_back,
        )?;

        let project = non_blank(self.project.as_deref());
        let environment = non_blank(self.environment.as_deref());

        let mut conditions = Conditions::default();
        if let Some(project) = project {
            conditions.push("pm.project_name = ?", project);
        }
        conditions.push("cdc.result = ?", "SUCCESS");
        conditions.push("cdc.environment = ?", environment.unwrap_or(DEFAULT_ENVIRONMENT));
        window.push_conditions(&mut conditions, &format!("cdc.{}", date_field), now);

        let mut sql = String::from(DEPLOYMENTS_HEAD);
        conditions.render_into(&mut sql);
        sql.push_str(DEPLOYMENTS_TAIL);

        let mut params = conditions.params;
        params.push(QueryParam::Int(i64::from(limit)));

        let mut filters = Row::new();
        filters.insert("project".into(), echo(project));
        filters.insert(
            "environment".into(),
            echo(Some(environment.unwrap_or(DEFAULT_ENVIRONMENT))),
        );
        window.describe_into(&mut filters);
        filters.insert("date_field".into(), date_field.into());
        filters.insert("limit".into(), limit.into());

        Ok(AnalyticsQuery {
            request: QueryRequest::new(sql).with_params(params).with_limit(limit),
            filters,
        })
    }
}

impl DateWindow {
    fn push_conditions(&self, conditions: &mut Conditions, column: &str, now: NaiveDateTime) {
        if self.start.is_some() || self.end.is_some() {
            if let Some(start) = &self.start {
                conditions.push(format!("{} >= ?", column), start.as_str());
            }
            if let Some(end) = &self.end {
                conditions.push(format!("{} <= ?", column), end.as_str());
            }
        } else if let Some(days) = self.days_back {
            let since = now - Duration::days(i64::from(days));
            conditions.push(
                format!("{} >= ?", column),
                since.format(DATETIME_FORMAT).to_string(),
            );
        }
    }

    fn describe_into(&self, filters: &mut Row) {
        filters.insert(
            "days_back".into(),
            self.days_back.map(JsonValue::from).unwrap_or_else(|| "all".into()),
        );
        filters.insert("start_date".into(), or_all(self.start.as_deref()));
        filters.insert("end_date".into(), or_all(self.end.as_deref()));
    }
}

fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    days_back: Option<u32>,
) -> DbResult<DateWindow> {
    let start = non_blank(start).map(|s| widen_bound(s, false)).transpose()?;
    let end = non_blank(end).map(|s| widen_bound(s, true)).transpose()?;

    if let (Some(s), Some(e)) = (&start, &end) {
        if s > e {
            return Err(DbError::invalid_input(format!(
                "start_date '{}' is after end_date '{}'",
                s, e
            )));
        }
    }

    let days_back = match days_back {
        Some(0) | None => None,
        Some(_) if start.is_some() || end.is_some() => None,
        Some(days) => Some(days.min(MAX_DAYS_BACK)),
    };

    Ok(DateWindow {
        start,
        end,
        days_back,
    })
}

/// Normalise a bound to `YYYY-MM-DD HH:MM:SS`; date-only input covers the whole day.
fn widen_bound(value: &str, end_of_day: bool) -> DbResult<String> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT) {
        return Ok(dt.format(DATETIME_FORMAT).to_string());
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => {
            let time = if end_of_day { "23:59:59" } else { "00:00:00" };
            Ok(format!("{} {}", date.format("%Y-%m-%d"), time))
        }
        Err(_) => Err(DbError::invalid_input(format!(
            "Invalid date '{}'. Use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS",
            value
        ))),
    }
}

fn pick_date_field(requested: Option<&str>, allowed: &[&'static str]) -> DbResult<&'static str> {
    let Some(requested) = non_blank(requested) else {
        return Ok(allowed[0]);
    };
    allowed
        .iter()
        .find(|field| **field == requested)
        .copied()
        .ok_or_else(|| {
            DbError::invalid_input(format!(
                "Invalid date_field '{}'. Must be one of: {}",
                requested,
                allowed.join(", ")
            ))
        })
}

fn clamp_limit(limit: Option<u32>, default: u32, max: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, max)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Caller-supplied text echoed back in `filters`; the bound value is untouched.
fn echo(value: Option<&str>) -> JsonValue {
    or_all(value.map(sanitize_input).as_deref())
}

fn or_all(value: Option<&str>) -> JsonValue {
    value.unwrap_or("all").into()
}
