//! REST surface for the reflow scheduler.
//!
//! Maps request/response JSON onto domain records and scheduler errors
//! onto `400` bodies. The scheduling core stays pure; everything
//! transport-shaped lives here.

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SchedulerError;
use crate::models::{MaintenanceWindow, OrderResult, ReflowOutput, WorkCenter, WorkOrder};
use crate::scheduler::{ReflowConfig, ReflowScheduler};

// ============================================================================
// DTOs
// ============================================================================

/// Work order envelope: document id plus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderDto {
    pub doc_id: String,
    pub data: WorkOrderData,
}

/// Work order payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderData {
    pub work_order_number: String,
    pub work_center_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(default)]
    pub is_maintenance: bool,
    #[serde(default)]
    pub depends_on_work_order_ids: Vec<String>,
}

/// Work center envelope: document id plus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkCenterDto {
    pub doc_id: String,
    pub data: WorkCenterData,
}

/// Work center payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkCenterData {
    pub name: String,
    pub shifts: Vec<ShiftDto>,
    #[serde(default)]
    pub maintenance_windows: Vec<MaintenanceWindowDto>,
}

/// A weekly shift row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDto {
    pub day_of_week: u8,
    pub start_hour: u8,
    pub end_hour: u8,
}

/// An absolute maintenance interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowDto {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Full reflow request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflowRequest {
    pub work_orders: Vec<WorkOrderDto>,
    pub work_centers: Vec<WorkCenterDto>,
    #[serde(default)]
    pub allow_earlier_start: bool,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Per-order result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResultDto {
    pub work_order_id: String,
    pub work_order_number: String,
    pub original_start_date: DateTime<Utc>,
    pub original_end_date: DateTime<Utc>,
    pub new_start_date: DateTime<Utc>,
    pub new_end_date: DateTime<Utc>,
    pub was_rescheduled: bool,
    pub is_fixed: bool,
}

impl From<&OrderResult> for OrderResultDto {
    fn from(r: &OrderResult) -> Self {
        Self {
            work_order_id: r.work_order_id.clone(),
            work_order_number: r.work_order_number.clone(),
            original_start_date: r.original_start,
            original_end_date: r.original_end,
            new_start_date: r.new_start,
            new_end_date: r.new_end,
            was_rescheduled: r.was_rescheduled,
            is_fixed: r.is_fixed,
        }
    }
}

/// Aggregate counters row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDto {
    pub total_orders: usize,
    pub rescheduled_count: usize,
    pub fixed_count: usize,
    pub processing_time_ms: u64,
}

/// Full reflow response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflowResponse {
    pub results: Vec<OrderResultDto>,
    pub warnings: Vec<String>,
    pub metadata: MetadataDto,
}

impl ReflowResponse {
    fn from_output(output: &ReflowOutput) -> Self {
        Self {
            results: output.results.iter().map(OrderResultDto::from).collect(),
            warnings: output.warnings.clone(),
            metadata: MetadataDto {
                total_orders: output.metadata.total_orders,
                rescheduled_count: output.metadata.rescheduled_count,
                fixed_count: output.metadata.fixed_count,
                processing_time_ms: output.metadata.processing_time_ms,
            },
        }
    }
}

impl WorkOrderDto {
    fn to_domain(&self) -> WorkOrder {
        let mut order = WorkOrder::new(
            &self.doc_id,
            &self.data.work_center_id,
            self.data.start_date,
            self.data.end_date,
        )
        .with_number(&self.data.work_order_number)
        .with_duration_minutes(self.data.duration_minutes)
        .with_dependencies(self.data.depends_on_work_order_ids.iter().cloned());
        if self.data.is_maintenance {
            order = order.as_maintenance();
        }
        order
    }
}

impl WorkCenterDto {
    fn to_domain(&self) -> WorkCenter {
        let mut wc = WorkCenter::new(&self.doc_id).with_name(&self.data.name);
        for shift in &self.data.shifts {
            wc = wc.with_shift(shift.day_of_week, shift.start_hour, shift.end_hour);
        }
        for window in &self.data.maintenance_windows {
            let mut mw = MaintenanceWindow::new(window.start_date, window.end_date);
            if let Some(reason) = &window.reason {
                mw = mw.with_reason(reason);
            }
            wc.maintenance_windows.push(mw);
        }
        wc
    }
}

// ============================================================================
// Error bodies
// ============================================================================

fn validation_error(message: impl Into<String>) -> Value {
    json!({
        "statusCode": 400,
        "error": "ValidationError",
        "message": message.into(),
    })
}

fn scheduler_error(err: &SchedulerError) -> Value {
    let message = err.to_string();
    match err {
        SchedulerError::CircularDependency { cycle } => json!({
            "statusCode": 400,
            "error": "CircularDependencyError",
            "message": message,
            "cycle": cycle,
        }),
        SchedulerError::MissingDependency {
            work_order_id,
            missing_dependency_id,
        } => json!({
            "statusCode": 400,
            "error": "MissingDependencyError",
            "message": message,
            "workOrderId": work_order_id,
            "missingDependencyId": missing_dependency_id,
        }),
        SchedulerError::MissingWorkCenter {
            work_order_id,
            work_center_id,
        } => json!({
            "statusCode": 400,
            "error": "MissingWorkCenterError",
            "message": message,
            "workOrderId": work_order_id,
            "workCenterId": work_center_id,
        }),
        SchedulerError::NoWorkableSlot { work_center_id, .. } => json!({
            "statusCode": 400,
            "error": "NoWorkableSlotError",
            "message": message,
            "workCenterId": work_center_id,
        }),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Structural checks the core assumes have already happened.
fn validate_request(request: &ReflowRequest) -> Result<(), Value> {
    for order in &request.work_orders {
        if order.data.duration_minutes < 0 {
            return Err(validation_error(format!(
                "Work order '{}': durationMinutes must be >= 0",
                order.doc_id
            )));
        }
    }
    for wc in &request.work_centers {
        for shift in &wc.data.shifts {
            if shift.day_of_week > 6 {
                return Err(validation_error(format!(
                    "Work center '{}': dayOfWeek must be 0..6",
                    wc.doc_id
                )));
            }
            if shift.start_hour > 23 || shift.end_hour > 23 {
                return Err(validation_error(format!(
                    "Work center '{}': shift hours must be 0..23",
                    wc.doc_id
                )));
            }
        }
    }
    Ok(())
}

/// Runs one reflow for a parsed request. Synchronous so it can be tested
/// without a server.
fn handle_reflow(request: &ReflowRequest) -> Result<ReflowResponse, Value> {
    validate_request(request)?;

    let timezone: Tz = match &request.timezone {
        Some(name) => name
            .parse()
            .map_err(|_| validation_error(format!("Unknown timezone '{name}'")))?,
        None => chrono_tz::UTC,
    };

    let centers: Vec<WorkCenter> = request.work_centers.iter().map(WorkCenterDto::to_domain).collect();
    let orders: Vec<WorkOrder> = request.work_orders.iter().map(WorkOrderDto::to_domain).collect();

    let config = ReflowConfig::new()
        .with_allow_earlier_start(request.allow_earlier_start)
        .with_timezone(timezone);
    let output = ReflowScheduler::new(centers)
        .with_config(config)
        .reflow(&orders)
        .map_err(|err| scheduler_error(&err))?;

    Ok(ReflowResponse::from_output(&output))
}

/// POST /reflow - Recompute the schedule for a set of work orders.
async fn reflow(
    Json(request): Json<ReflowRequest>,
) -> Result<Json<ReflowResponse>, (StatusCode, Json<Value>)> {
    handle_reflow(&request)
        .map(Json)
        .map_err(|body| (StatusCode::BAD_REQUEST, Json(body)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health - Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

/// Creates the API router.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reflow", post(reflow))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> ReflowRequest {
        serde_json::from_value(json!({
            "workOrders": [
                {
                    "docId": "wo-1",
                    "data": {
                        "workOrderNumber": "WO-0001",
                        "workCenterId": "wc-1",
                        "startDate": "2024-01-15T16:00:00Z",
                        "endDate": "2024-01-15T18:00:00Z",
                        "durationMinutes": 120
                    }
                }
            ],
            "workCenters": [
                {
                    "docId": "wc-1",
                    "data": {
                        "name": "Mill 1",
                        "shifts": [
                            { "dayOfWeek": 1, "startHour": 9, "endHour": 17 },
                            { "dayOfWeek": 2, "startHour": 9, "endHour": 17 }
                        ]
                    }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_reflow_round_trip() {
        let response = handle_reflow(&base_request()).unwrap();

        assert_eq!(response.results.len(), 1);
        let r = &response.results[0];
        assert_eq!(r.work_order_id, "wo-1");
        assert_eq!(r.new_start_date.to_rfc3339(), "2024-01-15T16:00:00+00:00");
        assert_eq!(r.new_end_date.to_rfc3339(), "2024-01-16T10:00:00+00:00");
        assert!(r.was_rescheduled);
        assert_eq!(response.metadata.total_orders, 1);
        assert_eq!(response.metadata.rescheduled_count, 1);
    }

    #[test]
    fn test_response_uses_camel_case() {
        let response = handle_reflow(&base_request()).unwrap();
        let value = serde_json::to_value(&response).unwrap();

        let result = &value["results"][0];
        assert!(result.get("workOrderId").is_some());
        assert!(result.get("newStartDate").is_some());
        assert!(result.get("wasRescheduled").is_some());
        assert!(value["metadata"].get("processingTimeMs").is_some());
    }

    #[test]
    fn test_defaults_applied() {
        let request = base_request();
        assert!(!request.allow_earlier_start);
        assert!(request.timezone.is_none());
        assert!(!request.work_orders[0].data.is_maintenance);
        assert!(request.work_orders[0].data.depends_on_work_order_ids.is_empty());
        assert!(request.work_centers[0].data.maintenance_windows.is_empty());
    }

    #[test]
    fn test_circular_dependency_body() {
        let mut request = base_request();
        request.work_orders[0].data.depends_on_work_order_ids = vec!["wo-1".into()];

        let body = handle_reflow(&request).unwrap_err();
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["error"], "CircularDependencyError");
        assert_eq!(body["cycle"], json!(["wo-1", "wo-1"]));
    }

    #[test]
    fn test_missing_work_center_body() {
        let mut request = base_request();
        request.work_orders[0].data.work_center_id = "wc-9".into();

        let body = handle_reflow(&request).unwrap_err();
        assert_eq!(body["error"], "MissingWorkCenterError");
        assert_eq!(body["workOrderId"], "wo-1");
        assert_eq!(body["workCenterId"], "wc-9");
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let mut request = base_request();
        request.timezone = Some("Mars/Olympus".into());

        let body = handle_reflow(&request).unwrap_err();
        assert_eq!(body["error"], "ValidationError");
    }

    #[test]
    fn test_negative_duration_rejected() {
        let mut request = base_request();
        request.work_orders[0].data.duration_minutes = -5;

        let body = handle_reflow(&request).unwrap_err();
        assert_eq!(body["error"], "ValidationError");
    }

    #[test]
    fn test_bad_shift_rejected() {
        let mut request = base_request();
        request.work_centers[0].data.shifts.push(ShiftDto {
            day_of_week: 7,
            start_hour: 9,
            end_hour: 17,
        });

        let body = handle_reflow(&request).unwrap_err();
        assert_eq!(body["error"], "ValidationError");
    }

    #[test]
    fn test_timezone_applied() {
        // New York shifts put Monday 09:00 local at 14:00 UTC in January.
        let mut request = base_request();
        request.timezone = Some("America/New_York".into());

        let response = handle_reflow(&request).unwrap();
        assert_eq!(
            response.results[0].new_start_date.to_rfc3339(),
            "2024-01-15T16:00:00+00:00"
        );
        assert_eq!(
            response.results[0].new_end_date.to_rfc3339(),
            "2024-01-15T18:00:00+00:00"
        );
    }
}
