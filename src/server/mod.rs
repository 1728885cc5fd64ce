//! HTTP服务模块
//!
//! - `POST /sliding-decision`：对请求中的参数做一次决策，返回结果和解释
//! - `GET /health`：返回功能块名称、规则集摘要和审计记录数
//! - `GET /decisions?limit=N`：最近的审计记录（新记录在前）
//!
//! 规则引擎通过 `Arc` 只读共享，不加锁。审计记录在决策完成后
//! 放到阻塞线程池里写入，写入失败只记日志，不影响响应。

use crate::core::error::DecisionError;
use crate::core::models::{Decision, Explanation, VariableExplanation};
use crate::core::rule_engine::RuleEngine;
use crate::storage::database::{Database, DecisionRecord};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const STATUS_RESPONSE: &str = "Sliding Decision Response";
const STATUS_ERROR: &str = "Error - Sliding Decision not possible";
const HINT_INPUT: &str = "Please check the provided sliding decision input parameter(s) and try again.";
const HINT_UNEXPECTED: &str =
    "An unexpected error occurred. Check the exception message or system logs for more details";

/// `GET /decisions` 默认和最大返回条数
const RECENT_DEFAULT: usize = 20;
const RECENT_MAX: usize = 500;

/// 服务共享状态
pub struct AppState {
    pub engine: Arc<RuleEngine>,
    /// 规则集摘要
    pub ruleset_digest: String,
    /// 决策结果（语言项）到描述文字的映射
    pub descriptions: BTreeMap<String, String>,
    /// 审计数据库，未启用时为 None
    pub audit: Option<Arc<Mutex<Database>>>,
    /// 审计记录保留条数
    pub audit_keep_count: usize,
}

impl AppState {
    pub fn new(
        engine: Arc<RuleEngine>,
        ruleset_digest: impl Into<String>,
        descriptions: BTreeMap<String, String>,
    ) -> Self {
        Self {
            engine,
            ruleset_digest: ruleset_digest.into(),
            descriptions,
            audit: None,
            audit_keep_count: 0,
        }
    }

    /// 启用决策审计，最多保留 keep_count 条记录
    pub fn with_audit(mut self, database: Database, keep_count: usize) -> Self {
        self.audit = Some(Arc::new(Mutex::new(database)));
        self.audit_keep_count = keep_count;
        self
    }
}

pub type SharedState = Arc<AppState>;

/// 决策请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidingDecisionRequest {
    #[serde(default)]
    pub decision_status: Option<String>,
    #[serde(default)]
    pub sliding_decision_input_parameters: Option<BTreeMap<String, Value>>,
}

/// 接口层错误
#[derive(Debug)]
pub enum ApiError {
    /// 请求体不是合法的JSON或结构不符
    MalformedRequest(String),
    /// 参数为空或缺失
    EmptyInput,
    Decision(DecisionError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Decision(DecisionError::UnresolvedTerm { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn exception_name(&self) -> &'static str {
        match self {
            ApiError::MalformedRequest(_) => "MalformedRequestError",
            ApiError::EmptyInput => "EmptyInputError",
            ApiError::Decision(err) => err.kind(),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::MalformedRequest(detail) => format!("请求体无法解析: {}", detail),
            ApiError::EmptyInput => "决策输入参数不能为空".to_string(),
            ApiError::Decision(err) => err.to_string(),
        }
    }
}

impl From<DecisionError> for ApiError {
    fn from(err: DecisionError) -> Self {
        ApiError::Decision(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let hint = if status == StatusCode::BAD_REQUEST {
            HINT_INPUT
        } else {
            HINT_UNEXPECTED
        };

        let mut details = Map::new();
        details.insert("exceptionName".into(), json!(self.exception_name()));
        details.insert("exceptionMessage".into(), json!(self.message()));
        details.insert("debugHint".into(), json!(hint));
        if let ApiError::Decision(err) = &self {
            if !err.unknown_inputs().is_empty() {
                details.insert("unknownInputs".into(), json!(err.unknown_inputs()));
            }
            if !err.missing_inputs().is_empty() {
                details.insert("missingInputs".into(), json!(err.missing_inputs()));
            }
            if !err.invalid_inputs().is_empty() {
                details.insert("invalidInputs".into(), json!(err.invalid_inputs()));
            }
        }

        tracing::warn!(status = status.as_u16(), "决策请求失败: {}", self.message());

        let body = json!({
            "decisionStatus": STATUS_ERROR,
            "errorDetails": details,
        });
        (status, Json(body)).into_response()
    }
}

/// 变量解释的对外格式
#[derive(Debug, Serialize)]
struct VariableView<'a> {
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "Terms")]
    terms: &'a BTreeMap<String, f64>,
}

impl<'a> From<&'a VariableExplanation> for VariableView<'a> {
    fn from(v: &'a VariableExplanation) -> Self {
        Self {
            value: v.value,
            terms: &v.terms,
        }
    }
}

/// 已触发规则的对外格式
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppliedRuleView<'a> {
    name: &'a str,
    condition: &'a str,
    consequence: &'a str,
    weight: f64,
    degree_of_support: f64,
    rule_block: &'a str,
}

fn explanation_body(explanation: &Explanation) -> Value {
    let inputs: BTreeMap<&str, VariableView> = explanation
        .inputs
        .iter()
        .map(|(name, v)| (name.as_str(), v.into()))
        .collect();
    let outputs: BTreeMap<&str, VariableView> = explanation
        .outputs
        .iter()
        .map(|(name, v)| (name.as_str(), v.into()))
        .collect();
    let rules: Vec<AppliedRuleView> = explanation
        .fired_rules
        .iter()
        .map(|r| AppliedRuleView {
            name: &r.name,
            condition: &r.antecedent,
            consequence: &r.consequent,
            weight: r.weight,
            degree_of_support: r.degree_of_support,
            rule_block: &r.rule_block,
        })
        .collect();

    json!({
        "slidingDecisionInputParameters": inputs,
        "slidingDecisionOutputParameters": outputs,
        "appliedRules": rules,
    })
}

/// 组装成功响应
fn decision_body(decision: &Decision, descriptions: &BTreeMap<String, String>) -> Value {
    let results: Map<String, Value> = decision
        .outputs
        .iter()
        .map(|(name, output)| {
            (
                name.clone(),
                json!({
                    "slidingDecision": output.dominant_term,
                    "value": output.crisp_value,
                    "description": descriptions.get(&output.dominant_term),
                }),
            )
        })
        .collect();

    json!({
        "decisionStatus": STATUS_RESPONSE,
        "decisionResult": results,
        "decisionExplanation": explanation_body(&decision.explanation),
    })
}

/// POST /sliding-decision
async fn sliding_decision(
    State(state): State<SharedState>,
    payload: Result<Json<SlidingDecisionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    tracing::debug!("收到决策请求: {:?}", request.decision_status);
    let parameters = request
        .sliding_decision_input_parameters
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::EmptyInput)?;

    let decision = state.engine.decide(&parameters)?;
    let body = decision_body(&decision, &state.descriptions);

    if let Some(audit) = state.audit.clone() {
        let record = DecisionRecord::new(
            state.engine.function_block().name(),
            state.ruleset_digest.clone(),
            parameters,
            decision,
        );
        record_decision(audit, record, state.audit_keep_count).await;
    }

    Ok(Json(body))
}

/// 在阻塞线程池中访问审计数据库
async fn with_audit_db<T, F>(audit: Arc<Mutex<Database>>, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let db = audit
            .lock()
            .map_err(|_| anyhow::anyhow!("审计数据库锁已中毒"))?;
        f(&db)
    })
    .await
    .map_err(|e| anyhow::anyhow!("审计任务异常退出: {}", e))?
}

/// 写入审计记录并裁剪超出保留条数的旧记录
async fn record_decision(audit: Arc<Mutex<Database>>, record: DecisionRecord, keep_count: usize) {
    let id = record.id.clone();
    let result = with_audit_db(audit, move |db| {
        db.record(&record)?;
        db.cleanup_old_records(keep_count)
    })
    .await;

    match result {
        Ok(0) => tracing::debug!("已记录决策: {}", id),
        Ok(removed) => tracing::debug!("已记录决策: {}，清理旧记录 {} 条", id, removed),
        Err(e) => tracing::warn!("记录决策失败: {:#}", e),
    }
}

/// GET /health
async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let mut body = json!({
        "status": "ok",
        "functionBlock": state.engine.function_block().name(),
        "rulesetDigest": state.ruleset_digest,
    });

    if let Some(audit) = state.audit.clone() {
        match with_audit_db(audit, |db| db.count()).await {
            Ok(count) => body["auditRecords"] = json!(count),
            Err(e) => tracing::warn!("读取审计记录数失败: {:#}", e),
        }
    }

    Json(body)
}

/// `GET /decisions` 查询参数
#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

/// GET /decisions
async fn recent_decisions(
    State(state): State<SharedState>,
    Query(query): Query<RecentQuery>,
) -> Response {
    let Some(audit) = state.audit.clone() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": "决策审计未启用"})),
        )
            .into_response();
    };

    let limit = query.limit.unwrap_or(RECENT_DEFAULT).min(RECENT_MAX);
    match with_audit_db(audit, move |db| db.load_recent(limit)).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            tracing::warn!("读取审计记录失败: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": format!("{:#}", e)})),
            )
                .into_response()
        }
    }
}

/// 创建路由
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/sliding-decision", post(sliding_decision))
        .route("/health", get(health))
        .route("/decisions", get(recent_decisions))
        .with_state(state)
}

/// 启动HTTP服务，直到收到 Ctrl+C
pub async fn run_server(state: SharedState, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("HTTP服务已启动: http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP服务已关闭");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("无法监听 Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::load_rules;
    use crate::core::models::ScenarioConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_state() -> AppState {
        let rules = load_rules("logistics.fcl").unwrap();
        AppState::new(
            Arc::new(RuleEngine::new(rules.function_block)),
            rules.digest,
            ScenarioConfig::default().decision_results_description,
        )
    }

    async fn post_json(state: SharedState, body: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sliding-decision")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn request(params: Value) -> String {
        json!({
            "decisionStatus": "Sliding Decision Request",
            "slidingDecisionInputParameters": params,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = Arc::new(test_state());
        let digest = state.ruleset_digest.clone();
        let response = create_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["functionBlock"], "slidingDecision");
        assert_eq!(json["rulesetDigest"], digest.as_str());
    }

    #[tokio::test]
    async fn test_successful_decision() {
        let body = request(json!({
            "noOfTrucksInQueue": 7,
            "positionOfTruckToBePrioritized": 5
        }));
        let (status, json) = post_json(Arc::new(test_state()), &body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["decisionStatus"], STATUS_RESPONSE);

        let result = &json["decisionResult"]["suggestedWorkSharingApproach"];
        assert_eq!(result["slidingDecision"], "HUMAN_ON_THE_LOOP");
        assert_eq!(
            result["description"],
            "Human has to be informed about AI's rescheduling"
        );
        assert!(result["value"].is_number());

        let explanation = &json["decisionExplanation"];
        assert_eq!(
            explanation["slidingDecisionInputParameters"]["noOfTrucksInQueue"]["Value"],
            7.0
        );
        assert!(explanation["slidingDecisionOutputParameters"]["suggestedWorkSharingApproach"]
            ["Terms"]["HUMAN_ON_THE_LOOP"]
            .is_number());
        let rules = explanation["appliedRules"].as_array().unwrap();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0]["name"], "shortQueueFrontPosition");
        assert_eq!(rules[0]["ruleBlock"], "workSharing");
        assert!(rules[0]["degreeOfSupport"].is_number());
    }

    #[tokio::test]
    async fn test_unknown_and_missing_inputs_are_bad_request() {
        let body = request(json!({"noOfTrucksInQueue": 7, "weather": 3}));
        let (status, json) = post_json(Arc::new(test_state()), &body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["decisionStatus"], STATUS_ERROR);
        let details = &json["errorDetails"];
        assert_eq!(details["exceptionName"], "UnknownInputError+MissingInputError");
        assert_eq!(details["debugHint"], HINT_INPUT);
        assert_eq!(details["unknownInputs"], json!(["weather"]));
        assert_eq!(details["missingInputs"], json!(["positionOfTruckToBePrioritized"]));
    }

    #[tokio::test]
    async fn test_misspelled_parameter_lists_both_names() {
        let body = request(json!({
            "noOfTrucksInQueuee": 7,
            "positionOfTruckToBePrioritized": 5
        }));
        let (status, json) = post_json(Arc::new(test_state()), &body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorDetails"]["unknownInputs"], json!(["noOfTrucksInQueuee"]));
        assert_eq!(json["errorDetails"]["missingInputs"], json!(["noOfTrucksInQueue"]));
    }

    #[tokio::test]
    async fn test_invalid_value_is_bad_request() {
        let body = request(json!({
            "noOfTrucksInQueue": "seven",
            "positionOfTruckToBePrioritized": 5
        }));
        let (status, json) = post_json(Arc::new(test_state()), &body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorDetails"]["exceptionName"], "InvalidValueError");
        assert!(json["errorDetails"]["exceptionMessage"]
            .as_str()
            .unwrap()
            .contains("noOfTrucksInQueue"));
        assert!(json["errorDetails"].get("unknownInputs").is_none());
    }

    #[tokio::test]
    async fn test_empty_and_malformed_requests() {
        let state = Arc::new(test_state());

        let (status, json) = post_json(state.clone(), &request(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorDetails"]["exceptionName"], "EmptyInputError");

        let (status, json) =
            post_json(state.clone(), r#"{"decisionStatus": "Sliding Decision Request"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorDetails"]["exceptionName"], "EmptyInputError");

        let (status, json) = post_json(state, "{ not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errorDetails"]["exceptionName"], "MalformedRequestError");
        assert_eq!(json["errorDetails"]["debugHint"], HINT_INPUT);
    }

    #[tokio::test]
    async fn test_unresolved_term_is_unprocessable() {
        // 输出语言项之间有空隙，清晰值落在空隙里
        let source = r#"
FUNCTION_BLOCK gap
VAR_INPUT x : REAL; END_VAR
VAR_OUTPUT y : REAL; END_VAR
FUZZIFY x
    TERM low := (0, 1) (10, 0);
    TERM high := (0, 0) (10, 1);
    RANGE := (0 .. 10);
END_FUZZIFY
DEFUZZIFY y
    TERM left := (0, 1) (2, 0);
    TERM right := (8, 0) (10, 1);
    METHOD : COG;
    RANGE := (0 .. 10);
END_DEFUZZIFY
RULEBLOCK rb
    AND : MIN;
    RULE r1 : IF x IS low THEN y IS left;
    RULE r2 : IF x IS high THEN y IS right;
END_RULEBLOCK
END_FUNCTION_BLOCK
"#;
        let engine = RuleEngine::from_fcl(source).unwrap();
        let state = Arc::new(AppState::new(Arc::new(engine), "digest", BTreeMap::new()));

        let (status, json) = post_json(state, &request(json!({"x": 5}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["errorDetails"]["exceptionName"], "UnresolvedTermError");
        assert_eq!(json["errorDetails"]["debugHint"], HINT_UNEXPECTED);
    }

    #[tokio::test]
    async fn test_successful_decision_is_audited() {
        let state = Arc::new(test_state().with_audit(Database::open_in_memory().unwrap(), 100));
        let body = request(json!({
            "noOfTrucksInQueue": 40,
            "positionOfTruckToBePrioritized": 5
        }));
        let (status, _) = post_json(state.clone(), &body).await;
        assert_eq!(status, StatusCode::OK);

        // 失败的请求不记录
        let (status, _) = post_json(state.clone(), &request(json!({"x": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let audit = state.audit.as_ref().unwrap().lock().unwrap();
        let records = audit.load_recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].function_block, "slidingDecision");
        assert_eq!(records[0].ruleset_digest, state.ruleset_digest);
        assert_eq!(
            records[0].decision.dominant_term("suggestedWorkSharingApproach"),
            Some("HUMAN_MANUALLY")
        );
    }

    async fn get_json(state: SharedState, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_audit_journal_keeps_only_newest_records() {
        let state = Arc::new(test_state().with_audit(Database::open_in_memory().unwrap(), 2));
        for trucks in [3, 7, 40] {
            let body = request(json!({
                "noOfTrucksInQueue": trucks,
                "positionOfTruckToBePrioritized": 5
            }));
            let (status, _) = post_json(state.clone(), &body).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, health) = get_json(state.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["auditRecords"], 2);

        let (status, records) = get_json(state.clone(), "/decisions").await;
        assert_eq!(status, StatusCode::OK);
        let records = records.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["inputs"]["noOfTrucksInQueue"], 40);
        assert_eq!(records[1]["inputs"]["noOfTrucksInQueue"], 7);

        let (_, limited) = get_json(state, "/decisions?limit=1").await;
        assert_eq!(limited.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decisions_without_audit_is_not_found() {
        let state = Arc::new(test_state());
        let (status, _) = get_json(state.clone(), "/decisions").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, health) = get_json(state, "/health").await;
        assert!(health.get("auditRecords").is_none());
    }

    #[tokio::test]
    async fn test_all_invalid_values_reported() {
        let body = request(json!({
            "noOfTrucksInQueue": "seven",
            "positionOfTruckToBePrioritized": null
        }));
        let (status, json) = post_json(Arc::new(test_state()), &body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["errorDetails"]["invalidInputs"],
            json!(["noOfTrucksInQueue", "positionOfTruckToBePrioritized"])
        );
    }
}
