use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

pub async fn handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "tools": state.tool_count(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, web, App};
    use agent_core::tools::{ToolInvoker, ToolRegistry};
    use agent_llm::ScriptedProvider;
    use agent_loop::AgentLoopConfig;
    use agent_tools::{AddTool, MultiplyTool};
    use serde_json::{json, Value};

    use crate::server::app_config;
    use crate::state::AppState;

    #[actix_web::test]
    async fn reports_registered_tool_count() {
        let mut builder = ToolRegistry::builder();
        builder.register(AddTool::new()).unwrap();
        builder.register(MultiplyTool::new()).unwrap();
        let registry = Arc::new(builder.build());
        let state = web::Data::new(AppState::new(
            Arc::new(ScriptedProvider::new(Vec::new())),
            Arc::new(ToolInvoker::new(registry)),
            "system",
            AgentLoopConfig::default(),
        ));
        let app = test::init_service(App::new().app_data(state).configure(app_config)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, json!({"status": "ok", "tools": 2}));
    }
}
