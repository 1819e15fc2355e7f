use salvo::cors::*;
use salvo::prelude::*;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .hoop(affix_state::inject(state))
        .hoop(
            Cors::new()
                .allow_origin(AllowOrigin::any())
                .allow_methods(AllowMethods::any())
                .allow_headers(AllowHeaders::any())
                .into_handler(),
        )
        .push(Router::with_path("health").get(handlers::health::health))
        .push(Router::with_path("v1/chat/completions").post(handlers::chat::chat_completions))
        .push(Router::with_path("v1/model-info").get(handlers::health::model_info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceRequest;
    use crate::types::{
        AssistantMessage, ChatChoice, ChatCompletionResponse, ModelInfo,
    };
    use salvo::http::StatusCode;
    use salvo::test::{ResponseExt, TestClient};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn stub_info() -> ModelInfo {
        ModelInfo {
            model_name: "stub-model".to_string(),
            device: "cpu".to_string(),
            is_quantized: false,
        }
    }

    /// Stand-in for the inference thread: answers over the same channel the
    /// real one uses, without loading a model. `delay` models generation time.
    fn stub_state_with_delay(reply: &'static str, delay: Duration) -> AppState {
        let (tx, mut rx) = mpsc::channel::<InferenceRequest>(8);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    InferenceRequest::ChatCompletion {
                        request,
                        response_tx,
                    } => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        let response = ChatCompletionResponse {
                            id: "chatcmpl-stub".to_string(),
                            object: "chat.completion".to_string(),
                            created: 0,
                            model: request.model.clone(),
                            choices: vec![ChatChoice {
                                index: 0,
                                finish_reason: "stop".to_string(),
                                message: AssistantMessage {
                                    role: "assistant".to_string(),
                                    content: reply.to_string(),
                                    refusal: None,
                                    tool_calls: None,
                                    function_call: None,
                                },
                                logprobs: None,
                            }],
                        };
                        let _ = response_tx.send(Ok(response));
                    }
                }
            }
        });
        AppState {
            inference_tx: tx,
            model_info: stub_info(),
        }
    }

    fn stub_state(reply: &'static str) -> AppState {
        stub_state_with_delay(reply, Duration::ZERO)
    }

    /// Stand-in whose generation never finishes; requests queue forever.
    fn stub_state_busy() -> AppState {
        let (tx, mut rx) = mpsc::channel::<InferenceRequest>(8);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    InferenceRequest::ChatCompletion { response_tx, .. } => {
                        // Keep the caller waiting without answering.
                        let _keep = response_tx;
                        std::future::pending::<()>().await;
                    }
                }
            }
        });
        AppState {
            inference_tx: tx,
            model_info: stub_info(),
        }
    }

    fn stub_service() -> Service {
        Service::new(build_router(stub_state("hello back")))
    }

    #[tokio::test]
    async fn chat_completions_returns_model_echo() {
        let service = stub_service();
        let mut res = TestClient::post("http://127.0.0.1/v1/chat/completions")
            .json(&serde_json::json!({
                "model": "x",
                "temperature": 0,
                "messages": [{"role": "user", "content": "hello"}]
            }))
            .send(&service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(body["model"], "x");
        assert_eq!(body["choices"][0]["finish_reason"], "stop");
        assert_eq!(body["choices"][0]["message"]["content"], "hello back");
        assert!(body["choices"][0]["message"]["refusal"].is_null());
    }

    // Generation has no deadline: a reply that takes far longer than any
    // plausible timeout still comes back as a normal 200.
    #[tokio::test(start_paused = true)]
    async fn chat_completions_waits_out_long_generations() {
        let state = stub_state_with_delay("slow reply", Duration::from_secs(600));
        let service = Service::new(build_router(state));
        let mut res = TestClient::post("http://127.0.0.1/v1/chat/completions")
            .json(&serde_json::json!({
                "model": "x",
                "messages": [{"role": "user", "content": "hello"}]
            }))
            .send(&service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(body["choices"][0]["message"]["content"], "slow reply");
    }

    #[tokio::test]
    async fn chat_completions_rejects_two_system_messages() {
        let service = stub_service();
        let mut res = TestClient::post("http://127.0.0.1/v1/chat/completions")
            .json(&serde_json::json!({
                "model": "x",
                "messages": [
                    {"role": "system", "content": "a"},
                    {"role": "system", "content": "b"},
                    {"role": "user", "content": "hello"}
                ]
            }))
            .send(&service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
        let body: serde_json::Value = res.take_json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("system"));
    }

    #[tokio::test]
    async fn chat_completions_rejects_out_of_range_temperature() {
        let service = stub_service();
        let res = TestClient::post("http://127.0.0.1/v1/chat/completions")
            .json(&serde_json::json!({
                "model": "x",
                "temperature": 3.0,
                "messages": [{"role": "user", "content": "hello"}]
            }))
            .send(&service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn model_info_reports_loaded_model() {
        let service = stub_service();
        let mut res = TestClient::get("http://127.0.0.1/v1/model-info")
            .send(&service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(body["model_name"], "stub-model");
        assert_eq!(body["device"], "cpu");
        assert_eq!(body["is_quantized"], false);
    }

    // model-info is served from state, so it must not queue behind a
    // generation that is still running.
    #[tokio::test]
    async fn model_info_answers_while_generation_is_in_flight() {
        let service = std::sync::Arc::new(Service::new(build_router(stub_state_busy())));

        let chat_service = service.clone();
        let chat = tokio::spawn(async move {
            TestClient::post("http://127.0.0.1/v1/chat/completions")
                .json(&serde_json::json!({
                    "model": "x",
                    "messages": [{"role": "user", "content": "hello"}]
                }))
                .send(&*chat_service)
                .await;
        });
        // Let the chat request reach the (stuck) inference stub first.
        tokio::task::yield_now().await;

        let mut res = TestClient::get("http://127.0.0.1/v1/model-info")
            .send(&*service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(body["model_name"], "stub-model");

        chat.abort();
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let service = stub_service();
        let mut res = TestClient::get("http://127.0.0.1/health")
            .send(&service)
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));
        let body: serde_json::Value = res.take_json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }
}
