use hovershelf::arxiv::{ArxivEndpoints, ArxivResearcher, MemoryListing};
use hovershelf::credentials::{Credentials, MULTION_KEY, OPENAI_KEY};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TABLE: &str = "| Title | Authors | Abstract | Link |\n\
|-------|---------|----------|------|\n\
| Robots That Learn | A. Turing | Learning from play | https://arxiv.org/abs/2401.00001 |";

struct Services {
    openai: MockServer,
    multion: MockServer,
    memory: MockServer,
}

impl Services {
    async fn start() -> Self {
        Self {
            openai: MockServer::start().await,
            multion: MockServer::start().await,
            memory: MockServer::start().await,
        }
    }

    fn researcher(&self) -> ArxivResearcher {
        let credentials = Credentials::new()
            .with(OPENAI_KEY, "sk-test")
            .with(MULTION_KEY, "mo-test");
        let endpoints = ArxivEndpoints {
            openai_host: self.openai.uri(),
            multion_host: self.multion.uri(),
            memory_host: self.memory.uri(),
            memory_api_key: Some("m0-test".to_string()),
        };
        ArxivResearcher::connect(&credentials, &endpoints).unwrap()
    }
}

#[tokio::test]
async fn test_search_runs_memory_browse_and_format_in_order() {
    let services = Services::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memories/search/"))
        .and(header("Authorization", "Token m0-test"))
        .and(body_partial_json(json!({"query": "robot learning", "user_id": "ada"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "memory": "Works on robotics"},
            {"id": "2", "memory": "Prefers recent papers"}
        ])))
        .expect(1)
        .mount(&services.memory)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/web/browse"))
        .and(header("x_multion_api_key", "mo-test"))
        .and(body_partial_json(json!({
            "cmd": "Search for arXiv papers: robot learning\nUser background: Works on robotics Prefers recent papers",
            "url": "https://arxiv.org/"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "Robots That Learn by A. Turing ..."})),
        )
        .expect(1)
        .mount(&services.multion)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": TABLE},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&services.openai)
        .await;

    let outcome = services
        .researcher()
        .search("robot learning", "ada")
        .await
        .unwrap();

    assert!(outcome.is_well_formed());
    let papers = outcome.papers.unwrap();
    assert_eq!(papers.len(), 1);
    assert_eq!(papers[0].title, "Robots That Learn");
    assert_eq!(papers[0].link, "https://arxiv.org/abs/2401.00001");
}

#[tokio::test]
async fn test_browse_failure_skips_formatting() {
    let services = Services::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/memories/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&services.memory)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/web/browse"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&services.multion)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&services.openai)
        .await;

    let err = services
        .researcher()
        .search("robot learning", "ada")
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("upstream down"));
}

#[tokio::test]
async fn test_list_memories_for_new_user() {
    let services = Services::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/memories/"))
        .and(query_param("user_id", "newcomer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&services.memory)
        .await;

    let listing = services.researcher().list_memories("newcomer").await.unwrap();
    assert_eq!(listing, MemoryListing::Empty);
    assert_eq!(listing.to_string(), "No memories stored yet.");
}
