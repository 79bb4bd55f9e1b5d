//! End-to-end runs of the control graph with a scripted model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use openbio_rs::AgentError;
use openbio_rs::agent::{
    AgentConfig, ChatRequest, ChatResponse, LlmProvider, Orchestrator, PromptSet,
};
use openbio_rs::api::{ApiClient, HttpApiClient};
use openbio_rs::core::{Annotation, Status};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays model replies in order.
struct Replay(Mutex<VecDeque<String>>);

impl Replay {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            replies.iter().map(ToString::to_string).collect(),
        )))
    }
}

#[async_trait]
impl LlmProvider for Replay {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let reply = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        reply
            .map(|content| ChatResponse {
                content,
                ..ChatResponse::default()
            })
            .ok_or(AgentError::ApiRequest {
                message: "replay exhausted".to_string(),
                status: None,
            })
    }
}

/// BLAST double: accepts a job, then always reports it as running.
struct SlowBlast {
    polls: Mutex<u32>,
}

#[async_trait]
impl ApiClient for SlowBlast {
    async fn get(&self, target: &str) -> Option<String> {
        if target.contains("CMD=Put") {
            return Some("<!--QBlastInfoBegin\n    RID = SLOWJOB42\n    RTOE = 30\nQBlastInfoEnd-->".to_string());
        }
        *self.polls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Some("<!--QBlastInfoBegin\n\tStatus=WAITING\nQBlastInfoEnd-->".to_string())
    }
}

#[tokio::test]
async fn scenario_gene_location_via_database() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/esearch.fcgi"))
        .and(query_param("db", "gene"))
        .and(query_param("term", "TTTY7 human"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"header":{"type":"esearch"},"esearchresult":{"count":"1","idlist":["246119"]}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/esummary.fcgi"))
        .and(query_param("id", "246119"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"result":{"uids":["246119"],"246119":{"name":"TTTY7","chromosome":"Y","maplocation":"Yp11.2"}}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = AgentConfig::builder()
        .api_key("test")
        .eutils_base(format!("{}/entrez/eutils", server.uri()))
        .build()
        .unwrap_or_else(|_| unreachable!());
    let api = HttpApiClient::from_config(&config)
        .unwrap_or_else(|_| unreachable!())
        .request_delay(Duration::ZERO);
    let provider = Replay::new(&[
        r#"{"agent": "database-agent", "reason": "gene location lookup"}"#,
        r#"```json
{"db": "gene", "term": "TTTY7 human", "limit": 5}
```"#,
        r#"{"method": "esummary", "db": "gene", "ids": ["246119"]}"#,
        r#"{"next_step": "GENERATE", "reason": "esummary lists chromosome Y"}"#,
        "The TTTY7 gene is located on chromosome Y (Yp11.2).",
    ]);

    let orchestrator =
        Orchestrator::with_prompts(provider, Arc::new(api), &config, &PromptSet::defaults());
    let result = orchestrator
        .ask("Which chromosome is TTTY7 gene located on human genome?")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.eval_rounds, 1);
    let answer = result.answer.as_deref().unwrap_or_default();
    assert!(answer.contains("chromosome Y"));

    let annotations: Vec<_> = result.history.iter().map(|m| m.annotation).collect();
    assert_eq!(
        annotations,
        [
            Annotation::Question,
            Annotation::DatabaseProgress,
            Annotation::DatabaseResponse,
            Annotation::FinalAnswer
        ]
    );
    let fetched = &result.history[2].content;
    assert!(fetched.contains(r#""chromosome":"Y""#));
}

#[tokio::test(start_paused = true)]
async fn scenario_alignment_times_out() {
    let config = AgentConfig::builder()
        .api_key("test")
        .build()
        .unwrap_or_else(|_| unreachable!());
    let blast = Arc::new(SlowBlast {
        polls: Mutex::new(0),
    });
    let provider = Replay::new(&[
        r#"{"agent": "alignment-agent", "reason": "raw DNA sequence"}"#,
        r#"{"sequence": "ATTCTGCCTTTAGTAATTTGATGACAGAGACTTCTTGGGAACCACAGCC", "hitlist_size": 10}"#,
    ]);

    let orchestrator = Orchestrator::with_prompts(
        provider,
        blast.clone(),
        &config,
        &PromptSet::defaults(),
    );
    let start = tokio::time::Instant::now();
    let result = orchestrator
        .ask("Align the DNA sequence to the human genome: ATTCTGCCTTTAGTAATTTGATGACAGAGACTTCTTGGGAACCACAGCC")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(result.status, Status::Error);
    assert!(result.answer.is_none());
    assert_eq!(*blast.polls.lock().unwrap_or_else(PoisonError::into_inner), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(150));

    let last = result.history.last().map(|m| (m.annotation, m.content.as_str()));
    assert_eq!(
        last,
        Some((
            Annotation::AlignmentError,
            "BLAST analysis is taking too long, please try again later"
        ))
    );
    let progress = result
        .history
        .iter()
        .filter(|m| m.annotation == Annotation::AlignmentProgress)
        .count();
    assert_eq!(progress, 4);
    assert!(result.error.is_some());
}
