use hscode_core::config::{AppConfig, TariffConfig};
use hscode_core::models::{ClassificationQuery, OutcomeSource, Resolution, SearchResponse};
use hscode_core::{pipeline, Classifier, ClassifierSettings, ClassifyError};
use providers::{LlmProvider, ProviderError};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const TARIFF: &str = "CHAPTER 9\n\
Coffee, tea, mate and spices\n\
09011100 - Coffee, not roasted, not decaffeinated\n\
09012100 - Coffee, roasted, not decaffeinated\n\
17\n\
09024000 - Other black tea (fermented) and other partly\n\
fermented tea\n\
84821000 - Ball bearings\n";

struct Canned {
    reply: String,
    calls: Mutex<usize>,
}

#[async_trait::async_trait]
impl LlmProvider for Canned {
    async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.reply.clone())
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

fn canned(reply: &str) -> Arc<Canned> {
    Arc::new(Canned {
        reply: reply.to_string(),
        calls: Mutex::new(0),
    })
}

fn model_settings() -> ClassifierSettings {
    ClassifierSettings {
        models: vec!["primary".into()],
        clarification_check: false,
        ..ClassifierSettings::default()
    }
}

#[tokio::test]
async fn extracted_artifacts_reload_and_classify_locally() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("tariff.txt");
    let out = temp.path().join("data");
    fs::write(&source, TARIFF).unwrap();

    let (index, paths) =
        pipeline::extract_to_dir(&source, &out, &TariffConfig::default()).unwrap();
    assert_eq!(index.records().len(), 4);
    assert_eq!(
        index.lookup("09024000").unwrap().description,
        "Other black tea (fermented) and other partly fermented tea"
    );
    let mirror = fs::read_to_string(&paths.codes_text).unwrap();
    assert!(mirror.contains("84821000 - Ball bearings"));

    let reloaded = pipeline::load_index(&TariffConfig {
        codes_path: Some(paths.codes_json.display().to_string()),
        ..TariffConfig::default()
    })
    .unwrap();
    assert_eq!(reloaded.records(), index.records());

    let classifier = Classifier::new(None, ClassifierSettings::default());
    let outcome = classifier
        .classify(Some(&reloaded), &ClassificationQuery::new("ball bearings"))
        .await
        .unwrap();
    assert_eq!(outcome.source, OutcomeSource::Lexical);
    let response = SearchResponse::from_resolution(&outcome.resolution);
    assert_eq!(response.hs_code.as_deref(), Some("84821000"));
    assert!(!response.needs_clarification);
    assert!(response.confidence >= 70);
}

#[tokio::test]
async fn model_answer_wrapped_in_prose_is_accepted() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("tariff.txt");
    fs::write(&source, TARIFF).unwrap();
    let index = pipeline::load_index(&TariffConfig {
        source: Some(source.display().to_string()),
        ..TariffConfig::default()
    })
    .unwrap();

    let provider = canned(
        "Sure! Here is the classification:\n```json\n{\"hsCode\": \"0901.21.00\", \
         \"confidence\": 88, \"reasons\": [\"Roasted coffee beans\"], \
         \"relatedCodes\": [{\"code\": \"09011100\", \"description\": \"Coffee, not roasted\"}]}\n```",
    );
    let llm: Arc<dyn LlmProvider> = provider.clone();
    let classifier = Classifier::new(Some(llm), model_settings());

    let outcome = classifier
        .classify(Some(&index), &ClassificationQuery::new("dark roast arabica, whole bean"))
        .await
        .unwrap();
    assert_eq!(outcome.source, OutcomeSource::Model("primary".into()));
    match outcome.resolution {
        Resolution::Classified(r) => {
            assert_eq!(r.hs_code, "09012100");
            assert_eq!(r.description, "Coffee, roasted, not decaffeinated");
            assert_eq!(r.confidence, 88);
            assert_eq!(r.related_codes.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(*provider.calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn error_responses_keep_the_full_shape() {
    let classifier = Classifier::new(None, ClassifierSettings::default());
    let err = classifier
        .classify(None, &ClassificationQuery::new("ball bearings"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifyError::ServiceUnavailable(_)));

    let body = serde_json::to_value(SearchResponse::from_error(err.public_message())).unwrap();
    for key in [
        "needsClarification",
        "hsCode",
        "description",
        "confidence",
        "reasons",
        "relatedCodes",
        "message",
        "clarificationQuestions",
        "error",
    ] {
        assert!(body.get(key).is_some(), "missing {key}");
    }
    assert_eq!(body["needsClarification"], false);
    assert!(body["hsCode"].is_null());
}

#[test]
fn registry_without_credential_is_empty() {
    let mut cfg = AppConfig::default();
    cfg.llm.api_key_env = "HSCODE_TEST_KEY_THAT_IS_NEVER_SET".to_string();
    let registry = pipeline::build_registry(&cfg);
    assert!(registry.is_empty());
    assert!(!pipeline::build_classifier(&cfg, &registry).has_backend());
}
