use std::fs;
use studybuddy_core::{
    ConfigError, ConfigManager, DedupMode, OutputFormat, QuestionStrategy, RetryPolicy,
    StudyBuddyConfig, StudyBuddyError,
};
use tempfile::TempDir;

#[test]
fn test_create_default_config_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    ConfigManager::create_default_config(&path).unwrap();
    assert!(path.exists());

    let manager = ConfigManager::from_path(&path).unwrap();
    assert_eq!(manager.config_path(), Some(path.as_path()));

    let defaults = StudyBuddyConfig::default();
    let loaded = manager.config();
    assert_eq!(
        loaded.chunking.question_chunk_size,
        defaults.chunking.question_chunk_size
    );
    assert_eq!(loaded.retrieval.top_k, defaults.retrieval.top_k);
    assert_eq!(loaded.retry, RetryPolicy::default());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studybuddy.toml");
    fs::write(
        &path,
        r#"
[llm]
provider = "gemini"
question_temperature = 0.5

[chunking]
answer_chunk_size = 500
answer_chunk_overlap = 50

[retrieval]
top_k = 3
question_limit = 10

[pipeline]
question_strategy = "refine"
dedup = "exact"

[output]
format = "json"
"#,
    )
    .unwrap();

    let config = ConfigManager::from_path(&path).unwrap().into_config();
    assert_eq!(config.llm.provider, "gemini");
    assert_eq!(config.llm.question_temperature, 0.5);
    assert_eq!(config.llm.answer_temperature, 0.1);
    assert_eq!(config.chunking.fine().max_tokens, 500);
    assert_eq!(config.chunking.coarse().max_tokens, 10000);
    assert_eq!(config.retrieval.question_limit, Some(10));
    assert_eq!(config.pipeline.question_strategy, QuestionStrategy::Refine);
    assert_eq!(config.pipeline.dedup, DedupMode::Exact);
    assert_eq!(config.output.format, OutputFormat::Json);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[chunking]\nquestion_chunk_size = 100\nquestion_chunk_overlap = 100\n")
        .unwrap();

    let err = ConfigManager::from_path(&path).err().unwrap();
    assert!(matches!(err, ConfigError::ValidationError(_)));

    let as_core: StudyBuddyError = err.into();
    assert!(matches!(as_core, StudyBuddyError::Configuration(_)));
}

#[test]
fn test_missing_and_malformed_files() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        ConfigManager::from_path(&missing).err().unwrap(),
        ConfigError::NotFound(_)
    ));

    let malformed = dir.path().join("malformed.toml");
    fs::write(&malformed, "[llm\nprovider = ").unwrap();
    assert!(matches!(
        ConfigManager::from_path(&malformed).err().unwrap(),
        ConfigError::ParseError(_)
    ));
}

#[test]
fn test_retry_policy_runs_outside_async_context() {
    let policy = RetryPolicy::no_backoff(2);
    let result = tokio_test::block_on(policy.run("noop", || async { Ok::<_, StudyBuddyError>(7) }));
    assert_eq!(result.unwrap(), 7);
}
