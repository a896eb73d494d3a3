/*!
 * Tests for translation provider implementations
 */

use autotranslate::errors::ProviderError;
use autotranslate::providers::{DeepLTranslator, MockTranslator, OPTION_AUTH_KEY, TranslateOptions, Translator};

fn texts(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// The working mock marks texts with the target language
#[tokio::test]
async fn test_mockTranslator_working_shouldTranslateEveryText() {
    let translator = MockTranslator::working();

    let results = translator
        .translate(&texts(&["Hello", "World"]), "EN", "DE", &TranslateOptions::new())
        .await
        .unwrap();

    let translated: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(translated, vec!["[DE] Hello", "[DE] World"]);
    assert_eq!(translator.call_count(), 1);
    assert_eq!(translator.texts_translated(), 2);
}

#[tokio::test]
async fn test_mockTranslator_rateLimited_shouldRecoverAfterFailures() {
    let translator = MockTranslator::rate_limited(1);
    let input = texts(&["Hello"]);

    let first = translator.translate(&input, "EN", "DE", &TranslateOptions::new()).await;
    let second = translator.translate(&input, "EN", "DE", &TranslateOptions::new()).await;

    assert!(matches!(first, Err(ref e) if e.is_rate_limit()));
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_mockTranslator_unauthorized_shouldBeFatal() {
    let translator = MockTranslator::unauthorized();

    let error = translator
        .translate(&texts(&["Hello"]), "EN", "DE", &TranslateOptions::new())
        .await
        .unwrap_err();

    assert!(error.is_fatal());
}

/// Without any key the client fails before sending a request
#[tokio::test]
async fn test_deepl_withoutApiKey_shouldFailWithAuthenticationError() {
    let translator = DeepLTranslator::new("", "http://127.0.0.1:9", 1);

    let error = translator
        .translate(&texts(&["Hello"]), "EN", "DE", &TranslateOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(error, ProviderError::AuthenticationError(_)));
    assert_eq!(translator.name(), "deepl");
}

#[tokio::test]
async fn test_deepl_withUnreachableEndpoint_shouldFailNonFatally() {
    let translator = DeepLTranslator::new("", "http://127.0.0.1:9", 2);
    let mut options = TranslateOptions::new();
    options.insert(OPTION_AUTH_KEY.to_string(), "per-site-key".to_string());

    let error = translator
        .translate(&texts(&["Hello"]), "EN", "DE", &options)
        .await
        .unwrap_err();

    assert!(!error.is_fatal());
}

#[tokio::test]
async fn test_deepl_withNoTexts_shouldNotCallApi() {
    let translator = DeepLTranslator::new("", "", 1);

    let results = translator.translate(&[], "EN", "DE", &TranslateOptions::new()).await.unwrap();

    assert!(results.is_empty());
}
