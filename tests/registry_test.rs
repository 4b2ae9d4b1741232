//! Tests for PretrainedRegistry name resolution and remote listing.

mod common;

use candle_core::Device;
use matgl_hub::model::ModelKind;
use matgl_hub::{load_model, Config, Downloader, Error, PretrainedRegistry};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// The blocking client must be built off the async worker threads, so tests
// pass a Config into `spawn_blocking` and build the registry there.
fn config_for(server: &MockServer, cache_dir: &Path) -> Config {
    Config::default()
        .with_cache_dir(cache_dir)
        .with_base_url(format!("{}/pretrained_models", server.uri()))
        .with_listing_url(format!("{}/contents/pretrained_models", server.uri()))
}

#[tokio::test]
async fn remote_listing_keeps_directories_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contents/pretrained_models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "README.md", "type": "file"},
            {"name": "MEGNet-MP-2018.6.1-Eform", "type": "dir"},
            {"name": "M3GNet-MP-2021.2.8-PES", "type": "dir"},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = config_for(&server, cache.path());
    let names = tokio::task::spawn_blocking(move || {
        PretrainedRegistry::new(config)
            .unwrap()
            .fetch_remote_names()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(
        names,
        vec!["M3GNet-MP-2021.2.8-PES", "MEGNet-MP-2018.6.1-Eform"]
    );
}

#[tokio::test]
async fn remote_listing_failure_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = config_for(&server, cache.path());
    let err = tokio::task::spawn_blocking(move || {
        PretrainedRegistry::new(config)
            .unwrap()
            .fetch_remote_names()
            .unwrap_err()
    })
    .await
    .unwrap();

    assert!(matches!(err, Error::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn load_by_name_fetches_missing_checkpoint_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/pretrained_models/{}/model.json", common::MODEL_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::checkpoint_json()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/pretrained_models/{}/state.pt", common::MODEL_NAME)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    common::write_state(&cache.path().join(common::MODEL_NAME));

    let config = config_for(&server, cache.path());
    let (kind, nblocks, num_parameters) = tokio::task::spawn_blocking(move || {
        let registry = PretrainedRegistry::new(config).unwrap();
        assert!(registry
            .list_available_names()
            .contains(&common::MODEL_NAME.to_string()));
        let model = registry.load_by_name(common::MODEL_NAME, &Device::Cpu).unwrap();
        (
            model.kind(),
            model.init_args()["nblocks"].clone(),
            model.num_parameters(),
        )
    })
    .await
    .unwrap();

    assert_eq!(kind, ModelKind::MEGNet);
    assert_eq!(nblocks, 3);
    assert_eq!(num_parameters, 3 * 2 + 3);
    assert!(cache
        .path()
        .join(common::MODEL_NAME)
        .join("model.json")
        .is_file());
}

#[tokio::test]
async fn complete_cache_needs_no_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let model_dir = cache.path().join(common::MODEL_NAME);
    common::write_state(&model_dir);
    std::fs::write(model_dir.join("model.json"), common::checkpoint_json()).unwrap();

    let config = config_for(&server, cache.path());
    let name = tokio::task::spawn_blocking(move || {
        let registry = PretrainedRegistry::new(config).unwrap();
        let model = load_model(common::MODEL_NAME, &registry, &Device::Cpu).unwrap();
        model.name().to_string()
    })
    .await
    .unwrap();

    assert_eq!(name, common::MODEL_NAME);
}

#[tokio::test]
async fn unknown_name_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = config_for(&server, cache.path());
    let err = tokio::task::spawn_blocking(move || {
        let registry = PretrainedRegistry::new(config).unwrap();
        load_model("Foo-v1", &registry, &Device::Cpu).unwrap_err()
    })
    .await
    .unwrap();

    assert!(matches!(err, Error::ModelNotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn forced_load_fetches_cached_model_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/pretrained_models/{}/model.json", common::MODEL_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::checkpoint_json()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/pretrained_models/{}/state.pt", common::MODEL_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_string("version https://git-lfs.github.com/spec/v1"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let model_dir = cache.path().join(common::MODEL_NAME);
    common::write_state(&model_dir);
    std::fs::write(model_dir.join("model.json"), r#"{"@class": "MEGNet", "kwargs": {"nblocks": 1}}"#)
        .unwrap();

    let config = config_for(&server, cache.path());
    let err = tokio::task::spawn_blocking(move || {
        let downloader = Downloader::new(&config).unwrap().force_download(true);
        let registry = PretrainedRegistry::with_downloader(config, downloader);
        registry
            .load_by_name(common::MODEL_NAME, &Device::Cpu)
            .unwrap_err()
    })
    .await
    .unwrap();

    // The refreshed state is not a PyTorch archive, so conversion fails.
    assert!(matches!(err, Error::ModelLoadFailed(_)), "got {:?}", err);
    assert_eq!(
        std::fs::read_to_string(model_dir.join("model.json")).unwrap(),
        common::checkpoint_json()
    );
    assert!(!model_dir.join("state.pt").exists());
    assert!(model_dir.join("state.safetensors").is_file());
}

#[tokio::test]
async fn unconvertible_state_is_not_a_cache_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/pretrained_models/{}/model.json", common::MODEL_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::checkpoint_json()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/pretrained_models/{}/state.pt", common::MODEL_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .expect(2)
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let config = config_for(&server, cache.path());
    let (first, second) = tokio::task::spawn_blocking(move || {
        let registry = PretrainedRegistry::new(config).unwrap();
        let first = registry
            .load_by_name(common::MODEL_NAME, &Device::Cpu)
            .unwrap_err();
        let second = registry
            .load_by_name(common::MODEL_NAME, &Device::Cpu)
            .unwrap_err();
        (first, second)
    })
    .await
    .unwrap();

    assert!(matches!(first, Error::ModelLoadFailed(_)), "got {:?}", first);
    assert!(matches!(second, Error::ModelLoadFailed(_)), "got {:?}", second);

    let model_dir = cache.path().join(common::MODEL_NAME);
    assert!(model_dir.join("model.json").is_file());
    assert!(!model_dir.join("state.pt").exists());
    assert!(!model_dir.join("state.safetensors").exists());
}
