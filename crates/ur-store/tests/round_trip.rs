use std::fs;

use tempfile::TempDir;
use ur_core::{
    build_filter, page_allow_filter, ContentRequest, ContentType, Decision, DomainConstraint, EngineConfig,
    Filter, Response, RuleRepository, ThirdPartyPolicy, UserRules,
};
use ur_store::{JsonFileRepository, StoreError};

fn sample_filters() -> Vec<Filter> {
    vec![
        build_filter("news.example", "track.ads", ContentType::IMAGE, true, Response::Block).expect("valid"),
        build_filter("", "", ContentType::SCRIPT | ContentType::XMLHTTPREQUEST, false, Response::Allow)
            .expect("valid"),
        page_allow_filter("site.example").expect("valid"),
        Filter::host(
            "mail.example",
            ContentType::ALL,
            Some(DomainConstraint::new(false, ["cdn.example", "static.example"]).expect("valid")),
            ThirdPartyPolicy::Either,
            Response::Block,
        )
        .expect("valid"),
    ]
}

#[test]
fn filters_survive_restart_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rules.json");

    {
        let repo = JsonFileRepository::open(&path).expect("open");
        let rules = UserRules::load(repo, EngineConfig::default()).expect("load");
        for filter in sample_filters() {
            assert!(rules.add_user_rule(filter).expect("add"));
        }
    }

    let repo = JsonFileRepository::open(&path).expect("reopen");
    assert_eq!(repo.get_all_rules().expect("read"), sample_filters());

    let rules = UserRules::load(repo, EngineConfig::default()).expect("load");
    let request = ContentRequest::new("news.example", "track.ads", ContentType::IMAGE, true);
    assert_eq!(rules.get_response(&request), Decision::Block);
    assert!(rules.is_explicitly_allowed("https://site.example/"));
}

#[test]
fn removal_is_persisted() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("rules.json");
    let filters = sample_filters();

    {
        let rules = UserRules::load(JsonFileRepository::open(&path).expect("open"), EngineConfig::default())
            .expect("load");
        for filter in &filters {
            rules.add_user_rule(filter.clone()).expect("add");
        }
        assert!(rules.remove_user_rule(&filters[0]).expect("remove"));
    }

    let repo = JsonFileRepository::open(&path).expect("reopen");
    assert_eq!(repo.get_all_rules().expect("read"), filters[1..].to_vec());
}

#[test]
fn open_creates_missing_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rules.json");
    let repo = JsonFileRepository::open(&path).expect("open");
    assert!(repo.is_empty());
    assert!(path.exists());
}

#[test]
fn corrupt_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rules.json");
    fs::write(&path, "{\"version\": 1, \"rules\": [{\"scope\": 5}]}").expect("write");
    assert!(matches!(JsonFileRepository::open(&path), Err(StoreError::Json { .. })));
}

#[test]
fn hand_edited_rules_are_normalized_on_load() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rules.json");
    fs::write(
        &path,
        r#"{"version": 1, "rules": [
            {"scope": "Site.Example", "shape": "Host", "content_type": "SCRIPT",
             "domain_constraint": null, "third_party": "Either", "response": "Block"},
            {"scope": "", "shape": "Contains", "content_type": "IMAGE",
             "domain_constraint": {"include": true, "domains": ["Ads.Example"]},
             "third_party": "Either", "response": "Block"}
        ]}"#,
    )
    .expect("write");

    let rules = UserRules::load(JsonFileRepository::open(&path).expect("open"), EngineConfig::default())
        .expect("load");
    let script = ContentRequest::new("site.example", "cdn.example", ContentType::SCRIPT, true);
    let image = ContentRequest::new("other.example", "ads.example", ContentType::IMAGE, true);
    assert_eq!(rules.get_response(&script), Decision::Block);
    assert_eq!(rules.get_response(&image), Decision::Block);
}

#[test]
fn rule_that_could_never_match_is_rejected_on_load() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rules.json");
    fs::write(
        &path,
        r#"{"version": 1, "rules": [
            {"scope": "bad host", "shape": "Host", "content_type": "SCRIPT",
             "domain_constraint": null, "third_party": "Either", "response": "Block"}
        ]}"#,
    )
    .expect("write");
    assert!(matches!(JsonFileRepository::open(&path), Err(StoreError::Json { .. })));
}

#[test]
fn failed_write_keeps_memory_and_disk_in_step() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rules.json");
    let repo = JsonFileRepository::open(&path).expect("open");
    let rules = UserRules::load(repo, EngineConfig::default()).expect("load");

    // A directory where the temp file should go makes the write fail.
    fs::create_dir(dir.path().join("rules.json.tmp")).expect("mkdir");

    let filter = sample_filters().remove(0);
    assert!(rules.add_user_rule(filter).is_err());
    assert!(rules.is_empty());
    assert!(rules.repository().is_empty());
}
