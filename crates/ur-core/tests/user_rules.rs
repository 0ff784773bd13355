use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use ur_core::{
    build_filter, ContentRequest, ContentType, Decision, DomainConstraint, EngineConfig, Filter,
    MalformedRuleError, MemoryRepository, PersistenceError, Response, RuleRepository, ThirdPartyPolicy,
    UserRules, UserRulesError,
};

/// Repository that can be switched into a failing state.
#[derive(Default)]
struct FlakyRepository {
    inner: MemoryRepository,
    failing: AtomicBool,
}

impl FlakyRepository {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PersistenceError::new("storage unavailable"))
        } else {
            Ok(())
        }
    }
}

impl RuleRepository for FlakyRepository {
    fn get_all_rules(&self) -> Result<Vec<Filter>, PersistenceError> {
        self.check()?;
        self.inner.get_all_rules()
    }

    fn add_rules(&self, filters: &[Filter]) -> Result<(), PersistenceError> {
        self.check()?;
        self.inner.add_rules(filters)
    }

    fn remove_rule(&self, filter: &Filter) -> Result<(), PersistenceError> {
        self.check()?;
        self.inner.remove_rule(filter)
    }
}

fn engine() -> UserRules<MemoryRepository> {
    UserRules::load(MemoryRepository::new(), EngineConfig::default()).expect("memory load")
}

fn sample_requests() -> Vec<ContentRequest<'static>> {
    vec![
        ContentRequest::new("news.example", "track.ads", ContentType::IMAGE, true),
        ContentRequest::new("news.example", "track.ads", ContentType::SCRIPT, true),
        ContentRequest::new("news.example", "news.example", ContentType::MAIN_FRAME, false),
        ContentRequest::new("site.example", "cdn.example", ContentType::SCRIPT, true),
        ContentRequest::new("other.example", "track.ads", ContentType::IMAGE, true),
    ]
}

fn answers<R: RuleRepository>(rules: &UserRules<R>) -> Vec<Decision> {
    sample_requests().iter().map(|req| rules.get_response(req)).collect()
}

#[test]
fn no_rules_means_no_opinion() {
    let rules = engine();
    for request in sample_requests() {
        assert_eq!(rules.get_response(&request), Decision::Undecided);
    }
}

#[test]
fn concrete_news_scenario() {
    let rules = engine();
    let f1 = build_filter("news.example", "track.ads", ContentType::IMAGE, true, Response::Block)
        .expect("valid rule");
    rules.add_user_rule(f1).expect("add");

    let image = ContentRequest::new("news.example", "track.ads", ContentType::IMAGE, true);
    let script = ContentRequest::new("news.example", "track.ads", ContentType::SCRIPT, true);
    assert_eq!(rules.get_response(&image), Decision::Block);
    assert_eq!(rules.get_response(&script), Decision::Undecided);
}

#[test]
fn adding_twice_equals_adding_once() {
    let once = engine();
    let twice = engine();
    let filter = build_filter("", "track.ads", ContentType::ALL, true, Response::Block).expect("valid rule");

    once.add_user_rule(filter.clone()).expect("add");
    twice.add_user_rule(filter.clone()).expect("add");
    twice.add_user_rule(filter).expect("add again");

    assert_eq!(answers(&once), answers(&twice));
    assert_eq!(twice.len(), 1);
}

#[test]
fn remove_restores_pre_add_answers() {
    let rules = engine();
    rules
        .add_user_rule(build_filter("", "", ContentType::SCRIPT, true, Response::Block).expect("valid"))
        .expect("add");
    let before = answers(&rules);

    let extra = build_filter("news.example", "track.ads", ContentType::IMAGE, true, Response::Allow)
        .expect("valid");
    rules.add_user_rule(extra.clone()).expect("add");
    assert_ne!(answers(&rules), before);

    assert!(rules.remove_user_rule(&extra).expect("remove"));
    assert_eq!(answers(&rules), before);
    assert!(!rules.remove_user_rule(&extra).expect("absent remove is fine"));
}

#[test]
fn local_allow_beats_global_block_in_any_order() {
    let global = build_filter("", "", ContentType::SCRIPT, true, Response::Block).expect("valid");
    let local = build_filter("site.example", "", ContentType::SCRIPT, true, Response::Allow).expect("valid");
    let request = ContentRequest::new("site.example", "cdn.example", ContentType::SCRIPT, true);

    for order in [[&global, &local], [&local, &global]] {
        let rules = engine();
        for filter in order {
            rules.add_user_rule(filter.clone()).expect("add");
        }
        assert_eq!(rules.get_response(&request), Decision::Allow);
    }
}

#[test]
fn domain_constraint_is_exclusive() {
    let rules = engine();
    rules
        .add_user_rule(build_filter("site.example", "ads.example", ContentType::SCRIPT, true, Response::Block).expect("valid"))
        .expect("add");

    let other = ContentRequest::new("site.example", "other.example", ContentType::SCRIPT, true);
    let ads = ContentRequest::new("site.example", "ads.example", ContentType::SCRIPT, true);
    assert_eq!(rules.get_response(&other), Decision::Undecided);
    assert_eq!(rules.get_response(&ads), Decision::Block);
}

#[test]
fn third_party_polarity_is_respected() {
    let rules = engine();
    rules
        .add_user_rule(build_filter("site.example", "", ContentType::IMAGE, true, Response::Block).expect("valid"))
        .expect("add");

    let first_party = ContentRequest::new("site.example", "site.example", ContentType::IMAGE, false);
    let third_party = ContentRequest::new("site.example", "img.example", ContentType::IMAGE, true);
    assert_eq!(rules.get_response(&first_party), Decision::Undecided);
    assert_eq!(rules.get_response(&third_party), Decision::Block);
}

#[test]
fn directly_constructed_filters_always_match() {
    let rules = engine();
    let local = Filter::host("Site.Example", ContentType::SCRIPT, None, ThirdPartyPolicy::Either, Response::Block)
        .expect("valid");
    let global = Filter::global(
        ContentType::IMAGE,
        Some(DomainConstraint::single("Ads.Example").expect("valid")),
        ThirdPartyPolicy::Either,
        Response::Block,
    )
    .expect("valid");
    assert!(rules.add_user_rule(local).expect("add"));
    assert!(rules.add_user_rule(global).expect("add"));

    let script = ContentRequest::new("Site.Example", "cdn.example", ContentType::SCRIPT, true);
    let image = ContentRequest::new("news.example", "ads.example", ContentType::IMAGE, true);
    assert_eq!(rules.get_response(&script), Decision::Block);
    assert_eq!(rules.get_response(&image), Decision::Block);
}

#[test]
fn unmatchable_filters_cannot_be_built() {
    assert_eq!(
        Filter::global(ContentType::empty(), None, ThirdPartyPolicy::Either, Response::Block),
        Err(MalformedRuleError::EmptyContentType)
    );
    assert!(Filter::host("not a host", ContentType::SCRIPT, None, ThirdPartyPolicy::Either, Response::Block).is_err());
    let none: [&str; 0] = [];
    assert_eq!(
        DomainConstraint::new(true, none),
        Err(MalformedRuleError::EmptyDomainConstraint)
    );
}

#[test]
fn failed_add_rolls_back() {
    let rules = UserRules::load(FlakyRepository::default(), EngineConfig::default()).expect("load");
    let filter = build_filter("site.example", "", ContentType::SCRIPT, true, Response::Block).expect("valid");
    let request = ContentRequest::new("site.example", "cdn.example", ContentType::SCRIPT, true);

    rules.repository().set_failing(true);
    let err = rules.add_user_rule(filter.clone()).expect_err("storage is down");
    assert!(matches!(err, UserRulesError::Persistence(_)));
    assert_eq!(rules.get_response(&request), Decision::Undecided);
    assert!(rules.is_empty());

    rules.repository().set_failing(false);
    assert!(rules.add_user_rule(filter).expect("add"));
    assert_eq!(rules.get_response(&request), Decision::Block);
}

#[test]
fn failed_remove_restores_rule_in_place() {
    let rules = UserRules::load(FlakyRepository::default(), EngineConfig::default()).expect("load");
    let older = build_filter("site.example", "", ContentType::SCRIPT, true, Response::Allow).expect("valid");
    let newer = build_filter("site.example", "", ContentType::SCRIPT, true, Response::Block).expect("valid");
    rules.add_user_rule(older.clone()).expect("add");
    rules.add_user_rule(newer.clone()).expect("add");

    rules.repository().set_failing(true);
    assert!(rules.remove_user_rule(&older).is_err());
    assert_eq!(rules.rules_for_scope("site.example"), vec![older, newer]);

    let request = ContentRequest::new("site.example", "cdn.example", ContentType::SCRIPT, true);
    assert_eq!(rules.get_response(&request), Decision::Block);
}

#[test]
fn load_failure_is_reported() {
    let repo = FlakyRepository::default();
    repo.set_failing(true);
    assert!(UserRules::load(repo, EngineConfig::default()).is_err());
}

#[test]
fn lookups_run_alongside_mutations() {
    let rules = Arc::new(engine());
    let global = build_filter("", "", ContentType::SCRIPT, true, Response::Block).expect("valid");
    rules.add_user_rule(global).expect("add");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let rules = Arc::clone(&rules);
            thread::spawn(move || {
                let request = ContentRequest::new("site.example", "cdn.example", ContentType::SCRIPT, true);
                for _ in 0..2_000 {
                    let decision = rules.get_response(&request);
                    assert!(decision == Decision::Block || decision == Decision::Allow);
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let rules = Arc::clone(&rules);
            thread::spawn(move || {
                let scope = format!("site{i}.example");
                for _ in 0..200 {
                    let filter = build_filter(&scope, "", ContentType::SCRIPT, true, Response::Allow).expect("valid");
                    rules.add_user_rule(filter.clone()).expect("add");
                    rules.remove_user_rule(&filter).expect("remove");
                }
                let toggle = build_filter("site.example", "", ContentType::SCRIPT, true, Response::Allow)
                    .expect("valid");
                rules.add_user_rule(toggle).expect("add");
            })
        })
        .collect();

    for handle in readers.into_iter().chain(writers) {
        handle.join().expect("thread panicked");
    }

    assert_eq!(rules.len(), 2);
    assert_eq!(rules.repository().len(), 2);
}
