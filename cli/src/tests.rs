//! CLI test suite: document parsing, model construction, and scenario
//! replay against hand-computed books.

use strata_engine::math::FRAC_ONE;
use strata_engine::{Frac, MarketState, Nav, YdmInputs};

use crate::config::{self, parse_frac, parse_nav, ActionDoc, MarketFile, ParseError, ScenarioFile};
use crate::inspect;
use crate::simulate;

const MARKET_TOML: &str = r#"
[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000

[book]
senior = "200"
junior = "250"
"#;

const CURVE_MARKET_TOML: &str = r#"
[market]
coverage = "0.25"
beta = "1"
lltv = "0.9"
fixed-term-secs = 0
senior-fee = "0.1"
junior-fee = "0.2"

[market.yield-model]
type = "curve"
base = "0.1"
slope = "0.4"
kink = "0.8"
max = "0.5"
"#;

const FLAT_MARKET_TOML: &str = r#"
[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 0

[market.yield-model]
type = "flat"
share = "0.3"
"#;

/// Senior crash into recovery, then a term-expiry observation that
/// forgives junior IL, absorbs a junior drawdown, repays senior IL,
/// and splits the leftover senior yield 50/50.
const LIFECYCLE_TOML: &str = r#"
name = "recovery lifecycle"

[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000

[market.yield-model]
type = "flat"
share = "0.5"

[book]
senior = "200"
junior = "250"

[[step]]
at = 10
action = "observe"
senior = "50"
junior = "250"

[[step]]
at = 1011
action = "observe"
senior = "130"
junior = "100"
"#;

/// Book at (300, 400): the senior side can admit exactly 100 more
/// before coverage binds, and once utilization sits at 1.0 no junior
/// unit may leave.
const COVERAGE_TOML: &str = r#"
name = "coverage limits"

[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000

[book]
senior = "300"
junior = "400"

[[step]]
at = 0
action = "deposit-senior"
amount = "101"

[[step]]
at = 3
action = "withdraw-junior"
amount = "50"

[[step]]
at = 5
action = "deposit-senior"
amount = "100"

[[step]]
at = 5
action = "deposit-senior"
amount = "50"

[[step]]
at = 7
action = "withdraw-junior"
amount = "1"
"#;

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn parse_frac_reads_decimal_strings() {
    assert_eq!(parse_frac("0.25").unwrap(), Frac::new(FRAC_ONE / 4));
    assert_eq!(parse_frac("1").unwrap(), Frac::ONE);
    assert_eq!(parse_frac("1.5").unwrap(), Frac::new(FRAC_ONE * 3 / 2));
    assert_eq!(
        parse_frac("0.000_000_000_000_000_001").unwrap(),
        Frac::new(1)
    );
    assert_eq!(
        parse_frac("0.4375").unwrap(),
        Frac::new(FRAC_ONE * 4_375 / 10_000)
    );
}

#[test]
fn parse_frac_rejects_malformed_input() {
    assert!(matches!(parse_frac(""), Err(ParseError::BadFraction(_))));
    assert!(matches!(parse_frac("abc"), Err(ParseError::BadFraction(_))));
    assert!(matches!(
        parse_frac("1.2.3"),
        Err(ParseError::BadFraction(_))
    ));
    assert!(matches!(
        parse_frac("-0.5"),
        Err(ParseError::BadFraction(_))
    ));
    assert!(matches!(
        parse_frac("0.0000000000000000001"),
        Err(ParseError::TooPrecise(_))
    ));
    assert!(matches!(
        parse_frac("400000000000000000000000"),
        Err(ParseError::FractionOverflow(_))
    ));
}

#[test]
fn parse_nav_reads_underscored_integers() {
    assert_eq!(parse_nav("1_000_000").unwrap(), Nav::new(1_000_000));
    assert_eq!(parse_nav("0").unwrap(), Nav::ZERO);
    assert!(matches!(parse_nav("12.5"), Err(ParseError::BadAmount(_))));
    assert!(matches!(parse_nav(""), Err(ParseError::BadAmount(_))));
    assert!(matches!(parse_nav("-5"), Err(ParseError::BadAmount(_))));
}

// ============================================================================
// Documents
// ============================================================================

#[test]
fn market_file_round_trips_to_a_valid_config() {
    let file: MarketFile = toml::from_str(MARKET_TOML).expect("parse market file");
    let market_config = file.market.to_config().expect("config");

    assert_eq!(market_config.coverage, Frac::new(FRAC_ONE / 2));
    assert_eq!(market_config.beta, Frac::ONE);
    assert_eq!(market_config.lltv, Frac::new(FRAC_ONE * 9 / 10));
    assert_eq!(market_config.fixed_term_secs, 1000);
    assert_eq!(market_config.senior_fee, Frac::ZERO);
    assert_eq!(market_config.junior_fee, Frac::ZERO);
    market_config.validate().expect("config is valid");

    let (senior, junior) = file.book.expect("book").to_navs().expect("navs");
    assert_eq!(senior, Nav::new(200));
    assert_eq!(junior, Nav::new(250));
}

#[test]
fn market_file_rejects_unknown_keys() {
    let bad = r#"
[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000
bogus = "1"
"#;
    assert!(toml::from_str::<MarketFile>(bad).is_err());
}

#[test]
fn yield_model_docs_build_working_models() {
    let inputs = YdmInputs {
        raw_senior: Nav::new(300),
        raw_junior: Nav::new(400),
        beta: Frac::ONE,
        coverage: Frac::new(FRAC_ONE / 4),
        junior_effective: Nav::new(400),
    };

    // No model key means a zero flat share.
    let file: MarketFile = toml::from_str(MARKET_TOML).expect("parse");
    let model = file.market.to_model().expect("model");
    assert_eq!(
        model.instantaneous_junior_share(&inputs).expect("share"),
        Frac::ZERO
    );

    let file: MarketFile = toml::from_str(FLAT_MARKET_TOML).expect("parse");
    let model = file.market.to_model().expect("model");
    assert_eq!(
        model.instantaneous_junior_share(&inputs).expect("share"),
        Frac::new(FRAC_ONE * 3 / 10)
    );

    // Utilization (300 + 400) * 0.25 / 400 = 0.4375, below the kink,
    // so the curve answers 0.1 + 0.4 * 0.4375 = 0.275.
    let file: MarketFile = toml::from_str(CURVE_MARKET_TOML).expect("parse");
    let model = file.market.to_model().expect("model");
    assert_eq!(
        model.instantaneous_junior_share(&inputs).expect("share"),
        Frac::new(FRAC_ONE * 275 / 1_000)
    );
}

#[test]
fn scenario_file_parses_every_action_form() {
    let toml_text = r#"
name = "all actions"

[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000

[[step]]
at = 0
action = "observe"
senior = "0"
junior = "0"

[[step]]
at = 1
action = "deposit-senior"
amount = "10"

[[step]]
at = 2
action = "deposit-junior"
amount = "10"

[[step]]
at = 3
action = "withdraw-senior"
amount = "5"

[[step]]
at = 4
action = "withdraw-junior"
amount = "5"

[[step]]
at = 5
action = "set-coverage"
value = "0.4"

[[step]]
at = 6
action = "set-beta"
value = "0.9"

[[step]]
at = 7
action = "set-lltv"
value = "0.85"

[[step]]
at = 8
action = "set-term"
secs = 500

[[step]]
at = 9
action = "set-fees"
senior = "0.05"
junior = "0.1"
"#;
    let scenario: ScenarioFile = toml::from_str(toml_text).expect("parse scenario");
    assert_eq!(scenario.name, "all actions");
    assert_eq!(scenario.steps.len(), 10);
    assert!(matches!(scenario.steps[0].action, ActionDoc::Observe { .. }));
    assert!(matches!(
        scenario.steps[1].action,
        ActionDoc::DepositSenior { .. }
    ));
    assert!(matches!(
        scenario.steps[8].action,
        ActionDoc::SetTerm { secs: 500 }
    ));
    assert!(matches!(scenario.steps[9].action, ActionDoc::SetFees { .. }));
}

// ============================================================================
// Simulation
// ============================================================================

#[test]
fn simulate_replays_a_full_recovery_lifecycle() {
    let scenario: ScenarioFile = toml::from_str(LIFECYCLE_TOML).expect("parse scenario");
    let report = simulate::run(&scenario, false).expect("run");

    assert_eq!(report.steps_total, 2);
    assert_eq!(report.steps_accepted, 2);
    assert_eq!(report.steps_rejected, 0);
    assert_eq!(report.recoveries_entered, 1);

    assert!(report.steps[0].accepted);
    assert_eq!(report.steps[0].detail, "entered recovery");
    assert!(report.steps[1].accepted);
    assert_eq!(
        report.steps[1].detail,
        "forgave 150 junior IL at window expiry"
    );

    let state = &report.final_state;
    assert_eq!(state.raw_nav.senior, Nav::new(130));
    assert_eq!(state.raw_nav.junior, Nav::new(100));
    assert_eq!(state.effective_nav.senior, Nav::new(215));
    assert_eq!(state.effective_nav.junior, Nav::new(15));
    assert_eq!(state.impermanent_loss.senior, Nav::ZERO);
    assert_eq!(state.impermanent_loss.junior, Nav::ZERO);
    assert_eq!(state.market_state, MarketState::Healthy);
    assert_eq!(report.fees.senior, Nav::ZERO);
    assert_eq!(report.fees.junior, Nav::ZERO);
}

#[test]
fn simulate_records_coverage_rejections_without_mutating_the_book() {
    let scenario: ScenarioFile = toml::from_str(COVERAGE_TOML).expect("parse scenario");
    let report = simulate::run(&scenario, false).expect("run");

    assert_eq!(report.steps_total, 5);
    assert_eq!(report.steps_accepted, 2);
    assert_eq!(report.steps_rejected, 3);
    assert_eq!(report.recoveries_entered, 0);

    let flags: Vec<bool> = report.steps.iter().map(|s| s.accepted).collect();
    assert_eq!(flags, vec![false, true, false, true, false]);
    for record in report.steps.iter().filter(|s| !s.accepted) {
        assert!(record.detail.contains("coverage bound"));
    }

    let state = &report.final_state;
    assert_eq!(state.raw_nav.senior, Nav::new(350));
    assert_eq!(state.raw_nav.junior, Nav::new(350));
    assert_eq!(state.effective_nav.senior, Nav::new(350));
    assert_eq!(state.effective_nav.junior, Nav::new(350));
    assert_eq!(state.market_state, MarketState::Healthy);
}

#[test]
fn simulate_refuses_time_travel() {
    let toml_text = r#"
name = "time travel"

[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000

[[step]]
at = 10
action = "observe"
senior = "0"
junior = "0"

[[step]]
at = 5
action = "observe"
senior = "0"
junior = "0"
"#;
    let scenario: ScenarioFile = toml::from_str(toml_text).expect("parse scenario");
    let err = simulate::run(&scenario, false).unwrap_err();
    assert!(err.to_string().contains("goes back in time"));
}

#[test]
fn simulate_aborts_on_overdrawn_withdrawal() {
    let toml_text = r#"
name = "overdraw"

[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000

[book]
senior = "100"
junior = "50"

[[step]]
at = 0
action = "withdraw-junior"
amount = "60"
"#;
    let scenario: ScenarioFile = toml::from_str(toml_text).expect("parse scenario");
    let err = simulate::run(&scenario, false).unwrap_err();
    assert!(format!("{:#}", err).contains("withdrawal exceeds the junior claim"));
}

#[test]
fn scenario_without_steps_is_just_a_funded_book() {
    let toml_text = r#"
name = "idle book"

[market]
coverage = "0.5"
beta = "1"
lltv = "0.9"
fixed-term-secs = 1000

[book]
senior = "100"
junior = "200"
"#;
    let scenario: ScenarioFile = toml::from_str(toml_text).expect("parse scenario");
    let report = simulate::run(&scenario, false).expect("run");

    assert_eq!(report.steps_total, 0);
    assert_eq!(report.final_state.raw_nav.senior, Nav::new(100));
    assert_eq!(report.final_state.raw_nav.junior, Nav::new(200));
    assert_eq!(report.final_state.effective_nav.senior, Nav::new(100));
    assert_eq!(report.final_state.effective_nav.junior, Nav::new(200));
}

#[test]
fn simulation_report_serializes_to_json() {
    let scenario: ScenarioFile = toml::from_str(LIFECYCLE_TOML).expect("parse scenario");
    let report = simulate::run(&scenario, false).expect("run");
    let value = serde_json::to_value(&report).expect("serialize");

    assert_eq!(value["name"], "recovery lifecycle");
    assert_eq!(value["steps_accepted"], 2);
    assert_eq!(value["recoveries_entered"], 1);
    assert_eq!(value["final_state"]["market_state"], "healthy");
    assert_eq!(value["final_state"]["raw_nav"]["senior"], 130);
    assert_eq!(value["final_state"]["effective_nav"]["junior"], 15);
}

// ============================================================================
// Inspection
// ============================================================================

#[test]
fn market_files_load_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let market_path = dir.path().join("market.toml");
    std::fs::write(&market_path, MARKET_TOML).expect("write market file");

    let file = config::load_market_file(market_path.to_str().expect("utf8 path")).expect("load");
    file.market
        .to_config()
        .expect("config")
        .validate()
        .expect("valid");

    let scenario_path = dir.path().join("scenario.toml");
    std::fs::write(&scenario_path, LIFECYCLE_TOML).expect("write scenario file");
    let scenario =
        config::load_scenario_file(scenario_path.to_str().expect("utf8 path")).expect("load");
    assert_eq!(scenario.steps.len(), 2);

    let missing = dir.path().join("absent.toml");
    let err = config::load_market_file(missing.to_str().expect("utf8 path")).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to read"));
}

#[test]
fn check_config_flags_invalid_parameters() {
    let dir = tempfile::tempdir().expect("tempdir");

    let valid_path = dir.path().join("valid.toml");
    std::fs::write(&valid_path, MARKET_TOML).expect("write");
    inspect::check_config(valid_path.to_str().expect("utf8 path")).expect("valid config");

    let invalid = r#"
[market]
coverage = "0.0001"
beta = "1"
lltv = "0.9"
fixed-term-secs = 0
"#;
    let invalid_path = dir.path().join("invalid.toml");
    std::fs::write(&invalid_path, invalid).expect("write");
    let err = inspect::check_config(invalid_path.to_str().expect("utf8 path")).unwrap_err();
    assert_eq!(err.to_string(), "configuration is invalid");
}

#[test]
fn inspect_commands_run_against_a_market_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("market.toml");
    std::fs::write(&path, MARKET_TOML).expect("write");
    let path = path.to_str().expect("utf8 path");

    inspect::sizing(path, true).expect("sizing");
    inspect::preview(path, "210", "260", 0, true, false).expect("preview");
    inspect::waterfall(path, "50", "250", 10, true).expect("waterfall");
}
