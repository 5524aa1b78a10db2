use super::*;

#[test]
fn decision_policy_defaults() {
    let policy = DecisionPolicy::default();
    assert_eq!(policy.email_threshold, 0.30);
    assert_eq!(policy.escalate_threshold, 0.60);
    assert_eq!(policy.action_costs.none, 0.0);
    assert_eq!(policy.action_costs.email, 5.0);
    assert_eq!(policy.action_costs.discount_call, 50.0);
    assert!(policy.validate().is_ok());
}

#[test]
fn decision_policy_rejects_inverted_thresholds() {
    let policy = DecisionPolicy {
        email_threshold: 0.8,
        escalate_threshold: 0.4,
        ..DecisionPolicy::default()
    };
    assert!(policy.validate().is_err());
}

#[test]
fn decision_policy_rejects_out_of_range_threshold() {
    let policy = DecisionPolicy {
        email_threshold: -0.1,
        ..DecisionPolicy::default()
    };
    assert!(policy.validate().is_err());

    let policy = DecisionPolicy {
        escalate_threshold: 1.5,
        ..DecisionPolicy::default()
    };
    assert!(policy.validate().is_err());
}

#[test]
fn action_cost_lookup() {
    let costs = ActionCosts::default();
    assert_eq!(costs.for_action(RecommendedAction::None), 0.0);
    assert_eq!(costs.for_action(RecommendedAction::Email), 5.0);
    assert_eq!(costs.for_action(RecommendedAction::DiscountCall), 50.0);
}

#[test]
fn candidate_rules_parse_from_sparse_json() {
    let rules: CandidateRules = serde_json::from_str("{}").expect("parse empty rules");
    assert!(rules.exclude_no_action);
    assert_eq!(rules.min_p_churn, None);
    assert_eq!(rules.min_net_gain, 0.0);
    assert_eq!(rules.allowed_actions, None);
    assert_eq!(rules.max_candidates, None);
}

#[test]
fn candidate_rules_reject_unknown_fields() {
    let parsed = serde_json::from_str::<CandidateRules>(r#"{"min_gain": 1.0}"#);
    assert!(parsed.is_err());
}

#[test]
fn run_config_defaults_from_sparse_json() {
    let config: RunConfig =
        serde_json::from_str(r#"{"company_name": "Acme", "from_name": "Dana"}"#)
            .expect("parse run config");
    assert_eq!(config.from_email, DEFAULT_FROM_EMAIL);
    assert_eq!(config.threshold, DEFAULT_SELECTION_THRESHOLD);
    assert_eq!(config.max_targets, DEFAULT_MAX_TARGETS);
    assert!(config.require_email);
    assert!(config.dry_run);
    assert_eq!(config.tone_policy, DEFAULT_TONE_POLICY);
    assert!(config.validate().is_empty());
}

#[test]
fn run_config_collects_every_fault() {
    let config = RunConfig {
        company_name: "  ".to_string(),
        from_name: String::new(),
        from_email: "not-an-email".to_string(),
        threshold: 1.2,
        max_targets: 10,
        require_email: true,
        dry_run: true,
        tone_policy: "friendly-and-direct".to_string(),
        allowed_actions: None,
        prompt_template: None,
    };
    let errors = config.validate();
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(|error| error.stage == Stage::Config));
}

#[test]
fn command_from_env_splits_shell_words() {
    let var = "CPILOT_TEST_COMMAND_SPLIT";
    env::set_var(var, "python3 scorer.py --model 'churn v2'");
    let argv = command_from_env(var).expect("parse command").expect("command set");
    assert_eq!(argv, vec!["python3", "scorer.py", "--model", "churn v2"]);
    env::remove_var(var);
}

#[test]
fn command_from_env_treats_blank_as_unset() {
    let var = "CPILOT_TEST_COMMAND_BLANK";
    env::set_var(var, "   ");
    assert!(command_from_env(var).expect("parse command").is_none());
    env::remove_var(var);
    assert!(command_from_env(var).expect("parse command").is_none());
}

#[test]
fn command_from_env_rejects_unbalanced_quotes() {
    let var = "CPILOT_TEST_COMMAND_BROKEN";
    env::set_var(var, "python3 'unterminated");
    assert!(command_from_env(var).is_err());
    env::remove_var(var);
}
