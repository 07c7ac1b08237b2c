use ethnum::U256;
use z3::{Config, Context};
use nft_ownership_detector::config::{parse_address, DEFAULT_ATTACKER, DEFAULT_CREATOR};
use nft_ownership_detector::detection::{
    DetectionContext, NftOwnershipDetector, RuleKind, DEFAULT_RULES,
};
use nft_ownership_detector::state::bitvec::{bv_from_u256, word};
use nft_ownership_detector::state::{
    Account, Bytecode, Instruction, Opcode, SymbolicState, TransactionRecord,
};
use nft_ownership_detector::{DetectorConfig, DetectorError};

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (&'static Context, DetectorConfig, DetectionContext<'static>) {
        let cfg = Config::new();
        let ctx = Box::leak(Box::new(Context::new(&cfg)));
        let config = DetectorConfig {
            max_calldata_size: 36,
            ..DetectorConfig::default()
        };
        let context =
            DetectionContext::new(ctx, &config).expect("Failed to build detection context");
        (ctx, config, context)
    }

    const MARKET: u64 = 0x0901d12e;

    fn takeover_state(ctx: &'static Context, opcode: Opcode) -> SymbolicState<'static> {
        takeover_state_at(ctx, U256::from(MARKET), opcode)
    }

    fn takeover_state_at(
        ctx: &'static Context,
        address: U256,
        opcode: Opcode,
    ) -> SymbolicState<'static> {
        let code = Bytecode::from_hex("60806040").unwrap();
        let account = Account::new(ctx, address, "NFTMarket", code);
        let tx = TransactionRecord::symbolic(ctx, "1", address, 8_000_000);
        let instruction = Instruction::new(0x9c, opcode);
        let mut state = SymbolicState::new(ctx, account, tx, "setOwner(address)", instruction);

        let creator = parse_address(DEFAULT_CREATOR).unwrap();
        let attacker = parse_address(DEFAULT_ATTACKER).unwrap();
        state.store(&word(ctx, 0), &bv_from_u256(ctx, creator)).unwrap();
        state.push_stack(bv_from_u256(ctx, attacker));
        state.push_stack(word(ctx, 0));
        state
    }

    #[test]
    fn test_default_rule_table_order() {
        let rules: Vec<RuleKind> = DEFAULT_RULES.iter().map(|slot| slot.rule).collect();
        assert_eq!(rules, RuleKind::ALL.to_vec());
        assert!(DEFAULT_RULES[0].exclusive);
        assert!(DEFAULT_RULES[1..].iter().all(|slot| !slot.exclusive));
    }

    #[test]
    fn test_detector_starts_with_default_rules() {
        let detector = NftOwnershipDetector::new(&DetectorConfig::default());
        assert_eq!(detector.rules(), &DEFAULT_RULES[..]);
        assert!(detector.issues().is_empty());
    }

    #[test]
    fn test_metadata_hooks_sstore() {
        let metadata = NftOwnershipDetector::metadata();
        assert_eq!(metadata.pre_hooks, &["SSTORE"]);
        assert!(metadata.default_enabled);
        assert_eq!(metadata.version, "0.0.1");
    }

    #[test]
    fn test_analysis_does_not_mutate_engine_state() {
        let (ctx, config, context) = setup();
        let state = takeover_state(ctx, Opcode::SStore);
        let before = state.clone();

        let issues = NftOwnershipDetector::new(&config).analyze_state(&context, &state).unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(state, before);
        assert_eq!(state.world.constraints.len(), before.world.constraints.len());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let (ctx, config, context) = setup();
        let state = takeover_state(ctx, Opcode::SStore);
        let detector = NftOwnershipDetector::new(&config);

        let first = detector.analyze_state(&context, &state.clone()).unwrap();
        let second = detector.analyze_state(&context, &state.clone()).unwrap();

        let summary = |issues: &[nft_ownership_detector::Issue]| {
            issues.iter().map(|issue| (issue.rule(), issue.title().to_string())).collect::<Vec<_>>()
        };
        assert_eq!(summary(&first), summary(&second));
    }

    #[test]
    fn test_execute_skips_unhooked_instruction() {
        let (ctx, config, context) = setup();
        let state = takeover_state(ctx, Opcode::SLoad);
        let mut detector = NftOwnershipDetector::new(&config);

        let issues = detector.execute(&context, &state).unwrap();

        assert!(issues.is_empty());
        assert!(detector.issues().is_empty());
    }

    #[test]
    fn test_execute_reports_each_location_once() {
        let (ctx, config, context) = setup();
        let state = takeover_state(ctx, Opcode::SStore);
        let mut detector = NftOwnershipDetector::new(&config);

        let first = detector.execute(&context, &state).unwrap();
        let second = detector.execute(&context, &state).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(detector.issues().len(), 1);
    }

    #[test]
    fn test_same_location_in_another_contract_is_reported() {
        let (ctx, config, context) = setup();
        let mut detector = NftOwnershipDetector::new(&config);

        let first = takeover_state_at(ctx, U256::from(MARKET), Opcode::SStore);
        let second = takeover_state_at(ctx, U256::from(0x0a11ce00u64), Opcode::SStore);

        assert_eq!(detector.execute(&context, &first).unwrap().len(), 1);
        assert_eq!(detector.execute(&context, &second).unwrap().len(), 1);
        assert_eq!(detector.issues().len(), 2);
    }

    #[test]
    fn test_witness_lists_every_known_account() {
        let (ctx, config, context) = setup();
        let mut state = takeover_state(ctx, Opcode::SStore);
        let token = U256::from(0x70c3e2u64);
        state.add_account(Account::new(ctx, token, "NFTToken", Bytecode::default()));

        let issues = NftOwnershipDetector::new(&config).analyze_state(&context, &state).unwrap();
        let accounts = &issues[0].transaction_sequence().initial_state.accounts;

        let entry = accounts.get(&format!("0x{:040x}", token)).expect("Token missing");
        assert_eq!(entry.contract_name.as_deref(), Some("NFTToken"));
        assert!(accounts.contains_key(&format!("0x{:040x}", MARKET)));
        // Two contracts plus the three actors.
        assert_eq!(accounts.len(), 5);
    }

    #[test]
    fn test_reset_module_clears_findings() {
        let (ctx, config, context) = setup();
        let state = takeover_state(ctx, Opcode::SStore);
        let mut detector = NftOwnershipDetector::new(&config);

        detector.execute(&context, &state).unwrap();
        detector.reset_module();
        assert!(detector.issues().is_empty());

        let again = detector.execute(&context, &state).unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_disabled_module_reports_nothing() {
        let (ctx, _, context) = setup();
        let config = DetectorConfig::from_json_str(r#"{ "enabled": false }"#).unwrap();
        let state = takeover_state(ctx, Opcode::SStore);
        let mut detector = NftOwnershipDetector::new(&config);

        assert!(detector.execute(&context, &state).unwrap().is_empty());
    }

    #[test]
    fn test_missing_stack_operand_is_an_error() {
        let (ctx, config, context) = setup();
        let mut state = takeover_state(ctx, Opcode::SStore);
        state.machine.stack.clear();

        let err = NftOwnershipDetector::new(&config).analyze_state(&context, &state).unwrap_err();

        assert!(matches!(err, DetectorError::MissingStateField { .. }));
    }

    #[test]
    fn test_missing_active_account_is_an_error() {
        let (ctx, config, context) = setup();
        let mut state = takeover_state(ctx, Opcode::SStore);
        state.world.accounts.clear();

        let err = NftOwnershipDetector::new(&config).analyze_state(&context, &state).unwrap_err();

        assert!(matches!(err, DetectorError::MissingStateField { .. }));
    }

    #[test]
    fn test_issue_serializes_report_fields() {
        let (ctx, config, context) = setup();
        let state = takeover_state(ctx, Opcode::SStore);

        let issues = NftOwnershipDetector::new(&config).analyze_state(&context, &state).unwrap();
        let json = serde_json::to_value(&issues[0]).unwrap();

        assert_eq!(json["title"], "Ownership Takeover");
        assert_eq!(json["rule"], "ownership-takeover");
        assert_eq!(json["severity"], "High");
        assert_eq!(json["swc_id"], "000");
        assert_eq!(json["transaction_sequence"]["steps"][0]["callerActor"], "ATTACKER");
        assert_eq!(json["transaction_sequence"]["pendingWrite"]["slot"], "0x0");
    }

    #[test]
    fn test_issue_display_lists_witness() {
        let (ctx, config, context) = setup();
        let state = takeover_state(ctx, Opcode::SStore);

        let issues = NftOwnershipDetector::new(&config).analyze_state(&context, &state).unwrap();
        let report = issues[0].to_string();

        assert!(report.starts_with("==== Ownership Takeover ===="));
        assert!(report.contains("Ownership takeover vulnerability detected."));
        assert!(report.contains("[ATTACKER]"));
    }
}
