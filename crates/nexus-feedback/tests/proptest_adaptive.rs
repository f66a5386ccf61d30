use nexus_core::model::{QueryContext, SignalWeights, WeightProfile};
use nexus_feedback::{
    CandidateHistory, Outcome, OutcomeAction, ProfileStore, ThompsonProfileStore,
};
use proptest::prelude::*;
use tempfile::TempDir;

const DOMAINS: [&str; 3] = ["Cryptography", "Machine Learning", "Quantum Computing"];

fn arb_outcome() -> impl Strategy<Value = (usize, Outcome)> {
    (
        0..DOMAINS.len(),
        0_u8..6,
        any::<bool>(),
        prop::array::uniform6(0.0_f32..=1.0),
    )
        .prop_map(|(domain, doc, accepted, values)| {
            let mut idx = 0;
            let weights = SignalWeights::from_fn(|_| {
                let value = values[idx];
                idx += 1;
                value
            });
            let action = if accepted {
                OutcomeAction::Accepted
            } else {
                OutcomeAction::Rejected
            };
            (domain, Outcome::new(doc.to_string(), action, weights))
        })
}

fn record_all(store: &ThompsonProfileStore, outcomes: &[(usize, Outcome)]) {
    for (domain, outcome) in outcomes {
        store
            .record(&QueryContext::for_domain(DOMAINS[*domain]), outcome)
            .expect("record");
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(200))]

    #[test]
    fn sampled_profiles_keep_base_total(outcomes in prop::collection::vec(arb_outcome(), 0..30), seed in any::<u64>()) {
        let base = WeightProfile::enhanced();
        let store = ThompsonProfileStore::new(base.clone(), Some(seed));
        record_all(&store, &outcomes);

        for domain in DOMAINS {
            let profile = store.profile_for(&QueryContext::for_domain(domain));
            prop_assert!(profile.weights.validate().is_ok());
            prop_assert!((profile.weights.total() - base.weights.total()).abs() < 1e-4);
        }
    }

    #[test]
    fn historical_score_is_posterior_mean(outcomes in prop::collection::vec(arb_outcome(), 1..30)) {
        let store = ThompsonProfileStore::new(WeightProfile::standard(), Some(1));
        record_all(&store, &outcomes);

        let state = store.snapshot();
        let total: u64 = state.contexts.values().map(|c| c.outcomes).sum();
        prop_assert_eq!(total, outcomes.len() as u64);

        for (id, history) in &state.candidates {
            let score = store.historical_score(id).expect("seen candidate");
            prop_assert!(score > 0.0 && score < 1.0);
            let CandidateHistory { accepted, rejected } = *history;
            let expected = (accepted as f32 + 1.0) / ((accepted + rejected) as f32 + 2.0);
            prop_assert!((score - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn replaying_the_log_rebuilds_the_state(outcomes in prop::collection::vec(arb_outcome(), 1..20)) {
        let dir = TempDir::new().expect("tempdir");
        let live = ThompsonProfileStore::open(dir.path(), WeightProfile::standard(), Some(3)).expect("open");
        record_all(&live, &outcomes);
        let expected = live.snapshot();

        let reopened = ThompsonProfileStore::open(dir.path(), WeightProfile::standard(), Some(3)).expect("reopen");
        prop_assert_eq!(&reopened.snapshot(), &expected);

        std::fs::remove_file(dir.path().join("adaptive_state.json")).expect("remove state");
        let replayed = ThompsonProfileStore::open(dir.path(), WeightProfile::standard(), Some(3)).expect("replay");
        prop_assert_eq!(&replayed.snapshot(), &expected);
    }
}
