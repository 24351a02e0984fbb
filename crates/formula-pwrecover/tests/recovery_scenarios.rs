use formula_pwrecover::{
    extract_encryption_params, inspect_container, AttackOptions, AttackStrategy, CandidatePlan,
    HashAlgorithm, HostConfig, HostEvent, NumericSpace, Protection, RecoveryHost, RunOutcome,
    StartRequest, Wordlist,
};

mod common;

use common::{params_for, plain_container, protected_container};

fn words_with(password: &str, position: usize, len: usize) -> Wordlist {
    Wordlist::new((0..len).map(|i| {
        if i + 1 == position {
            password.to_string()
        } else {
            format!("filler-{i:03}")
        }
    }))
}

#[test]
fn container_without_encryption_info_is_not_protected() {
    let bytes = plain_container();
    assert_eq!(extract_encryption_params(&bytes).unwrap(), None);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.xlsx");
    std::fs::write(&path, &bytes).unwrap();
    assert_eq!(inspect_container(&path).unwrap(), Protection::NotProtected);
}

#[test]
fn protected_container_round_trips_through_the_extractor() {
    let params = params_for("secret", HashAlgorithm::Sha512, "SHA512");
    let bytes = protected_container(&params);
    assert_eq!(extract_encryption_params(&bytes).unwrap(), Some(params.clone()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");
    std::fs::write(&path, &bytes).unwrap();
    assert_eq!(inspect_container(&path).unwrap(), Protection::Protected(params));
}

#[test]
fn dictionary_attack_finds_the_fiftieth_word() {
    let params = params_for("1234", HashAlgorithm::Sha512, "SHA512");
    let bytes = protected_container(&params);
    let params = extract_encryption_params(&bytes).unwrap().unwrap();

    let plan = CandidatePlan::new(AttackStrategy::Dictionary).with_wordlist(words_with("1234", 50, 80));
    let mut host = RecoveryHost::default();
    host.start(StartRequest { plan, params }).unwrap();

    let mut snapshots = Vec::new();
    let outcome = host.wait(|snap| snapshots.push(snap.clone()));

    assert_eq!(outcome, Some(RunOutcome::Found("1234".to_string())));
    assert_eq!(snapshots.len(), 50);
    for (i, snap) in snapshots.iter().enumerate() {
        assert_eq!(snap.tested, i as u64 + 1);
        assert_eq!(snap.total, 80);
    }
    assert_eq!(snapshots.last().unwrap().current, "1234");
}

#[test]
fn brute_force_finds_a_zero_padded_pin() {
    let params = params_for("083517", HashAlgorithm::Sha512, "SHA512");
    let plan = CandidatePlan::new(AttackStrategy::BruteForce);
    assert_eq!(plan.len(), 1_000_000);

    let mut host = RecoveryHost::default();
    host.start(StartRequest { plan, params }).unwrap();

    let mut last = None;
    let outcome = host.wait(|snap| last = Some(snap.clone()));

    assert_eq!(outcome, Some(RunOutcome::Found("083517".to_string())));
    let last = last.expect("progress before the match");
    assert_eq!(last.tested, 83_518);
    assert_eq!(last.current, "083517");
    assert_eq!(last.total, 1_000_000);
}

#[test]
fn hybrid_attack_over_the_default_space_has_a_million_numeric_candidates() {
    let plan = CandidatePlan::new(AttackStrategy::Hybrid);
    assert_eq!(plan.len(), Wordlist::builtin().len() as u64 + 1_000_000);
}

#[test]
fn default_hybrid_attack_exhausts_dictionary_and_six_digit_space() {
    let params = params_for("not-in-any-list", HashAlgorithm::Sha1, "SHA1");
    let plan = CandidatePlan::new(AttackStrategy::Hybrid);
    let expected_total = Wordlist::builtin().len() as u64 + 1_000_000;
    assert_eq!(plan.len(), expected_total);

    let mut host = RecoveryHost::new(HostConfig {
        attack: AttackOptions {
            progress_interval: 1_000,
        },
        ..HostConfig::default()
    });
    host.start(StartRequest { plan, params }).unwrap();

    let mut last_tested = 0u64;
    let mut snapshots = 0usize;
    let outcome = host.wait(|snap| {
        assert!(snap.tested >= last_tested, "{} after {last_tested}", snap.tested);
        assert!(snap.tested <= snap.total);
        assert_eq!(snap.total, expected_total);
        assert!(snap.speed >= 0.0, "speed {}", snap.speed);
        assert!(snap.eta_secs >= 0.0, "eta {}", snap.eta_secs);
        last_tested = snap.tested;
        snapshots += 1;
    });

    assert_eq!(outcome, Some(RunOutcome::NotFound));
    assert_eq!(last_tested, expected_total);
    assert_eq!(snapshots as u64, expected_total.div_ceil(1_000));
}

#[test]
fn small_hybrid_attack_reports_every_candidate() {
    let params = params_for("not-in-any-list", HashAlgorithm::Sha256, "SHA-256");
    let plan = CandidatePlan::new(AttackStrategy::Hybrid)
        .with_wordlist(Wordlist::new(["alpha", "bravo", "charlie"]))
        .with_numeric_space(NumericSpace::new(2).unwrap());

    let mut host = RecoveryHost::default();
    host.start(StartRequest { plan, params }).unwrap();

    let mut tested = Vec::new();
    let outcome = host.wait(|snap| tested.push(snap.tested));

    assert_eq!(outcome, Some(RunOutcome::NotFound));
    assert_eq!(tested.len(), 103);
    assert_eq!(tested.last(), Some(&103));
    assert!(!host.is_running());
}

#[test]
fn cancel_mid_run_suppresses_late_results() {
    let params = params_for("999999", HashAlgorithm::Sha1, "SHA1");
    let plan = CandidatePlan::new(AttackStrategy::BruteForce);

    let mut host = RecoveryHost::default();
    host.start(StartRequest { plan, params }).unwrap();

    let mut progress = Vec::new();
    let terminal = loop {
        let event = host.recv().expect("run is active until a terminal event");
        match event {
            HostEvent::Progress(snap) => {
                progress.push(snap.tested);
                if snap.tested == 10 {
                    host.cancel();
                }
            }
            terminal => break terminal,
        }
    };

    assert_eq!(terminal, HostEvent::Cancelled);
    assert_eq!(progress, (1..=10).collect::<Vec<u64>>());
    assert!(!host.is_running());
    assert_eq!(host.try_recv(), None);
}

#[test]
fn unsupported_hash_algorithm_exhausts_without_matching() {
    let mut params = params_for("12", HashAlgorithm::Sha512, "SHA512");
    params.hash_algorithm = "MD5".to_string();
    let plan = CandidatePlan::new(AttackStrategy::BruteForce)
        .with_numeric_space(NumericSpace::new(2).unwrap());

    let mut host = RecoveryHost::default();
    host.start(StartRequest { plan, params }).unwrap();
    assert_eq!(host.wait(|_| {}), Some(RunOutcome::NotFound));
}
