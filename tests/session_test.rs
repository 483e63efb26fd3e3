use evoscope::optimization::{Objective, OptimizationMode, SteppableOptimizer};
use evoscope::{Command, ReportData, Session, SessionConfig, SessionError, Winner};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;

fn sphere_session(rng: &mut StdRng) -> Session {
    let config = SessionConfig {
        pop_size: 16,
        function_expr: Some("x1^2 + x2^2".to_string()),
        ..SessionConfig::default()
    };
    Session::with_rng(config, rng).unwrap()
}

#[test]
fn test_step_seek_continue_round_trip() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut session = sphere_session(&mut rng);

    for expected in 1..=4 {
        let response = session.handle_with(r#"{"action": "step"}"#, &mut rng);
        assert_eq!(response.ag.iteration, expected);
        assert_eq!(response.pso.iteration, expected);
        assert!(response.error.is_none());
    }

    let seeked = session.handle_with(r#"{"action": "seek", "iteration": 2}"#, &mut rng);
    assert_eq!(seeked.ag.iteration, 2);
    assert_eq!(seeked.pso.iteration, 2);
    assert_eq!(seeked.ag.max_iteration, 4);
    assert_eq!(seeked.ag.population.len(), 16);

    let resumed = session.handle_with("continue", &mut rng);
    assert_eq!(resumed.ag.iteration, 4);
    assert_eq!(resumed.pso.iteration, 4);
}

#[test]
fn test_seek_out_of_range_reports_and_keeps_state() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut session = sphere_session(&mut rng);
    session.step_with(&mut rng);
    session.step_with(&mut rng);
    let before = session.state();

    let response = session.handle_with(r#"{"action": "seek", "iteration": 9}"#, &mut rng);
    assert_eq!(response.error.as_deref(), Some("Iteration 9 not available"));
    assert_eq!(response.ag, before.ag);
    assert_eq!(response.pso, before.pso);
}

#[test]
fn test_step_after_seek_grows_history() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut session = sphere_session(&mut rng);
    for _ in 0..3 {
        session.step_with(&mut rng);
    }
    session.seek(1).unwrap();
    let response = session.execute_with(Command::Step, &mut rng);

    assert_eq!(response.ag.iteration, 2);
    assert_eq!(session.ga().history().len(), 5);
    assert_eq!(session.pso().history().len(), 5);
}

#[test]
fn test_reset_rejected_expression_keeps_previous_objective() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut session = sphere_session(&mut rng);
    session.step_with(&mut rng);

    let response = session.handle_with(
        r#"{"action": "reset", "pop_size": 10, "function_expr": "sin(x1) + y1"}"#,
        &mut rng,
    );
    assert_eq!(response.error.as_deref(), Some("Unsupported symbol(s): y1"));
    assert_eq!(response.ag.iteration, 0);
    assert_eq!(response.ag.population.len(), 10);
    assert_eq!(session.objective().describe(), "x1**2 + x2**2");
}

#[test]
fn test_reset_rejected_expression_falls_back_to_default_when_too_wide() {
    let mut rng = StdRng::seed_from_u64(5);
    let config = SessionConfig {
        dimensions: 3,
        function_expr: Some("x1 + x2 + x3".to_string()),
        ..SessionConfig::default()
    };
    let mut session = Session::with_rng(config, &mut rng).unwrap();

    let reset = SessionConfig {
        dimensions: 2,
        function_expr: Some("x1 + nope".to_string()),
        ..SessionConfig::default()
    };
    let rejected = session.reset_with(reset, &mut rng).unwrap();
    assert!(rejected.is_some());
    assert_eq!(session.objective().describe(), "rastrigin");
    assert_eq!(session.state().ag.population[0].len(), 2);
}

#[test]
fn test_reset_with_invalid_settings_leaves_session_alone() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut session = sphere_session(&mut rng);
    session.step_with(&mut rng);
    session.step_with(&mut rng);

    let response = session.handle_with(r#"{"action": "reset", "pop_size": 1}"#, &mut rng);
    assert!(response.error.is_some());
    assert_eq!(response.ag.iteration, 2);
    assert_eq!(session.config().pop_size, 16);

    let response = session.handle_with(
        r#"{"action": "reset", "bounds": [[1.0, -1.0], [0.0, 1.0]]}"#,
        &mut rng,
    );
    assert!(response.error.is_some());
    assert_eq!(response.ag.iteration, 2);
}

#[test]
fn test_reset_applies_mode_and_bounds() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut session = sphere_session(&mut rng);
    let response = session.handle_with(
        r#"{"action": "reset", "optimization_mode": "max", "bounds": [[0.0, 1.0], [2.0, 3.0]]}"#,
        &mut rng,
    );
    assert!(response.error.is_none());
    assert_eq!(session.config().mode(), OptimizationMode::Max);

    for _ in 0..5 {
        session.step_with(&mut rng);
    }
    for point in session.state().pso.population {
        assert!((0.0..=1.0).contains(&point[0]));
        assert!((2.0..=3.0).contains(&point[1]));
    }
}

#[test]
fn test_unknown_command_is_reported() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut session = sphere_session(&mut rng);
    let response = session.handle_with("launch", &mut rng);
    assert_eq!(response.error.as_deref(), Some("Unknown action 'launch'"));
    assert_eq!(response.ag.iteration, 0);
}

#[test]
fn test_response_json_shape() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut session = sphere_session(&mut rng);
    let ok = serde_json::to_value(session.handle_with("step", &mut rng)).unwrap();
    assert!(ok.get("ag").is_some());
    assert!(ok.get("pso").is_some());
    assert!(ok.get("error").is_none());
    assert_eq!(ok["ag"]["iteration"], 1);
    assert_eq!(ok["pso"]["converged"], false);

    let failed =
        serde_json::to_value(session.handle_with(r#"{"action": "seek", "iteration": 50}"#, &mut rng))
            .unwrap();
    assert_eq!(failed["error"], "Iteration 50 not available");
}

#[test]
fn test_new_session_rejects_bad_expression() {
    let config = SessionConfig {
        function_expr: Some("__import__('os')".to_string()),
        ..SessionConfig::default()
    };
    assert!(matches!(Session::new(config), Err(SessionError::Expression(_))));
}

#[test]
fn test_report_data_and_convergence() {
    let mut rng = StdRng::seed_from_u64(10);
    let config = SessionConfig {
        pop_size: 8,
        function_expr: Some("0 * x1 + 0 * x2 + 1".to_string()),
        convergence_enabled: true,
        convergence_window: 2,
        ..SessionConfig::default()
    };
    let mut session = Session::with_rng(config, &mut rng).unwrap();
    session.step_with(&mut rng);
    assert!(!session.converged());
    session.step_with(&mut rng);
    assert!(session.converged());
    session.step_with(&mut rng);

    let report = ReportData::from_session(&session);
    assert_eq!(report.history_ag, vec![1.0; 4]);
    assert_eq!(report.history_pso.len(), 4);
    assert_eq!(report.ag_converged_at, Some(2));
    assert_eq!(report.pso_converged_at, Some(2));

    let analysis = report.analyze();
    assert_eq!(analysis.winner, Winner::Tie);
    assert_eq!(analysis.iterations, 4);
    assert_eq!(analysis.ag_improvement, Some(0.0));
    assert_eq!(analysis.ag_converged_at, Some(2));
}

#[test]
fn test_config_files() {
    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        yaml,
        "pop_size: 30\ndimensions: 3\nfunction_expr: \"x1 * x2 - x3\"\noptimization_mode: target\ntarget_value: 2.5"
    )
    .unwrap();
    let config = SessionConfig::from_path(yaml.path()).unwrap();
    assert_eq!(config.pop_size, 30);
    assert_eq!(config.dimensions, 3);
    assert_eq!(config.mode(), OptimizationMode::Target);
    assert_eq!(config.pso_c1, 1.5);

    let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    writeln!(json, r#"{{"ag_mutation": 0.2, "convergence_enabled": true}}"#).unwrap();
    let config = SessionConfig::from_path(json.path()).unwrap();
    assert_eq!(config.ag_mutation, 0.2);
    assert!(config.convergence_enabled);
    assert_eq!(config.convergence_window, 20);

    assert!(matches!(
        SessionConfig::from_path("/definitely/not/here.yaml"),
        Err(SessionError::Io(_))
    ));
}
